use crate::logging::LogFormat;
use clap::{Args, Parser, Subcommand};
use emote_animation::Mood;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "emote", version, about = "Animated mood assets with over-the-air bundle updates")]
pub struct Cli {
    /// Configuration file (defaults to emote.toml in the user config directory).
    #[arg(long, global = true, env = "EMOTE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Asset volume, overriding `store.root`.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play animations and keep the bundle up to date until interrupted.
    Run(RunArgs),
    /// Run a single update attempt.
    Update(UpdateArgs),
    /// Check a mega bundle file against the expected layout.
    Validate(ValidateArgs),
    /// Print the manifest, stored assets and catalog sources as JSON.
    Status,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, default_value = "normal", value_parser = parse_mood)]
    pub mood: Mood,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Attempt even when the updater is disabled.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    pub file: PathBuf,
}

fn parse_mood(value: &str) -> Result<Mood, String> {
    Mood::ALL.into_iter().find(|mood| mood.to_string() == value).ok_or_else(|| {
        let known: Vec<String> = Mood::ALL.iter().map(ToString::to_string).collect();
        format!("unknown mood '{value}', expected one of: {}", known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = ["emote", "update", "--force", "--store", "/srv/emote", "--log-format", "json"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/srv/emote")));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Command::Update(UpdateArgs { force: true })));
    }

    #[rstest]
    #[case("happy", Mood::Happy)]
    #[case("static_normal", Mood::StaticNormal)]
    fn test_run_mood(#[case] arg: &str, #[case] expected: Mood) {
        let cli = Cli::try_parse_from(["emote", "run", "--mood", arg]).unwrap();
        assert!(matches!(cli.command, Command::Run(RunArgs { mood }) if mood == expected));
    }

    #[test]
    fn test_unknown_mood() {
        let err = Cli::try_parse_from(["emote", "run", "--mood", "grumpy"]).unwrap_err();
        assert!(err.to_string().contains("unknown mood"));
    }

    #[test]
    fn test_validate_requires_file() {
        assert!(Cli::try_parse_from(["emote", "validate"]).is_err());
    }
}
