//! Layered settings for the emote binary.
//!
//! Later sources override earlier ones:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`emote.toml` in the platform config directory unless a
//!    path is given),
//! 3. `EMOTE_`-prefixed environment variables, with `__` separating
//!    sections (`EMOTE_UPDATER__ENDPOINT`, `EMOTE_STORE__ROOT`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use emote_storage::AssetStore;
use emote_updater::UpdaterOptions;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "EMOTE_";
pub const CONFIG_FILE: &str = "emote.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "emote")
}

/// Where the configuration file is looked for when none is given.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub updater: UpdaterSettings,
    pub playback: PlaybackSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Mount point of the asset volume. Must be absolute.
    pub root: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let root = project_dirs().map_or_else(|| PathBuf::from("/var/lib/emote"), |dirs| dirs.data_dir().to_path_buf());
        Self { root }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub bundle_name: String,
    pub startup_delay_secs: u64,
    pub retry_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub resolve_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for UpdaterSettings {
    // Off until an endpoint is configured.
    fn default() -> Self {
        let options = UpdaterOptions::default();
        Self {
            enabled: false,
            endpoint: options.endpoint,
            bundle_name: options.bundle_name,
            startup_delay_secs: options.startup_delay.as_secs(),
            retry_interval_secs: options.retry_interval.as_secs(),
            refresh_interval_secs: options.refresh_interval.as_secs(),
            resolve_timeout_secs: options.resolve_timeout.as_secs(),
            download_timeout_secs: options.download_timeout.as_secs(),
            read_timeout_secs: options.read_timeout.as_secs(),
            user_agent: options.user_agent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub frame_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        let interval = emote_animation::DEFAULT_FRAME_INTERVAL.as_millis();
        Self { frame_interval_ms: u64::try_from(interval).unwrap_or(500) }
    }
}

impl Settings {
    /// The merged providers, before extraction.
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate settings.
    ///
    /// An explicit `file` must exist; the default location is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let path = match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::Missing(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => default_config_path().unwrap_or_else(|| PathBuf::from(CONFIG_FILE)),
        };
        tracing::debug!(path = %path.display(), exists = path.is_file(), "Loading configuration");
        let settings: Settings = Self::figment(&path).extract().map_err(|err| ErrorKind::Load(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.store.root.is_absolute() {
            exn::bail!(ErrorKind::Invalid(format!("store.root must be absolute, got {}", self.store.root.display())));
        }

        let updater = &self.updater;
        let durations = [
            ("updater.retry_interval_secs", updater.retry_interval_secs),
            ("updater.refresh_interval_secs", updater.refresh_interval_secs),
            ("updater.resolve_timeout_secs", updater.resolve_timeout_secs),
            ("updater.download_timeout_secs", updater.download_timeout_secs),
            ("updater.read_timeout_secs", updater.read_timeout_secs),
            ("playback.frame_interval_ms", self.playback.frame_interval_ms),
        ];
        if let Some((key, _)) = durations.iter().find(|(_, value)| *value == 0) {
            exn::bail!(ErrorKind::Invalid(format!("{key} must be greater than zero")));
        }

        if updater.enabled && updater.endpoint.is_empty() {
            exn::bail!(ErrorKind::Invalid("updater.enabled requires updater.endpoint".to_string()));
        }
        if !updater.endpoint.is_empty()
            && !(updater.endpoint.starts_with("https://") || updater.endpoint.starts_with("http://"))
        {
            exn::bail!(ErrorKind::Invalid(format!("updater.endpoint is not an HTTP URL: {}", updater.endpoint)));
        }
        if AssetStore::validate_name(&updater.bundle_name).is_err() {
            let name = &updater.bundle_name;
            exn::bail!(ErrorKind::Invalid(format!("updater.bundle_name is not a usable asset name: {name}")));
        }
        if updater.user_agent.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("updater.user_agent must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn updater_options(&self) -> UpdaterOptions {
        let updater = &self.updater;
        UpdaterOptions {
            enabled: updater.enabled,
            endpoint: updater.endpoint.clone(),
            bundle_name: updater.bundle_name.clone(),
            startup_delay: Duration::from_secs(updater.startup_delay_secs),
            retry_interval: Duration::from_secs(updater.retry_interval_secs),
            refresh_interval: Duration::from_secs(updater.refresh_interval_secs),
            resolve_timeout: Duration::from_secs(updater.resolve_timeout_secs),
            download_timeout: Duration::from_secs(updater.download_timeout_secs),
            read_timeout: Duration::from_secs(updater.read_timeout_secs),
            user_agent: updater.user_agent.clone(),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.playback.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn valid() -> Settings {
        let mut settings = Settings::default();
        settings.store.root = PathBuf::from("/srv/emote");
        settings.updater.enabled = true;
        settings.updater.endpoint = "https://updates.local/latest".to_string();
        settings
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert!(!settings.updater.enabled);
        assert_eq!(settings.updater.bundle_name, emote_animation::MEGA_BUNDLE_NAME);
        assert_eq!(settings.frame_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "emote.toml",
                r#"
                    [store]
                    root = "/srv/emote"

                    [updater]
                    enabled = true
                    endpoint = "https://updates.local/latest"
                    retry_interval_secs = 30
                    refresh_interval_secs = 7200
                "#,
            )?;
            jail.set_env("EMOTE_UPDATER__REFRESH_INTERVAL_SECS", "900");
            jail.set_env("EMOTE_PLAYBACK__FRAME_INTERVAL_MS", "250");

            let settings = Settings::load(Some(Path::new("emote.toml"))).unwrap();
            assert_eq!(settings.store.root, PathBuf::from("/srv/emote"));
            assert_eq!(settings.updater.retry_interval_secs, 30);
            assert_eq!(settings.updater.refresh_interval_secs, 900);
            assert_eq!(settings.updater.startup_delay_secs, 5);
            assert_eq!(settings.frame_interval(), Duration::from_millis(250));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Missing(_)));
    }

    #[test]
    fn test_wrong_type_is_load_error() {
        Jail::expect_with(|jail| {
            jail.create_file("emote.toml", "[updater]\nretry_interval_secs = \"soon\"\n")?;
            let err = Settings::load(Some(Path::new("emote.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case::relative_root(|s: &mut Settings| s.store.root = PathBuf::from("assets"))]
    #[case::zero_retry(|s: &mut Settings| s.updater.retry_interval_secs = 0)]
    #[case::zero_read_timeout(|s: &mut Settings| s.updater.read_timeout_secs = 0)]
    #[case::zero_frame_interval(|s: &mut Settings| s.playback.frame_interval_ms = 0)]
    #[case::enabled_without_endpoint(|s: &mut Settings| s.updater.endpoint.clear())]
    #[case::ftp_endpoint(|s: &mut Settings| s.updater.endpoint = "ftp://updates.local".to_string())]
    #[case::manifest_as_bundle(|s: &mut Settings| s.updater.bundle_name = "manifest.json".to_string())]
    #[case::escaping_bundle(|s: &mut Settings| s.updater.bundle_name = "../bundle.bin".to_string())]
    #[case::blank_user_agent(|s: &mut Settings| s.updater.user_agent = " ".to_string())]
    fn test_invalid(#[case] tweak: fn(&mut Settings)) {
        let mut settings = valid();
        tweak(&mut settings);
        let err = settings.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)), "{err:?}");
    }

    #[test]
    fn test_zero_startup_delay_is_allowed() {
        let mut settings = valid();
        settings.updater.startup_delay_secs = 0;
        settings.validate().unwrap();
    }

    #[test]
    fn test_updater_options() {
        let mut settings = valid();
        settings.updater.download_timeout_secs = 120;
        let options = settings.updater_options();
        assert!(options.enabled);
        assert_eq!(options.endpoint, "https://updates.local/latest");
        assert_eq!(options.download_timeout, Duration::from_secs(120));
        assert_eq!(options.retry_interval, Duration::from_secs(10));
    }
}
