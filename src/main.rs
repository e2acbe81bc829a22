mod cli;
mod error;
mod logging;

use crate::cli::{Cli, Command, RunArgs, UpdateArgs, ValidateArgs};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use emote_animation::{Catalog, FrameSink, Mood, Player, mega_frame_counts};
use emote_config::Settings;
use emote_frame::Frame;
use emote_storage::AssetStore;
use emote_storage::backend::LocalBackend;
use emote_updater::http::ReqwestClient;
use emote_updater::{Context, Updater};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format);
    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "emote failed");
            ExitCode::FAILURE
        },
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let Cli { config, store, command, .. } = cli;
    match command {
        Command::Validate(args) => validate(args).await,
        Command::Run(args) => {
            let (settings, ctx) = load(config.as_deref(), store).await?;
            run(ctx, &settings, args).await
        },
        Command::Update(args) => {
            let (_, ctx) = load(config.as_deref(), store).await?;
            update(ctx, args).await
        },
        Command::Status => {
            let (_, ctx) = load(config.as_deref(), store).await?;
            status(&ctx).await
        },
    }
}

async fn load(config: Option<&Path>, store: Option<PathBuf>) -> Result<(Settings, Context)> {
    let mut settings = Settings::load(config).or_raise(|| ErrorKind::Config)?;
    if let Some(root) = store {
        settings.store.root = root;
    }
    let ctx = context(&settings).await?;
    Ok((settings, ctx))
}

/// Wire the asset store, catalog and HTTP client together and publish the
/// first catalog generation.
async fn context(settings: &Settings) -> Result<Context> {
    let backend = LocalBackend::new("local", &settings.store.root).or_raise(|| ErrorKind::Storage)?;
    let store = AssetStore::new(Arc::new(backend));
    let options = settings.updater_options();
    let catalog = Arc::new(Catalog::new().with_mega_bundle(options.bundle_name.as_str()));
    let http = ReqwestClient::new(options.resolve_timeout).or_raise(|| ErrorKind::Update)?;
    let snapshot = catalog.reload_all(&store).await;
    tracing::info!(root = %settings.store.root.display(), generation = snapshot.generation(), "Assets loaded");
    Ok(Context::new(store, catalog, Arc::new(http), options))
}

/// Stand-in display: reports each frame it is handed.
struct LogSink;

impl FrameSink for LogSink {
    fn show(&mut self, mood: Mood, step: usize, frame: &Frame) {
        tracing::debug!(%mood, step, width = frame.width(), height = frame.height(), "Frame");
    }
}

async fn run(ctx: Context, settings: &Settings, args: RunArgs) -> Result<()> {
    let cancel = CancellationToken::new();
    let updater = Updater::new(ctx.clone()).spawn(None, cancel.clone());
    let player = Player::new(ctx.catalog.subscribe(), args.mood);
    let playback = {
        let cancel = cancel.clone();
        let interval = settings.frame_interval();
        tokio::spawn(async move {
            let mut sink = LogSink;
            player.run(&mut sink, interval, cancel).await;
        })
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Could not listen for Ctrl-C, shutting down");
    }
    tracing::info!("Shutting down");
    cancel.cancel();
    updater.join().await;
    if let Err(err) = playback.await {
        tracing::error!(error = %err, "Playback task panicked");
    }
    Ok(())
}

async fn update(ctx: Context, args: UpdateArgs) -> Result<()> {
    if !ctx.options.enabled && !args.force {
        tracing::warn!("Updater is disabled; pass --force to update anyway");
        return Ok(());
    }
    if let Err(err) = ctx.store.sweep_staging().await {
        tracing::warn!(error = %err, "Could not sweep staging area");
    }
    let updater = Updater::new(ctx);
    let outcome = updater.check_once().await;
    print_json(&updater.status())?;
    let committed = outcome.or_raise(|| ErrorKind::Update)?;
    tracing::info!(url = %committed.url, size = committed.size, hash = %committed.hash, "Update committed");
    Ok(())
}

async fn validate(args: ValidateArgs) -> Result<()> {
    let path = args.file;
    let file = tokio::fs::File::open(&path).await.map_err(|err| ErrorKind::Validation(err.to_string()))?;
    let file = file.into_std().await;
    let counts = mega_frame_counts();
    let frames = tokio::task::spawn_blocking(move || emote_frame::bundle::validate_reader(file, &counts))
        .await
        .map_err(|err| ErrorKind::Validation(err.to_string()))?
        .map_err(|err| ErrorKind::Validation(err.to_string()))?;
    tracing::info!(path = %path.display(), frames, "Bundle is valid");
    Ok(())
}

async fn status(ctx: &Context) -> Result<()> {
    let manifest = ctx.store.manifest().await.or_raise(|| ErrorKind::Storage)?;
    let inventory = ctx.store.inventory().await.or_raise(|| ErrorKind::Storage)?;
    let snapshot = ctx.catalog.current();
    print_json(&serde_json::json!({
        "manifest": manifest,
        "assets": inventory,
        "catalog": {
            "generation": snapshot.generation(),
            "sources": snapshot.sources(),
        },
        "updater": {
            "enabled": ctx.options.enabled,
            "endpoint": ctx.options.endpoint,
            "bundle_name": ctx.options.bundle_name,
        },
    }))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).or_raise(|| ErrorKind::Output)?;
    println!("{json}");
    Ok(())
}
