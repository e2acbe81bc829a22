//! The update state machine and its background worker.
//!
//! An attempt runs `Resolving → Downloading → Validating → Committing` and
//! always ends back in `Idle`. Nothing reaches the bundle's final name
//! unless it passed validation from disk; an attempt that fails before the
//! rename leaves the previous bundle, its manifest entry and the published
//! catalog alone. Once renamed, the bundle is published even if recording
//! it in the manifest fails.
//!
//! The worker schedules attempts: one after the startup delay, then every
//! `retry_interval` until a bundle has been obtained, then every
//! `refresh_interval`. "Obtained" is read from the manifest, so it survives
//! restarts and a failed forced attempt can't clear it.

use crate::context::Context;
use crate::download::{Download, stream_download, validate_download};
use crate::error::{ErrorKind, Result};
use crate::resolve::resolve_bundle_url;
use crate::state::{Connectivity, UpdaterState, UpdaterStatus};
use emote_animation::mega_frame_counts;
use exn::ResultExt;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A bundle that made it all the way into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub url: String,
    pub size: u64,
    pub hash: String,
    pub frames: u32,
    /// Catalog generation published after the commit.
    pub generation: u64,
}

enum Command {
    Force(oneshot::Sender<Result<Committed>>),
    SetEnabled(bool),
}

fn unix_now() -> u64 {
    u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or_default()
}

pub struct Updater {
    ctx: Context,
    status: watch::Sender<UpdaterStatus>,
}

impl Updater {
    pub fn new(ctx: Context) -> Self {
        let status = UpdaterStatus { enabled: ctx.options.enabled, online: true, ..Default::default() };
        let (status, _) = watch::channel(status);
        Self { ctx, status }
    }

    pub fn status(&self) -> UpdaterStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdaterStatus> {
        self.status.subscribe()
    }

    /// Whether the bundle is registered in the manifest.
    pub async fn obtained(&self) -> bool {
        match self.ctx.store.entry(&self.ctx.options.bundle_name).await {
            Ok(entry) => entry.is_some(),
            Err(err) => {
                tracing::warn!(error = %err, "Could not read manifest");
                false
            },
        }
    }

    async fn interval(&self) -> Duration {
        if self.obtained().await { self.ctx.options.refresh_interval } else { self.ctx.options.retry_interval }
    }

    fn set_state(&self, state: UpdaterState) {
        tracing::debug!(%state, "Updater state");
        self.status.send_modify(|status| status.state = state);
    }

    /// Run one full attempt now, updating the status counters.
    pub async fn check_once(&self) -> Result<Committed> {
        let started = unix_now();
        self.status.send_modify(|status| {
            status.check_count += 1;
            status.last_check_time = Some(started);
        });
        let outcome = self.attempt().await;
        let obtained = self.obtained().await;
        self.status.send_modify(|status| {
            status.state = UpdaterState::Idle;
            status.obtained = obtained;
            match &outcome {
                Ok(_) => {
                    status.update_count += 1;
                    status.last_update_time = Some(unix_now());
                    status.last_error = None;
                },
                Err(err) => {
                    status.error_count += 1;
                    status.last_error = Some(err.to_string());
                },
            }
        });
        if let Err(err) = &outcome {
            tracing::warn!(error = %err, retryable = err.is_retryable(), "Update attempt failed");
        }
        outcome
    }

    async fn attempt(&self) -> Result<Committed> {
        let Context { store, catalog, http, options } = &self.ctx;
        if options.endpoint.is_empty() {
            exn::bail!(ErrorKind::Unresolvable("no endpoint configured".to_string()));
        }

        self.set_state(UpdaterState::Resolving);
        let url = resolve_bundle_url(&**http, &options.endpoint, options).await?;

        self.set_state(UpdaterState::Downloading);
        let download = stream_download(&**http, &url, store, &options.bundle_name, options).await?;

        self.set_state(UpdaterState::Validating);
        let frames = match validate_download(store, &download, &mega_frame_counts()).await {
            Ok(frames) => frames,
            Err(err) => {
                tracing::warn!(url, error = %err, "Discarding invalid bundle");
                store.discard(download.staged).await;
                return Err(err);
            },
        };

        self.set_state(UpdaterState::Committing);
        let Download { staged, size, hash } = download;
        store.commit(staged).await.or_raise(|| ErrorKind::Storage)?;
        // The bundle is in place now; publish it even if registering it fails.
        let registered = store.update_manifest(&options.bundle_name, size, &hash).await;
        let snapshot = catalog.reload_all(store).await;
        if let Err(err) = registered {
            let generation = snapshot.generation();
            tracing::warn!(url, error = %err, generation, "Bundle committed but not registered");
            return Err(err).or_raise(|| ErrorKind::Storage);
        }
        tracing::info!(url, size, frames, generation = snapshot.generation(), "Bundle updated");
        Ok(Committed { url, size, hash, frames, generation: snapshot.generation() })
    }

    async fn check_until_cancelled(&self, cancel: &CancellationToken) -> Result<Committed> {
        tokio::select! {
            outcome = self.check_once() => outcome,
            _ = cancel.cancelled() => exn::bail!(ErrorKind::Shutdown),
        }
    }

    /// Start the background worker.
    ///
    /// `connectivity`, when given, gates scheduled attempts on the link
    /// being up and triggers one as soon as it comes back. The worker stops
    /// when `cancel` fires; an interrupted attempt leaves at most a staging
    /// file, which the next start sweeps away.
    pub fn spawn(
        self,
        connectivity: Option<watch::Receiver<Connectivity>>,
        cancel: CancellationToken,
    ) -> UpdaterHandle {
        let (commands, receiver) = mpsc::channel(8);
        let status = self.subscribe();
        let task = tokio::spawn(self.run(receiver, connectivity, cancel));
        UpdaterHandle { commands, status, task }
    }

    async fn run(
        self,
        commands: mpsc::Receiver<Command>,
        mut connectivity: Option<watch::Receiver<Connectivity>>,
        cancel: CancellationToken,
    ) {
        let mut commands = Some(commands);
        match self.ctx.store.sweep_staging().await {
            Ok(0) => {},
            Ok(removed) => tracing::info!(removed, "Removed interrupted downloads"),
            Err(err) => tracing::warn!(error = %err, "Could not sweep staging area"),
        }
        let mut online = connectivity.as_ref().is_none_or(|rx| *rx.borrow() == Connectivity::Online);
        let obtained = self.obtained().await;
        self.status.send_modify(|status| {
            status.running = true;
            status.online = online;
            status.obtained = obtained;
        });
        let mut next = Instant::now() + self.ctx.options.startup_delay;
        tracing::info!(
            bundle = %self.ctx.options.bundle_name,
            obtained,
            delay_secs = self.ctx.options.startup_delay.as_secs(),
            "Updater started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                command = next_command(&mut commands) => match command {
                    Command::Force(reply) => {
                        tracing::info!("Forced update check");
                        let outcome = self.check_until_cancelled(&cancel).await;
                        next = Instant::now() + self.interval().await;
                        let _ = reply.send(outcome);
                    },
                    Command::SetEnabled(enabled) => {
                        tracing::info!(enabled, "Updater enabled state changed");
                        self.status.send_modify(|status| status.enabled = enabled);
                    },
                },
                change = connectivity_change(&mut connectivity) => {
                    let was_online = online;
                    online = change.is_none_or(|state| state == Connectivity::Online);
                    self.status.send_modify(|status| status.online = online);
                    if online && !was_online {
                        tracing::info!("Link is up, checking for updates");
                        next = Instant::now();
                    }
                },
                _ = tokio::time::sleep_until(next) => {
                    if !self.status.borrow().enabled {
                        tracing::debug!("Updater disabled, skipping scheduled check");
                    } else if !online {
                        tracing::debug!("Link is down, skipping scheduled check");
                    } else {
                        // Failures are already logged and counted.
                        let _ = self.check_until_cancelled(&cancel).await;
                    }
                    next = Instant::now() + self.interval().await;
                },
            }
        }

        self.status.send_modify(|status| {
            status.running = false;
            status.state = UpdaterState::Idle;
        });
        tracing::info!("Updater stopped");
    }
}

/// Next command, or never once every handle is gone.
async fn next_command(commands: &mut Option<mpsc::Receiver<Command>>) -> Command {
    if let Some(receiver) = commands {
        if let Some(command) = receiver.recv().await {
            return command;
        }
        *commands = None;
    }
    std::future::pending().await
}

/// Next link state. `None` means the sender is gone; the link is then
/// assumed up and never reported again.
async fn connectivity_change(connectivity: &mut Option<watch::Receiver<Connectivity>>) -> Option<Connectivity> {
    let Some(receiver) = connectivity else {
        return std::future::pending().await;
    };
    match receiver.changed().await {
        Ok(()) => Some(*receiver.borrow_and_update()),
        Err(_) => {
            *connectivity = None;
            None
        },
    }
}

/// Control surface of a running worker.
pub struct UpdaterHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<UpdaterStatus>,
    task: JoinHandle<()>,
}

impl UpdaterHandle {
    /// Run an attempt now regardless of schedule, enabled flag or link
    /// state, and wait for its outcome.
    pub async fn force(&self) -> Result<Committed> {
        let (reply, outcome) = oneshot::channel();
        self.commands.send(Command::Force(reply)).await.map_err(|_| ErrorKind::Shutdown)?;
        outcome.await.map_err(|_| ErrorKind::Shutdown)?
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.commands.send(Command::SetEnabled(enabled)).await.map_err(|_| ErrorKind::Shutdown)?;
        Ok(())
    }

    pub fn status(&self) -> UpdaterStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdaterStatus> {
        self.status.clone()
    }

    /// Wait for the worker to finish (after its cancellation token fired).
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "Updater worker panicked");
        }
    }
}
