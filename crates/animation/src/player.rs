//! Frame-by-frame playback of the current mood.
//!
//! The player only ever reads published [`CatalogSnapshot`]s; it never
//! touches the asset store, so playback can't be stalled by storage or
//! network work.

use crate::catalog::{CatalogSnapshot, Entry};
use crate::mood::Mood;
use emote_frame::Frame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default time each frame stays on screen.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(500);

/// Whatever puts pixels on the display.
pub trait FrameSink: Send {
    fn show(&mut self, mood: Mood, step: usize, frame: &Frame);
}

/// Outcome of one playback step.
#[derive(Debug, PartialEq, Eq)]
pub enum Tick<'a> {
    Show { mood: Mood, step: usize, frame: &'a Frame },
    /// The mood is `Blank`; leave the display as it is.
    Skip,
}

/// Playback cursor over the latest catalog snapshot.
pub struct Player {
    snapshots: watch::Receiver<Arc<CatalogSnapshot>>,
    snapshot: Arc<CatalogSnapshot>,
    moods: Option<watch::Receiver<Mood>>,
    mood: Mood,
    position: usize,
}

impl Player {
    pub fn new(mut snapshots: watch::Receiver<Arc<CatalogSnapshot>>, mood: Mood) -> Self {
        let snapshot = Arc::clone(&snapshots.borrow_and_update());
        Self { snapshots, snapshot, moods: None, mood, position: 0 }
    }

    /// Take mood changes from a channel instead of only [`set_mood()`](Self::set_mood).
    pub fn follow_moods(mut self, mut moods: watch::Receiver<Mood>) -> Self {
        self.set_mood(*moods.borrow_and_update());
        self.moods = Some(moods);
        self
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    /// Generation of the snapshot currently being played.
    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }

    /// Switch mood, restarting from the first step of its sequence.
    pub fn set_mood(&mut self, mood: Mood) {
        if mood != self.mood {
            tracing::debug!(from = %self.mood, to = %mood, "Mood changed");
        }
        self.mood = mood;
        self.position = 0;
    }

    /// Pick up a newer snapshot or mood if one was published, then return
    /// the frame to show and advance.
    pub fn tick(&mut self) -> Tick<'_> {
        if let Some(moods) = self.moods.as_mut()
            && moods.has_changed().unwrap_or(false)
        {
            let mood = *moods.borrow_and_update();
            self.set_mood(mood);
        }
        if self.snapshots.has_changed().unwrap_or(false) {
            let snapshot = Arc::clone(&self.snapshots.borrow_and_update());
            if snapshot.generation() != self.snapshot.generation() {
                tracing::debug!(generation = snapshot.generation(), "Playing new catalog generation");
                self.snapshot = snapshot;
                self.position = 0;
            }
        }
        let Entry::Animated(set) = self.snapshot.get(self.mood) else {
            return Tick::Skip;
        };
        let step = self.position;
        self.position = (self.position + 1) % set.playback_sequence().len();
        Tick::Show { mood: self.mood, step, frame: set.frame_at(step) }
    }

    /// Drive `sink` every `interval` until `cancel` fires.
    pub async fn run(mut self, sink: &mut impl FrameSink, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = interval.as_millis() as u64, mood = %self.mood, "Playback started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Tick::Show { mood, step, frame } = self.tick() {
                        sink.show(mood, step, frame);
                    }
                },
            }
        }
        tracing::info!("Playback stopped");
    }
}
