//! The published set of animations, one entry per mood.
//!
//! A reload resolves every mood from scratch into a new [`CatalogSnapshot`]
//! and publishes it with a single `watch` send. Readers hold an
//! `Arc<CatalogSnapshot>`, so a reload never changes what they are looking
//! at; they pick up the next generation when they ask for it.

use crate::embedded::load_embedded;
use crate::error::Result;
use crate::mood::{MEGA_BUNDLE_NAME, MEGA_LAYOUT, Mood};
use crate::set::{AnimationSet, Source, load_from_bundle, load_mega_bundle, load_sequence};
use emote_storage::AssetStore;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::watch;

/// Last resort for a mood the asset store can't provide.
pub type Fallback = fn(Mood) -> Result<Option<AnimationSet>>;

/// What a mood shows.
#[derive(Debug, Clone)]
pub enum Entry {
    Animated(Arc<AnimationSet>),
    /// Nothing to show; playback leaves the display alone.
    Blank,
}

static BLANK: Entry = Entry::Blank;

impl Entry {
    pub fn source(&self) -> EntrySource {
        match self {
            Entry::Animated(set) => match set.source() {
                Source::Dynamic => EntrySource::Dynamic,
                Source::Embedded => EntrySource::Embedded,
            },
            Entry::Blank => EntrySource::Blank,
        }
    }

    pub fn animation(&self) -> Option<&AnimationSet> {
        match self {
            Entry::Animated(set) => Some(set),
            Entry::Blank => None,
        }
    }
}

/// Per-mood provenance, as reported by [`CatalogSnapshot::sources()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Dynamic,
    Embedded,
    Blank,
}

/// One generation of the catalog. Immutable once published.
#[derive(Debug)]
pub struct CatalogSnapshot {
    generation: u64,
    entries: BTreeMap<Mood, Entry>,
}

impl CatalogSnapshot {
    fn blank(generation: u64) -> Self {
        let entries = Mood::ALL.into_iter().map(|mood| (mood, Entry::Blank)).collect();
        Self { generation, entries }
    }

    /// Increments with every reload; `0` is the empty catalog before the
    /// first reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, mood: Mood) -> &Entry {
        self.entries.get(&mood).unwrap_or(&BLANK)
    }

    /// Where each mood's frames come from.
    pub fn sources(&self) -> BTreeMap<Mood, EntrySource> {
        Mood::ALL.into_iter().map(|mood| (mood, self.get(mood).source())).collect()
    }
}

/// Owner of the published [`CatalogSnapshot`].
pub struct Catalog {
    sender: watch::Sender<Arc<CatalogSnapshot>>,
    fallback: Fallback,
    mega_name: String,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// An empty catalog (every mood `Blank`) that falls back to the
    /// embedded frames on reload.
    pub fn new() -> Self {
        Self::with_fallback(load_embedded)
    }

    pub fn with_fallback(fallback: Fallback) -> Self {
        let (sender, _) = watch::channel(Arc::new(CatalogSnapshot::blank(0)));
        Self { sender, fallback, mega_name: MEGA_BUNDLE_NAME.to_string() }
    }

    /// Read the mega bundle from `name` instead of [`MEGA_BUNDLE_NAME`].
    pub fn with_mega_bundle(mut self, name: impl Into<String>) -> Self {
        self.mega_name = name.into();
        self
    }

    /// Receiver that observes every published generation.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.sender.borrow())
    }

    /// Rebuild every mood from the store and publish the result in one swap.
    ///
    /// Never fails: a mood that can't be loaded falls through to the next
    /// source and ultimately to `Blank`.
    pub async fn reload_all(&self, store: &AssetStore) -> Arc<CatalogSnapshot> {
        let generation = self.sender.borrow().generation + 1;
        let entries = self.resolve_all(store).await;
        let snapshot = Arc::new(CatalogSnapshot { generation, entries });
        for (mood, source) in snapshot.sources() {
            tracing::debug!(%mood, ?source, generation, "Resolved mood");
        }
        self.sender.send_replace(Arc::clone(&snapshot));
        tracing::info!(
            generation,
            dynamic = snapshot.entries.values().filter(|e| e.source() == EntrySource::Dynamic).count(),
            "Catalog reloaded"
        );
        snapshot
    }

    async fn resolve_all(&self, store: &AssetStore) -> BTreeMap<Mood, Entry> {
        let mut mega = load_mega(store, &self.mega_name).await;
        let mut entries = BTreeMap::new();
        for mood in Mood::ALL.into_iter().filter(|mood| mood.animation() == *mood) {
            let set = match mega.remove(&mood) {
                Some(set) => Some(set),
                None => match load_dynamic(store, mood).await {
                    Some(set) => Some(set),
                    None => self.load_fallback(mood),
                },
            };
            let entry = set.map_or(Entry::Blank, |set| Entry::Animated(Arc::new(set)));
            entries.insert(mood, entry);
        }
        let still = match entries.get(&Mood::Normal) {
            Some(Entry::Animated(normal)) => Entry::Animated(Arc::new(normal.still())),
            _ => Entry::Blank,
        };
        entries.insert(Mood::StaticNormal, still);
        entries
    }

    fn load_fallback(&self, mood: Mood) -> Option<AnimationSet> {
        match (self.fallback)(mood) {
            Ok(set) => set,
            Err(err) => {
                tracing::warn!(%mood, error = %err, "Fallback frames are unusable");
                None
            },
        }
    }
}

async fn load_mega(store: &AssetStore, name: &str) -> HashMap<Mood, AnimationSet> {
    if !store.exists(name).await {
        return HashMap::new();
    }
    match load_mega_bundle(store, name, &MEGA_LAYOUT).await {
        Ok(sets) => sets.into_iter().collect(),
        Err(err) => {
            tracing::warn!(name, error = %err, "Mega bundle is unusable, falling back");
            HashMap::new()
        },
    }
}

/// Per-mood bundle, then individual files.
async fn load_dynamic(store: &AssetStore, mood: Mood) -> Option<AnimationSet> {
    let bundle = mood.bundle_name();
    if store.exists(&bundle).await {
        match load_from_bundle(store, &bundle, mood.frame_count()).await {
            Ok(set) => return Some(set),
            Err(err) => tracing::warn!(%mood, name = %bundle, error = %err, "Mood bundle is unusable"),
        }
    }
    let names = mood.frame_names();
    if store.exists(&names[0]).await {
        match load_sequence(store, &names).await {
            Ok(set) => return Some(set),
            Err(err) => tracing::warn!(%mood, error = %err, "Individual frames are unusable"),
        }
    }
    None
}
