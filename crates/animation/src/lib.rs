//! Mood animations.
//!
//! Frames come from the asset store when it has them (mega bundle, then a
//! per-mood bundle, then individual frame files) and from frames compiled
//! into the binary otherwise. The resolved set of animations is published
//! as an immutable [`CatalogSnapshot`] that the [`Player`] reads from.

pub mod catalog;
mod embedded;
pub mod error;
mod mood;
pub mod player;
mod set;

pub use crate::catalog::{Catalog, CatalogSnapshot, Entry, EntrySource};
pub use crate::embedded::{embedded_names, load_embedded};
pub use crate::mood::{MEGA_BUNDLE_NAME, MEGA_LAYOUT, Mood, mega_frame_counts};
pub use crate::player::{DEFAULT_FRAME_INTERVAL, FrameSink, Player, Tick};
pub use crate::set::{AnimationSet, Source, load_from_bundle, load_mega_bundle, load_sequence};
