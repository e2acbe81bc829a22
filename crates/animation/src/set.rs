//! Animation sets and the loaders that build them from the asset store.
//!
//! Every loader is all-or-nothing: the first failure drops whatever frames
//! were already decoded and returns the error.

use crate::error::{ErrorKind, Result};
use crate::mood::Mood;
use emote_frame::{Frame, decode};
use emote_storage::AssetStore;
use exn::ResultExt;
use serde::Serialize;
use std::sync::Arc;

/// Where an animation's frames came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Compiled into the binary.
    Embedded,
    /// Loaded from the asset store.
    Dynamic,
}

/// A decoded animation: frames plus the order in which to show them.
///
/// Never mutated after construction; a reload builds new sets.
#[derive(Debug, Clone)]
pub struct AnimationSet {
    frames: Arc<[Frame]>,
    playback_sequence: Vec<usize>,
    source: Source,
}

impl AnimationSet {
    /// Build a set that plays its frames in order. `frames` must not be
    /// empty.
    pub(crate) fn sequential(frames: Vec<Frame>, source: Source) -> Self {
        let playback_sequence = (0..frames.len()).collect();
        Self { frames: frames.into(), playback_sequence, source }
    }

    /// Same frames, showing only the first one.
    pub fn still(&self) -> Self {
        Self { frames: Arc::clone(&self.frames), playback_sequence: vec![0], source: self.source }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn playback_sequence(&self) -> &[usize] {
        &self.playback_sequence
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Frame shown at `step` of the playback sequence, wrapping around.
    pub fn frame_at(&self, step: usize) -> &Frame {
        let index = self.playback_sequence[step % self.playback_sequence.len()];
        &self.frames[index]
    }
}

/// Decode `count` frames laid end to end at the start of `bytes`.
///
/// Returns the frames and the number of bytes they occupied.
pub(crate) fn decode_frames(bytes: &[u8], count: usize, name: &str) -> Result<(Vec<Frame>, usize)> {
    let mut frames = Vec::with_capacity(count);
    let mut offset = 0;
    for index in 0..count {
        let (frame, consumed) = decode(&bytes[offset..]).or_raise(|| ErrorKind::Format(format!("{name}#{index}")))?;
        tracing::debug!(
            name,
            index,
            width = frame.width(),
            height = frame.height(),
            format = %frame.color_format(),
            "Decoded frame"
        );
        offset += consumed;
        frames.push(frame);
    }
    Ok((frames, offset))
}

/// Load one frame per file, in order.
pub async fn load_sequence(store: &AssetStore, filenames: &[impl AsRef<str>]) -> Result<AnimationSet> {
    if filenames.is_empty() {
        exn::bail!(ErrorKind::Empty("<no files>".to_string()));
    }
    let mut frames = Vec::with_capacity(filenames.len());
    for name in filenames {
        let name = name.as_ref();
        let bytes = store.read(name).await.or_raise(|| ErrorKind::Storage(name.to_string()))?;
        let (mut decoded, consumed) = decode_frames(&bytes, 1, name)?;
        if consumed < bytes.len() {
            tracing::debug!(name, trailing = bytes.len() - consumed, "Ignoring bytes after frame");
        }
        frames.append(&mut decoded);
    }
    Ok(AnimationSet::sequential(frames, Source::Dynamic))
}

/// Load `frame_count` frames from one concatenated bundle file.
pub async fn load_from_bundle(store: &AssetStore, bundle_name: &str, frame_count: u32) -> Result<AnimationSet> {
    if frame_count == 0 {
        exn::bail!(ErrorKind::Empty(bundle_name.to_string()));
    }
    let bytes = store.read(bundle_name).await.or_raise(|| ErrorKind::Storage(bundle_name.to_string()))?;
    let (frames, consumed) = decode_frames(&bytes, frame_count as usize, bundle_name)?;
    if consumed < bytes.len() {
        tracing::warn!(name = bundle_name, trailing = bytes.len() - consumed, "Bundle has bytes after its last frame");
    }
    Ok(AnimationSet::sequential(frames, Source::Dynamic))
}

/// Load a bundle holding several animations back to back, splitting it by
/// `layout`. Either every animation loads or none does.
pub async fn load_mega_bundle(
    store: &AssetStore,
    bundle_name: &str,
    layout: &[(Mood, u32)],
) -> Result<Vec<(Mood, AnimationSet)>> {
    if layout.iter().all(|(_, count)| *count == 0) {
        exn::bail!(ErrorKind::Empty(bundle_name.to_string()));
    }
    let bytes = store.read(bundle_name).await.or_raise(|| ErrorKind::Storage(bundle_name.to_string()))?;
    let mut offset = 0;
    let mut sets = Vec::with_capacity(layout.len());
    for (mood, count) in layout {
        if *count == 0 {
            exn::bail!(ErrorKind::Empty(format!("{bundle_name}:{mood}")));
        }
        let (frames, consumed) = decode_frames(&bytes[offset..], *count as usize, bundle_name)?;
        offset += consumed;
        sets.push((*mood, AnimationSet::sequential(frames, Source::Dynamic)));
    }
    if offset < bytes.len() {
        tracing::warn!(name = bundle_name, trailing = bytes.len() - offset, "Bundle has bytes after its last frame");
    }
    tracing::info!(name = bundle_name, animations = sets.len(), size = bytes.len(), "Loaded mega bundle");
    Ok(sets)
}
