//! Fallback frames compiled into the binary.
//!
//! Files follow the same `<stem><n>.bin` naming as individual frames in the
//! asset store and go through the same decoder.

use crate::error::{ErrorKind, Result};
use crate::mood::Mood;
use crate::set::{AnimationSet, Source, decode_frames};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "assets/"]
struct EmbeddedFrames;

/// Decode the embedded frames for `mood`, or `None` if the binary doesn't
/// carry a complete set for it.
///
/// Errors only if embedded data is present but malformed.
pub fn load_embedded(mood: Mood) -> Result<Option<AnimationSet>> {
    let mut frames = Vec::with_capacity(mood.frame_count() as usize);
    for name in mood.frame_names() {
        let Some(file) = EmbeddedFrames::get(&name) else {
            tracing::debug!(%mood, name = %name, "No embedded frame");
            return Ok(None);
        };
        let (mut decoded, _) = decode_frames(&file.data, 1, &name)?;
        frames.append(&mut decoded);
    }
    if frames.is_empty() {
        exn::bail!(ErrorKind::Empty(format!("embedded:{mood}")));
    }
    let set = AnimationSet::sequential(frames, Source::Embedded);
    Ok(Some(if mood == Mood::StaticNormal { set.still() } else { set }))
}

/// Names of every embedded file, for diagnostics.
pub fn embedded_names() -> Vec<String> {
    let mut names: Vec<String> = EmbeddedFrames::iter().map(|name| name.into_owned()).collect();
    names.sort();
    names
}
