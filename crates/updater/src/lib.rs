//! Over-the-air animation updates.
//!
//! A background worker asks a resolve endpoint where the current mega
//! bundle lives, streams it into the asset store's staging area, validates
//! it from disk, and only then renames it into place, records it in the
//! manifest and reloads the animation catalog.

mod context;
pub mod download;
pub mod error;
pub mod http;
mod options;
pub mod resolve;
mod state;
mod updater;

pub use crate::context::Context;
pub use crate::download::{Download, stream_download, validate_download};
pub use crate::http::{HttpClient, HttpHandle, HttpResponse, Request};
pub use crate::options::UpdaterOptions;
pub use crate::resolve::resolve_bundle_url;
pub use crate::state::{Connectivity, UpdaterState, UpdaterStatus};
pub use crate::updater::{Committed, Updater, UpdaterHandle};
