pub mod backend;
pub mod error;
pub mod file;
pub mod manifest;
mod path;
pub mod store;

pub use crate::backend::StorageBackend;
pub use crate::file::FileInfo;
pub use crate::manifest::{Manifest, ManifestEntry};
pub use crate::path::validate as validate_path;
pub use crate::store::{Asset, AssetStore, Sealed, Staged, Writing};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
