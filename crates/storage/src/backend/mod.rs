//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the byte-oriented
//! filesystem boundary underneath the [`AssetStore`](crate::AssetStore):
//! open/read/write/rename/delete/stat over a single mounted volume.
//!

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::io::{Read, Seek};
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncWrite;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
pub type BoxAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;
pub type BoxSeekRead = Box<dyn SeekRead + 'static>;

/// A blocking reader that can also seek. Blanket-implemented for anything
/// that is [`Read`] + [`Seek`] + [`Send`].
pub trait SeekRead: Read + Seek + Send {}
impl<T: Read + Seek + Send> SeekRead for T {}

/// Unified interface for storage backends.
///
/// All storage operations are asynchronous. It's a glorified CRUD
/// interface, but in ✨Rust✨
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Atomicity
/// [`rename()`](Self::rename) within one backend is assumed to be atomic:
/// a reader opening the destination sees either the old or the new file,
/// never a mixture. The [`AssetStore`](crate::AssetStore) builds every
/// replace-in-place operation on that single guarantee.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use emote_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_frame(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = PathBuf::from("normal1.bin");
///     if backend.exists(&path).await? {
///         Ok(backend.stat(&path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream file metadata matching an optional prefix.
    ///
    /// Yields results incrementally. Prefixes match whole path components,
    /// so `frames` matches `frames/a.bin` but not `frames2/a.bin`. A prefix
    /// that doesn't exist yields nothing rather than an error.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Open a file for blocking, seekable reads.
    ///
    /// Returns a `'static` boxed reader suitable for use inside
    /// [`spawn_blocking`](tokio::task::spawn_blocking). The async setup
    /// (opening the file) happens before returning.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::io::{Seek, SeekFrom};
    /// use std::path::Path;
    /// # use emote_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut reader = backend.seekable(Path::new("animations_mega.bin")).await?;
    /// let size = tokio::task::spawn_blocking(move || reader.seek(SeekFrom::End(0)))
    ///     .await
    ///     .unwrap()
    ///     .unwrap();
    /// # Ok(())
    /// # }
    /// ```
    async fn seekable(&self, path: &Path) -> Result<BoxSeekRead>;

    /// Write file contents.
    ///
    /// Creates a new file or overwrites an existing file. Parent directories
    /// are created as needed. This is **not** atomic; see
    /// [`AssetStore::write_atomic`](crate::AssetStore::write_atomic).
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Open a file for streaming writes.
    ///
    /// Truncates any existing file. Data written is visible at `path` as it
    /// arrives; callers should `shutdown()` the writer before relying on the
    /// contents.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use tokio::io::AsyncWriteExt;
    /// # use emote_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut writer = backend.writer(Path::new(".updates/bundle.tmp")).await?;
    /// writer.write_all(b"chunk one").await.unwrap();
    /// writer.write_all(b"chunk two").await.unwrap();
    /// writer.shutdown().await.unwrap();
    /// # Ok(())
    /// # }
    /// ```
    async fn writer(&self, path: &Path) -> Result<BoxAsyncWrite>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Rename/move a file within the same backend.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist. If the destination already exists it is replaced
    /// in one step. Parent directories are created as needed.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Flush a file's contents to the underlying medium.
    ///
    /// Must be called on a staged file before it is renamed into place, so a
    /// power cut after the rename cannot expose an empty or partial file.
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn sync(&self, path: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
