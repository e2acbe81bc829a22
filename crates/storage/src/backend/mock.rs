//! In-memory storage backend for testing.

use super::{BoxAsyncWrite, BoxSeekRead, FileInfoStream};
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use time::OffsetDateTime;
use tokio::io::AsyncWrite;

type Files = HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`Mutex`] shared with any open
/// [`writer()`](StorageBackend::writer)s, so all trait methods can operate on
/// `&self` without external synchronisation. The lock is never held across
/// an await point.
///
/// Writes and renames can be made to fail for chosen destinations, which is
/// how tests simulate a volume that fills up or a power cut mid-update.
///
/// # Examples
///
/// ```
/// use emote_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("normal1.bin", b"LGVL...."),
/// ]);
/// assert!(backend.exists(Path::new("normal1.bin")).await?);
///
/// backend.write(Path::new("fire1.bin"), b"data...").await?;
/// assert!(backend.exists(Path::new("fire1.bin")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: Arc<Mutex<Files>>,
    failing_writes: Mutex<HashSet<PathBuf>>,
    failing_renames: Mutex<HashSet<PathBuf>>,
    synced: Mutex<Vec<PathBuf>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: Arc::new(Mutex::new(map)),
            failing_writes: Mutex::default(),
            failing_renames: Mutex::default(),
            synced: Mutex::default(),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent `write()` or `writer()` targeting `path` fail.
    pub fn fail_writes_to(&self, path: impl AsRef<Path>) {
        lock(&self.failing_writes).insert(path.as_ref().to_path_buf());
    }

    /// Make every subsequent `rename()` whose destination is `path` fail,
    /// leaving both source and destination untouched.
    pub fn fail_renames_to(&self, path: impl AsRef<Path>) {
        lock(&self.failing_renames).insert(path.as_ref().to_path_buf());
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        lock(&self.failing_writes).clear();
        lock(&self.failing_renames).clear();
    }

    /// Paths of every file currently stored, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = lock(&self.storage).keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Every path passed to `sync()`, in call order.
    pub fn synced(&self) -> Vec<PathBuf> {
        lock(&self.synced).clone()
    }

    fn injected(set: &Mutex<HashSet<PathBuf>>, path: &Path) -> Result<()> {
        if lock(set).contains(path) {
            exn::bail!(ErrorKind::Io(std::io::Error::other(format!(
                "injected failure for {}",
                path.display()
            ))));
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

// A panic while holding one of these locks only ever happens inside a test
// that is already failing, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write-through writer: every chunk lands in the shared map immediately,
/// mirroring how a partially written file is visible on a real disk.
struct MockWriter {
    storage: Arc<Mutex<Files>>,
    path: PathBuf,
}

impl AsyncWrite for MockWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        let mut guard = lock(&self.storage);
        let (modified, data) = guard
            .entry(self.path.clone())
            .or_insert_with(|| (OffsetDateTime::now_utc(), Vec::new()));
        *modified = OffsetDateTime::now_utc();
        data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries, then drop the lock before yielding.
            let entries: Vec<FileInfo> = {
                let guard = lock(&self.storage);
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, (modified, data))| FileInfo::new(path.clone(), data.len() as u64, *modified))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(lock(&self.storage).contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let data = lock(&self.storage).get(&path).map(|(_, data)| data.clone());
        data.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn seekable(&self, path: &Path) -> Result<BoxSeekRead> {
        let data = self.read(path).await?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        Self::injected(&self.failing_writes, &path)?;
        lock(&self.storage).insert(path, (OffsetDateTime::now_utc(), data.to_vec()));
        Ok(())
    }

    async fn writer(&self, path: &Path) -> Result<BoxAsyncWrite> {
        let path = validate_path(path)?;
        Self::injected(&self.failing_writes, &path)?;
        lock(&self.storage).insert(path.clone(), (OffsetDateTime::now_utc(), Vec::new()));
        Ok(Box::pin(MockWriter { storage: Arc::clone(&self.storage), path }))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let removed = lock(&self.storage).remove(&path);
        removed.map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        Self::injected(&self.failing_renames, &to)?;
        let mut guard = lock(&self.storage);
        let data = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, data);
        Ok(())
    }

    async fn sync(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        if !lock(&self.storage).contains_key(&path) {
            exn::bail!(ErrorKind::NotFound(path));
        }
        lock(&self.synced).push(path);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = lock(&self.storage);
        let (modified, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileInfo::new(path.clone(), data.len() as u64, *modified))
    }
}
