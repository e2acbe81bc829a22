//! The asset store: named assets on top of a [`StorageBackend`].
//!
//! Every replacement of a committed asset goes through a staging file in
//! [`STAGING_DIR`] on the same volume. The staging file is synced to disk
//! and then renamed into place, so a reader (or a power cut) only ever sees
//! the old file or the new one.
//!
//! Streamed writes use a small typestate: [`stage()`](AssetStore::stage)
//! hands out a `Staged<Writing>`, [`seal()`](AssetStore::seal) flushes it
//! into a `Staged<Sealed>`, and only a sealed file can be
//! [`commit()`](AssetStore::commit)ted.

use crate::backend::{BoxAsyncWrite, BoxSeekRead};
use crate::error::{ErrorKind, Result};
use crate::manifest::{Manifest, ManifestEntry};
use crate::path::validate as validate_path;
use crate::BackendHandle;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;

/// File name of the manifest at the store root.
pub const MANIFEST_NAME: &str = "manifest.json";
/// Directory (relative to the store root) holding in-flight writes.
pub const STAGING_DIR: &str = ".updates";
const STAGING_SUFFIX: &str = ".tmp";

/// Typestate: the staging file is open and accepting chunks.
pub struct Writing {
    writer: BoxAsyncWrite,
}

/// Typestate: the staging file is complete and flushed.
pub struct Sealed(PhantomData<()>);

/// A file being written into the staging area, destined for `name`.
pub struct Staged<S> {
    name: String,
    path: PathBuf,
    written: u64,
    state: S,
}

impl<S> Staged<S> {
    /// Final asset name this staging file will be committed as.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of the staging file inside the store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Staged<Writing> {
    /// Append a chunk to the staging file.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.state.writer.write_all(chunk).await.map_err(ErrorKind::Io)?;
        self.written += chunk.len() as u64;
        Ok(())
    }
}

/// One committed file, as reported by [`AssetStore::inventory()`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub name: String,
    pub size: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
    /// Manifest entry, or `None` for an unregistered file.
    pub entry: Option<ManifestEntry>,
}

/// Named, atomically-replaceable assets.
///
/// Cheap to clone; clones share the backend.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use emote_storage::{AssetStore, backend::LocalBackend};
///
/// # async fn example() -> emote_storage::error::Result<()> {
/// let store = AssetStore::new(Arc::new(LocalBackend::new("assets", "/var/lib/emote")?));
/// store.write_atomic("normal1.bin", b"LGVL...").await?;
/// assert!(store.exists("normal1.bin").await);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AssetStore {
    backend: BackendHandle,
}

impl AssetStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Validate a caller-supplied asset name, rejecting names that collide
    /// with the store's own bookkeeping.
    pub fn validate_name(name: &str) -> Result<PathBuf> {
        let path = validate_path(name)?;
        if path.starts_with(STAGING_DIR) || path == Path::new(MANIFEST_NAME) {
            exn::bail!(ErrorKind::ReservedName(name.to_string()));
        }
        Ok(path)
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut staged = Path::new(STAGING_DIR).join(path).into_os_string();
        staged.push(STAGING_SUFFIX);
        PathBuf::from(staged)
    }

    /// Whether `name` exists. Invalid names and backend errors count as
    /// absent; the latter are logged.
    pub async fn exists(&self, name: &str) -> bool {
        let Ok(path) = Self::validate_name(name) else {
            return false;
        };
        match self.backend.exists(&path).await {
            Ok(exists) => exists,
            Err(err) => {
                tracing::warn!(name, error = %err, "Could not check asset existence");
                false
            },
        }
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = Self::validate_name(name)?;
        self.backend.read(&path).await
    }

    /// Blocking `Read + Seek` handle onto a committed asset.
    pub async fn open_seekable(&self, name: &str) -> Result<BoxSeekRead> {
        let path = Self::validate_name(name)?;
        self.backend.seekable(&path).await
    }

    /// Replace `name` with `bytes` so that readers see either the previous
    /// contents or the new ones, never a partial file.
    ///
    /// On failure the staging file is removed and `name` is left as it was.
    pub async fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = Self::validate_name(name)?;
        self.replace(&path, bytes).await
    }

    async fn replace(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let staging = Self::staging_path(path);
        let outcome = match self.backend.write(&staging, bytes).await {
            Ok(()) => match self.backend.sync(&staging).await {
                Ok(()) => self.backend.rename(&staging, path).await,
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            tracing::warn!(path = %path.display(), error = %err, "Atomic write failed, removing staging file");
            self.delete_quietly(&staging).await;
            return Err(err);
        }
        tracing::debug!(path = %path.display(), size = bytes.len(), "Committed file");
        Ok(())
    }

    async fn delete_quietly(&self, path: &Path) {
        match self.backend.delete(path).await {
            Ok(()) => {},
            Err(err) if err.is_not_found() => {},
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "Could not delete file"),
        }
    }

    /// Delete `name`. Deleting something that isn't there succeeds.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = Self::validate_name(name)?;
        match self.backend.delete(&path).await {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// Delete `name` and drop its manifest entry, if it had one.
    pub async fn remove(&self, name: &str) -> Result<()> {
        self.delete(name).await?;
        let mut manifest = self.manifest().await?;
        if manifest.remove(name).is_some() {
            self.write_manifest(&manifest).await?;
        }
        Ok(())
    }

    /// Load the manifest. A missing manifest is an empty one, and so is one
    /// that can't be parsed (after a warning).
    pub async fn manifest(&self) -> Result<Manifest> {
        let bytes = match self.backend.read(Path::new(MANIFEST_NAME)).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_found() => return Ok(Manifest::default()),
            Err(err) => return Err(err),
        };
        match Manifest::from_json(&bytes) {
            Ok(manifest) => Ok(manifest),
            Err(err) => {
                tracing::warn!(error = %err, size = bytes.len(), "Manifest is unreadable, starting a new one");
                Ok(Manifest::default())
            },
        }
    }

    /// The registered manifest entry for `name`, if any.
    pub async fn entry(&self, name: &str) -> Result<Option<ManifestEntry>> {
        Ok(self.manifest().await?.files.remove(name))
    }

    /// Record `name` as committed with the given size and hash, stamped with
    /// the current time. Call only after the file itself is in place.
    pub async fn update_manifest(&self, name: &str, size: u64, hash: &str) -> Result<ManifestEntry> {
        let mut manifest = self.manifest().await?;
        let timestamp = u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or_default();
        let entry = ManifestEntry { size, hash: hash.to_string(), timestamp };
        manifest.upsert(name, entry.clone());
        self.write_manifest(&manifest).await?;
        tracing::info!(name, size, hash, "Manifest updated");
        Ok(entry)
    }

    async fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        self.replace(Path::new(MANIFEST_NAME), &manifest.to_json()?).await
    }

    /// Open a staging file for a streamed write destined for `name`.
    pub async fn stage(&self, name: &str) -> Result<Staged<Writing>> {
        let path = Self::validate_name(name)?;
        let staging = Self::staging_path(&path);
        let writer = self.backend.writer(&staging).await?;
        tracing::debug!(name, staging = %staging.display(), "Staging file opened");
        Ok(Staged { name: name.to_string(), path: staging, written: 0, state: Writing { writer } })
    }

    /// Flush and close the staging writer, then sync the staging file to
    /// disk. On failure the staging file is removed.
    pub async fn seal(&self, mut staged: Staged<Writing>) -> Result<Staged<Sealed>> {
        if let Err(err) = staged.state.writer.shutdown().await {
            self.discard(staged).await;
            exn::bail!(ErrorKind::Io(err));
        }
        if let Err(err) = self.backend.sync(&staged.path).await {
            self.discard(staged).await;
            return Err(err);
        }
        let Staged { name, path, written, .. } = staged;
        Ok(Staged { name, path, written, state: Sealed(PhantomData) })
    }

    /// Blocking `Read + Seek` handle onto a sealed staging file, for
    /// validation before commit.
    pub async fn open_staged(&self, staged: &Staged<Sealed>) -> Result<BoxSeekRead> {
        self.backend.seekable(&staged.path).await
    }

    /// Rename a sealed staging file into place. On failure the staging file
    /// is removed and the destination left untouched.
    pub async fn commit(&self, staged: Staged<Sealed>) -> Result<()> {
        let destination = Self::validate_name(&staged.name)?;
        if let Err(err) = self.backend.rename(&staged.path, &destination).await {
            tracing::warn!(name = %staged.name, error = %err, "Commit failed, discarding staged file");
            self.discard(staged).await;
            return Err(err);
        }
        tracing::info!(name = %staged.name, size = staged.written, "Committed staged file");
        Ok(())
    }

    /// Throw away a staging file in any state. Never fails; problems are
    /// logged.
    pub async fn discard<S>(&self, staged: Staged<S>) {
        let Staged { name, path, state, .. } = staged;
        // Close the writer (if any) before deleting what it writes to.
        drop(state);
        self.delete_quietly(&path).await;
        tracing::debug!(name = %name, staging = %path.display(), "Staging file discarded");
    }

    /// Remove leftovers of interrupted writes from the staging area.
    pub async fn sweep_staging(&self) -> Result<usize> {
        let leftovers = self.backend.list(Some(Path::new(STAGING_DIR))).await?;
        for file in &leftovers {
            tracing::info!(path = %file.path.display(), size = file.size, "Removing stale staging file");
            self.delete_quietly(&file.path).await;
        }
        Ok(leftovers.len())
    }

    /// Every committed file (staging area and manifest excluded), sorted by
    /// name, with its manifest registration.
    pub async fn inventory(&self) -> Result<Vec<Asset>> {
        let mut manifest = self.manifest().await?;
        let mut assets: Vec<Asset> = self
            .backend
            .list(None)
            .await?
            .into_iter()
            .filter(|file| !file.path.starts_with(STAGING_DIR) && file.path != Path::new(MANIFEST_NAME))
            .map(|file| {
                let name = file.path.to_string_lossy().into_owned();
                let entry = manifest.remove(&name);
                Asset { name, size: file.size, modified: file.modified, entry }
            })
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }

    /// Check a registered file against its manifest hash and size.
    ///
    /// Returns `None` for an unregistered file.
    pub async fn verify(&self, name: &str) -> Result<Option<bool>> {
        let Some(entry) = self.entry(name).await? else {
            return Ok(None);
        };
        let bytes = self.read(name).await?;
        let hash = blake3::hash(&bytes).to_hex();
        let intact = bytes.len() as u64 == entry.size && hash.as_str() == entry.hash;
        if !intact {
            tracing::warn!(name, expected = %entry.hash, actual = %hash, "Asset does not match manifest");
        }
        Ok(Some(intact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalBackend, MockBackend, StorageBackend};
    use rstest::rstest;
    use std::io::Read;
    use std::sync::Arc;

    fn mock_store() -> (Arc<MockBackend>, AssetStore) {
        let backend = Arc::new(MockBackend::default());
        (Arc::clone(&backend), AssetStore::new(backend))
    }

    #[tokio::test]
    async fn test_write_atomic_then_read() {
        let (backend, store) = mock_store();
        store.write_atomic("normal1.bin", b"frame").await.unwrap();
        assert_eq!(store.read("normal1.bin").await.unwrap(), b"frame");
        assert_eq!(backend.paths(), vec![PathBuf::from("normal1.bin")]);
    }

    #[tokio::test]
    async fn test_write_atomic_replaces() {
        let (_backend, store) = mock_store();
        store.write_atomic("normal1.bin", b"old").await.unwrap();
        store.write_atomic("normal1.bin", b"new").await.unwrap();
        assert_eq!(store.read("normal1.bin").await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_crash_before_rename_keeps_original() {
        let backend = Arc::new(MockBackend::with_files([("normal1.bin", Vec::from(*b"original"))]));
        let store = AssetStore::new(backend.clone());
        backend.fail_renames_to("normal1.bin");
        assert!(store.write_atomic("normal1.bin", b"replacement").await.is_err());
        assert_eq!(store.read("normal1.bin").await.unwrap(), b"original");
        assert_eq!(backend.paths(), vec![PathBuf::from("normal1.bin")]);
    }

    #[tokio::test]
    async fn test_staging_is_synced_before_rename() {
        let (backend, store) = mock_store();
        backend.fail_renames_to("normal1.bin");
        assert!(store.write_atomic("normal1.bin", b"replacement").await.is_err());
        assert_eq!(backend.synced(), vec![PathBuf::from(".updates/normal1.bin.tmp")]);

        let mut staged = store.stage("animations_mega.bin").await.unwrap();
        staged.write_chunk(b"data").await.unwrap();
        let sealed = store.seal(staged).await.unwrap();
        assert_eq!(backend.synced().last(), Some(&PathBuf::from(".updates/animations_mega.bin.tmp")));
        store.commit(sealed).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_staging_write_keeps_original() {
        let backend = Arc::new(MockBackend::with_files([("fire1.bin", Vec::from(*b"original"))]));
        let store = AssetStore::new(backend.clone());
        backend.fail_writes_to(".updates/fire1.bin.tmp");
        assert!(store.write_atomic("fire1.bin", b"replacement").await.is_err());
        assert_eq!(store.read("fire1.bin").await.unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_backend, store) = mock_store();
        store.write_atomic("shy1.bin", b"x").await.unwrap();
        store.delete("shy1.bin").await.unwrap();
        store.delete("shy1.bin").await.unwrap();
        assert!(!store.exists("shy1.bin").await);
    }

    #[rstest]
    #[case("manifest.json")]
    #[case(".updates/normal1.bin.tmp")]
    #[case("./.updates/x")]
    fn test_reserved_names(#[case] name: &str) {
        let err = AssetStore::validate_name(name).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ReservedName(_)));
    }

    #[rstest]
    #[case("../normal1.bin")]
    #[case("")]
    #[case("a\0b")]
    fn test_invalid_names(#[case] name: &str) {
        let err = AssetStore::validate_name(name).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            AssetStore::staging_path(Path::new("animations_mega.bin")),
            Path::new(".updates/animations_mega.bin.tmp")
        );
    }

    #[tokio::test]
    async fn test_exists_on_reserved_name_is_false() {
        let backend = Arc::new(MockBackend::with_files([("manifest.json", Vec::from(*b"{}"))]));
        let store = AssetStore::new(backend);
        assert!(!store.exists("manifest.json").await);
    }

    #[tokio::test]
    async fn test_missing_manifest_is_empty() {
        let (_backend, store) = mock_store();
        let manifest = store.manifest().await.unwrap();
        assert_eq!(manifest, Manifest::default());
        assert!(store.entry("animations_mega.bin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_manifest_upserts() {
        let (_backend, store) = mock_store();
        store.update_manifest("animations_mega.bin", 10, "aa").await.unwrap();
        store.update_manifest("normal_all.bin", 20, "bb").await.unwrap();
        let entry = store.update_manifest("animations_mega.bin", 30, "cc").await.unwrap();
        assert_eq!(entry.size, 30);
        assert!(entry.timestamp > 0);

        let manifest = store.manifest().await.unwrap();
        assert_eq!(manifest.version, 1);
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.get("animations_mega.bin").unwrap().hash, "cc");
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_replaced() {
        let backend = Arc::new(MockBackend::with_files([("manifest.json", Vec::from(*b"{ not json"))]));
        let store = AssetStore::new(backend.clone());
        assert!(store.manifest().await.unwrap().is_empty());

        store.update_manifest("animations_mega.bin", 1, "ab").await.unwrap();
        let raw = backend.read(Path::new("manifest.json")).await.unwrap();
        let manifest = Manifest::from_json(&raw).unwrap();
        assert_eq!(manifest.files.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_drops_entry() {
        let (_backend, store) = mock_store();
        store.write_atomic("animations_mega.bin", b"bundle").await.unwrap();
        store.update_manifest("animations_mega.bin", 6, "ab").await.unwrap();
        store.remove("animations_mega.bin").await.unwrap();
        assert!(!store.exists("animations_mega.bin").await);
        assert!(store.entry("animations_mega.bin").await.unwrap().is_none());
        // Removing again is fine.
        store.remove("animations_mega.bin").await.unwrap();
    }

    #[tokio::test]
    async fn test_stage_seal_commit() {
        let (backend, store) = mock_store();
        let mut staged = store.stage("animations_mega.bin").await.unwrap();
        staged.write_chunk(b"abc").await.unwrap();
        staged.write_chunk(b"def").await.unwrap();
        assert_eq!(staged.written(), 6);
        assert!(!store.exists("animations_mega.bin").await);

        let sealed = store.seal(staged).await.unwrap();
        let mut contents = Vec::new();
        store.open_staged(&sealed).await.unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"abcdef");

        store.commit(sealed).await.unwrap();
        assert_eq!(store.read("animations_mega.bin").await.unwrap(), b"abcdef");
        assert_eq!(backend.paths(), vec![PathBuf::from("animations_mega.bin")]);
    }

    #[tokio::test]
    async fn test_discard_removes_staging_file() {
        let (backend, store) = mock_store();
        store.write_atomic("animations_mega.bin", b"old").await.unwrap();
        let mut staged = store.stage("animations_mega.bin").await.unwrap();
        staged.write_chunk(b"partial").await.unwrap();
        store.discard(staged).await;
        assert_eq!(backend.paths(), vec![PathBuf::from("animations_mega.bin")]);
        assert_eq!(store.read("animations_mega.bin").await.unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_failed_commit_discards() {
        let (backend, store) = mock_store();
        let mut staged = store.stage("animations_mega.bin").await.unwrap();
        staged.write_chunk(b"data").await.unwrap();
        let sealed = store.seal(staged).await.unwrap();
        backend.fail_renames_to("animations_mega.bin");
        assert!(store.commit(sealed).await.is_err());
        assert!(backend.paths().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_staging() {
        let backend = Arc::new(MockBackend::with_files([
            (".updates/animations_mega.bin.tmp", Vec::from(*b"half")),
            (".updates/normal1.bin.tmp", Vec::from(*b"half")),
            ("normal1.bin", Vec::from(*b"keep")),
        ]));
        let store = AssetStore::new(backend.clone());
        assert_eq!(store.sweep_staging().await.unwrap(), 2);
        assert_eq!(backend.paths(), vec![PathBuf::from("normal1.bin")]);
    }

    #[tokio::test]
    async fn test_inventory() {
        let backend = Arc::new(MockBackend::with_files([
            (".updates/animations_mega.bin.tmp", Vec::from(*b"half")),
            ("normal1.bin", Vec::from(*b"abc")),
        ]));
        let store = AssetStore::new(backend);
        store.write_atomic("animations_mega.bin", b"bundle").await.unwrap();
        store.update_manifest("animations_mega.bin", 6, "ab").await.unwrap();

        let inventory = store.inventory().await.unwrap();
        let names: Vec<&str> = inventory.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["animations_mega.bin", "normal1.bin"]);
        assert_eq!(inventory[0].entry.as_ref().unwrap().size, 6);
        assert!(inventory[1].entry.is_none());
        assert_eq!(inventory[1].size, 3);
    }

    #[tokio::test]
    async fn test_verify() {
        let (backend, store) = mock_store();
        let data = b"bundle bytes";
        store.write_atomic("animations_mega.bin", data).await.unwrap();
        assert_eq!(store.verify("animations_mega.bin").await.unwrap(), None);

        let hash = blake3::hash(data).to_hex().to_string();
        store.update_manifest("animations_mega.bin", data.len() as u64, &hash).await.unwrap();
        assert_eq!(store.verify("animations_mega.bin").await.unwrap(), Some(true));

        backend.write(Path::new("animations_mega.bin"), b"bundle bytez").await.unwrap();
        assert_eq!(store.verify("animations_mega.bin").await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_local_write_atomic_leaves_no_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(Arc::new(LocalBackend::new("assets", dir.path()).unwrap()));
        store.write_atomic("normal1.bin", b"frame").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("normal1.bin")).unwrap(), b"frame");
        let staged: Vec<_> = std::fs::read_dir(dir.path().join(STAGING_DIR)).unwrap().collect();
        assert!(staged.is_empty());
    }

    /// A reader racing a writer that keeps replacing the same asset must
    /// only ever observe one complete version or the other.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_read_never_sees_partial_file() {
        const SIZE: usize = 256 * 1024;
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(Arc::new(LocalBackend::new("assets", dir.path()).unwrap()));
        let a = vec![0xAA; SIZE];
        let b = vec![0xBB; SIZE];
        store.write_atomic("animations_mega.bin", &a).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let data = if i % 2 == 0 { &b } else { &a };
                    store.write_atomic("animations_mega.bin", data).await.unwrap();
                }
            })
        };
        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let data = store.read("animations_mega.bin").await.unwrap();
                    assert_eq!(data.len(), SIZE);
                    assert!(data.iter().all(|&byte| byte == data[0]), "observed a torn file");
                    tokio::task::yield_now().await;
                }
            })
        };
        writer.await.unwrap();
        reader.await.unwrap();
    }
}
