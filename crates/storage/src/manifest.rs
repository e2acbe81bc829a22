//! Update manifest.
//!
//! A small JSON document at the store root recording, per asset, the size,
//! BLAKE3 hash and commit time of the last successful update:
//!
//! ```json
//! {
//!   "version": 1,
//!   "files": {
//!     "animations_mega.bin": { "size": 52416, "hash": "9f1c...", "timestamp": 1760000000 }
//!   }
//! }
//! ```

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Size in bytes of the committed file.
    pub size: u64,
    /// Lowercase hex BLAKE3 digest of the committed file.
    pub hash: String,
    /// Unix timestamp (seconds) of the commit.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default)]
    pub files: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self { version: MANIFEST_VERSION, files: BTreeMap::new() }
    }
}

impl Manifest {
    /// Parse a manifest. Anything that isn't a JSON object of the expected
    /// shape is an error; the store decides what to do about that.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).or_raise(|| ErrorKind::Manifest)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).or_raise(|| ErrorKind::Manifest)
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.files.get(name)
    }

    /// Insert or replace the entry for `name`, returning the previous one.
    pub fn upsert(&mut self, name: impl Into<String>, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.files.insert(name.into(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<ManifestEntry> {
        self.files.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(size: u64) -> ManifestEntry {
        ManifestEntry { size, hash: "ab".repeat(32), timestamp: 1_700_000_000 }
    }

    #[test]
    fn test_default_is_version_one_and_empty() {
        let manifest = Manifest::default();
        assert_eq!(manifest.version, 1);
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_upsert_replaces() {
        let mut manifest = Manifest::default();
        assert!(manifest.upsert("animations_mega.bin", entry(10)).is_none());
        let previous = manifest.upsert("animations_mega.bin", entry(20)).unwrap();
        assert_eq!(previous.size, 10);
        assert_eq!(manifest.get("animations_mega.bin").unwrap().size, 20);
        assert_eq!(manifest.files.len(), 1);
    }

    #[test]
    fn test_json_shape() {
        let mut manifest = Manifest::default();
        manifest.upsert("normal_all.bin", entry(42));
        let value: serde_json::Value = serde_json::from_slice(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["files"]["normal_all.bin"]["size"], 42);
        assert_eq!(value["files"]["normal_all.bin"]["timestamp"], 1_700_000_000u64);
        assert_eq!(Manifest::from_json(&manifest.to_json().unwrap()).unwrap(), manifest);
    }

    #[test]
    fn test_missing_files_key_defaults() {
        let manifest = Manifest::from_json(br#"{"version":1}"#).unwrap();
        assert!(manifest.is_empty());
    }

    #[rstest]
    #[case(b"")]
    #[case(b"not json")]
    #[case(b"[]")]
    #[case(b"{\"files\":{}}")]
    #[case(b"{\"version\":1,\"files\":{\"a\":{\"size\":\"big\"}}}")]
    fn test_invalid_json(#[case] input: &[u8]) {
        let err = Manifest::from_json(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Manifest));
    }
}
