//! Path validation for asset store paths.
//!
//! Every path handed to a backend is relative to the store root and must
//! never resolve outside of it.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path and returns it normalized.
///
/// `.` components and repeated separators are dropped, `..` is resolved
/// lexically and must never climb above the root. Null bytes and Windows
/// drive prefixes are rejected, as is anything that normalizes to an empty
/// path.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use emote_storage::validate_path;
/// assert!(validate_path("normal1.bin").is_ok());
/// assert!(validate_path(".updates/animations_mega.bin.tmp").is_ok());
/// assert!(validate_path("../normal1.bin").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("./old/../frames//fire1.bin/").unwrap(),
///     Path::new("frames/fire1.bin")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            // Null bytes survive Path::components() on Unix but truncate
            // the path once it reaches a syscall.
            Component::Normal(s) if s.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(s) => components.push(s),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("normal1.bin", "normal1.bin")]
    #[case("animations_mega.bin", "animations_mega.bin")]
    #[case(".updates/normal1.bin.tmp", ".updates/normal1.bin.tmp")]
    #[case("a//b//c.bin", "a/b/c.bin")]
    #[case("./a/./b.bin", "a/b.bin")]
    #[case("a/b/../c.bin", "a/c.bin")]
    #[case("/absolute/is/rooted.bin", "absolute/is/rooted.bin")]
    #[case("trailing.bin/", "trailing.bin")]
    fn test_valid(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    #[case("..")]
    #[case("../manifest.json")]
    #[case("a/../../b.bin")]
    #[case("a\0b")]
    #[case("\0")]
    fn test_invalid(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
