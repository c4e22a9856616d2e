//! Content and normalized-source hashing.

use crate::error::HashError;
use crate::types::{EntityKind, HashSource};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Version tag carried by every digest. Mixed into entity hashes so a scheme
/// change can never alias an old digest.
pub const HASH_VERSION: &str = "sha256-v1";

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_LEN: usize = 64;

/// SHA-256 over raw bytes.
pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 over whitespace-normalized text.
pub fn hash_source(text: &str) -> String {
    hash_content(normalize_source(text).as_bytes())
}

/// Digest identifying an entity's functional content: kind, name and
/// normalized source.
pub fn hash_entity(kind: EntityKind, name: &str, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(HASH_VERSION.as_bytes());
    hasher.update([0u8]);
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_source(source).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a file's raw bytes from disk.
pub fn hash_file(path: &Path) -> Result<String, HashError> {
    let bytes = std::fs::read(path).map_err(|source| HashError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_content(&bytes))
}

/// A computed digest and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest64 {
    pub hex: String,
    pub source: HashSource,
}

impl Digest64 {
    pub fn content(bytes: &[u8]) -> Self {
        Self {
            hex: hash_content(bytes),
            source: HashSource::Content,
        }
    }

    /// Content digest of a file on disk.
    pub fn file(path: &Path) -> Result<Self, HashError> {
        Ok(Self {
            hex: hash_file(path)?,
            source: HashSource::Content,
        })
    }

    pub fn entity(kind: EntityKind, name: &str, source: &str) -> Self {
        Self {
            hex: hash_entity(kind, name, source),
            source: HashSource::NormalizedSource,
        }
    }
}

/// Check that a digest is exactly 64 lowercase hex characters.
pub fn is_well_formed(digest: &str) -> bool {
    digest.len() == DIGEST_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Canonical form of source text for hashing.
///
/// Line endings become `\n`, trailing whitespace is trimmed per line, the
/// common leading indentation is removed and leading/trailing blank lines are
/// dropped. Re-indenting a block as a whole therefore leaves the result
/// unchanged.
pub fn normalize_source(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.lines().map(|l| l.trim_end()).collect();

    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return String::new();
    };
    let lines = &lines[first..=last];

    let indent = lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = String::with_capacity(unified.len());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !line.is_empty() {
            out.push_str(line.get(indent..).unwrap_or_else(|| line.trim_start()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            hash_content(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(is_well_formed(&hash_content(b"anything")));
    }

    #[test]
    fn test_trailing_whitespace_and_line_endings() {
        let unix = "def f():\n    return 1\n";
        let windows = "def f():   \r\n    return 1\t\r\n";
        assert_eq!(hash_source(unix), hash_source(windows));
        assert_ne!(hash_content(unix.as_bytes()), hash_content(windows.as_bytes()));
    }

    #[test]
    fn test_reindent_keeps_source_hash() {
        let flat = "fn f() {\n    g();\n}";
        let nested = "    fn f() {\n        g();\n    }\n";
        assert_eq!(hash_source(flat), hash_source(nested));
        assert_ne!(hash_content(flat.as_bytes()), hash_content(nested.as_bytes()));
    }

    #[test]
    fn test_relative_indent_matters() {
        let a = "if x:\n    y()\n";
        let b = "if x:\ny()\n";
        assert_ne!(hash_source(a), hash_source(b));
    }

    #[test]
    fn test_entity_hash_depends_on_kind_and_name() {
        let src = "return 1";
        let f = hash_entity(EntityKind::Function, "f", src);
        assert_ne!(f, hash_entity(EntityKind::Method, "f", src));
        assert_ne!(f, hash_entity(EntityKind::Function, "g", src));
        assert_eq!(f, hash_entity(EntityKind::Function, "f", "  return 1  \n"));
        assert!(is_well_formed(&f));
    }

    #[test]
    fn test_unreadable_file() {
        let err = hash_file(Path::new("/nonexistent/structmap/file.py")).unwrap_err();
        assert!(matches!(err, HashError::Unreadable { .. }));
        assert!(Digest64::file(Path::new("/nonexistent/structmap/file.py")).is_err());
    }

    #[test]
    fn test_file_digest_matches_content_digest() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("m.py");
        std::fs::write(&path, b"x = 1\n").unwrap();
        let digest = Digest64::file(&path).unwrap();
        assert_eq!(digest, Digest64::content(b"x = 1\n"));
    }

    #[test]
    fn test_malformed_digests() {
        assert!(!is_well_formed("abc"));
        assert!(!is_well_formed(&"G".repeat(64)));
        assert!(!is_well_formed(&"A".repeat(64)));
    }
}
