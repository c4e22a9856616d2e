//! Error types for the structural index.

use std::path::PathBuf;
use std::time::Duration;

/// A single file could not be turned into entity records.
///
/// Always isolated to that file: the run logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid record in {path}: {reason}")]
    InvalidRecord { path: PathBuf, reason: String },

    #[error("scan worker for {path} aborted: {message}")]
    Worker { path: PathBuf, message: String },
}

/// Description of one side of a uid collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub kind: crate::types::EntityKind,
    pub name: String,
    pub file_path: String,
    pub line: usize,
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} `{}` at {}:{}", self.kind, self.name, self.file_path, self.line)
    }
}

/// Two distinct entities resolved to the same uid. Fatal for assembly.
#[derive(Debug, Clone, thiserror::Error)]
#[error("uid collision on `{uid}`: {first} and {second}")]
pub struct CollisionError {
    pub uid: String,
    pub first: EntityRef,
    pub second: EntityRef,
}

/// Content could not be read for hashing. The entity is emitted without a hash.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("no content available for {0}")]
    Missing(String),

    #[error("failed to read {path} for hashing: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A summary provider failed; the chain moves on to the next provider.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned an unusable response: {0}")]
    BadResponse(String),
}

/// The diff engine was handed a manifest it cannot trust.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported manifest version `{found}` (expected `{expected}`)")]
    UnsupportedVersion { found: String, expected: String },

    #[error("manifest lists uid `{0}` more than once")]
    DuplicateUid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Writing an output artifact failed.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error for operations that must surface structural failures.
#[derive(Debug, thiserror::Error)]
pub enum StructmapError {
    #[error(transparent)]
    Collision(#[from] CollisionError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("file discovery failed: {0}")]
    Discovery(String),
}

impl StructmapError {
    /// Stable machine-readable code for CLI error output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Collision(_) => "uid_collision",
            Self::Manifest(_) => "manifest_load",
            Self::Config(_) => "config",
            Self::Output(_) => "output",
            Self::Scan(_) => "scan",
            Self::Discovery(_) => "discovery",
        }
    }
}

pub type Result<T> = std::result::Result<T, StructmapError>;
