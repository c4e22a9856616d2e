//! Output artifacts and the persisted manifest store.

use crate::config::StructmapConfig;
use crate::error::{ManifestError, OutputError};
use crate::manifest::{Manifest, load_manifest, save_manifest};
use crate::types::StructuralDocument;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Write a value as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut data = serde_json::to_vec_pretty(value).map_err(|source| OutputError::Serialize {
        what: what.to_string(),
        source,
    })?;
    data.push(b'\n');
    fs::write(path, data).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Owns the on-disk location of the current document and manifest.
///
/// The previous manifest is only ever read for diffing; a new run replaces it
/// wholesale.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
    document_file: String,
    manifest_file: String,
}

impl ManifestStore {
    pub fn new(dir: PathBuf) -> Self {
        let defaults = crate::config::OutputConfig::default();
        Self {
            dir,
            document_file: defaults.document_file,
            manifest_file: defaults.manifest_file,
        }
    }

    pub fn from_config(config: &StructmapConfig, root: &Path) -> Self {
        Self {
            dir: config.output_dir(root),
            document_file: config.output.document_file.clone(),
            manifest_file: config.output.manifest_file.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir.join(&self.document_file)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(&self.manifest_file)
    }

    pub fn document_file(&self) -> &str {
        &self.document_file
    }

    /// The manifest of the previous run, or `None` on a first run.
    ///
    /// A manifest that exists but cannot be read is an error.
    pub fn load_previous(&self) -> Result<Option<Manifest>, ManifestError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        load_manifest(&path).map(Some)
    }

    pub fn load_document(&self) -> Result<StructuralDocument, OutputError> {
        let path = self.document_path();
        let data = fs::read(&path).map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| OutputError::Serialize {
            what: format!("document {}", path.display()),
            source,
        })
    }

    pub fn save(&self, document: &StructuralDocument, manifest: &Manifest) -> Result<(), OutputError> {
        write_json(&self.document_path(), document, "structural document")?;
        save_manifest(&self.manifest_path(), manifest)
    }
}
