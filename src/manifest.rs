//! Flat uid → hash manifest derived from a structural document.

use crate::error::{ManifestError, OutputError};
use crate::types::{EntityKind, HashSource, StructuralDocument};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub uid: String,
    pub hash: Option<String>,
    pub hash_source: Option<HashSource>,
    pub hash_version: String,
    pub kind: EntityKind,
    /// Uid of the owning module (the module's own uid for module entries).
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub generated_at_unix: u64,
    /// Reference to the document this manifest was derived from.
    pub source_document: String,
    pub total_entities: usize,
    pub counts_by_kind: BTreeMap<EntityKind, usize>,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Lookup by uid; rejects manifests that list a uid twice.
    pub fn by_uid(&self) -> Result<BTreeMap<&str, &ManifestEntry>, ManifestError> {
        let mut map = BTreeMap::new();
        for entry in &self.entries {
            if map.insert(entry.uid.as_str(), entry).is_some() {
                return Err(ManifestError::DuplicateUid(entry.uid.clone()));
            }
        }
        Ok(map)
    }

    /// Structural checks applied to every manifest read from outside.
    pub fn check(&self) -> Result<(), ManifestError> {
        if self.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: self.version.clone(),
                expected: MANIFEST_VERSION.to_string(),
            });
        }
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !seen.insert(entry.uid.as_str()) {
                return Err(ManifestError::DuplicateUid(entry.uid.clone()));
            }
        }
        Ok(())
    }
}

/// Flatten a document into a manifest stamped with the current time.
pub fn generate_manifest(document: &StructuralDocument, source_document: &str) -> Manifest {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    generate_manifest_at(document, source_document, now)
}

/// Flatten a document into a manifest with a fixed timestamp.
///
/// Identical documents and timestamps give identical manifests.
pub fn generate_manifest_at(
    document: &StructuralDocument,
    source_document: &str,
    generated_at_unix: u64,
) -> Manifest {
    let mut entries = Vec::new();
    for module in &document.modules {
        let module_uid = module.uid().to_string();
        for entity in module.entities() {
            entries.push(ManifestEntry {
                uid: entity.uid.clone(),
                hash: entity.hash.clone(),
                hash_source: entity.hash_source,
                hash_version: entity.hash_version.clone(),
                kind: entity.kind,
                module: module_uid.clone(),
                class: entity.class_name.clone(),
                name: entity.name.clone(),
            });
        }
    }

    let mut counts_by_kind = BTreeMap::new();
    for entry in &entries {
        *counts_by_kind.entry(entry.kind).or_insert(0) += 1;
    }

    Manifest {
        version: MANIFEST_VERSION.to_string(),
        generated_at_unix,
        source_document: source_document.to_string(),
        total_entities: entries.len(),
        counts_by_kind,
        entries,
    }
}

/// Read and check a manifest. A missing file is an error, never an empty
/// manifest.
pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }
    let data = fs::read(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: Manifest =
        serde_json::from_slice(&data).map_err(|source| ManifestError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    manifest.check()?;
    Ok(manifest)
}

pub fn save_manifest(path: &Path, manifest: &Manifest) -> Result<(), OutputError> {
    crate::output::write_json(path, manifest, "manifest")
}
