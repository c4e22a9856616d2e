//! UID-keyed diff between two manifest snapshots.

use crate::error::ManifestError;
use crate::manifest::{Manifest, ManifestEntry};
use serde::{Deserialize, Serialize};

/// An entity present in both snapshots whose hash changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedEntry {
    pub uid: String,
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,
    pub entry: ManifestEntry,
}

/// Entities that were added, modified or deleted. Unchanged entities are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub added: Vec<ManifestEntry>,
    pub modified: Vec<ModifiedEntry>,
    pub deleted: Vec<ManifestEntry>,
    pub unchanged: usize,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// Compare two manifests by uid. Output lists are sorted by uid.
pub fn diff(old: &Manifest, new: &Manifest) -> Result<ChangeReport, ManifestError> {
    let old_map = old.by_uid()?;
    let new_map = new.by_uid()?;

    let mut report = ChangeReport::default();
    for (uid, new_entry) in &new_map {
        match old_map.get(uid) {
            None => report.added.push((*new_entry).clone()),
            Some(old_entry) if old_entry.hash != new_entry.hash => {
                report.modified.push(ModifiedEntry {
                    uid: uid.to_string(),
                    old_hash: old_entry.hash.clone(),
                    new_hash: new_entry.hash.clone(),
                    entry: (*new_entry).clone(),
                });
            }
            Some(_) => report.unchanged += 1,
        }
    }
    for (uid, old_entry) in &old_map {
        if !new_map.contains_key(uid) {
            report.deleted.push((*old_entry).clone());
        }
    }

    tracing::debug!(
        "diff: {} added, {} modified, {} deleted, {} unchanged",
        report.added.len(),
        report.modified.len(),
        report.deleted.len(),
        report.unchanged
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MANIFEST_VERSION;
    use crate::types::{EntityKind, HashSource};
    use std::collections::BTreeMap;

    fn entry(uid: &str, hash: &str) -> ManifestEntry {
        ManifestEntry {
            uid: uid.to_string(),
            hash: Some(hash.to_string()),
            hash_source: Some(HashSource::NormalizedSource),
            hash_version: "sha256-v1".to_string(),
            kind: EntityKind::Function,
            module: "m#module".to_string(),
            class: None,
            name: uid.to_string(),
        }
    }

    fn manifest(entries: Vec<ManifestEntry>) -> Manifest {
        Manifest {
            version: MANIFEST_VERSION.to_string(),
            generated_at_unix: 0,
            source_document: "structure.json".to_string(),
            total_entities: entries.len(),
            counts_by_kind: BTreeMap::new(),
            entries,
        }
    }

    #[test]
    fn test_added_and_deleted() {
        let old = manifest(vec![entry("A", "hash1"), entry("B", "hash2")]);
        let new = manifest(vec![entry("A", "hash1"), entry("C", "hash3")]);
        let report = diff(&old, &new).unwrap();

        assert_eq!(report.added, vec![entry("C", "hash3")]);
        assert_eq!(report.deleted, vec![entry("B", "hash2")]);
        assert!(report.modified.is_empty());
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn test_modified_reports_both_hashes() {
        let old = manifest(vec![entry("A", "hash1")]);
        let new = manifest(vec![entry("A", "hash9")]);
        let report = diff(&old, &new).unwrap();
        assert_eq!(report.modified.len(), 1);
        let modified = &report.modified[0];
        assert_eq!(modified.old_hash.as_deref(), Some("hash1"));
        assert_eq!(modified.new_hash.as_deref(), Some("hash9"));
        assert_eq!(modified.entry.uid, "A");
    }

    #[test]
    fn test_identity() {
        let m = manifest(vec![entry("A", "1"), entry("B", "2")]);
        let report = diff(&m, &m).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.unchanged, 2);
    }

    #[test]
    fn test_losing_a_hash_is_a_modification() {
        let old = manifest(vec![entry("A", "1")]);
        let mut gone = entry("A", "1");
        gone.hash = None;
        let report = diff(&old, &manifest(vec![gone])).unwrap();
        assert_eq!(report.modified.len(), 1);
        assert_eq!(report.modified[0].new_hash, None);
    }

    #[test]
    fn test_duplicate_uid_is_surfaced() {
        let bad = manifest(vec![entry("A", "1"), entry("A", "2")]);
        let good = manifest(vec![]);
        assert!(matches!(diff(&bad, &good), Err(ManifestError::DuplicateUid(_))));
    }
}
