//! Per-file enrichment: uid, hash, summary and call graph for every record.

use crate::callgraph;
use crate::error::HashError;
use crate::hashing::{Digest64, HASH_VERSION};
use crate::summary::{SummaryEngine, SummaryRequest};
use crate::types::*;
use crate::uid::UidAssigner;
use std::sync::Arc;

/// Turns one file's scanner output into an [`EnrichedModule`].
///
/// Pure apart from the optional remote summary call; safe to share between
/// workers.
#[derive(Clone)]
pub struct Enricher {
    uids: UidAssigner,
    summaries: Arc<SummaryEngine>,
}

impl Enricher {
    pub fn new(uids: UidAssigner, summaries: Arc<SummaryEngine>) -> Self {
        Self { uids, summaries }
    }

    /// Enrich a scan result. `file_bytes` are the raw bytes of the file and
    /// back the module's content hash.
    pub fn enrich(&self, scan: &ScanOutput, file_bytes: Option<&[u8]>) -> EnrichedModule {
        let module_record = &scan.module;
        let module_hash = match file_bytes.or(module_record.source.as_deref().map(str::as_bytes)) {
            Some(bytes) => Some(Digest64::content(bytes)),
            None => {
                let err = HashError::Missing(module_record.file_path.clone());
                tracing::warn!("module emitted without hash: {}", err);
                None
            }
        };
        self.enrich_with_module_hash(scan, module_hash)
    }

    /// Enrich a scan result whose module digest was computed by the caller.
    pub fn enrich_with_module_hash(&self, scan: &ScanOutput, module_hash: Option<Digest64>) -> EnrichedModule {
        let module_record = &scan.module;
        let mut module = self.enrich_entity(module_record, None, None, module_hash);
        let module_uid = module.uid.clone();
        module.dependencies = module_record.dependencies.clone();

        let mut functions = Vec::new();
        let mut classes = Vec::new();
        for record in &scan.entities {
            match record.kind {
                EntityKind::Function => {
                    functions.push(self.enrich_hashed(record, Some(&module_uid), None));
                }
                EntityKind::Class => {
                    let mut class = self.enrich_hashed(record, Some(&module_uid), None);
                    class.methods = record
                        .methods
                        .iter()
                        .map(|m| self.enrich_hashed(m, Some(&module_uid), Some(&record.name)))
                        .collect();
                    classes.push(class);
                }
                EntityKind::Module | EntityKind::Method => {
                    tracing::warn!(
                        "ignoring misplaced {} `{}` in {}",
                        record.kind,
                        record.name,
                        record.file_path
                    );
                }
            }
        }

        EnrichedModule {
            entity: module,
            functions,
            classes,
            call_graph: callgraph::build_graph(&scan.entities),
        }
    }

    fn enrich_hashed(
        &self,
        record: &EntityRecord,
        module_uid: Option<&str>,
        class_name: Option<&str>,
    ) -> EnrichedEntity {
        let digest = match record.source.as_deref() {
            Some(source) => Some(Digest64::entity(record.kind, &record.name, source)),
            None => {
                tracing::debug!(
                    "no source slice for {} `{}` in {}; emitting without hash",
                    record.kind,
                    record.name,
                    record.file_path
                );
                None
            }
        };
        self.enrich_entity(record, module_uid, class_name, digest)
    }

    fn enrich_entity(
        &self,
        record: &EntityRecord,
        module_uid: Option<&str>,
        class_name: Option<&str>,
        digest: Option<Digest64>,
    ) -> EnrichedEntity {
        let (uid, uid_components) =
            self.uids
                .assign(record.kind, &record.file_path, &record.name, class_name);

        let code = match record.kind {
            EntityKind::Module => None,
            _ => record.source.as_deref(),
        };
        let request = SummaryRequest::new(record.kind, &record.name)
            .with_docstring(record.docstring.as_deref())
            .with_code(code)
            .with_modifiers(&record.modifiers)
            .with_class(class_name);
        let summary = self.summaries.summarize(&request);
        let tags = crate::summary::derive_tags(&request);

        let (hash, hash_source) = match digest {
            Some(d) => (Some(d.hex), Some(d.source)),
            None => (None, None),
        };

        EnrichedEntity {
            uid,
            uid_components,
            kind: record.kind,
            name: record.name.clone(),
            file_path: record.file_path.clone(),
            lines: record.lines,
            docstring: record.docstring.clone(),
            hash,
            hash_source,
            hash_version: HASH_VERSION.to_string(),
            summary,
            tags,
            calls: record.calls.clone(),
            dependencies: Vec::new(),
            module_uid: module_uid.map(str::to_string),
            class_name: class_name.map(str::to_string),
            methods: Vec::new(),
        }
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(UidAssigner::default(), Arc::new(SummaryEngine::offline()))
    }
}
