//! Indexing pipeline.
//!
//! Discovers files, scans and enriches each one on a bounded pool of blocking
//! workers, then assembles the document and manifest on the calling task.
//! Comparing against the previous run goes through an explicit
//! [`ManifestStore`].

use crate::config::StructmapConfig;
use crate::diff::{ChangeReport, diff};
use crate::discovery::{FileDiscovery, relative_path};
use crate::enrich::Enricher;
use crate::error::{Result, ScanError};
use crate::hashing::Digest64;
use crate::manifest::{Manifest, generate_manifest, generate_manifest_at};
use crate::output::ManifestStore;
use crate::parsing::ScannerRegistry;
use crate::summary::SummaryEngine;
use crate::types::{EnrichedModule, ProjectMetadata, ScanOutput, StructuralDocument};
use crate::uid::UidAssigner;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// A file that was skipped because scanning it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// What happened to the discovered files during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub files_discovered: usize,
    pub files_scanned: usize,
    /// Discovered files that no scanner handles.
    pub files_unsupported: usize,
    /// Sorted by path.
    pub failures: Vec<FileFailure>,
    pub elapsed_ms: u64,
}

/// Result of one indexing run.
#[derive(Debug, Clone)]
pub struct IndexRun {
    pub document: StructuralDocument,
    pub manifest: Manifest,
    pub report: IndexReport,
    /// Changes versus the previous manifest, when one was compared.
    pub changes: Option<ChangeReport>,
}

/// Indexer that turns a source tree into a structural document.
pub struct Indexer {
    config: StructmapConfig,
    registry: Arc<ScannerRegistry>,
    enricher: Enricher,
    generated_at: Option<u64>,
}

impl Indexer {
    pub fn new(config: StructmapConfig) -> Self {
        let enricher = Enricher::new(
            UidAssigner::from_config(&config.project),
            Arc::new(SummaryEngine::from_config(&config.summary)),
        );
        Self {
            config,
            registry: Arc::new(ScannerRegistry::with_defaults()),
            enricher,
            generated_at: None,
        }
    }

    pub fn with_registry(mut self, registry: ScannerRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Pin the manifest timestamp instead of reading the clock.
    pub fn with_timestamp(mut self, generated_at_unix: u64) -> Self {
        self.generated_at = Some(generated_at_unix);
        self
    }

    pub fn config(&self) -> &StructmapConfig {
        &self.config
    }

    /// Index `root` without touching the output directory.
    pub async fn index(&self, root: &Path) -> Result<IndexRun> {
        let started = Instant::now();
        tracing::info!("Starting full index of {}", root.display());

        let discovery = FileDiscovery::from_config(&self.config.scan)
            .with_output_dir(self.config.output_dir(root));
        let files = discovery.discover(root)?;
        tracing::info!("Discovered {} files", files.len());

        let mut report = IndexReport {
            files_discovered: files.len(),
            ..IndexReport::default()
        };

        let workers = self.config.scan.effective_workers();
        let root_buf = Arc::new(root.to_path_buf());
        let results: Vec<(PathBuf, std::result::Result<Option<EnrichedModule>, ScanError>)> =
            stream::iter(files)
                .map(|path| {
                    let registry = Arc::clone(&self.registry);
                    let enricher = self.enricher.clone();
                    let root = Arc::clone(&root_buf);
                    async move {
                        let task_path = path.clone();
                        let outcome = tokio::task::spawn_blocking(move || {
                            scan_file(&registry, &enricher, &root, &task_path)
                        })
                        .await
                        .unwrap_or_else(|e| {
                            Err(ScanError::Worker {
                                path: path.clone(),
                                message: e.to_string(),
                            })
                        });
                        (path, outcome)
                    }
                })
                .buffer_unordered(workers)
                .collect()
                .await;

        let mut modules = Vec::with_capacity(results.len());
        for (path, outcome) in results {
            match outcome {
                Ok(Some(module)) => {
                    report.files_scanned += 1;
                    modules.push(module);
                }
                Ok(None) => report.files_unsupported += 1,
                Err(e) => {
                    tracing::warn!("Failed to index {}: {}", path.display(), e);
                    report.failures.push(FileFailure {
                        path: relative_path(root, &path),
                        error: e.to_string(),
                    });
                }
            }
        }
        report.failures.sort_by(|a, b| a.path.cmp(&b.path));

        let project = ProjectMetadata {
            name: self.config.project_name(root),
            goals: self.config.project.goals.clone(),
        };
        let document = crate::assembler::assemble(modules, &project)?;

        let source_document = self.config.output.document_file.as_str();
        let manifest = match self.generated_at {
            Some(at) => generate_manifest_at(&document, source_document, at),
            None => generate_manifest(&document, source_document),
        };

        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            "Index complete: {} files scanned, {} skipped, {} entities",
            report.files_scanned,
            report.failures.len(),
            manifest.total_entities
        );

        Ok(IndexRun {
            document,
            manifest,
            report,
            changes: None,
        })
    }

    /// Index `root`, diff against the stored manifest when `compare` is set,
    /// then replace the stored document and manifest.
    ///
    /// A stored manifest that cannot be read fails the run before anything is
    /// written.
    pub async fn index_and_save(&self, root: &Path, store: &ManifestStore, compare: bool) -> Result<IndexRun> {
        let previous = if compare { store.load_previous()? } else { None };

        let mut run = self.index(root).await?;
        if let Some(previous) = &previous {
            run.changes = Some(diff(previous, &run.manifest)?);
        }

        store.save(&run.document, &run.manifest)?;
        tracing::info!("Wrote {}", store.document_path().display());
        Ok(run)
    }
}

/// Read, scan and enrich one file. `Ok(None)` when no scanner handles it.
fn scan_file(
    registry: &ScannerRegistry,
    enricher: &Enricher,
    root: &Path,
    path: &Path,
) -> std::result::Result<Option<EnrichedModule>, ScanError> {
    let Some(scanner) = registry.scanner_for(path) else {
        return Ok(None);
    };

    let bytes = fs::read(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let source = std::str::from_utf8(&bytes).map_err(|e| ScanError::Parse {
        path: path.to_path_buf(),
        message: format!("not valid UTF-8: {e}"),
    })?;

    let rel = relative_path(root, path);
    let output = scanner.scan(&rel, source)?;
    output.validate().map_err(|reason| ScanError::InvalidRecord {
        path: path.to_path_buf(),
        reason,
    })?;
    tracing::debug!("{} scanned {} ({} entities)", scanner.name(), rel, output.entities.len());

    let digest = module_digest(root, &output, &bytes, scanner.reads_module_source());
    Ok(Some(enricher.enrich_with_module_hash(&output, digest)))
}

/// Module digest: the scanned bytes for source scanners; for record scanners
/// the embedded module source, else the described file on disk.
fn module_digest(root: &Path, output: &ScanOutput, bytes: &[u8], reads_module_source: bool) -> Option<Digest64> {
    if reads_module_source {
        return Some(Digest64::content(bytes));
    }
    if let Some(source) = output.module.source.as_deref() {
        return Some(Digest64::content(source.as_bytes()));
    }
    match Digest64::file(&root.join(&output.module.file_path)) {
        Ok(digest) => Some(digest),
        Err(e) => {
            tracing::warn!("module emitted without hash: {}", e);
            None
        }
    }
}
