//! Split a structural document into a directory of smaller files.
//!
//! Layout:
//! - `modules/<module>.json`, one per module, named by cleaned module uid
//! - `index.json` listing every module and its file
//! - `callgraph.json` with all call edges as caller/callee pairs
//! - `metadata.json` with generator version and statistics
//! - the whole document under its usual name, for older consumers

use crate::callgraph;
use crate::error::OutputError;
use crate::output::write_json;
use crate::types::{DocumentStats, FolderNode, StructuralDocument};
use crate::uid::clean_module_uid;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const MODULES_DIR: &str = "modules";
pub const INDEX_FILE: &str = "index.json";
pub const CALLGRAPH_FILE: &str = "callgraph.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const LEGACY_DOCUMENT_FILE: &str = "structure.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIndexEntry {
    pub uid: String,
    pub path: String,
    /// Relative to the struct directory.
    pub file: String,
    pub function_count: usize,
    pub class_count: usize,
    pub method_count: usize,
    pub hash: Option<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructIndex {
    pub project_name: String,
    pub schema_version: String,
    pub modules: Vec<ModuleIndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    /// Uid of the module the caller lives in.
    pub module: String,
    pub caller: String,
    pub callee: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphFile {
    pub total_edges: usize,
    pub edges: Vec<CallEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructMetadata {
    pub generator: String,
    pub generator_version: String,
    pub schema_version: String,
    pub project_name: String,
    pub goals: Vec<String>,
    pub stats: DocumentStats,
    pub folder_structure: FolderNode,
}

/// What [`generate`] wrote.
#[derive(Debug, Clone)]
pub struct StructDirReport {
    pub dir: PathBuf,
    pub module_files: Vec<PathBuf>,
    pub edge_count: usize,
}

/// Filesystem-safe stem for a module uid: `#module` and repeated trailing
/// segments removed, path separators and reserved characters replaced.
pub fn module_file_stem(uid: &str) -> String {
    let cleaned = clean_module_uid(uid);
    let stem: String = cleaned
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "_root".to_string()
    } else {
        stem
    }
}

/// Write the struct directory for `document` under `output_dir`.
pub fn generate(output_dir: &Path, document: &StructuralDocument) -> Result<StructDirReport, OutputError> {
    let mut used = HashSet::new();
    let mut index_entries = Vec::with_capacity(document.modules.len());
    let mut module_files = Vec::with_capacity(document.modules.len());
    let mut edges = Vec::new();

    for module in &document.modules {
        let stem = module_file_stem(module.uid());
        let mut name = stem.clone();
        let mut n = 2;
        while !used.insert(name.to_lowercase()) {
            name = format!("{stem}_{n}");
            n += 1;
        }

        let rel = format!("{MODULES_DIR}/{name}.json");
        let path = output_dir.join(&rel);
        write_json(&path, module, &format!("module {}", module.uid()))?;
        module_files.push(path);

        index_entries.push(ModuleIndexEntry {
            uid: module.uid().to_string(),
            path: module.path().to_string(),
            file: rel,
            function_count: module.functions.len(),
            class_count: module.classes.len(),
            method_count: module.method_count(),
            hash: module.entity.hash.clone(),
            summary: module.entity.summary.text.clone(),
        });

        edges.extend(callgraph::edges(&module.call_graph).map(|(caller, callee)| CallEdge {
            module: module.uid().to_string(),
            caller: caller.to_string(),
            callee: callee.to_string(),
        }));
    }

    let metadata = &document.metadata;
    write_json(
        &output_dir.join(INDEX_FILE),
        &StructIndex {
            project_name: metadata.project_name.clone(),
            schema_version: metadata.schema_version.clone(),
            modules: index_entries,
        },
        "struct index",
    )?;

    let edge_count = edges.len();
    write_json(
        &output_dir.join(CALLGRAPH_FILE),
        &CallGraphFile {
            total_edges: edge_count,
            edges,
        },
        "call graph",
    )?;

    write_json(
        &output_dir.join(METADATA_FILE),
        &StructMetadata {
            generator: crate::GENERATOR_NAME.to_string(),
            generator_version: crate::VERSION.to_string(),
            schema_version: metadata.schema_version.clone(),
            project_name: metadata.project_name.clone(),
            goals: metadata.goals.clone(),
            stats: metadata.stats.clone(),
            folder_structure: metadata.folder_structure.clone(),
        },
        "struct metadata",
    )?;

    write_json(&output_dir.join(LEGACY_DOCUMENT_FILE), document, "structural document")?;

    tracing::info!(
        "Wrote struct directory {} ({} modules, {} call edges)",
        output_dir.display(),
        module_files.len(),
        edge_count
    );

    Ok(StructDirReport {
        dir: output_dir.to_path_buf(),
        module_files,
        edge_count,
    })
}
