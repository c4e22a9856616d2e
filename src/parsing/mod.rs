//! Language scanners that turn source text into entity records.
//!
//! Uses tree-sitter for error-tolerant parsing. The rest of the crate only
//! depends on the [`Scanner`] trait and the record shape it returns.

pub mod python;
pub mod records;
pub mod rust;
pub mod typescript;

use crate::error::ScanError;
use crate::types::{EntityKind, EntityRecord, LineRange, ScanOutput};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::{Language, Node, Parser, Tree};

/// Trait for language-specific scanners.
pub trait Scanner: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// File-name suffixes this scanner handles (without the leading dot).
    fn extensions(&self) -> &[&str];

    /// Scan one file. `path` is the root-relative, `/`-separated path that
    /// ends up in every record.
    fn scan(&self, path: &str, source: &str) -> Result<ScanOutput, ScanError>;

    /// Whether the scanned file's bytes are the module's own content.
    ///
    /// False for record files, whose module hash must come from the record.
    fn reads_module_source(&self) -> bool {
        true
    }
}

/// Maps file suffixes to scanners.
#[derive(Clone, Default)]
pub struct ScannerRegistry {
    scanners: Vec<Arc<dyn Scanner>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every bundled scanner.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(rust::RustScanner::new()));
        registry.register(Arc::new(python::PythonScanner::new()));
        registry.register(Arc::new(typescript::TypeScriptScanner::new_typescript()));
        registry.register(Arc::new(typescript::TypeScriptScanner::new_tsx()));
        registry.register(Arc::new(records::JsonRecordScanner::new()));
        registry
    }

    pub fn register(&mut self, scanner: Arc<dyn Scanner>) {
        self.scanners.push(scanner);
    }

    /// Scanner with the longest matching suffix for this file.
    pub fn scanner_for(&self, path: &Path) -> Option<Arc<dyn Scanner>> {
        let file_name = path.file_name()?.to_str()?.to_lowercase();
        let mut best: Option<(usize, &Arc<dyn Scanner>)> = None;
        for scanner in &self.scanners {
            for ext in scanner.extensions() {
                let matches = file_name.len() > ext.len()
                    && file_name.ends_with(ext)
                    && file_name.as_bytes()[file_name.len() - ext.len() - 1] == b'.';
                if matches && best.is_none_or(|(len, _)| ext.len() > len) {
                    best = Some((ext.len(), scanner));
                }
            }
        }
        best.map(|(_, scanner)| Arc::clone(scanner))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse `source`, failing only when tree-sitter gives up entirely.
pub(crate) fn parse_source(language: &Language, path: &str, source: &str) -> Result<Tree, ScanError> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| ScanError::Parse {
            path: PathBuf::from(path),
            message: format!("failed to load grammar: {e}"),
        })?;

    let tree = parser.parse(source, None).ok_or_else(|| ScanError::Parse {
        path: PathBuf::from(path),
        message: "parser produced no tree".to_string(),
    })?;

    let root = tree.root_node();
    if root.is_error() {
        return Err(ScanError::Parse {
            path: PathBuf::from(path),
            message: "source is not valid for this grammar".to_string(),
        });
    }
    if root.has_error() {
        tracing::debug!("{} contains syntax errors; scanning what parsed", path);
    }
    Ok(tree)
}

/// Text of a node, or "" if the byte range is not valid UTF-8.
pub(crate) fn node_text<'a>(bytes: &'a [u8], node: Node) -> &'a str {
    std::str::from_utf8(&bytes[node.start_byte()..node.end_byte()]).unwrap_or("")
}

/// Text of a named field of `node`.
pub(crate) fn field_text<'a>(bytes: &'a [u8], node: Node, field: &str) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|n| node_text(bytes, n))
        .filter(|t| !t.is_empty())
}

/// 1-based inclusive line range of a node.
pub(crate) fn line_range(node: Node) -> LineRange {
    LineRange::new(node.start_position().row + 1, node.end_position().row + 1)
}

/// Last identifier-like run in a node's text (`self.store.save` → `save`).
pub(crate) fn last_ident(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '$')
        .filter(|p| !p.is_empty())
        .last()
        .map(str::to_string)
}

/// Display name for a file's module record.
///
/// Index files (`mod.rs`, `__init__.py`, `index.ts`) take their directory's name.
pub(crate) fn module_name_for(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let mut parts = normalized.rsplit('/').filter(|p| !p.is_empty());
    let file = parts.next().unwrap_or(path);
    let stem = file.split('.').next().unwrap_or(file);
    if matches!(stem, "mod" | "__init__" | "index") {
        if let Some(dir) = parts.next() {
            return dir.to_string();
        }
    }
    stem.to_string()
}

/// Module record covering the whole file.
pub(crate) fn module_record(path: &str, source: &str) -> EntityRecord {
    let lines = source.lines().count().max(1);
    let mut module = EntityRecord::new(EntityKind::Module, module_name_for(path), path)
        .with_lines(1, lines)
        .with_source(source);
    module.module_id = Some(module_name_for(path));
    module
}

/// Source of `node`, starting at the beginning of its first line when only
/// indentation precedes it, so every line carries its original indent.
pub(crate) fn indented_text<'a>(bytes: &'a [u8], node: Node) -> &'a str {
    let start = node.start_byte();
    let line_start = bytes[..start]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    let from = if bytes[line_start..start].iter().all(|b| *b == b' ' || *b == b'\t') {
        line_start
    } else {
        start
    };
    std::str::from_utf8(&bytes[from..node.end_byte()]).unwrap_or("")
}

/// Build a record for `node` with its source slice and line range.
pub(crate) fn record_for(
    kind: EntityKind,
    name: impl Into<String>,
    path: &str,
    bytes: &[u8],
    node: Node,
) -> EntityRecord {
    let range = line_range(node);
    EntityRecord::new(kind, name, path)
        .with_lines(range.start, range.end)
        .with_source(indented_text(bytes, node))
}

/// Sorted, de-duplicated call names.
pub(crate) fn finish_calls(mut calls: Vec<String>) -> Vec<String> {
    calls.sort();
    calls.dedup();
    calls
}

/// Fold records that describe one logical entity into a single record.
///
/// A later record with the same kind and name as an earlier one is absorbed
/// into it when `mergeable(earlier, later)` holds; other same-name records are
/// left for the collision check. Order of first appearance is kept.
pub(crate) fn merge_same_name<F>(records: Vec<EntityRecord>, mergeable: F) -> Vec<EntityRecord>
where
    F: Fn(&EntityRecord, &EntityRecord) -> bool,
{
    let mut merged: Vec<EntityRecord> = Vec::with_capacity(records.len());
    for record in records {
        let target = merged
            .iter()
            .position(|r| r.kind == record.kind && r.name == record.name && mergeable(r, &record));
        match target {
            Some(idx) => absorb(&mut merged[idx], record),
            None => merged.push(record),
        }
    }
    merged
}

fn absorb(target: &mut EntityRecord, other: EntityRecord) {
    target.lines = LineRange::new(
        target.lines.start.min(other.lines.start),
        target.lines.end.max(other.lines.end),
    );
    target.source = match (target.source.take(), other.source) {
        (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
        (a, b) => a.or(b),
    };
    if target.docstring.is_none() {
        target.docstring = other.docstring;
    }
    target.calls.extend(other.calls);
    target.calls = finish_calls(std::mem::take(&mut target.calls));
    for modifier in other.modifiers {
        if !target.modifiers.contains(&modifier) {
            target.modifiers.push(modifier);
        }
    }
    for dependency in other.dependencies {
        if !target.dependencies.contains(&dependency) {
            target.dependencies.push(dependency);
        }
    }
    target.methods.extend(other.methods);
}
