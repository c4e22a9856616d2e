//! Core types for the structural index.
//!
//! This module defines the data contracts shared by every stage:
//! - Entity records emitted by language scanners
//! - Enriched entities carrying uid, hash and summary
//! - The assembled structural document

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Document schema version written into `metadata.schema_version`.
pub const SCHEMA_VERSION: &str = "1.0";

// ============================================================================
// Scanner Contract
// ============================================================================

/// Kind of entity discovered by a scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Module,
    Function,
    Class,
    Method,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive 1-based line range of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// The record shape every language scanner must emit.
///
/// `kind`, `name` and `file_path` are mandatory; JSON records missing any of
/// them fail to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub name: String,
    /// Path relative to the scanned root, `/`-separated.
    pub file_path: String,
    #[serde(default)]
    pub lines: LineRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// Raw source slice of the entity (whole file for modules).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Literal call-site names referenced from this entity's body.
    #[serde(default)]
    pub calls: Vec<String>,
    /// Imported names (modules only, usually).
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Scanner-reported modifiers such as `async`, `static`, `pub`, decorators.
    #[serde(default)]
    pub modifiers: Vec<String>,
    /// Owning module id as reported by the scanner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    /// Nested method records (classes only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<EntityRecord>,
}

impl EntityRecord {
    pub fn new(kind: EntityKind, name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            file_path: file_path.into(),
            lines: LineRange::default(),
            docstring: None,
            source: None,
            calls: Vec::new(),
            dependencies: Vec::new(),
            modifiers: Vec::new(),
            module_id: None,
            methods: Vec::new(),
        }
    }

    pub fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.lines = LineRange::new(start, end);
        self
    }

    pub fn with_docstring(mut self, doc: impl Into<String>) -> Self {
        self.docstring = Some(doc.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_calls<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.calls = calls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_modifiers<I, S>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifiers = modifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_method(mut self, method: EntityRecord) -> Self {
        self.methods.push(method);
        self
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    /// Check the structural requirements of the scanner contract.
    ///
    /// `expected_parent` is the kind of the record this one is nested under.
    pub fn validate(&self, expected_parent: Option<EntityKind>) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("{} record has an empty name", self.kind));
        }
        if self.file_path.trim().is_empty() {
            return Err(format!("{} `{}` has an empty file_path", self.kind, self.name));
        }

        let allowed = match expected_parent {
            None => self.kind == EntityKind::Module,
            Some(EntityKind::Module) => {
                matches!(self.kind, EntityKind::Function | EntityKind::Class)
            }
            Some(EntityKind::Class) => self.kind == EntityKind::Method,
            Some(_) => false,
        };
        if !allowed {
            return Err(format!(
                "{} `{}` cannot appear under {}",
                self.kind,
                self.name,
                expected_parent.map(|k| k.as_str()).unwrap_or("the document root")
            ));
        }

        if self.kind != EntityKind::Class && !self.methods.is_empty() {
            return Err(format!("{} `{}` has nested methods", self.kind, self.name));
        }
        for method in &self.methods {
            method.validate(Some(EntityKind::Class))?;
        }
        Ok(())
    }
}

/// Everything one scanner run produced for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutput {
    pub module: EntityRecord,
    /// Top-level functions and classes.
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

impl ScanOutput {
    pub fn validate(&self) -> Result<(), String> {
        self.module.validate(None)?;
        for entity in &self.entities {
            entity.validate(Some(EntityKind::Module))?;
        }
        Ok(())
    }
}

// ============================================================================
// Enrichment
// ============================================================================

/// Which hashing strategy produced a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashSource {
    /// SHA-256 over raw bytes.
    Content,
    /// SHA-256 over kind, name and normalized source.
    NormalizedSource,
}

/// Origin of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Docstring,
    Heuristic,
    Llm,
    Empty,
}

/// Short natural-language description of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub source: SummarySource,
    /// Always within [0, 1]; zero for empty summaries.
    pub confidence: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub truncated: bool,
}

impl Summary {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            source: SummarySource::Empty,
            confidence: 0.0,
            tags: Vec::new(),
            truncated: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Per-module call graph: caller name to the set of literal callee names.
///
/// Self-loops and cycles are representable.
pub type CallGraph = BTreeMap<String, BTreeSet<String>>;

/// An entity after uid, hash and summary enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEntity {
    pub uid: String,
    pub uid_components: Vec<String>,
    pub kind: EntityKind,
    pub name: String,
    pub file_path: String,
    pub lines: LineRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// 64-char hex digest, or `None` when hashing failed.
    pub hash: Option<String>,
    pub hash_source: Option<HashSource>,
    pub hash_version: String,
    pub summary: Summary,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub calls: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Uid of the owning module (absent on the module itself).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<EnrichedEntity>,
}

/// A module together with everything it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedModule {
    #[serde(flatten)]
    pub entity: EnrichedEntity,
    pub functions: Vec<EnrichedEntity>,
    pub classes: Vec<EnrichedEntity>,
    pub call_graph: CallGraph,
}

impl EnrichedModule {
    pub fn uid(&self) -> &str {
        &self.entity.uid
    }

    pub fn path(&self) -> &str {
        &self.entity.file_path
    }

    pub fn method_count(&self) -> usize {
        self.classes.iter().map(|c| c.methods.len()).sum()
    }

    pub fn call_edge_count(&self) -> usize {
        crate::callgraph::edge_count(&self.call_graph)
    }

    /// Visit the module and every nested entity in document order.
    pub fn entities(&self) -> impl Iterator<Item = &EnrichedEntity> {
        std::iter::once(&self.entity)
            .chain(self.functions.iter())
            .chain(
                self.classes
                    .iter()
                    .flat_map(|c| std::iter::once(c).chain(c.methods.iter())),
            )
    }
}

// ============================================================================
// Structural Document
// ============================================================================

/// Aggregate counts over a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub module_count: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub method_count: usize,
    pub call_edges_count: usize,
}

/// Directory tree of the scanned modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub project_name: String,
    pub schema_version: String,
    #[serde(default)]
    pub goals: Vec<String>,
    pub stats: DocumentStats,
    pub folder_structure: FolderNode,
}

/// One table-of-contents row per module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub uid: String,
    pub path: String,
    pub function_count: usize,
    pub class_count: usize,
    pub method_count: usize,
    pub hash: Option<String>,
    pub summary: String,
}

/// The full structural representation of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralDocument {
    pub metadata: DocumentMetadata,
    pub table_of_contents: Vec<TocEntry>,
    pub modules: Vec<EnrichedModule>,
}

impl StructuralDocument {
    /// Every enriched entity of every kind.
    pub fn entities(&self) -> impl Iterator<Item = &EnrichedEntity> {
        self.modules.iter().flat_map(|m| m.entities())
    }
}

/// Project-level facts passed to the assembler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    #[serde(default)]
    pub goals: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> EntityRecord {
        EntityRecord::new(EntityKind::Module, "util", "src/util.py")
    }

    #[test]
    fn test_valid_scan_output() {
        let output = ScanOutput {
            module: module(),
            entities: vec![
                EntityRecord::new(EntityKind::Function, "helper", "src/util.py"),
                EntityRecord::new(EntityKind::Class, "User", "src/util.py").with_method(
                    EntityRecord::new(EntityKind::Method, "save", "src/util.py"),
                ),
            ],
        };
        assert!(output.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_name_and_path() {
        let mut record = module();
        record.name = " ".to_string();
        assert!(record.validate(None).is_err());

        let mut record = module();
        record.file_path.clear();
        assert!(record.validate(None).is_err());
    }

    #[test]
    fn test_rejects_misplaced_kinds() {
        let output = ScanOutput {
            module: module(),
            entities: vec![EntityRecord::new(EntityKind::Method, "orphan", "src/util.py")],
        };
        assert!(output.validate().is_err());

        let function = EntityRecord::new(EntityKind::Function, "f", "src/util.py")
            .with_method(EntityRecord::new(EntityKind::Method, "m", "src/util.py"));
        assert!(function.validate(Some(EntityKind::Module)).is_err());
    }

    #[test]
    fn test_json_record_requires_kind() {
        let missing_kind = r#"{"name": "f", "file_path": "a.py"}"#;
        assert!(serde_json::from_str::<EntityRecord>(missing_kind).is_err());

        let ok = r#"{"kind": "function", "name": "f", "file_path": "a.py"}"#;
        let record: EntityRecord = serde_json::from_str(ok).unwrap();
        assert_eq!(record.kind, EntityKind::Function);
        assert!(record.calls.is_empty());
    }
}
