//! Python scanner using tree-sitter-python.

use super::{
    Scanner, field_text, finish_calls, merge_same_name, module_record, node_text, parse_source, record_for,
};
use crate::error::ScanError;
use crate::types::{EntityKind, EntityRecord, ScanOutput};
use tree_sitter::{Language, Node};

/// Python source scanner.
pub struct PythonScanner {
    language: Language,
}

impl PythonScanner {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl Default for PythonScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for PythonScanner {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn scan(&self, path: &str, source: &str) -> Result<ScanOutput, ScanError> {
        let tree = parse_source(&self.language, path, source)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let mut module = module_record(path, source);
        module.docstring = leading_docstring(bytes, root);

        let mut entities = Vec::new();
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            match node.kind() {
                "import_statement" | "import_from_statement" => {
                    collect_imports(bytes, node, &mut module.dependencies);
                }
                _ => {
                    let (definition, decorators) = unwrap_decorated(bytes, node);
                    match definition.kind() {
                        "function_definition" => {
                            if let Some(record) =
                                callable(bytes, path, definition, EntityKind::Function, decorators)
                            {
                                entities.push(record);
                            }
                        }
                        "class_definition" => {
                            if let Some(record) = class(bytes, path, definition, decorators) {
                                entities.push(record);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let entities = merge_same_name(entities, same_entity);
        Ok(ScanOutput { module, entities })
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// For a `decorated_definition`, the inner definition and its decorator names.
fn unwrap_decorated<'t>(bytes: &[u8], node: Node<'t>) -> (Node<'t>, Vec<String>) {
    if node.kind() != "decorated_definition" {
        return (node, Vec::new());
    }
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            decorators.push(decorator_name(node_text(bytes, child)));
        }
    }
    let definition = node.child_by_field_name("definition").unwrap_or(node);
    (definition, decorators)
}

/// `@app.route("/x")` → `app.route`.
fn decorator_name(text: &str) -> String {
    let text = text.trim().trim_start_matches('@');
    text.split('(').next().unwrap_or(text).trim().to_string()
}

/// First string statement of a block or module, with quotes removed.
fn leading_docstring(bytes: &[u8], container: Node) -> Option<String> {
    let mut cursor = container.walk();
    let first = container
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let doc = strip_string_quotes(node_text(bytes, expr));
    (!doc.is_empty()).then_some(doc)
}

fn strip_string_quotes(raw: &str) -> String {
    let body = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = body.strip_prefix(quote).and_then(|b| b.strip_suffix(quote)) {
            return inner.trim().to_string();
        }
    }
    body.trim().to_string()
}

fn docstring_of(bytes: &[u8], definition: Node) -> Option<String> {
    leading_docstring(bytes, definition.child_by_field_name("body")?)
}

fn is_async(definition: Node) -> bool {
    let mut cursor = definition.walk();
    definition.children(&mut cursor).any(|c| c.kind() == "async")
}

/// Walk a body without descending into nested definitions.
fn walk_body<F: FnMut(Node)>(node: Node, visit: &mut F) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "function_definition" | "class_definition" | "lambda"
        ) {
            continue;
        }
        visit(child);
        walk_body(child, visit);
    }
}

fn collect_calls(bytes: &[u8], body: Node) -> Vec<String> {
    let mut calls = Vec::new();
    walk_body(body, &mut |node| {
        if node.kind() != "call" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let name = match function.kind() {
            "identifier" => Some(node_text(bytes, function)),
            "attribute" => field_text(bytes, function, "attribute"),
            _ => None,
        };
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            calls.push(name.to_string());
        }
    });
    finish_calls(calls)
}

fn yields(body: Node) -> bool {
    let mut found = false;
    walk_body(body, &mut |node| {
        if node.kind() == "yield" {
            found = true;
        }
    });
    found
}

fn collect_imports(bytes: &[u8], node: Node, out: &mut Vec<String>) {
    if node.kind() == "import_from_statement" {
        if let Some(module) = field_text(bytes, node, "module_name") {
            out.push(module.to_string());
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        let name = match child.kind() {
            "aliased_import" => field_text(bytes, child, "name"),
            _ => Some(node_text(bytes, child)),
        };
        if let Some(name) = name {
            out.push(name.to_string());
        }
    }
}

// ── Definitions ───────────────────────────────────────────────────────────

fn callable(
    bytes: &[u8],
    path: &str,
    definition: Node,
    kind: EntityKind,
    decorators: Vec<String>,
) -> Option<EntityRecord> {
    let name = field_text(bytes, definition, "name")?;
    let body = definition.child_by_field_name("body");

    let mut modifiers: Vec<String> = decorators
        .into_iter()
        .map(|d| accessor_role(name, &d).map_or(d, str::to_string))
        .collect();
    if is_async(definition) {
        modifiers.push("async".to_string());
    }
    if body.is_some_and(yields) {
        modifiers.push("generator".to_string());
    }

    let mut record = record_for(kind, name, path, bytes, definition)
        .with_calls(body.map(|b| collect_calls(bytes, b)).unwrap_or_default())
        .with_modifiers(modifiers);
    record.docstring = docstring_of(bytes, definition);
    Some(record)
}

fn class(bytes: &[u8], path: &str, definition: Node, decorators: Vec<String>) -> Option<EntityRecord> {
    let name = field_text(bytes, definition, "name")?;
    let mut record = record_for(EntityKind::Class, name, path, bytes, definition).with_modifiers(decorators);
    record.docstring = docstring_of(bytes, definition);

    if let Some(superclasses) = definition.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for base in superclasses.named_children(&mut cursor) {
            if matches!(base.kind(), "identifier" | "attribute") {
                record.dependencies.push(node_text(bytes, base).to_string());
            }
        }
    }

    if let Some(body) = definition.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            let (inner, decorators) = unwrap_decorated(bytes, child);
            if inner.kind() != "function_definition" {
                continue;
            }
            if let Some(method) = callable(bytes, path, inner, EntityKind::Method, decorators) {
                record.methods.push(method);
            }
        }
    }
    record.methods = merge_same_name(std::mem::take(&mut record.methods), same_entity);
    Some(record)
}

/// `@x.setter` on `def x` → `setter`.
fn accessor_role(name: &str, decorator: &str) -> Option<&'static str> {
    let role = decorator.strip_prefix(name)?.strip_prefix('.')?;
    match role {
        "getter" => Some("getter"),
        "setter" => Some("setter"),
        "deleter" => Some("deleter"),
        _ => None,
    }
}

fn is_overload(record: &EntityRecord) -> bool {
    record.has_modifier("overload") || record.has_modifier("typing.overload")
}

fn is_accessor(record: &EntityRecord) -> bool {
    ["property", "getter", "setter", "deleter"]
        .iter()
        .any(|m| record.has_modifier(m))
}

/// Overload stubs and their implementation, or the accessors of one
/// property, describe a single entity.
fn same_entity(a: &EntityRecord, b: &EntityRecord) -> bool {
    is_overload(a) || is_overload(b) || (is_accessor(a) && is_accessor(b))
}
