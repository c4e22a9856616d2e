//! TypeScript / TSX scanner using tree-sitter.

use super::{
    Scanner, field_text, finish_calls, last_ident, merge_same_name, module_record, node_text, parse_source,
    record_for,
};
use crate::error::ScanError;
use crate::types::{EntityKind, EntityRecord, ScanOutput};
use std::collections::HashSet;
use tree_sitter::{Language, Node};

/// TypeScript source scanner.
pub struct TypeScriptScanner {
    language: Language,
    name: &'static str,
    extensions: &'static [&'static str],
}

impl TypeScriptScanner {
    pub fn new_typescript() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            name: "typescript",
            extensions: &["ts", "mts", "cts"],
        }
    }

    pub fn new_tsx() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TSX.into(),
            name: "tsx",
            extensions: &["tsx"],
        }
    }
}

impl Scanner for TypeScriptScanner {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extensions(&self) -> &[&str] {
        self.extensions
    }

    fn scan(&self, path: &str, source: &str) -> Result<ScanOutput, ScanError> {
        let tree = parse_source(&self.language, path, source)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let mut module = module_record(path, source);
        module.docstring = file_doc_comment(bytes, root);

        let mut entities = Vec::new();
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            if statement.kind() == "import_statement" {
                if let Some(source) = field_text(bytes, statement, "source") {
                    module.dependencies.push(strip_quotes(source));
                }
                continue;
            }
            top_level(bytes, path, statement, &mut entities);
        }

        Ok(ScanOutput { module, entities })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn string_literal_value(bytes: &[u8], node: Node) -> Option<String> {
    let text = node_text(bytes, node);
    let quoted = ['"', '\'', '`']
        .iter()
        .any(|q| text.len() >= 2 && text.starts_with(*q) && text.ends_with(*q));
    quoted.then(|| strip_quotes(text))
}

fn extract_callee_name(bytes: &[u8], node: Node) -> Option<String> {
    match node.kind() {
        "identifier" | "property_identifier" | "private_property_identifier" => {
            Some(node_text(bytes, node).to_string())
        }
        "member_expression" => node
            .child_by_field_name("property")
            .map(|p| node_text(bytes, p).to_string())
            .or_else(|| last_ident(node_text(bytes, node))),
        "subscript_expression" => node
            .child_by_field_name("index")
            .and_then(|index| string_literal_value(bytes, index))
            .or_else(|| last_ident(node_text(bytes, node))),
        _ => last_ident(node_text(bytes, node)),
    }
}

/// `/** ... */` directly above `node`, reduced to its text.
fn jsdoc_before(bytes: &[u8], node: Node) -> Option<String> {
    let comment = node.prev_named_sibling().filter(|s| s.kind() == "comment")?;
    let text = node_text(bytes, comment);
    // Must be adjacent, not separated by a blank line.
    if node.start_position().row > comment.end_position().row + 1 {
        return None;
    }
    clean_jsdoc(text)
}

/// A leading JSDoc block that is followed by a blank line documents the file.
fn file_doc_comment(bytes: &[u8], root: Node) -> Option<String> {
    let first = root.named_child(0).filter(|n| n.kind() == "comment")?;
    let next_row = first
        .next_named_sibling()
        .map(|n| n.start_position().row)
        .unwrap_or(usize::MAX);
    if next_row <= first.end_position().row + 1 {
        return None;
    }
    clean_jsdoc(node_text(bytes, first))
}

fn clean_jsdoc(text: &str) -> Option<String> {
    let inner = text.strip_prefix("/**")?.strip_suffix("*/")?;
    let lines: Vec<&str> = inner
        .lines()
        .map(|l| {
            let l = l.trim();
            l.strip_prefix('*').map(str::trim_start).unwrap_or(l)
        })
        .collect();
    let doc = lines.join("\n");
    let doc = doc.trim();
    (!doc.is_empty()).then(|| doc.to_string())
}

fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == kind)
}

/// Callees under `node`, not descending into nested declarations.
fn collect_calls(bytes: &[u8], node: Node, out: &mut Vec<String>) {
    if node.kind() == "call_expression" {
        if let Some(callee) = node
            .child_by_field_name("function")
            .and_then(|f| extract_callee_name(bytes, f))
        {
            out.push(callee);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "function_declaration" | "generator_function_declaration" | "class_declaration"
        ) {
            continue;
        }
        collect_calls(bytes, child, out);
    }
}

fn calls_of(bytes: &[u8], node: Node) -> Vec<String> {
    let mut calls = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        collect_calls(bytes, body, &mut calls);
    }
    finish_calls(calls)
}

// ============================================================================
// Declarations
// ============================================================================

fn top_level(bytes: &[u8], path: &str, statement: Node, entities: &mut Vec<EntityRecord>) {
    let (declaration, mut modifiers) = if statement.kind() == "export_statement" {
        let declaration = statement.child_by_field_name("declaration").or_else(|| {
            let mut cursor = statement.walk();
            statement
                .named_children(&mut cursor)
                .find(|n| n.kind().ends_with("declaration"))
        });
        let Some(declaration) = declaration else {
            return;
        };
        let mut modifiers = vec!["export".to_string()];
        if has_child_kind(statement, "default") {
            modifiers.push("default".to_string());
        }
        (declaration, modifiers)
    } else {
        (statement, Vec::new())
    };
    let doc = jsdoc_before(bytes, statement);

    match declaration.kind() {
        "function_declaration" | "generator_function_declaration" => {
            let Some(name) = field_text(bytes, declaration, "name") else {
                return;
            };
            if has_child_kind(declaration, "async") {
                modifiers.push("async".to_string());
            }
            if declaration.kind() == "generator_function_declaration" {
                modifiers.push("generator".to_string());
            }
            let mut record = record_for(EntityKind::Function, name, path, bytes, statement)
                .with_calls(calls_of(bytes, declaration))
                .with_modifiers(modifiers);
            record.docstring = doc;
            entities.push(record);
        }
        "class_declaration" | "abstract_class_declaration" | "interface_declaration" => {
            let Some(name) = field_text(bytes, declaration, "name") else {
                return;
            };
            match declaration.kind() {
                "abstract_class_declaration" => modifiers.push("abstract".to_string()),
                "interface_declaration" => modifiers.push("interface".to_string()),
                _ => {}
            }
            let mut record = record_for(EntityKind::Class, name, path, bytes, statement).with_modifiers(modifiers);
            record.docstring = doc;
            if let Some(body) = declaration.child_by_field_name("body") {
                let mut members = Vec::new();
                let mut cursor = body.walk();
                for member in body.named_children(&mut cursor) {
                    if let Some(method) = method(bytes, path, member) {
                        members.push((method, member.kind() != "method_definition"));
                    }
                }
                record.methods = class_members(members);
            }
            entities.push(record);
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = declaration.walk();
            for declarator in declaration.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let (Some(name), Some(value)) = (
                    field_text(bytes, declarator, "name"),
                    declarator.child_by_field_name("value"),
                ) else {
                    continue;
                };
                if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
                    continue;
                }
                let mut modifiers = modifiers.clone();
                if has_child_kind(value, "async") {
                    modifiers.push("async".to_string());
                }
                let mut record = record_for(EntityKind::Function, name, path, bytes, statement)
                    .with_calls(calls_of(bytes, value))
                    .with_modifiers(modifiers);
                record.docstring = doc.clone();
                entities.push(record);
            }
        }
        _ => {}
    }
}

fn method(bytes: &[u8], path: &str, member: Node) -> Option<EntityRecord> {
    if !matches!(member.kind(), "method_definition" | "method_signature" | "abstract_method_signature") {
        return None;
    }
    let name_node = member.child_by_field_name("name")?;
    let name = node_text(bytes, name_node);
    if name.is_empty() {
        return None;
    }

    let mut modifiers = Vec::new();
    let mut cursor = member.walk();
    for child in member.children(&mut cursor) {
        match child.kind() {
            "static" => modifiers.push("static".to_string()),
            "async" => modifiers.push("async".to_string()),
            "get" => modifiers.push("property".to_string()),
            "set" => modifiers.extend(["property".to_string(), "setter".to_string()]),
            "*" => modifiers.push("generator".to_string()),
            "accessibility_modifier" => {
                let access = node_text(bytes, child).trim();
                modifiers.push(if access == "protected" { "private" } else { access }.to_string());
            }
            _ => {}
        }
    }
    if name_node.kind() == "private_property_identifier" {
        modifiers.push("private".to_string());
    }

    let mut record = record_for(EntityKind::Method, name, path, bytes, member)
        .with_calls(calls_of(bytes, member))
        .with_modifiers(modifiers);
    record.docstring = jsdoc_before(bytes, member);
    Some(record)
}

/// Collapse a class body to one record per member.
///
/// Overload signatures are dropped when the class implements the member;
/// signature-only overloads fold together, as do `get`/`set` pairs.
fn class_members(members: Vec<(EntityRecord, bool)>) -> Vec<EntityRecord> {
    let implemented: HashSet<String> = members
        .iter()
        .filter(|(_, signature)| !signature)
        .map(|(m, _)| m.name.clone())
        .collect();
    let kept: Vec<EntityRecord> = members
        .into_iter()
        .filter_map(|(mut member, signature)| {
            if signature {
                if implemented.contains(&member.name) {
                    return None;
                }
                member.modifiers.push("signature".to_string());
            }
            Some(member)
        })
        .collect();
    merge_same_name(kept, |a, b| {
        let both = |m: &str| a.has_modifier(m) && b.has_modifier(m);
        both("signature") || both("property")
    })
}
