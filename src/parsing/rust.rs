//! Rust scanner using tree-sitter.
//!
//! Structs, enums, unions and traits become classes. Methods from `impl`
//! blocks are attached to the type they implement; trait impl methods are
//! qualified by the trait so `impl Display` and `impl Debug` do not collide.

use super::{
    Scanner, field_text, finish_calls, merge_same_name, module_record, node_text, parse_source, record_for,
};
use crate::error::ScanError;
use crate::types::{EntityKind, EntityRecord, ScanOutput};
use std::collections::HashMap;
use tree_sitter::{Language, Node};

/// Rust source scanner.
pub struct RustScanner {
    language: Language,
}

impl RustScanner {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_rust::LANGUAGE.into(),
        }
    }
}

impl Default for RustScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for RustScanner {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn scan(&self, path: &str, source: &str) -> Result<ScanOutput, ScanError> {
        let tree = parse_source(&self.language, path, source)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let mut walk = RustWalk::new(bytes, path);
        walk.items(root, &[]);

        let mut module = module_record(path, source);
        module.docstring = inner_doc_comments(bytes, root);
        module.dependencies = std::mem::take(&mut walk.dependencies);

        Ok(ScanOutput {
            module,
            entities: walk.finish(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Extract the last identifier from a node's text.
fn last_ident_of(bytes: &[u8], node: Node) -> Option<String> {
    super::last_ident(node_text(bytes, node))
}

/// Extract the type identifier for an impl item (`Foo` from `Foo<T>`).
fn impl_type_ident(bytes: &[u8], impl_node: Node) -> Option<String> {
    let ty = impl_node.child_by_field_name("type")?;
    let text = node_text(bytes, ty);
    let base = text.split('<').next().unwrap_or(text);
    super::last_ident(base)
}

/// Trait name of a trait impl with whitespace removed.
fn impl_trait_name(bytes: &[u8], impl_node: Node) -> Option<String> {
    let text = field_text(bytes, impl_node, "trait")?;
    Some(text.chars().filter(|c| !c.is_whitespace()).collect())
}

/// Text of the outer attributes directly above an item, comments skipped.
fn outer_attributes<'b>(bytes: &'b [u8], node: Node) -> Vec<&'b str> {
    let mut attributes = Vec::new();
    let mut cur = node.prev_sibling();
    while let Some(sib) = cur {
        match sib.kind() {
            "attribute_item" => attributes.push(node_text(bytes, sib)),
            "line_comment" | "block_comment" => {}
            _ => break,
        }
        cur = sib.prev_sibling();
    }
    attributes
}

/// Check if a function has #[test] or #[tokio::test] attribute.
fn has_test_attr(bytes: &[u8], fn_node: Node) -> bool {
    outer_attributes(bytes, fn_node)
        .iter()
        .any(|text| text.contains("#[test") || text.contains("#[tokio::test"))
}

/// `#[cfg(...)]` on the item itself. `cfg_attr` does not gate.
fn has_cfg_attr(bytes: &[u8], node: Node) -> bool {
    outer_attributes(bytes, node).iter().any(|text| {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        compact.starts_with("#[cfg(")
    })
}

/// Twins selected by `#[cfg]` describe one entity.
fn cfg_twins(a: &EntityRecord, b: &EntityRecord) -> bool {
    a.has_modifier("cfg") || b.has_modifier("cfg")
}

/// Outer doc comments (`///`) directly above an item, attributes skipped.
fn extract_doc_comments(bytes: &[u8], node: Node) -> Option<String> {
    let mut doc_lines = Vec::new();
    let mut cur = node.prev_sibling();

    while let Some(sib) = cur {
        match sib.kind() {
            "line_comment" => {
                let text = node_text(bytes, sib);
                match text.strip_prefix("///") {
                    Some(rest) if !rest.starts_with('/') => doc_lines.push(strip_doc_marker(rest)),
                    _ => break,
                }
            }
            "attribute_item" => {}
            _ => break,
        }
        cur = sib.prev_sibling();
    }

    doc_lines.reverse();
    join_doc(doc_lines)
}

/// Inner doc comments (`//!`) at the top of a file.
fn inner_doc_comments(bytes: &[u8], root: Node) -> Option<String> {
    let mut doc_lines = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "line_comment" {
            break;
        }
        if let Some(rest) = node_text(bytes, child).strip_prefix("//!") {
            doc_lines.push(strip_doc_marker(rest));
        }
    }
    join_doc(doc_lines)
}

fn strip_doc_marker(rest: &str) -> String {
    let rest = rest.trim_end();
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

fn join_doc(lines: Vec<String>) -> Option<String> {
    let text = lines.join("\n");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// `pub`/`private`, `async`, `const`, `unsafe`, `static` (no receiver), `test`.
fn fn_modifiers(bytes: &[u8], fn_node: Node, in_impl: bool) -> Vec<String> {
    let mut modifiers = Vec::new();
    let mut has_visibility = false;
    let mut cursor = fn_node.walk();
    for child in fn_node.children(&mut cursor) {
        match child.kind() {
            "visibility_modifier" => has_visibility = true,
            "function_modifiers" => {
                let text = node_text(bytes, child);
                for word in ["async", "const", "unsafe"] {
                    if text.split_whitespace().any(|w| w == word) {
                        modifiers.push(word.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    modifiers.insert(0, if has_visibility { "pub" } else { "private" }.to_string());

    if in_impl {
        let has_receiver = fn_node
            .child_by_field_name("parameters")
            .map(|params| {
                let mut cursor = params.walk();
                params.children(&mut cursor).any(|p| p.kind() == "self_parameter")
            })
            .unwrap_or(false);
        if !has_receiver {
            modifiers.push("static".to_string());
        }
    }
    if has_test_attr(bytes, fn_node) {
        modifiers.push("test".to_string());
    }
    modifiers
}

fn type_modifiers(node: Node, gated: bool) -> Vec<String> {
    let mut cursor = node.walk();
    let public = node
        .children(&mut cursor)
        .any(|c| c.kind() == "visibility_modifier");
    let mut modifiers = vec![if public { "pub" } else { "private" }.to_string()];
    if gated {
        modifiers.push("cfg".to_string());
    }
    modifiers
}

/// Callee names of every call expression under `node`. Macros are ignored.
fn collect_calls(bytes: &[u8], node: Node, out: &mut Vec<String>) {
    if node.kind() == "call_expression" {
        if let Some(function) = node.child_by_field_name("function") {
            let target = if function.kind() == "generic_function" {
                function.child_by_field_name("function").unwrap_or(function)
            } else {
                function
            };
            if let Some(name) = last_ident_of(bytes, target) {
                out.push(name);
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(bytes, child, out);
    }
}

fn qualify(prefix: &[String], name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix.join("."), name)
    }
}

// ============================================================================
// Item Walker
// ============================================================================

struct PendingImpl {
    methods: Vec<EntityRecord>,
    source: String,
    start: usize,
    end: usize,
}

struct RustWalk<'a> {
    bytes: &'a [u8],
    path: &'a str,
    functions: Vec<EntityRecord>,
    classes: Vec<EntityRecord>,
    class_index: HashMap<String, usize>,
    impls: Vec<(String, PendingImpl)>,
    dependencies: Vec<String>,
    /// Depth of enclosing `#[cfg]`-gated modules or impl blocks.
    gated: usize,
}

impl<'a> RustWalk<'a> {
    fn new(bytes: &'a [u8], path: &'a str) -> Self {
        Self {
            bytes,
            path,
            functions: Vec::new(),
            classes: Vec::new(),
            class_index: HashMap::new(),
            impls: Vec::new(),
            dependencies: Vec::new(),
            gated: 0,
        }
    }

    fn is_gated(&self, node: Node) -> bool {
        self.gated > 0 || has_cfg_attr(self.bytes, node)
    }

    /// Run `f` with items counted as conditionally compiled when `node` is.
    fn within<R>(&mut self, node: Node, f: impl FnOnce(&mut Self) -> R) -> R {
        let gated = has_cfg_attr(self.bytes, node);
        if gated {
            self.gated += 1;
        }
        let out = f(self);
        if gated {
            self.gated -= 1;
        }
        out
    }

    /// Walk the items of a source file or inline module body.
    fn items(&mut self, container: Node, prefix: &[String]) {
        let mut cursor = container.walk();
        for node in container.named_children(&mut cursor) {
            match node.kind() {
                "function_item" => {
                    if let Some(record) = self.function(node, prefix, EntityKind::Function, false) {
                        self.functions.push(record);
                    }
                }
                "struct_item" | "enum_item" | "union_item" => self.type_item(node, prefix),
                "trait_item" => self.trait_item(node, prefix),
                "impl_item" => self.impl_item(node, prefix),
                "mod_item" => {
                    if let (Some(body), Some(name)) = (
                        node.child_by_field_name("body"),
                        node.child_by_field_name("name").and_then(|n| last_ident_of(self.bytes, n)),
                    ) {
                        let mut inner = prefix.to_vec();
                        inner.push(name);
                        self.within(node, |walk| walk.items(body, &inner));
                    }
                }
                "use_declaration" => {
                    if let Some(argument) = field_text(self.bytes, node, "argument") {
                        self.dependencies.push(argument.split_whitespace().collect());
                    }
                }
                _ => {}
            }
        }
    }

    fn function(&self, node: Node, prefix: &[String], kind: EntityKind, in_impl: bool) -> Option<EntityRecord> {
        let name = node
            .child_by_field_name("name")
            .and_then(|n| last_ident_of(self.bytes, n))?;
        let name = if kind == EntityKind::Function {
            qualify(prefix, &name)
        } else {
            name
        };

        let mut calls = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            collect_calls(self.bytes, body, &mut calls);
        }

        let mut modifiers = fn_modifiers(self.bytes, node, in_impl);
        if self.is_gated(node) {
            modifiers.push("cfg".to_string());
        }
        let mut record = record_for(kind, name, self.path, self.bytes, node)
            .with_calls(finish_calls(calls))
            .with_modifiers(modifiers);
        record.docstring = extract_doc_comments(self.bytes, node);
        Some(record)
    }

    fn push_class(&mut self, record: EntityRecord) {
        self.class_index.insert(record.name.clone(), self.classes.len());
        self.classes.push(record);
    }

    fn type_item(&mut self, node: Node, prefix: &[String]) {
        let Some(name) = node
            .child_by_field_name("name")
            .and_then(|n| last_ident_of(self.bytes, n))
        else {
            return;
        };
        let mut record = record_for(EntityKind::Class, qualify(prefix, &name), self.path, self.bytes, node)
            .with_modifiers(type_modifiers(node, self.is_gated(node)));
        record.docstring = extract_doc_comments(self.bytes, node);
        self.push_class(record);
    }

    fn trait_item(&mut self, node: Node, prefix: &[String]) {
        let Some(name) = node
            .child_by_field_name("name")
            .and_then(|n| last_ident_of(self.bytes, n))
        else {
            return;
        };
        let mut modifiers = type_modifiers(node, self.is_gated(node));
        modifiers.push("trait".to_string());
        let mut record = record_for(EntityKind::Class, qualify(prefix, &name), self.path, self.bytes, node)
            .with_modifiers(modifiers);
        record.docstring = extract_doc_comments(self.bytes, node);

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for item in body.named_children(&mut cursor) {
                if matches!(item.kind(), "function_item" | "function_signature_item") {
                    if let Some(method) = self.function(item, prefix, EntityKind::Method, true) {
                        record.methods.push(method);
                    }
                }
            }
        }
        self.push_class(record);
    }

    fn impl_item(&mut self, node: Node, prefix: &[String]) {
        let Some(type_name) = impl_type_ident(self.bytes, node) else {
            return;
        };
        let trait_name = impl_trait_name(self.bytes, node);

        let methods = self.within(node, |walk| walk.impl_methods(node, prefix, trait_name.as_deref()));

        let range = super::line_range(node);
        self.impls.push((
            qualify(prefix, &type_name),
            PendingImpl {
                methods,
                source: node_text(self.bytes, node).to_string(),
                start: range.start,
                end: range.end,
            },
        ));
    }

    fn impl_methods(&self, node: Node, prefix: &[String], trait_name: Option<&str>) -> Vec<EntityRecord> {
        let mut methods = Vec::new();
        let Some(body) = node.child_by_field_name("body") else {
            return methods;
        };
        let mut cursor = body.walk();
        for item in body.named_children(&mut cursor) {
            if item.kind() != "function_item" {
                continue;
            }
            if let Some(mut method) = self.function(item, prefix, EntityKind::Method, true) {
                if let Some(trait_name) = trait_name {
                    method.name = format!("{trait_name}.{}", method.name);
                    method.modifiers.retain(|m| m != "private");
                    method.modifiers.insert(0, "pub".to_string());
                }
                methods.push(method);
            }
        }
        methods
    }

    /// Attach impl methods to their types. Types defined elsewhere get a
    /// synthesized class spanning their first impl block in this file.
    fn finish(mut self) -> Vec<EntityRecord> {
        for (type_name, pending) in std::mem::take(&mut self.impls) {
            match self.class_index.get(&type_name) {
                Some(&idx) => self.classes[idx].methods.extend(pending.methods),
                None => {
                    let mut record = EntityRecord::new(EntityKind::Class, type_name, self.path)
                        .with_lines(pending.start, pending.end)
                        .with_source(pending.source)
                        .with_modifiers(["impl"]);
                    record.methods = pending.methods;
                    self.push_class(record);
                }
            }
        }

        let mut entities = merge_same_name(self.functions, cfg_twins);
        let mut classes = merge_same_name(self.classes, cfg_twins);
        for class in &mut classes {
            class.methods = merge_same_name(std::mem::take(&mut class.methods), cfg_twins);
        }
        entities.extend(classes);
        entities
    }
}
