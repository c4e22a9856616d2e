//! Name-pattern summaries and tag derivation.
//!
//! Always produces a non-empty one-liner, so it terminates every chain.

use super::{SummaryProvider, SummaryRequest};
use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::types::{EntityKind, Summary, SummarySource};
use regex::Regex;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]+[a-z0-9]*|[a-z0-9]+").expect("valid word regex"));

pub struct HeuristicProvider {
    confidence: f32,
}

impl HeuristicProvider {
    pub fn from_config(config: &SummaryConfig) -> Self {
        Self {
            confidence: config.heuristic_confidence,
        }
    }
}

impl Default for HeuristicProvider {
    fn default() -> Self {
        Self::from_config(&SummaryConfig::default())
    }
}

impl SummaryProvider for HeuristicProvider {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<Option<Summary>, SummaryError> {
        Ok(Some(Summary {
            text: describe(request),
            source: SummarySource::Heuristic,
            confidence: self.confidence,
            tags: Vec::new(),
            truncated: false,
        }))
    }
}

/// Split an identifier into lowercase words (`getUserName` → get, user, name).
pub fn split_words(name: &str) -> Vec<String> {
    WORD_RE
        .find_iter(name)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn is_generator(request: &SummaryRequest<'_>) -> bool {
    request.has_modifier("generator")
}

fn describe(request: &SummaryRequest<'_>) -> String {
    let name = request.name;
    let words = split_words(name);

    let mut text = match request.kind {
        EntityKind::Module => {
            if words.is_empty() {
                format!("Module `{name}`.")
            } else {
                format!("Module for {}.", words.join(" "))
            }
        }
        EntityKind::Class => describe_class(name, &words),
        EntityKind::Function | EntityKind::Method => describe_callable(request, &words),
    };

    if request.has_modifier("async") {
        text = format!("Asynchronously {}", lowercase_first(&text));
    }
    if is_generator(request) {
        text.push_str(" Yields results lazily.");
    }
    if name.starts_with('_') && !is_dunder(name) {
        text.push_str(" Internal helper.");
    }
    text
}

fn describe_class(name: &str, words: &[String]) -> String {
    let Some(last) = words.last() else {
        return format!("Class `{name}`.");
    };
    let subject = words.join(" ");
    match last.as_str() {
        "error" | "exception" => {
            let rest = &words[..words.len() - 1];
            if rest.is_empty() {
                "Error type.".to_string()
            } else {
                format!("Error raised for {} failures.", rest.join(" "))
            }
        }
        "test" | "tests" if words.len() > 1 => {
            format!("Test suite for {}.", words[..words.len() - 1].join(" "))
        }
        _ if words[0] == "test" && words.len() > 1 => {
            format!("Test suite for {}.", words[1..].join(" "))
        }
        _ => format!("Class representing {subject}."),
    }
}

fn describe_callable(request: &SummaryRequest<'_>, words: &[String]) -> String {
    let name = request.name;

    if is_dunder(name) {
        return match name {
            "__init__" => match request.class_name {
                Some(class) => format!("Initialize a new `{class}` instance."),
                None => "Initialize a new instance.".to_string(),
            },
            _ => format!("Special method `{name}`."),
        };
    }

    let Some((verb, rest)) = words.split_first() else {
        return format!("Function `{name}`.");
    };
    let object = rest.join(" ");
    let or_value = |fallback: &str| {
        if object.is_empty() {
            fallback.to_string()
        } else {
            object.clone()
        }
    };

    match verb.as_str() {
        "get" | "fetch" | "load" | "read" | "find" => {
            format!("{} {}.", capitalize(verb), or_value("value"))
        }
        "set" | "update" | "write" | "save" | "store" => {
            format!("{} {}.", capitalize(verb), or_value("value"))
        }
        "is" | "has" | "can" | "should" => {
            format!("Check whether {} {}.", verb_subject(request), or_value("true"))
                .replace("  ", " ")
        }
        "to" | "as" | "into" => format!("Convert to {}.", or_value("another form")),
        "new" | "create" | "make" | "build" => match request.class_name {
            Some(class) if object.is_empty() => format!("Create a new `{class}`."),
            _ => format!("Create {}.", or_value("a new instance")),
        },
        "test" => format!("Test {}.", or_value("behaviour")),
        "on" | "handle" => format!("Handle {}.", or_value("an event")),
        "calc" | "calculate" | "compute" => format!("Compute {}.", or_value("a result")),
        "delete" | "remove" | "drop" => format!("{} {}.", capitalize(verb), or_value("an item")),
        "validate" | "check" | "verify" => format!("Validate {}.", or_value("input")),
        "main" if rest.is_empty() => "Program entry point.".to_string(),
        _ if object.is_empty() => format!("{}.", capitalize(verb)),
        _ => format!("{} {}.", capitalize(verb), object),
    }
}

fn verb_subject(request: &SummaryRequest<'_>) -> &'static str {
    if request.kind == EntityKind::Method {
        "the instance is"
    } else {
        "it is"
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Classification tags derived from the name and scanner modifiers.
pub fn derive_tags(request: &SummaryRequest<'_>) -> Vec<String> {
    let name = request.name;
    let mut tags: Vec<&str> = Vec::new();

    let explicit_private = request.has_modifier("private");
    let explicit_public =
        request.has_modifier("pub") || request.has_modifier("public") || request.has_modifier("export");
    if is_dunder(name) {
        tags.push("magic");
        tags.push("public");
    } else if explicit_private || (name.starts_with('_') && !explicit_public) {
        tags.push("private");
    } else {
        tags.push("public");
    }

    if request.has_modifier("async") {
        tags.push("async");
    }
    if request.has_modifier("static") || request.has_modifier("staticmethod") {
        tags.push("static");
    }
    if request.has_modifier("classmethod") {
        tags.push("classmethod");
    }
    if request.has_modifier("property") {
        tags.push("property");
    }
    if is_generator(request) {
        tags.push("generator");
    }

    let words = split_words(name);
    let first = words.first().map(|w| w.as_str());
    if request.has_modifier("test") || first == Some("test") {
        tags.push("test");
    }
    if matches!(request.kind, EntityKind::Function | EntityKind::Method) {
        match first {
            Some("get") => tags.push("getter"),
            Some("set") => tags.push("setter"),
            Some("is" | "has" | "can" | "should") => tags.push("predicate"),
            _ => {}
        }
        if name == "__init__" || (request.kind == EntityKind::Method && name == "new") {
            tags.push("constructor");
        }
    }

    let mut tags: Vec<String> = tags.into_iter().map(str::to_string).collect();
    tags.sort();
    tags.dedup();
    tags
}
