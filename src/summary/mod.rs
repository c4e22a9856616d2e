//! Summary generation through an ordered provider chain.
//!
//! Providers are tried in order and the first non-empty summary wins. The
//! offline chain is docstring → heuristic; enabling the remote provider
//! inserts it between the two so the heuristic stays the terminal fallback.

pub mod docstring;
pub mod heuristic;
#[cfg(feature = "llm")]
pub mod llm;

use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::types::{EntityKind, Summary};

pub use docstring::DocstringProvider;
pub use heuristic::{HeuristicProvider, derive_tags};
#[cfg(feature = "llm")]
pub use llm::LlmProvider;

/// Everything a provider may look at.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub kind: EntityKind,
    pub name: &'a str,
    pub code: Option<&'a str>,
    pub docstring: Option<&'a str>,
    pub modifiers: &'a [String],
    pub class_name: Option<&'a str>,
}

impl<'a> SummaryRequest<'a> {
    pub fn new(kind: EntityKind, name: &'a str) -> Self {
        Self {
            kind,
            name,
            code: None,
            docstring: None,
            modifiers: &[],
            class_name: None,
        }
    }

    pub fn with_docstring(mut self, docstring: Option<&'a str>) -> Self {
        self.docstring = docstring;
        self
    }

    pub fn with_code(mut self, code: Option<&'a str>) -> Self {
        self.code = code;
        self
    }

    pub fn with_modifiers(mut self, modifiers: &'a [String]) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_class(mut self, class_name: Option<&'a str>) -> Self {
        self.class_name = class_name;
        self
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// One strategy for producing a summary.
///
/// `Ok(None)` means "nothing to say"; `Err` means the provider failed. Both
/// move the chain on to the next provider.
pub trait SummaryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<Option<Summary>, SummaryError>;
}

/// Runs the provider chain.
pub struct SummaryEngine {
    providers: Vec<Box<dyn SummaryProvider>>,
    enabled: bool,
}

impl SummaryEngine {
    /// Build the chain described by the configuration.
    pub fn from_config(config: &SummaryConfig) -> Self {
        let mut providers: Vec<Box<dyn SummaryProvider>> =
            vec![Box::new(DocstringProvider::from_config(config))];

        if config.llm.enabled {
            #[cfg(feature = "llm")]
            {
                match LlmProvider::from_config(config) {
                    Ok(provider) => providers.push(Box::new(provider)),
                    Err(e) => tracing::warn!("LLM summaries disabled: {}", e),
                }
            }
            #[cfg(not(feature = "llm"))]
            {
                tracing::warn!("LLM summaries requested but the `llm` feature is not compiled in");
            }
        }

        providers.push(Box::new(HeuristicProvider::from_config(config)));

        Self {
            providers,
            enabled: config.enabled,
        }
    }

    /// Offline default chain.
    pub fn offline() -> Self {
        Self::from_config(&SummaryConfig::default())
    }

    /// Explicit chain, tried in the given order.
    pub fn with_providers(providers: Vec<Box<dyn SummaryProvider>>) -> Self {
        Self {
            providers,
            enabled: true,
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Produce a summary; never fails. Falls back to an empty summary only
    /// when summaries are disabled or every provider came up empty.
    pub fn summarize(&self, request: &SummaryRequest<'_>) -> Summary {
        if !self.enabled {
            return Summary::empty();
        }

        for provider in &self.providers {
            match provider.summarize(request) {
                Ok(Some(mut summary)) if !summary.is_empty() => {
                    summary.confidence = summary.confidence.clamp(0.0, 1.0);
                    summary.tags = derive_tags(request);
                    return summary;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        "summary provider {} failed for {}: {}",
                        provider.name(),
                        request.name,
                        e
                    );
                }
            }
        }

        let mut summary = Summary::empty();
        summary.tags = derive_tags(request);
        summary
    }
}

impl Default for SummaryEngine {
    fn default() -> Self {
        Self::offline()
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    (out, true)
}
