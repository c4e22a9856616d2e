//! Docstring-based summaries.

use super::{SummaryProvider, SummaryRequest, truncate_chars};
use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::types::{Summary, SummarySource};

/// Uses the entity's own documentation verbatim.
pub struct DocstringProvider {
    confidence: f32,
    max_chars: usize,
}

impl DocstringProvider {
    pub fn from_config(config: &SummaryConfig) -> Self {
        Self {
            confidence: config.docstring_confidence,
            max_chars: config.max_chars,
        }
    }
}

impl Default for DocstringProvider {
    fn default() -> Self {
        Self::from_config(&SummaryConfig::default())
    }
}

impl SummaryProvider for DocstringProvider {
    fn name(&self) -> &'static str {
        "docstring"
    }

    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<Option<Summary>, SummaryError> {
        let Some(doc) = request.docstring else {
            return Ok(None);
        };
        let doc = doc.trim();
        if doc.is_empty() {
            return Ok(None);
        }

        let (text, truncated) = truncate_chars(doc, self.max_chars);
        Ok(Some(Summary {
            text,
            source: SummarySource::Docstring,
            confidence: self.confidence,
            tags: Vec::new(),
            truncated,
        }))
    }
}
