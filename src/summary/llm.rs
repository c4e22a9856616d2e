//! Remote LLM summaries over an Ollama-compatible `/api/generate` endpoint.
//!
//! Only constructed when `summary.llm.enabled` is set. Every request is
//! bounded by the configured timeout and any failure is reported as a
//! `SummaryError`, which moves the chain on to the heuristic provider.

use super::{SummaryProvider, SummaryRequest, truncate_chars};
use crate::config::SummaryConfig;
use crate::error::SummaryError;
use crate::types::{Summary, SummarySource};
use serde::Deserialize;
use std::time::Duration;

/// Longest code excerpt sent in a prompt.
const MAX_PROMPT_CODE_CHARS: usize = 4_000;

pub struct LlmProvider {
    endpoint: String,
    model: String,
    timeout: Duration,
    default_confidence: f32,
    /// Reported confidences stay strictly below docstring summaries.
    max_confidence: f32,
    max_chars: usize,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    confidence: Option<f32>,
}

impl LlmProvider {
    pub fn from_config(config: &SummaryConfig) -> Result<Self, SummaryError> {
        let timeout = config.llm.timeout();
        // Each request runs on its own short-lived runtime, so pooled
        // connections would outlive the runtime that owns them.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| SummaryError::Request(e.to_string()))?;

        Ok(Self {
            endpoint: config.llm.endpoint.trim_end_matches('/').to_string(),
            model: config.llm.model.clone(),
            timeout,
            default_confidence: config.llm_default_confidence,
            max_confidence: just_below(config.docstring_confidence),
            max_chars: config.max_chars,
            client,
        })
    }

    fn prompt(request: &SummaryRequest<'_>) -> String {
        let mut prompt = format!(
            "Summarize the {} `{}` in one short sentence. Reply with the sentence only.\n",
            request.kind, request.name
        );
        if let Some(class) = request.class_name {
            prompt.push_str(&format!("It belongs to class `{class}`.\n"));
        }
        if let Some(code) = request.code {
            let (code, _) = truncate_chars(code, MAX_PROMPT_CODE_CHARS);
            prompt.push_str("\n```\n");
            prompt.push_str(&code);
            prompt.push_str("\n```\n");
        }
        prompt
    }

    async fn generate(&self, prompt: String) -> Result<GenerateResponse, SummaryError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let send = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| SummaryError::Timeout(self.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    SummaryError::Timeout(self.timeout)
                } else {
                    SummaryError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(SummaryError::Request(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| SummaryError::BadResponse(e.to_string()))
    }

    /// Drive one request to completion from synchronous code.
    ///
    /// Runs on a scoped thread with its own current-thread runtime so it is
    /// safe whether or not the caller is inside a tokio runtime.
    fn generate_blocking(&self, prompt: String) -> Result<GenerateResponse, SummaryError> {
        std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| SummaryError::Request(e.to_string()))?;
                    runtime.block_on(self.generate(prompt))
                })
                .join()
                .unwrap_or_else(|_| Err(SummaryError::Request("request thread panicked".into())))
        })
    }
}

impl SummaryProvider for LlmProvider {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<Option<Summary>, SummaryError> {
        let reply = self.generate_blocking(Self::prompt(request))?;
        let text = reply.response.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let confidence = capped_confidence(reply.confidence, self.default_confidence, self.max_confidence);
        let (text, truncated) = truncate_chars(text, self.max_chars);

        Ok(Some(Summary {
            text,
            source: SummarySource::Llm,
            confidence,
            tags: Vec::new(),
            truncated,
        }))
    }
}

/// Largest `f32` below `limit`, or zero.
fn just_below(limit: f32) -> f32 {
    if limit > 0.0 && limit.is_finite() {
        f32::from_bits(limit.to_bits() - 1)
    } else {
        0.0
    }
}

/// Confidence for a reply: the reported value when usable, else `default`,
/// never above `ceiling`.
fn capped_confidence(reported: Option<f32>, default: f32, ceiling: f32) -> f32 {
    reported
        .filter(|c| c.is_finite())
        .unwrap_or(default)
        .clamp(0.0, 1.0)
        .min(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryEngine;
    use crate::types::EntityKind;

    fn unreachable_config() -> SummaryConfig {
        let mut config = SummaryConfig::default();
        config.llm.enabled = true;
        // Reserved port; connection is refused immediately.
        config.llm.endpoint = "http://127.0.0.1:9".to_string();
        config.llm.timeout_ms = 500;
        config
    }

    #[test]
    fn test_prompt_mentions_entity() {
        let request = SummaryRequest::new(EntityKind::Method, "save")
            .with_class(Some("User"))
            .with_code(Some("def save(self): pass"));
        let prompt = LlmProvider::prompt(&request);
        assert!(prompt.contains("method `save`"));
        assert!(prompt.contains("class `User`"));
        assert!(prompt.contains("def save(self): pass"));
    }

    #[test]
    fn test_unreachable_endpoint_is_an_error() {
        let provider = LlmProvider::from_config(&unreachable_config()).unwrap();
        let request = SummaryRequest::new(EntityKind::Function, "get_user");
        assert!(provider.summarize(&request).is_err());
    }

    #[test]
    fn test_engine_fails_open_to_heuristic() {
        let engine = SummaryEngine::from_config(&unreachable_config());
        let summary = engine.summarize(&SummaryRequest::new(EntityKind::Function, "get_user"));
        assert_eq!(summary.source, SummarySource::Heuristic);
    }

    /// Endpoint that accepts connections and never answers.
    fn silent_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                held.push(stream);
            }
        });
        format!("http://{addr}")
    }

    fn silent_config() -> SummaryConfig {
        let mut config = SummaryConfig::default();
        config.llm.enabled = true;
        config.llm.endpoint = silent_endpoint();
        config.llm.timeout_ms = 200;
        config
    }

    #[test]
    fn test_silent_endpoint_times_out() {
        let provider = LlmProvider::from_config(&silent_config()).unwrap();
        let request = SummaryRequest::new(EntityKind::Function, "get_user");

        let started = std::time::Instant::now();
        let err = provider.summarize(&request).unwrap_err();
        assert!(matches!(err, SummaryError::Timeout(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn test_engine_falls_back_after_timeout() {
        let engine = SummaryEngine::from_config(&silent_config());
        let started = std::time::Instant::now();
        let summary = engine.summarize(&SummaryRequest::new(EntityKind::Function, "get_user"));
        assert_eq!(summary.source, SummarySource::Heuristic);
        assert_eq!(summary.confidence, 0.3);
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn test_confidence_stays_below_docstring() {
        let ceiling = just_below(0.9);
        assert!(ceiling < 0.9);
        assert!(ceiling > 0.89);
        assert!(capped_confidence(Some(0.95), 0.5, ceiling) < 0.9);
        assert!(capped_confidence(Some(7.0), 0.5, ceiling) < 0.9);
        assert_eq!(capped_confidence(Some(0.4), 0.5, ceiling), 0.4);
        assert_eq!(capped_confidence(Some(-1.0), 0.5, ceiling), 0.0);
        assert_eq!(capped_confidence(Some(f32::NAN), 0.5, ceiling), 0.5);
        assert_eq!(capped_confidence(None, 0.5, ceiling), 0.5);
        assert_eq!(just_below(0.0), 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_safe_inside_runtime() {
        let engine = SummaryEngine::from_config(&unreachable_config());
        let summary = engine.summarize(&SummaryRequest::new(EntityKind::Function, "get_user"));
        assert_eq!(summary.source, SummarySource::Heuristic);
    }
}
