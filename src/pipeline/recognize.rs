//! Recognition boundary: turn a page image into a [`RawTable`].
//!
//! The core never depends on which vision provider answers — it sees only
//! the [`TableRecognizer`] capability trait. Any implementation satisfying
//! the contract is substitutable, and tests drive the whole pipeline with a
//! deterministic stub.
//!
//! The shipped implementation, [`VisionTableRecognizer`], sends the page
//! PNG with a strict JSON extraction prompt to an `edgequake-llm` provider
//! and parses the reply. Vision models occasionally wrap the JSON in
//! markdown fences despite the prompt saying not to; the parser strips
//! those before decoding.

use crate::prompts::EXTRACTION_PROMPT;
use crate::table::RawTable;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// What the recognizer found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// A calibration table (or a continuation fragment of one).
    Table(RecognizedTable),
    /// The page holds no qualifying table.
    NoTable,
}

/// A recognized table plus the checklist area banner, when one was legible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedTable {
    /// Area name from the `Line Clearance Checklist - <Area>` banner.
    pub area_name: Option<String>,
    pub table: RawTable,
}

/// Recognition failures. All variants are transient from the caller's view;
/// the orchestrator retries with backoff, honouring `retry_after_secs` for
/// rate limits when the provider reports one.
#[derive(Debug, Clone, Error)]
pub enum RecognizeError {
    /// Provider returned HTTP 429 — back off before retrying.
    #[error("provider rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The model replied, but not with the expected JSON object.
    #[error("malformed model reply: {detail}")]
    MalformedReply { detail: String },

    /// Transport or provider failure.
    #[error("{detail}")]
    Failed { detail: String },
}

/// Capability interface for visual table recognition.
#[async_trait]
pub trait TableRecognizer: Send + Sync {
    /// Recognize the calibration table on one rendered page.
    async fn recognize_page(
        &self,
        page_number: u32,
        image: &ImageData,
    ) -> Result<Recognition, RecognizeError>;
}

/// Table recognition via a vision LLM.
///
/// ## Message layout
///
/// 1. **System message** — the extraction prompt from [`crate::prompts`]
/// 2. **User message** — the page PNG as a base64 image attachment (empty
///    text; the image carries all the content, but the API requires a user
///    turn)
pub struct VisionTableRecognizer {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl VisionTableRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            prompt: EXTRACTION_PROMPT.to_string(),
            temperature: 0.1,
            max_tokens: 4096,
        }
    }

    /// Override the extraction prompt (single pages with unusual layouts).
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }
}

#[async_trait]
impl TableRecognizer for VisionTableRecognizer {
    async fn recognize_page(
        &self,
        page_number: u32,
        image: &ImageData,
    ) -> Result<Recognition, RecognizeError> {
        let messages = vec![
            ChatMessage::system(self.prompt.as_str()),
            ChatMessage::user_with_images("", vec![image.clone()]),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_provider_error(&format!("{e}")))?;

        debug!(
            "Page {}: {} input tokens, {} output tokens",
            page_number, response.prompt_tokens, response.completion_tokens
        );

        parse_model_reply(&response.content)
    }
}

/// Map a provider error message onto the retry taxonomy.
fn classify_provider_error(detail: &str) -> RecognizeError {
    let lower = detail.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate-limit") {
        RecognizeError::RateLimited {
            retry_after_secs: None,
        }
    } else {
        RecognizeError::Failed {
            detail: detail.to_string(),
        }
    }
}

/// Reply schema the prompt asks for.
#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default)]
    area_name: Option<String>,
    #[serde(default)]
    table_data: Vec<Vec<String>>,
}

static RE_JSON_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

/// Parse the model's JSON reply into a [`Recognition`].
///
/// An empty `table_data` means the page holds no qualifying table; a reply
/// that is not the expected JSON object is a malformed (retryable) reply.
pub fn parse_model_reply(content: &str) -> Result<Recognition, RecognizeError> {
    let trimmed = content.trim();
    let body = match RE_JSON_FENCES.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    };

    let reply: ModelReply =
        serde_json::from_str(&body).map_err(|e| RecognizeError::MalformedReply {
            detail: e.to_string(),
        })?;

    let mut cells = reply.table_data.into_iter();
    let Some(header) = cells.next() else {
        return Ok(Recognition::NoTable);
    };

    Ok(Recognition::Table(RecognizedTable {
        area_name: normalize_area_name(reply.area_name),
        table: RawTable {
            header,
            rows: cells.collect(),
        },
    }))
}

/// The model answers the generic label when no banner is on the page;
/// treat that, and blanks, as "no area".
fn normalize_area_name(area: Option<String>) -> Option<String> {
    let area = area?.trim().to_string();
    if area.is_empty() || area.eq_ignore_ascii_case("Equipment Calibration") {
        None
    } else {
        Some(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "area_name": "Dispensing Area",
        "table_data": [
            ["Equipment Name/ Instrument name","ID no.","Due date of Calibration"],
            ["CVC - Counter Filler","PG-286","25/05/24"]
        ]
    }"#;

    #[test]
    fn parses_plain_json_reply() {
        let Recognition::Table(t) = parse_model_reply(REPLY).unwrap() else {
            panic!("expected a table");
        };
        assert_eq!(t.area_name.as_deref(), Some("Dispensing Area"));
        assert_eq!(t.table.header.len(), 3);
        assert_eq!(t.table.rows.len(), 1);
        assert_eq!(t.table.rows[0][1], "PG-286");
    }

    #[test]
    fn strips_markdown_fences() {
        let fenced = format!("```json\n{REPLY}\n```");
        assert!(matches!(
            parse_model_reply(&fenced).unwrap(),
            Recognition::Table(_)
        ));
        let bare_fence = format!("```\n{REPLY}\n```");
        assert!(matches!(
            parse_model_reply(&bare_fence).unwrap(),
            Recognition::Table(_)
        ));
    }

    #[test]
    fn empty_table_data_is_no_table() {
        let reply = r#"{"area_name": null, "table_data": []}"#;
        assert_eq!(parse_model_reply(reply).unwrap(), Recognition::NoTable);
    }

    #[test]
    fn generic_area_label_is_dropped() {
        let reply = r#"{"area_name": "Equipment Calibration", "table_data": [["a","b","c"]]}"#;
        let Recognition::Table(t) = parse_model_reply(reply).unwrap() else {
            panic!("expected a table");
        };
        assert_eq!(t.area_name, None);
    }

    #[test]
    fn prose_reply_is_malformed() {
        let err = parse_model_reply("I could not find a table on this page.").unwrap_err();
        assert!(matches!(err, RecognizeError::MalformedReply { .. }));
    }

    #[test]
    fn rate_limit_classification() {
        assert!(matches!(
            classify_provider_error("HTTP 429 Too Many Requests"),
            RecognizeError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_provider_error("Rate limit exceeded, slow down"),
            RecognizeError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_provider_error("connection reset by peer"),
            RecognizeError::Failed { .. }
        ));
    }
}
