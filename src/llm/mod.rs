//! Ticket classification backends
//!
//! A [`Classifier`] takes a free-text ticket description and suggests a
//! category/priority pair. Implementations are stateless request/response
//! wrappers: no retries, no caching, no backoff. Every failure mode collapses
//! into [`ClassifyError`] so the HTTP layer can degrade to 503 without ever
//! blocking ticket creation.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::shared::enums::{TicketCategory, TicketPriority};

pub mod anthropic;

pub use anthropic::AnthropicClassifier;

/// Instruction prompt sent ahead of the ticket description. The model is
/// asked for a bare JSON object; [`clean_reply`] still strips fencing in case
/// it ignores that.
pub const CLASSIFICATION_PROMPT: &str = "You are a support ticket classification assistant. Your job is to analyze a support ticket description and suggest:
1. A category (one of: billing, technical, account, general)
2. A priority level (one of: low, medium, high, critical)

Category definitions:
- billing: Payment issues, invoices, refunds, pricing questions
- technical: Software bugs, errors, performance issues, integration problems
- account: Login issues, password resets, account settings, permissions
- general: Questions, feedback, feature requests, other inquiries

Priority definitions:
- low: Minor issues, questions, non-urgent requests
- medium: Standard issues affecting single user, workarounds available
- high: Significant issues affecting multiple users or business operations
- critical: System down, data loss, security issues, blocking all users

You must respond with ONLY a valid JSON object in this exact format:
{
  \"category\": \"one of: billing, technical, account, general\",
  \"priority\": \"one of: low, medium, high, critical\"
}

Do not include any explanation, markdown formatting, or additional text. Only return the JSON object.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub category: TicketCategory,
    pub priority: TicketPriority,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier is not configured")]
    Disabled,
    #[error("empty description")]
    EmptyInput,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned status {0}")]
    BadStatus(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("label outside the allowed set: {0}")]
    InvalidLabel(String),
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, description: &str) -> Result<Suggestion, ClassifyError>;
}

/// Stand-in used when no API key is configured. Keeps the handler free of
/// capability checks.
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(&self, _description: &str) -> Result<Suggestion, ClassifyError> {
        Err(ClassifyError::Disabled)
    }
}

/// Strip markdown code fences and a leading `json` tag from a model reply.
/// Models occasionally wrap the object despite being told not to.
pub(crate) fn clean_reply(raw: &str) -> String {
    let mut text = raw.trim();

    if text.starts_with("```") {
        let unfenced: Vec<&str> = text
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect();
        return clean_reply(&unfenced.join("\n"));
    }

    if text.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
        text = text[4..].trim_start();
    }

    text.to_string()
}

/// Parse a model reply into a validated [`Suggestion`]. Rejects anything that
/// is not a JSON object carrying both labels from the fixed enum sets.
pub(crate) fn parse_suggestion(raw: &str) -> Result<Suggestion, ClassifyError> {
    let cleaned = clean_reply(raw);

    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| ClassifyError::Malformed(format!("invalid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| ClassifyError::Malformed("reply is not a JSON object".to_string()))?;

    let category = object
        .get("category")
        .and_then(Value::as_str)
        .ok_or_else(|| ClassifyError::Malformed("missing category".to_string()))?;
    let priority = object
        .get("priority")
        .and_then(Value::as_str)
        .ok_or_else(|| ClassifyError::Malformed("missing priority".to_string()))?;

    let category = category
        .parse::<TicketCategory>()
        .map_err(ClassifyError::InvalidLabel)?;
    let priority = priority
        .parse::<TicketPriority>()
        .map_err(ClassifyError::InvalidLabel)?;

    Ok(Suggestion { category, priority })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_reply_passes_bare_json_through() {
        let raw = r#"{"category": "billing", "priority": "low"}"#;
        assert_eq!(clean_reply(raw), raw);
    }

    #[test]
    fn clean_reply_strips_code_fences() {
        let raw = "```json\n{\"category\": \"billing\", \"priority\": \"low\"}\n```";
        assert_eq!(clean_reply(raw), "{\"category\": \"billing\", \"priority\": \"low\"}");
    }

    #[test]
    fn clean_reply_strips_json_prefix() {
        let raw = "json {\"category\": \"account\", \"priority\": \"high\"}";
        assert_eq!(clean_reply(raw), "{\"category\": \"account\", \"priority\": \"high\"}");
    }

    #[test]
    fn parse_suggestion_accepts_valid_reply() {
        let suggestion = parse_suggestion("{\"category\": \"technical\", \"priority\": \"critical\"}")
            .expect("valid reply");
        assert_eq!(suggestion.category, TicketCategory::Technical);
        assert_eq!(suggestion.priority, TicketPriority::Critical);
    }

    #[test]
    fn parse_suggestion_accepts_fenced_reply() {
        let raw = "```json\n{\"category\": \"general\", \"priority\": \"medium\"}\n```";
        let suggestion = parse_suggestion(raw).expect("fenced reply");
        assert_eq!(suggestion.category, TicketCategory::General);
        assert_eq!(suggestion.priority, TicketPriority::Medium);
    }

    #[test]
    fn parse_suggestion_rejects_invalid_json() {
        assert!(matches!(
            parse_suggestion("not json at all"),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn parse_suggestion_rejects_non_object() {
        assert!(matches!(
            parse_suggestion("[\"billing\", \"low\"]"),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn parse_suggestion_rejects_missing_priority() {
        assert!(matches!(
            parse_suggestion("{\"category\": \"billing\"}"),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn parse_suggestion_rejects_out_of_enum_label() {
        assert!(matches!(
            parse_suggestion("{\"category\": \"spam\", \"priority\": \"low\"}"),
            Err(ClassifyError::InvalidLabel(_))
        ));
        assert!(matches!(
            parse_suggestion("{\"category\": \"billing\", \"priority\": \"urgent\"}"),
            Err(ClassifyError::InvalidLabel(_))
        ));
    }

    #[tokio::test]
    async fn disabled_classifier_reports_disabled() {
        let result = DisabledClassifier.classify("anything").await;
        assert!(matches!(result, Err(ClassifyError::Disabled)));
    }
}
