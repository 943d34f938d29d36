use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::{parse_suggestion, Classifier, ClassifyError, Suggestion, CLASSIFICATION_PROMPT};
use crate::config::ClassifierConfig;

/// Classifier backed by the Anthropic Messages API.
pub struct AnthropicClassifier {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl AnthropicClassifier {
    pub fn new(api_key: String, base_url: String, model: String, timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Build a classifier from config, or `None` when no API key is set.
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        config.api_key.as_ref().map(|api_key| {
            Self::new(
                api_key.clone(),
                config.base_url.clone(),
                config.model.clone(),
                config.timeout_secs,
            )
        })
    }
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    async fn classify(&self, description: &str) -> Result<Suggestion, ClassifyError> {
        if description.trim().is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .timeout(self.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 200,
                "temperature": 0,
                "messages": [{
                    "role": "user",
                    "content": format!("{CLASSIFICATION_PROMPT}\n\nTicket description:\n{description}")
                }]
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::BadStatus(status));
        }

        let body: Value = response.json().await?;
        let text = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ClassifyError::Malformed("missing content text".to_string()))?;
        log::debug!("classifier raw reply: {text}");

        parse_suggestion(text)
    }
}
