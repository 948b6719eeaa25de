//! AI cause suggestions
//!
//! Asks a text-generation service for candidate root causes. This is the only
//! external call in the tool, and it is best effort: whatever goes wrong comes
//! back as a [`SuggestionOutcome`] diagnostic, never as an error, so manual
//! cause entry and scoring keep working.

use crate::config::SuggestionConfig;
use crate::error::{FishboneError, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

lazy_static! {
    static ref LIST_MARKER: Regex = Regex::new(r"^(?:[-*•]+|\d+[.)])\s*").unwrap();
}

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &SuggestionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| FishboneError::Config("no API key configured".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FishboneError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You list likely root causes of data quality issues as a short comma-separated list."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.3,
            "max_tokens": self.max_tokens
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FishboneError::Suggestion(format!("API call failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FishboneError::Suggestion("API key was rejected".to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FishboneError::Suggestion("rate limit or quota exceeded".to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FishboneError::Suggestion(format!("API returned {}: {}", status, text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FishboneError::Suggestion(format!("Failed to parse API response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| FishboneError::Suggestion("No content in API response".to_string()))?;

        Ok(content.to_string())
    }
}

/// Result of one suggestion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SuggestionOutcome {
    Suggested(Vec<String>),
    /// No generator configured (e.g. missing API key).
    Unavailable(String),
    Failed(String),
}

impl SuggestionOutcome {
    /// Suggested causes, empty when the request did not succeed.
    pub fn causes(&self) -> &[String] {
        match self {
            SuggestionOutcome::Suggested(causes) => causes,
            _ => &[],
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            SuggestionOutcome::Suggested(_) => None,
            SuggestionOutcome::Unavailable(msg) | SuggestionOutcome::Failed(msg) => Some(msg),
        }
    }
}

pub fn build_prompt(issue: &str) -> String {
    format!("List root causes for the following data quality issue: {}", issue.trim())
}

/// Split generated text on newlines and commas into distinct causes.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| c == '\n' || c == ',')
        .map(|part| part.trim().trim_matches('`').trim())
        .map(|part| LIST_MARKER.replace(part, "").trim().to_string())
        .filter(|cause| !cause.is_empty())
        .filter(|cause| seen.insert(cause.to_lowercase()))
        .collect()
}

pub struct SuggestionClient {
    generator: Option<Box<dyn TextGenerator>>,
    unavailable_reason: String,
    timeout: Duration,
}

impl SuggestionClient {
    /// Builds the HTTP generator when credentials are present; otherwise every
    /// request reports `Unavailable`.
    pub fn new(config: &SuggestionConfig) -> Self {
        if !config.has_credentials() {
            return Self::unavailable("AI suggestions are disabled: set OPENAI_API_KEY", config.timeout);
        }
        match OpenAiGenerator::new(config) {
            Ok(generator) => Self::with_generator(Box::new(generator), config.timeout),
            Err(e) => {
                warn!("Suggestion client unavailable: {}", e);
                Self::unavailable(&e.to_string(), config.timeout)
            }
        }
    }

    pub fn with_generator(generator: Box<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            generator: Some(generator),
            unavailable_reason: String::new(),
            timeout,
        }
    }

    pub fn unavailable(reason: &str, timeout: Duration) -> Self {
        Self {
            generator: None,
            unavailable_reason: reason.to_string(),
            timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    /// One attempt, bounded by the configured timeout. Never errors.
    pub async fn suggest(&self, issue: &str) -> SuggestionOutcome {
        if issue.trim().is_empty() {
            return SuggestionOutcome::Suggested(Vec::new());
        }
        let generator = match &self.generator {
            Some(generator) => generator,
            None => return SuggestionOutcome::Unavailable(self.unavailable_reason.clone()),
        };

        let prompt = build_prompt(issue);
        debug!(prompt = %prompt, "Requesting cause suggestions");

        match tokio::time::timeout(self.timeout, generator.generate(&prompt)).await {
            Ok(Ok(text)) => {
                let causes = parse_suggestions(&text);
                info!(count = causes.len(), "Received cause suggestions");
                SuggestionOutcome::Suggested(causes)
            }
            Ok(Err(e)) => {
                warn!("Cause suggestion failed: {}", e);
                SuggestionOutcome::Failed(e.to_string())
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Cause suggestion timed out");
                SuggestionOutcome::Failed(format!(
                    "Suggestion request timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        }
    }
}
