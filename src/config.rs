//! Runtime configuration, read from the environment (and `.env`) once at startup.

use crate::error::{FishboneError, Result};
use crate::templates::TemplateRegistry;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Settings for the text-generation service behind cause suggestions.
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_tokens: 200,
        }
    }
}

impl SuggestionConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let timeout = match std::env::var("SUGGEST_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                FishboneError::Config(format!("SUGGEST_TIMEOUT_SECS is not a number: {}", raw))
            })?),
            Err(_) => defaults.timeout,
        };

        Ok(Self {
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            timeout,
            max_tokens: defaults.max_tokens,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub suggestion: SuggestionConfig,
    /// Optional JSON file with extra domain templates.
    pub templates_file: Option<PathBuf>,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            suggestion: SuggestionConfig::from_env()?,
            templates_file: std::env::var("FISHBONE_TEMPLATES").ok().map(PathBuf::from),
            bind_addr: std::env::var("FISHBONE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
        })
    }

    pub fn template_registry(&self) -> Result<TemplateRegistry> {
        match &self.templates_file {
            Some(path) => TemplateRegistry::builtin_with_file(path),
            None => Ok(TemplateRegistry::builtin()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            suggestion: SuggestionConfig::default(),
            templates_file: None,
            bind_addr: DEFAULT_BIND.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.suggestion.has_credentials());
        assert_eq!(config.suggestion.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.template_registry().unwrap().names().len(), 3);
    }

    #[test]
    fn test_missing_templates_file_is_an_error() {
        let config = AppConfig {
            templates_file: Some(PathBuf::from("/nonexistent/templates.json")),
            ..AppConfig::default()
        };
        assert!(matches!(config.template_registry(), Err(FishboneError::Io(_))));
    }
}
