//! Runtime configuration, read once at startup.
use serde::{Deserialize, Serialize};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "GEMINI_MODEL";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: "".to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the credential and model name from the environment. A missing
    /// key is detected here, not at request time.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).unwrap_or_default(),
            model: std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_key() {
        let config = AppConfig::default();
        assert!(!config.has_api_key());
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn whitespace_key_counts_as_missing() {
        let config = AppConfig {
            api_key: "   ".to_string(),
            ..AppConfig::default()
        };
        assert!(!config.has_api_key());
    }
}
