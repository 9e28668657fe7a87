//! Engine configuration types.
//!
//! `CoachConfig` represents the `config.toml` in the data directory. Every
//! field has a default so a missing or partial file still yields a usable
//! configuration.

use serde::{Deserialize, Serialize};

/// Smallest history bound that still leaves one verbatim message after a fold.
pub const MIN_MAX_MESSAGES: usize = 2;

/// Top-level configuration for the coach engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    /// History length that triggers consolidation.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Model used for coach replies.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for fact extraction. Falls back to `model`.
    #[serde(default)]
    pub consolidation_model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Directory holding `states/` and `examples/`, relative to the data dir
    /// unless absolute.
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_max_messages() -> usize {
    10
}

fn default_model() -> String {
    "gpt-4o-2024-08-06".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_prompts_dir() -> String {
    "prompts".to_string()
}

impl CoachConfig {
    /// History bound with the floor applied.
    pub fn effective_max_messages(&self) -> usize {
        self.max_messages.max(MIN_MAX_MESSAGES)
    }

    pub fn consolidation_model(&self) -> &str {
        self.consolidation_model.as_deref().unwrap_or(&self.model)
    }
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            model: default_model(),
            consolidation_model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            prompts_dir: default_prompts_dir(),
            storage: StorageConfig::default(),
        }
    }
}

/// Which persistence backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    Sql,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite URL. Defaults to `coach.db` in the data directory.
    #[serde(default)]
    pub database_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = CoachConfig::default();
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.prompts_dir, "prompts");
        assert_eq!(config.storage.backend, StorageBackend::InMemory);
        assert_eq!(config.consolidation_model(), config.model);
    }

    #[test]
    fn test_config_deserialize_with_defaults() {
        let config: CoachConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_messages, 10);
        assert!(config.storage.database_url.is_none());
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
max_messages = 6
model = "gpt-4o-mini"
consolidation_model = "gpt-4o-mini"

[storage]
backend = "sql"
database_url = "sqlite:///tmp/coach.db"
"#;
        let config: CoachConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_messages, 6);
        assert_eq!(config.storage.backend, StorageBackend::Sql);
        assert_eq!(
            config.storage.database_url.as_deref(),
            Some("sqlite:///tmp/coach.db")
        );
    }

    #[test]
    fn test_max_messages_floor() {
        let config = CoachConfig {
            max_messages: 0,
            ..CoachConfig::default()
        };
        assert_eq!(config.effective_max_messages(), MIN_MAX_MESSAGES);
    }
}
