//! Configuration loading.
//!
//! Reads `config.toml` from the data directory (`~/.coach/` by default) into
//! [`CoachConfig`]. A missing or malformed file yields the defaults.

use std::path::{Path, PathBuf};

use coach_types::config::CoachConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "COACH_DATA_DIR";

/// Load `{data_dir}/config.toml`, falling back to defaults.
pub async fn load_config(data_dir: &Path) -> CoachConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return CoachConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return CoachConfig::default();
        }
    };

    match toml::from_str::<CoachConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            CoachConfig::default()
        }
    }
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `COACH_DATA_DIR` environment variable
/// 2. `~/.coach`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".coach");
    }
    PathBuf::from(".coach")
}

/// Prompt directory from config, relative to the data dir unless absolute.
pub fn resolve_prompts_dir(config: &CoachConfig, data_dir: &Path) -> PathBuf {
    let dir = Path::new(&config.prompts_dir);
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        data_dir.join(dir)
    }
}
