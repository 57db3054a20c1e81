//! Persisted API configuration.
//!
//! The key lives in a small JSON file next to wherever the caller decides;
//! when the file is absent the `GEMINI_API_KEY` environment variable is
//! consulted instead. Absence of a key is not an error here: the client
//! reports it at submission time.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub api_key: Option<String>,
}

impl ApiConfig {
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
        }
    }

    /// Load from a JSON file, falling back to the environment. Never fails:
    /// an unreadable or malformed file is treated as absent.
    pub fn load(path: &Path) -> Self {
        if let Ok(raw) = std::fs::read_to_string(path) {
            match serde_json::from_str::<ApiConfig>(&raw) {
                Ok(config) if config.api_key.is_some() => return config,
                Ok(_) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "ignoring malformed config"),
            }
        }

        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        ApiConfig::with_api_key("secret-key").save(&path).unwrap();
        let loaded = ApiConfig::load(&path);
        assert_eq!(loaded.api_key.as_deref(), Some("secret-key"));
    }

    #[test]
    fn malformed_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let loaded = ApiConfig::load(&path);
        // No file-based key; env fallback may or may not be set in CI, so
        // only assert that loading did not panic and produced a config.
        let _ = loaded.api_key;
    }
}
