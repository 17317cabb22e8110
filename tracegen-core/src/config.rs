//! Configuration types for the trace generation harness
//!
//! Core components never read configuration implicitly; config is resolved
//! at the edge (the CLI) and passed in as explicit constructor arguments.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TracegenError};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracegenConfig {
    /// Model endpoint configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Simulated caller identity attached to traces
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    "demo_user".to_string()
}

impl Default for TracegenConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            export: ExportConfig::default(),
            user_id: default_user_id(),
        }
    }
}

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// API key
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Collector endpoint for span export (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// JSONL output file for trace export (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl_path: Option<PathBuf>,

    /// Upper bound on exporter time per trace
    #[serde(with = "humantime_serde", default = "default_export_timeout")]
    pub timeout: Duration,
}

fn default_export_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            jsonl_path: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl TracegenConfig {
    /// Load configuration from file and environment.
    ///
    /// Sources, later ones overriding earlier:
    /// 1. `tracegen.toml` in the working directory
    /// 2. A file named by `TRACEGEN_CONFIG_PATH`
    /// 3. `TRACEGEN_`-prefixed environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or validation
    /// fails.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let mut figment = Figment::new().merge(Toml::file("tracegen.toml"));

        if let Ok(path) = std::env::var("TRACEGEN_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        // Double underscore separates nesting levels, so snake_case fields
        // like model.api_key stay addressable (TRACEGEN_MODEL__API_KEY).
        figment = figment.merge(Env::prefixed("TRACEGEN_").split("__"));

        let config: TracegenConfig = figment.extract().map_err(|e| {
            TracegenError::Configuration(format!("Failed to load configuration: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Toml},
        };

        let config: TracegenConfig = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                TracegenError::Configuration(format!("Failed to load configuration: {e}"))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints
    pub fn validate(&self) -> Result<()> {
        if self.model.base_url.is_empty() {
            return Err(TracegenError::Configuration(
                "model.base_url must not be empty".to_string(),
            ));
        }
        if self.model.model.is_empty() {
            return Err(TracegenError::Configuration(
                "model.model must not be empty".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(TracegenError::Configuration(
                "user_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = TracegenConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.user_id, "demo_user");
        assert_eq!(config.export.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracegen.toml");
        std::fs::write(
            &path,
            r#"
user_id = "tester"

[model]
base_url = "http://localhost:4000/v1"
api_key = "sk-test"
model = "gpt-4o-mini"

[export]
timeout = "2s"
"#,
        )
        .unwrap();

        let config = TracegenConfig::from_file(&path).unwrap();
        assert_eq!(config.model.base_url, "http://localhost:4000/v1");
        assert_eq!(config.user_id, "tester");
        assert_eq!(config.export.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TracegenConfig {
            model: ModelConfig {
                base_url: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
