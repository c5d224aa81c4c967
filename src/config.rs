//! Configuration file loading for the `promptify` CLI.
//!
//! Resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `./promptify.toml`
//! 3. `~/.promptify/config.toml` (user)
//!
//! With no file found, defaults apply. The API key comes from
//! `[model] api_key` or, failing that, the `UNIFY_KEY` environment variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::config::{DEFAULT_API_RETRY, DEFAULT_API_WAIT, DEFAULT_MAX_TOKENS};
use crate::model::{ModelConfig, OutputMode};
use crate::parser::DEFAULT_JSON_DEPTH_LIMIT;
use crate::pipeline::PipelineConfig;
use crate::types::ParameterValidationPolicy;
use crate::{PromptifyError, Result};

/// Environment variable holding the Unify API key.
pub const API_KEY_ENV: &str = "UNIFY_KEY";

const LOCAL_CONFIG: &str = "promptify.toml";

/// CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// The `[model]` table.
#[derive(Clone, Deserialize)]
pub struct ModelSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    /// Router base URL (default: the public Unify API).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Cap on the wait between retries, in seconds (default: 60).
    #[serde(default = "default_api_wait_secs")]
    pub api_wait_secs: u64,
    /// Attempts per remote call (default: 6).
    #[serde(default = "default_api_retry")]
    pub api_retry: u32,
    #[serde(default = "default_json_depth_limit")]
    pub json_depth_limit: usize,
    #[serde(default)]
    pub output_mode: OutputMode,
    #[serde(default)]
    pub validation_policy: ParameterValidationPolicy,
    /// Extra generation parameters, e.g. `temperature = 0.2`.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            model: None,
            provider: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            api_wait_secs: default_api_wait_secs(),
            api_retry: default_api_retry(),
            json_depth_limit: default_json_depth_limit(),
            output_mode: OutputMode::default(),
            validation_policy: ParameterValidationPolicy::default(),
            params: Map::new(),
        }
    }
}

impl std::fmt::Debug for ModelSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSection")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("api_wait_secs", &self.api_wait_secs)
            .field("api_retry", &self.api_retry)
            .field("json_depth_limit", &self.json_depth_limit)
            .field("output_mode", &self.output_mode)
            .field("validation_policy", &self.validation_policy)
            .field("params", &self.params)
            .finish()
    }
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_api_wait_secs() -> u64 {
    DEFAULT_API_WAIT.as_secs()
}

fn default_api_retry() -> u32 {
    DEFAULT_API_RETRY
}

fn default_json_depth_limit() -> usize {
    DEFAULT_JSON_DEPTH_LIMIT
}

impl ModelSection {
    /// Build a validated [`ModelConfig`], taking the key from the
    /// environment when the file has none.
    pub fn to_model_config(&self) -> Result<ModelConfig> {
        self.to_model_config_with(std::env::var(API_KEY_ENV).ok())
    }

    fn to_model_config_with(&self, env_key: Option<String>) -> Result<ModelConfig> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or(env_key)
            .ok_or_else(|| {
                PromptifyError::Configuration(format!(
                    "no API key: set [model] api_key or {API_KEY_ENV}"
                ))
            })?;

        let mut builder = ModelConfig::builder(api_key)
            .max_tokens(self.max_tokens)
            .api_wait(Duration::from_secs(self.api_wait_secs))
            .api_retry(self.api_retry)
            .json_depth_limit(self.json_depth_limit)
            .output_mode(self.output_mode)
            .validation_policy(self.validation_policy);
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(provider) = &self.provider {
            builder = builder.provider(provider);
        }
        for (name, value) in &self.params {
            builder = builder.param(name, value.clone());
        }
        builder.build()
    }
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PromptifyError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            PromptifyError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(PromptifyError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Ok(Some(local));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".promptify").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_library_defaults() {
        let config = Config::default();
        assert_eq!(config.model.max_tokens, 1000);
        assert_eq!(config.model.api_wait_secs, 60);
        assert_eq!(config.model.api_retry, 6);
        assert_eq!(config.model.json_depth_limit, 20);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [model]
            api_key = "file-key"
            model = "llama-3-8b-chat"
            provider = "fireworks-ai"
            max_tokens = 256
            api_retry = 2
            output_mode = "single_shot"
            validation_policy = "error"

            [model.params]
            temperature = 0.2

            [pipeline]
            cache_size = 10
            structured_output = false
            output_path = "/tmp/promptify"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.model.max_tokens, 256);
        assert_eq!(config.model.output_mode, OutputMode::SingleShot);
        assert_eq!(config.model.validation_policy, ParameterValidationPolicy::Error);
        assert_eq!(config.pipeline.cache_size, 10);
        assert!(!config.pipeline.structured_output);
        assert!(config.pipeline.cache_prompt);

        let model = config.model.to_model_config_with(None).unwrap();
        assert_eq!(model.api_key(), "file-key");
        assert_eq!(model.addressing().endpoint_id(), "llama-3-8b-chat@fireworks-ai");
        assert_eq!(model.max_tokens(), 256);
        assert_eq!(model.api_retry(), 2);
        assert_eq!(model.extra()["temperature"], 0.2);
    }

    #[test]
    fn env_key_used_when_file_has_none() {
        let section = ModelSection {
            endpoint: Some("m@p".into()),
            ..ModelSection::default()
        };
        let model = section.to_model_config_with(Some("env-key".into())).unwrap();
        assert_eq!(model.api_key(), "env-key");
    }

    #[test]
    fn file_key_wins_over_env() {
        let section = ModelSection {
            api_key: Some("file-key".into()),
            endpoint: Some("m@p".into()),
            ..ModelSection::default()
        };
        let model = section.to_model_config_with(Some("env-key".into())).unwrap();
        assert_eq!(model.api_key(), "file-key");
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let section = ModelSection {
            endpoint: Some("m@p".into()),
            ..ModelSection::default()
        };
        let err = section.to_model_config_with(None).unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn ambiguous_addressing_surfaces_from_file() {
        let toml = r#"
            [model]
            api_key = "k"
            endpoint = "m@p"
            model = "m"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.model.to_model_config_with(None).unwrap_err();
        assert!(matches!(err, PromptifyError::AmbiguousAddressing));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\nendpoint = \"m@p\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.model.endpoint.as_deref(), Some("m@p"));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/promptify.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn debug_redacts_key() {
        let section = ModelSection {
            api_key: Some("super-secret".into()),
            ..ModelSection::default()
        };
        assert!(!format!("{section:?}").contains("super-secret"));
    }
}
