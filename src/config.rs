//! Configuration management for Clean Coder.
//!
//! Configuration is read from environment variables, after `.env` files have
//! been loaded by the binaries:
//! - `WORK_DIR` - Required. The project the agents work on.
//! - `ANTHROPIC_API_KEY` - Optional. Enables Claude models.
//! - `OPENROUTER_API_KEY` - Optional. Enables models through OpenRouter.
//! - `OPENAI_API_KEY` - Optional. Enables OpenAI models and embeddings.
//! - `OLLAMA_MODEL` - Optional. Name of a model served by a local Ollama.
//! - `OLLAMA_BASE_URL` - Optional. Defaults to `http://localhost:11434`.
//! - `LOCAL_MODEL_API_BASE` / `LOCAL_MODEL_NAME` - Optional. Any OpenAI-compatible endpoint.
//! - `FRONTEND_URL` - Optional. Enables the frontend feedback screenshots.
//! - `TODOIST_API_KEY` / `TODOIST_PROJECT_ID` - Manager only.
//! - `EMBEDDING_MODEL` - Optional. Defaults to `text-embedding-3-small`.
//! - `TELEMETRY_DISABLED` - Optional. `1`/`true` silences usage events.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::env_var_bool;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} variable not provided. Please add {0} to .env file")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials and endpoints of the LLM providers.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub anthropic_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_model: Option<String>,
    pub ollama_base_url: String,
    pub local_model_api_base: Option<String>,
    pub local_model_name: Option<String>,
}

impl ProviderKeys {
    /// True when at least one provider can be built.
    pub fn any(&self) -> bool {
        self.anthropic_api_key.is_some()
            || self.openrouter_api_key.is_some()
            || self.openai_api_key.is_some()
            || self.ollama_model.is_some()
            || (self.local_model_api_base.is_some() && self.local_model_name.is_some())
    }
}

/// Todoist settings used by the manager.
#[derive(Debug, Clone, Default)]
pub struct TodoistConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
}

/// Clean Coder configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project directory all tools operate in
    pub work_dir: PathBuf,

    pub providers: ProviderKeys,

    /// Base URL of the running frontend, when screenshots are wanted
    pub frontend_url: Option<String>,

    pub todoist: TodoistConfig,

    /// Embedding model for the description collection
    pub embedding_model: String,

    pub telemetry_disabled: bool,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `WORK_DIR` is not set and
    /// `ConfigError::InvalidValue` if it does not point to a directory or
    /// `FRONTEND_URL` is not a URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let work_dir = optional_var("WORK_DIR")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("WORK_DIR".to_string()))?;

        if !work_dir.is_dir() {
            return Err(ConfigError::InvalidValue(
                "WORK_DIR".to_string(),
                format!("{} is not a directory", work_dir.display()),
            ));
        }

        // Project-specific values (Todoist project id) live next to the workspace data.
        let project_env = work_dir.join(".clean_coder").join(".env");
        if project_env.exists() {
            if let Err(e) = dotenvy::from_path(&project_env) {
                tracing::warn!("Could not load {}: {}", project_env.display(), e);
            }
        }

        let frontend_url = optional_var("FRONTEND_URL");
        if let Some(raw) = &frontend_url {
            url::Url::parse(raw).map_err(|e| {
                ConfigError::InvalidValue("FRONTEND_URL".to_string(), e.to_string())
            })?;
        }

        let providers = ProviderKeys {
            anthropic_api_key: optional_var("ANTHROPIC_API_KEY"),
            openrouter_api_key: optional_var("OPENROUTER_API_KEY"),
            openai_api_key: optional_var("OPENAI_API_KEY"),
            ollama_model: optional_var("OLLAMA_MODEL"),
            ollama_base_url: optional_var("OLLAMA_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            local_model_api_base: optional_var("LOCAL_MODEL_API_BASE"),
            local_model_name: optional_var("LOCAL_MODEL_NAME"),
        };

        Ok(Self {
            work_dir,
            providers,
            frontend_url,
            todoist: TodoistConfig {
                api_key: optional_var("TODOIST_API_KEY"),
                project_id: optional_var("TODOIST_PROJECT_ID"),
            },
            embedding_model: optional_var("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            telemetry_disabled: env_var_bool("TELEMETRY_DISABLED", false),
        })
    }

    /// Create a config with no providers (useful for testing).
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            providers: ProviderKeys {
                ollama_base_url: "http://localhost:11434".to_string(),
                ..Default::default()
            },
            frontend_url: None,
            todoist: TodoistConfig::default(),
            embedding_model: "text-embedding-3-small".to_string(),
            telemetry_disabled: true,
        }
    }

    /// Name of the working directory, used to name collections and projects.
    pub fn work_dir_name(&self) -> String {
        work_dir_name(&self.work_dir)
    }
}

pub fn work_dir_name(work_dir: &Path) -> String {
    work_dir
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        })
        .last()
        .unwrap_or_else(|| "project".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_work_dir_message() {
        let err = ConfigError::MissingEnvVar("WORK_DIR".to_string());
        assert_eq!(
            err.to_string(),
            "WORK_DIR variable not provided. Please add WORK_DIR to .env file"
        );
    }

    #[test]
    fn test_work_dir_name_ignores_trailing_slash() {
        assert_eq!(work_dir_name(Path::new("/home/me/shop/")), "shop");
        assert_eq!(work_dir_name(Path::new("/home/me/shop")), "shop");
    }

    #[test]
    fn test_provider_keys_any() {
        let mut keys = ProviderKeys::default();
        assert!(!keys.any());
        keys.local_model_api_base = Some("http://127.0.0.1:8000/v1".to_string());
        assert!(!keys.any());
        keys.local_model_name = Some("qwen".to_string());
        assert!(keys.any());
    }
}
