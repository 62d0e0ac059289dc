//! Configuration models for examforge.
//!
//! All runtime-tunable parameters live here and load from a TOML file with
//! serde defaults, so a minimal config only needs the service section.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for examforge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Completion/embedding service configuration
    pub service: ServiceConfig,

    /// Credential pool configuration
    #[serde(default)]
    pub credentials: CredentialConfig,

    /// Synthesis pipeline tuning
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Completion service configuration (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL for the API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for text completion calls
    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    /// Model used for embedding calls
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            completion_model: default_completion_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Credential pool configuration.
///
/// Keys may be listed inline (with `${ENV_VAR}` expansion) or provided as a
/// comma-separated list through the environment variable named by `keys_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// API keys, in rotation order
    #[serde(default)]
    pub keys: Vec<String>,

    /// Environment variable holding comma-separated keys (fallback)
    #[serde(default = "default_keys_env")]
    pub keys_env: String,

    /// Fixed backoff between rotation attempts, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_keys_env() -> String {
    "EXAMFORGE_API_KEYS".to_string()
}

fn default_backoff_ms() -> u64 {
    1500
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            keys_env: default_keys_env(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl CredentialConfig {
    /// Resolve the credential list from config or environment.
    pub fn resolve_keys(&self) -> Result<Vec<String>, ConfigError> {
        if !self.keys.is_empty() {
            return Ok(self.keys.iter().map(|k| expand_env_vars(k)).collect());
        }

        match std::env::var(&self.keys_env) {
            Ok(raw) => {
                let keys: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect();
                if keys.is_empty() {
                    Err(ConfigError::MissingCredentials {
                        env_var: self.keys_env.clone(),
                    })
                } else {
                    Ok(keys)
                }
            }
            Err(_) => Err(ConfigError::MissingCredentials {
                env_var: self.keys_env.clone(),
            }),
        }
    }
}

/// Synthesis pipeline tuning.
///
/// Batch size and pause are the backpressure controls against the completion
/// service's per-minute rate ceilings. Exposed here so test suites can shrink
/// them instead of hitting the hard-coded production values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Concurrent calls per craft/review batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches, in milliseconds
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Target languages for generated question text
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_batch_size() -> usize {
    3
}

fn default_batch_pause_ms() -> u64 {
    1000
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            languages: default_languages(),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for the JSON snapshot; in-memory only when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }
}

/// Expand `${VAR_NAME}` placeholders from the environment.
///
/// Unset variables leave the placeholder unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("No credentials configured: set {env_var} or [credentials] keys")]
    MissingCredentials { env_var: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [service]
            base_url = "http://localhost:8080/v1"
            "#,
        )
        .unwrap();

        assert_eq!(config.synthesis.batch_size, 3);
        assert_eq!(config.synthesis.batch_pause_ms, 1000);
        assert_eq!(config.credentials.backoff_ms, 1500);
        assert_eq!(config.synthesis.languages, vec!["en".to_string()]);
        assert!(config.store.data_dir.is_none());
    }

    #[test]
    fn inline_keys_win_over_env() {
        let creds = CredentialConfig {
            keys: vec!["sk-a".to_string(), "sk-b".to_string()],
            ..Default::default()
        };
        let keys = creds.resolve_keys().unwrap();
        assert_eq!(keys, vec!["sk-a".to_string(), "sk-b".to_string()]);
    }

    #[test]
    fn missing_credentials_error_names_env_var() {
        let creds = CredentialConfig {
            keys: Vec::new(),
            keys_env: "EXAMFORGE_TEST_NO_SUCH_VAR".to_string(),
            ..Default::default()
        };
        let err = creds.resolve_keys().unwrap_err();
        assert!(err.to_string().contains("EXAMFORGE_TEST_NO_SUCH_VAR"));
    }
}
