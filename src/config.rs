//! Configuration
//!
//! TOML config file with environment and CLI overrides.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keygen: KeygenConfig,
    pub supervisor: SupervisorConfig,
    pub estimate: EstimateConfig,
    pub assistant: AssistantConfig,
}

/// External search tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeygenConfig {
    /// Path (or PATH-resolvable name) of the keygen binary
    pub path: PathBuf,
    /// How long `--version` may take during preflight
    pub version_check_timeout_secs: u64,
    /// Working directory for the tool, where it writes keypair files
    pub output_dir: Option<PathBuf>,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("solana-keygen"),
            version_check_timeout_secs: 10,
            output_dir: None,
        }
    }
}

impl KeygenConfig {
    pub fn version_check_timeout(&self) -> Duration {
        Duration::from_secs(self.version_check_timeout_secs)
    }
}

/// Child process supervision settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Interval between non-blocking exit checks
    pub poll_interval_ms: u64,
    /// Cadence of cosmetic progress updates
    pub progress_interval_ms: u64,
    /// Grace period between the polite stop signal and a forced kill
    pub stop_grace_ms: u64,
    /// Upper bound on draining stdout/stderr after exit
    pub drain_timeout_ms: u64,
    /// Lines kept per stream; older lines are dropped
    pub max_captured_lines: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            progress_interval_ms: 10_000,
            stop_grace_ms: 5_000,
            drain_timeout_ms: 2000,
            max_captured_lines: 200,
        }
    }
}

impl SupervisorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Constants for the advisory cost estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateConfig {
    /// Assumed search throughput; not measured
    pub addresses_per_second: f64,
    /// Effective alphabet when case is ignored
    pub case_insensitive_alphabet: f64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            addresses_per_second: 100_000.0,
            case_insensitive_alphabet: 29.0,
        }
    }
}

/// Pattern suggestion / Q&A service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_suggestions: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 30,
            max_suggestions: 5,
        }
    }
}

impl AssistantConfig {
    /// The service is only usable with a key
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keygrind").join("config.toml"))
    }

    /// Load from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply process environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SOLANA_KEYGEN_PATH") {
            self.keygen.path = PathBuf::from(path);
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.assistant.api_key = Some(key);
        }

        if let Some(rate) = lookup("ESTIMATED_ADDRESSES_PER_SECOND") {
            let parsed: f64 = rate
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "ESTIMATED_ADDRESSES_PER_SECOND".to_string(),
                    value: rate.clone(),
                })?;
            if !parsed.is_finite() || parsed <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: "ESTIMATED_ADDRESSES_PER_SECOND".to_string(),
                    value: rate,
                });
            }
            self.estimate.addresses_per_second = parsed;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [keygen]
            path = "/opt/solana/bin/solana-keygen"

            [supervisor]
            progress_interval_ms = 30000
            "#,
        )
        .unwrap();

        assert_eq!(config.keygen.path, PathBuf::from("/opt/solana/bin/solana-keygen"));
        assert_eq!(config.keygen.version_check_timeout_secs, 10);
        assert_eq!(config.supervisor.progress_interval(), Duration::from_secs(30));
        assert_eq!(config.supervisor.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.estimate.addresses_per_second, 100_000.0);
        assert!(!config.assistant.is_enabled());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.keygen.path, PathBuf::from("solana-keygen"));
    }

    #[test]
    fn test_bad_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[keygen\npath = 1").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SOLANA_KEYGEN_PATH", "/usr/local/bin/solana-keygen"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ESTIMATED_ADDRESSES_PER_SECOND", "250000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.keygen.path, PathBuf::from("/usr/local/bin/solana-keygen"));
        assert!(config.assistant.is_enabled());
        assert_eq!(config.estimate.addresses_per_second, 250_000.0);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "ESTIMATED_ADDRESSES_PER_SECOND").then(|| "fast".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
