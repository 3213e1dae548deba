//! Configuration loading.
//!
//! Settings come from `config.toml` in the deckhand home directory. Every
//! field has a default, so a missing file or a partial file is fine.
//! Credentials may also come from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Embedded from `default_config.toml` at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for the deckhand home directory.
    //!
    //! Resolution order:
    //! 1. `DECKHAND_HOME` environment variable (if set)
    //! 2. `~/.config/deckhand`

    use std::path::PathBuf;

    pub const HOME_ENV: &str = "DECKHAND_HOME";

    /// Returns the deckhand home directory.
    pub fn deckhand_home() -> PathBuf {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".deckhand"),
            |h| h.join(".config").join("deckhand"),
        )
    }

    /// Returns the path to `config.toml`.
    pub fn config_path() -> PathBuf {
        deckhand_home().join("config.toml")
    }

    /// Returns the default sessions directory.
    pub fn sessions_dir() -> PathBuf {
        deckhand_home().join("sessions")
    }
}

/// Anthropic provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl AnthropicConfig {
    /// Returns the API key from config, else from `ANTHROPIC_API_KEY`.
    pub fn effective_api_key(&self) -> Option<String> {
        self.effective_api_key_with(|key| std::env::var(key).ok())
    }

    /// Returns the base URL from config, else `ANTHROPIC_BASE_URL`, else the
    /// public endpoint.
    pub fn effective_base_url(&self) -> String {
        self.effective_base_url_with(|key| std::env::var(key).ok())
    }

    fn effective_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| non_empty(env(ANTHROPIC_API_KEY_ENV)))
    }

    fn effective_base_url_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        non_empty(self.base_url.clone())
            .or_else(|| non_empty(env(ANTHROPIC_BASE_URL_ENV)))
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model used by the reasoning runtime.
    pub model: String,
    pub max_tokens: u32,
    /// Upper bound on model/tool round trips in one turn.
    pub max_tool_rounds: usize,
    pub request_timeout_secs: u64,
    /// Overrides `$DECKHAND_HOME/sessions`.
    pub sessions_dir: Option<PathBuf>,
    pub anthropic: AnthropicConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            max_tool_rounds: Self::DEFAULT_MAX_TOOL_ROUNDS,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            sessions_dir: None,
            anthropic: AnthropicConfig::default(),
        }
    }
}

impl Config {
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-5";
    pub const DEFAULT_MAX_TOKENS: u32 = 8192;
    pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 24;
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

    /// Loads configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the default config template to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Directory where sessions are stored.
    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions_dir.clone().unwrap_or_else(paths::sessions_dir)
    }

    /// Directory where conversation transcripts are stored.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.sessions_dir().join("transcripts")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.model, "claude-sonnet-4-5");
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            "max_tool_rounds = 3\n\n[anthropic]\nbase_url = \"http://localhost:9\"\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.max_tool_rounds, 3);
        assert_eq!(config.max_tokens, Config::DEFAULT_MAX_TOKENS);
        assert_eq!(
            config.anthropic.base_url.as_deref(),
            Some("http://localhost:9")
        );
    }

    #[test]
    fn test_load_invalid_toml_errors() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "model = [").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_init_writes_template_that_parses_to_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();
        assert_eq!(Config::load_from(&config_path).unwrap(), Config::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "model = \"mine\"\n").unwrap();

        let err = Config::init(&config_path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(
            fs::read_to_string(&config_path).unwrap(),
            "model = \"mine\"\n"
        );
    }

    #[test]
    fn test_api_key_prefers_config_over_env() {
        let env = |key: &str| (key == ANTHROPIC_API_KEY_ENV).then(|| "from-env".to_string());

        let config = AnthropicConfig {
            api_key: Some("from-config".to_string()),
            base_url: None,
        };
        assert_eq!(
            config.effective_api_key_with(env).as_deref(),
            Some("from-config")
        );

        let blank = AnthropicConfig {
            api_key: Some("  ".to_string()),
            base_url: None,
        };
        assert_eq!(blank.effective_api_key_with(env).as_deref(), Some("from-env"));
        assert_eq!(blank.effective_api_key_with(|_| None), None);
    }

    #[test]
    fn test_base_url_fallbacks() {
        let config = AnthropicConfig::default();
        assert_eq!(
            config.effective_base_url_with(|_| None),
            DEFAULT_ANTHROPIC_BASE_URL
        );
        assert_eq!(
            config.effective_base_url_with(|_| Some("http://proxy/".to_string())),
            "http://proxy"
        );
    }

    #[test]
    fn test_sessions_dir_override() {
        let config = Config {
            sessions_dir: Some(PathBuf::from("/tmp/decks")),
            ..Config::default()
        };
        assert_eq!(config.sessions_dir(), PathBuf::from("/tmp/decks"));
        assert_eq!(
            config.transcripts_dir(),
            PathBuf::from("/tmp/decks/transcripts")
        );
    }
}
