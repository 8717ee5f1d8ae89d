// Configuration
// Loaded once at startup from a YAML file, with token overrides from the environment

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Hard upper bound for round trips per chat
pub const MAX_ITERATIONS: i64 = 50;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid config file: {0}")]
    Parse(String),

    #[error("Missing tokens.openrouter")]
    MissingOpenRouterToken,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3443".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub openrouter: String,
    pub exa: String,
    pub github: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Typographic normalization of streamed strings
    pub cleanup: bool,
    /// Upper bound for client iteration counts
    pub iterations: i64,
    pub image_generation: bool,
    /// Provider message transform, e.g. "middle-out"
    pub transformation: String,
    /// Provider HTTP timeout in seconds
    pub timeout: u64,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            cleanup: true,
            iterations: MAX_ITERATIONS,
            image_generation: true,
            transformation: String::new(),
            timeout: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory of system prompt templates; none loaded when empty
    pub directory: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub debug: bool,
    pub server: ServerConfig,
    pub tokens: TokenConfig,
    pub settings: SettingsConfig,
    pub prompts: PromptsConfig,
}

impl AppConfig {
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(token) = non_empty("OPENROUTER_TOKEN") {
            self.tokens.openrouter = token;
        }
        if let Some(token) = non_empty("EXA_TOKEN") {
            self.tokens.exa = token;
        }
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.tokens.github = token;
        }
    }

    /// Clamp settings into range and check required tokens
    pub fn validate(&mut self) -> ConfigResult<()> {
        self.settings.iterations = self.settings.iterations.clamp(1, MAX_ITERATIONS);
        self.settings.timeout = self.settings.timeout.max(1);

        if self.tokens.openrouter.is_empty() {
            return Err(ConfigError::MissingOpenRouterToken);
        }

        if self.tokens.exa.is_empty() {
            log::warn!("[config] Missing tokens.exa, web search unavailable");
        }

        Ok(())
    }

    pub fn prompts_directory(&self) -> Option<PathBuf> {
        let directory = self.prompts.directory.trim();
        (!directory.is_empty()).then(|| PathBuf::from(directory))
    }
}

/// Path of the configuration file, honoring `CHATLOOP_CONFIG`
pub fn config_path() -> PathBuf {
    std::env::var("CHATLOOP_CONFIG")
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load, override and validate the configuration at `path`
pub fn load_config(path: &Path) -> ConfigResult<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut config = AppConfig::from_yaml(&content)?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;

    log::info!("[config] Loaded configuration from {}", path.display());

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = AppConfig::from_yaml("tokens:\n  openrouter: abc\n").unwrap();

        assert_eq!(config.tokens.openrouter, "abc");
        assert!(config.settings.cleanup);
        assert_eq!(config.settings.iterations, MAX_ITERATIONS);
        assert_eq!(config.settings.timeout, 300);
        assert_eq!(config.server.address, "127.0.0.1:3443");
        assert!(config.prompts_directory().is_none());
    }

    #[test]
    fn test_validate_clamps_iterations() {
        let mut config = AppConfig::from_yaml(
            "tokens:\n  openrouter: abc\nsettings:\n  iterations: 500\n",
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.settings.iterations, MAX_ITERATIONS);

        config.settings.iterations = 0;
        config.validate().unwrap();
        assert_eq!(config.settings.iterations, 1);
    }

    #[test]
    fn test_missing_openrouter_token_is_fatal() {
        let mut config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOpenRouterToken)
        ));
    }

    #[test]
    fn test_env_overrides_tokens() {
        let mut config = AppConfig::default();
        config.tokens.exa = "from-file".to_string();

        config.apply_env(|key| match key {
            "OPENROUTER_TOKEN" => Some("or-env".to_string()),
            "EXA_TOKEN" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.tokens.openrouter, "or-env");
        assert_eq!(config.tokens.exa, "from-file");
        assert!(config.tokens.github.is_empty());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "debug: true\ntokens:\n  openrouter: key\n  exa: exa-key\nsettings:\n  cleanup: false\n  timeout: 30\nprompts:\n  directory: prompts"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();

        assert!(config.debug);
        assert!(!config.settings.cleanup);
        assert_eq!(config.settings.timeout, 30);
        assert_eq!(config.prompts_directory(), Some(PathBuf::from("prompts")));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/chatloop/config.yml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
