use std::path::PathBuf;
use std::time::Duration;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::caption::LanguagePolicy;
use crate::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::pipeline::DEFAULT_REQUEST_TIMEOUT;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub languages: Option<Vec<String>>,
    pub fetch_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub bind: Option<String>,
    pub default_format: Option<String>,
}

impl Config {
    /// Load config from ~/.config/ytcap/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    pub fn language_policy(&self) -> LanguagePolicy {
        match &self.languages {
            Some(langs) if !langs.is_empty() => LanguagePolicy::new(langs.iter().cloned()),
            _ => LanguagePolicy::default(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytcap")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
languages = ["es", "en"]
fetch_timeout_secs = 5
request_timeout_secs = 20
bind = "0.0.0.0:9000"
default_format = "json"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.language_policy(), LanguagePolicy::new(["es", "en"]));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.bind(), "0.0.0.0:9000");
        assert_eq!(config.default_format.as_deref(), Some("json"));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.language_policy(), LanguagePolicy::default());
        assert_eq!(config.fetch_timeout(), DEFAULT_FETCH_TIMEOUT);
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.bind(), DEFAULT_BIND);
    }

    #[test]
    fn test_empty_language_list_uses_default() {
        let config: Config = toml::from_str("languages = []").unwrap();
        assert_eq!(config.language_policy(), LanguagePolicy::default());
    }
}
