//! Process configuration, read from the environment.

use std::time::Duration;

use thiserror::Error;

use crate::llm::GeminiSettings;
use crate::llm::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GOOGLE_API_KEY is not set")]
    MissingApiKey,

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Config {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingApiKey`] when `GOOGLE_API_KEY` is unset or blank;
    /// [`ConfigError::Invalid`] when `GEMINI_TIMEOUT_SECS` is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let api_key = var("GOOGLE_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let timeout = match var("GEMINI_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "GEMINI_TIMEOUT_SECS",
                        value: raw,
                    });
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            addr: var("KISAN_SATHI_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_owned()),
            api_key,
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: var("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            timeout,
        })
    }

    pub fn gemini(&self) -> GeminiSettings {
        GeminiSettings {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("GOOGLE_API_KEY", "k")]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:5000");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn missing_or_blank_key() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingApiKey)));
        assert!(matches!(
            load(&[("GOOGLE_API_KEY", "   ")]),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("GOOGLE_API_KEY", " secret "),
            ("KISAN_SATHI_ADDR", "127.0.0.1:8080"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("GEMINI_BASE_URL", "http://localhost:9000/v1beta"),
            ("GEMINI_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.addr, "127.0.0.1:8080");

        let gemini = config.gemini();
        assert_eq!(gemini.model, "gemini-2.0-flash");
        assert_eq!(gemini.base_url, "http://localhost:9000/v1beta");
        assert_eq!(gemini.timeout, Duration::from_secs(30));
    }

    #[test]
    fn bad_timeout() {
        for raw in ["soon", "0", "-5"] {
            let err = load(&[("GOOGLE_API_KEY", "k"), ("GEMINI_TIMEOUT_SECS", raw)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: "GEMINI_TIMEOUT_SECS", .. }));
        }
    }

    #[test]
    fn blank_optional_uses_default() {
        let config = load(&[("GOOGLE_API_KEY", "k"), ("GEMINI_MODEL", "")]).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
    }
}
