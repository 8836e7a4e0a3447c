//! Remote API configuration.
//!
//! The `[api]` section of the quire config file deserializes into
//! [`ApiConfig`]; without a file, [`ApiConfig::from_env`] reads `QUIRE_*`
//! variables and falls back to [`quire_core::defaults`].
//!
//! String values may reference environment variables as `${VAR_NAME}`;
//! call [`substitute_env_vars`] on the raw file contents before parsing.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for quire_core::Error {
    fn from(e: ConfigError) -> Self {
        quire_core::Error::Config(e.to_string())
    }
}

/// Connection settings for the notes server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the server, without the `/api` suffix.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: quire_core::defaults::API_URL.to_string(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    fn default_timeout_secs() -> u64 {
        quire_core::defaults::HTTP_TIMEOUT_SECS
    }

    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUIRE_API_URL` | `http://localhost:3000` | Server base URL |
    /// | `QUIRE_HTTP_TIMEOUT_SECS` | `30` | Per-request timeout |
    pub fn from_env() -> Self {
        let base_url = env::var("QUIRE_API_URL")
            .unwrap_or_else(|_| quire_core::defaults::API_URL.to_string());

        let timeout_secs = env::var("QUIRE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(quire_core::defaults::HTTP_TIMEOUT_SECS);

        debug!(base_url = %base_url, timeout_secs, "API config from environment");

        Self {
            base_url,
            timeout_secs,
        }
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "api base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "api base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Substitute environment variables in the format `${VAR_NAME}`.
///
/// Unknown variables are left as-is so validation can point at them.
pub fn substitute_env_vars(content: &str) -> String {
    let re = match regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, quire_core::defaults::API_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let config = ApiConfig::default().with_base_url("");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = ApiConfig::default().with_base_url("ftp://notes.example");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must start with http"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ApiConfig::default().with_timeout_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_error_converts_to_core_error() {
        let err: quire_core::Error = ConfigError::Validation("bad".into()).into();
        assert!(matches!(err, quire_core::Error::Config(_)));
    }

    #[test]
    fn test_deserialize_applies_timeout_default() {
        let config: ApiConfig =
            serde_json::from_str(r#"{"base_url":"https://notes.example"}"#).unwrap();
        assert_eq!(config.timeout_secs, quire_core::defaults::HTTP_TIMEOUT_SECS);
    }

    #[test]
    fn test_env_var_substitution_with_value() {
        env::set_var("QUIRE_TEST_SUBST_HOST", "notes.internal");
        let result = substitute_env_vars("base_url = \"https://${QUIRE_TEST_SUBST_HOST}\"");
        env::remove_var("QUIRE_TEST_SUBST_HOST");

        assert_eq!(result, "base_url = \"https://notes.internal\"");
    }

    #[test]
    fn test_env_var_substitution_missing() {
        let content = "base_url = \"${QUIRE_NONEXISTENT_TEST_VAR_12345}\"";
        assert_eq!(substitute_env_vars(content), content);
    }
}
