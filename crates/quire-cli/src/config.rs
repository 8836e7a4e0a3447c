//! CLI configuration loading.
//!
//! Resolution order:
//! 1. `--config <path>` if given (must exist)
//! 2. `~/.config/quire/config.toml` if present
//! 3. `QUIRE_*` environment variables, then built-in defaults
//!
//! ```toml
//! [api]
//! base_url = "https://${NOTES_HOST}"
//! timeout_secs = 30
//!
//! [autosave]
//! debounce_ms = 1000
//! indicator_ms = 1000
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use quire_gateway::{substitute_env_vars, ApiConfig, ConfigError, ConfigResult};
use quire_store::AutosaveConfig;

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuireConfig {
    pub api: ApiConfig,
    pub autosave: AutosaveConfig,
}

impl QuireConfig {
    /// `~/.config/quire/config.toml` (platform config dir).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("quire").join("config.toml"))
    }

    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            autosave: AutosaveConfig::from_env(),
        }
    }

    /// Parse a TOML config file, expanding `${VAR}` references first.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(&substitute_env_vars(raw))?;
        Ok(config)
    }

    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading config file");
                Self::from_file(&path)
            }
            _ => Ok(Self::from_env()),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.api.validate()?;
        if self.autosave.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "autosave debounce_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = QuireConfig::from_toml("").unwrap();
        assert_eq!(config, QuireConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config = QuireConfig::from_toml(
            r#"
            [api]
            base_url = "https://notes.example"

            [autosave]
            debounce_ms = 2000
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://notes.example");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.autosave.debounce_ms, 2000);
        assert_eq!(config.autosave.indicator_ms, 1000);
    }

    #[test]
    fn test_from_file_substitutes_env_vars() {
        std::env::set_var("QUIRE_CLI_TEST_HOST", "notes.internal");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nbase_url = \"https://${{QUIRE_CLI_TEST_HOST}}\"").unwrap();

        let config = QuireConfig::from_file(file.path()).unwrap();
        std::env::remove_var("QUIRE_CLI_TEST_HOST");

        assert_eq!(config.api.base_url, "https://notes.internal");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = QuireConfig::load(Some(&missing)).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }

    #[test]
    fn test_validate_rejects_zero_debounce() {
        let mut config = QuireConfig::default();
        config.autosave.debounce_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_checks_api_section() {
        let config = QuireConfig {
            api: ApiConfig::default().with_base_url("localhost:3000"),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
