//! Host configuration.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. The TOML file (`--config`, `PUBSUB_ADMIN_MCP_CONFIG`, or
//!    `<config dir>/pubsub-admin-mcp/config.toml`)
//! 3. Environment variables (`PUBSUB_ADMIN_MCP_*`)
//!
//! The remote operation timeout is fixed and not configurable.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_ENV: &str = "PUBSUB_ADMIN_MCP_CONFIG";
pub const LOG_LEVEL_ENV: &str = "PUBSUB_ADMIN_MCP_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "PUBSUB_ADMIN_MCP_LOG_FORMAT";
pub const SESSION_ENV: &str = "PUBSUB_ADMIN_MCP_SESSION";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub loopback: LoopbackConfig,
}

/// Identity reported to MCP clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `pubsub_admin_mcp=debug,warn`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid(format!(
                "unknown log format '{}', expected 'text' or 'json'",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session id used for calls that do not name one
    pub default_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_id: crate::DEFAULT_SESSION_ID.to_string(),
        }
    }
}

/// Credentials for the session the development host opens on its
/// in-process server.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    pub principal: String,
    pub password: String,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            principal: "admin".to_string(),
            password: "password".to_string(),
        }
    }
}

impl fmt::Debug for LoopbackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackConfig")
            .field("principal", &self.principal)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AdminConfig {
    /// `<config dir>/pubsub-admin-mcp/config.toml`, if the platform has a
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pubsub-admin-mcp").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the effective configuration from the process environment.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Like [`AdminConfig::load`], reading variables through `env`.
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_ENV).map(PathBuf::from));

        let mut config = match named {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(level) = env(LOG_LEVEL_ENV) {
            self.logging.level = level;
        }
        if let Some(format) = env(LOG_FORMAT_ENV) {
            self.logging.format = format.parse()?;
        }
        if let Some(session) = env(SESSION_ENV) {
            self.session.default_id = session;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.name.trim().is_empty() {
            return Err(ConfigError::Invalid("server.name must not be blank".to_string()));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be blank".to_string()));
        }
        if self.session.default_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "session.default_id must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// TOML rendering with the loopback password masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        shown.loopback.password = "********".to_string();
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nformat = \"json\"\n\n[session]\ndefault_id = \"ops\"").unwrap();

        let config = AdminConfig::load_with(Some(file.path()), env_of(&[])).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.session.default_id, "ops");
        assert_eq!(config.loopback.principal, "admin");
        assert_eq!(config.server.name, "pubsub-admin-mcp");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();

        let config = AdminConfig::load_with(
            Some(file.path()),
            env_of(&[(LOG_LEVEL_ENV, "debug"), (SESSION_ENV, "east")]),
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.session.default_id, "east");
    }

    #[test]
    fn test_config_path_from_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nname = \"edge-admin\"").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = AdminConfig::load_with(None, env_of(&[(CONFIG_ENV, path.as_str())])).unwrap();
        assert_eq!(config.server.name, "edge-admin");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let error = AdminConfig::load_with(Some(&missing), env_of(&[])).unwrap_err();
        assert!(matches!(error, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging\nlevel = ").unwrap();
        let error = AdminConfig::load_with(Some(file.path()), env_of(&[])).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AdminConfig::default();
        assert!(config
            .apply_env_overrides(env_of(&[(LOG_FORMAT_ENV, "xml")]))
            .is_err());

        config.session.default_id = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_redacted_toml_hides_password() {
        let mut config = AdminConfig::default();
        config.loopback.password = "s3cret".to_string();
        let text = config.to_redacted_toml().unwrap();
        assert!(!text.contains("s3cret"));
        assert!(text.contains("default_id = \"default\""));
        assert!(!format!("{:?}", config).contains("s3cret"));
    }
}
