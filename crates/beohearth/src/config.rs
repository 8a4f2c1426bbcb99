//! Configuration file parsing and structures.
//!
//! beohearth reads a single TOML file. Native integrations are statically
//! typed; each integration owns its section under `[integrations]`.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

use crate::engine::state::object_id;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP API; no server is started when the section is absent
    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(
    Debug,
    Default,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"beohearth::integrations" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Bang & Olufsen speakers, keyed by a free-form entry name
    #[serde(default)]
    pub bang_olufsen: BTreeMap<String, BangOlufsenDeviceConfig>,
}

fn default_websocket_port() -> u16 {
    9339
}

fn default_reconnect_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// A single Bang & Olufsen (Mozart platform) speaker
#[derive(Debug, Clone, Deserialize)]
pub struct BangOlufsenDeviceConfig {
    /// Hostname or IP address of the speaker
    pub host: String,

    /// Serial number; prefix of every entity unique id on this device
    pub serial: String,

    /// Display name; entity names are derived from it
    pub name: String,

    #[serde(default)]
    pub model: Option<String>,

    /// Whether the speaker is battery powered (adds battery sensors)
    #[serde(default)]
    pub battery: bool,

    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut serials = HashSet::new();
        for (entry, device) in &self.integrations.bang_olufsen {
            if device.host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "integrations.bang_olufsen.{}: host must not be empty",
                    entry
                )));
            }
            if device.serial.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "integrations.bang_olufsen.{}: serial must not be empty",
                    entry
                )));
            }
            // Serials differing only in case or `-`/`_` yield the same entity ids
            if !serials.insert(object_id(&device.serial)) {
                return Err(ConfigError::Invalid(format!(
                    "integrations.bang_olufsen.{}: serial {} is configured more than once",
                    entry, device.serial
                )));
            }
            if device.reconnect_interval_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "integrations.bang_olufsen.{}: reconnect_interval_secs must be at least 1",
                    entry
                )));
            }
            if device.request_timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "integrations.bang_olufsen.{}: request_timeout_secs must be at least 1",
                    entry
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [logging]
            level = "debug"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.api.is_none());
        assert!(config.integrations.bang_olufsen.is_empty());
    }

    #[test]
    fn test_parse_bang_olufsen_device() {
        let toml = r#"
            [api]
            port = 9000

            [integrations.bang_olufsen.living_room]
            host = "192.168.1.20"
            serial = "12345678"
            name = "Living Room"
            model = "Beosound Balance"
        "#;

        let config = Config::from_toml(toml).unwrap();
        let api = config.api.as_ref().unwrap();
        assert_eq!(api.listen, "127.0.0.1");
        assert_eq!(api.port, 9000);

        let device = config.integrations.bang_olufsen.get("living_room").unwrap();
        assert_eq!(device.serial, "12345678");
        assert_eq!(device.model.as_deref(), Some("Beosound Balance"));
        assert!(!device.battery);
        assert_eq!(device.websocket_port, 9339);
        assert_eq!(device.reconnect_interval_secs, 10);
        assert_eq!(device.request_timeout_secs, 10);
    }

    #[test]
    fn test_logging_overrides() {
        let toml = r#"
            [logging]
            level = "warn"

            [logging.overrides]
            "beohearth::integrations" = "trace"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(
            config.logging.overrides.get("beohearth::integrations"),
            Some(&LogLevel::Trace)
        );
        assert_eq!(LevelFilter::from(config.logging.level), LevelFilter::WARN);
    }

    #[test]
    fn test_rejects_empty_serial() {
        let toml = r#"
            [integrations.bang_olufsen.kitchen]
            host = "10.0.0.2"
            serial = ""
            name = "Kitchen"
        "#;

        let err = Config::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_duplicate_serial() {
        let toml = r#"
            [integrations.bang_olufsen.a]
            host = "10.0.0.2"
            serial = "1111"
            name = "A"

            [integrations.bang_olufsen.b]
            host = "10.0.0.3"
            serial = "1111"
            name = "B"
        "#;

        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    fn two_speakers(first: &str, second: &str) -> String {
        format!(
            r#"
            [integrations.bang_olufsen.a]
            host = "10.0.0.2"
            serial = "{}"
            name = "A"

            [integrations.bang_olufsen.b]
            host = "10.0.0.3"
            serial = "{}"
            name = "B"
            "#,
            first, second
        )
    }

    #[test]
    fn test_rejects_serials_differing_in_case() {
        let err = Config::from_toml(&two_speakers("AB12", "ab12")).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_serials_differing_in_separator() {
        let err = Config::from_toml(&two_speakers("12-34", "12_34")).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_accepts_distinct_serials() {
        let config = Config::from_toml(&two_speakers("1111", "2222")).unwrap();
        assert_eq!(config.integrations.bang_olufsen.len(), 2);
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let toml = r#"
            [integrations.bang_olufsen.kitchen]
            host = "10.0.0.2"
            serial = "1234"
            name = "Kitchen"
            reconnect_interval_secs = 0
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("reconnect_interval_secs"));

        let toml = r#"
            [integrations.bang_olufsen.kitchen]
            host = "10.0.0.2"
            serial = "1234"
            name = "Kitchen"
            request_timeout_secs = 0
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Config::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("beohearth.toml");
        std::fs::write(
            &path,
            r#"
            [integrations.bang_olufsen.bedroom]
            host = "speaker.local"
            serial = "87654321"
            name = "Bedroom"
            battery = true
            "#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        let device = config.integrations.bang_olufsen.get("bedroom").unwrap();
        assert!(device.battery);
    }
}
