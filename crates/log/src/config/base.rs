//! Core configuration types

use serde::{Deserialize, Serialize};

use super::{DisplayConfig, Fields, WriterConfig};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level filter (e.g., "info", "debug,sl_memory::collections=trace")
    pub level: String,

    /// Output format
    pub format: Format,

    /// Output writer configuration
    pub writer: WriterConfig,

    /// Display configuration
    pub display: DisplayConfig,

    /// Global fields attached to a root span
    pub fields: Fields,

    /// Enable runtime reload of the level filter
    pub reloadable: bool,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable with colors and indentation
    Pretty,
    /// Compact single-line output
    Compact,
    /// Structured JSON output
    Json,
    /// Logfmt-style key=value output (rendered through the compact formatter)
    Logfmt,
}

impl Format {
    /// Parse a format name, falling back to [`Format::Compact`]
    #[must_use]
    pub fn parse_lossy(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            "logfmt" => Self::Logfmt,
            _ => Self::Compact,
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Trace => write!(f, "trace"),
            Level::Debug => write!(f, "debug"),
            Level::Info => write!(f, "info"),
            Level::Warn => write!(f, "warn"),
            Level::Error => write!(f, "error"),
        }
    }
}

impl From<Level> for Config {
    fn from(level: Level) -> Self {
        Self {
            level: level.to_string(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            writer: WriterConfig::Stderr,
            display: DisplayConfig::default(),
            fields: Fields::default(),
            reloadable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"level":"debug","format":"json"}"#).expect("valid config");
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, Format::Json);
        assert!(!config.reloadable);
    }

    #[test]
    fn test_format_parse_lossy() {
        assert_eq!(Format::parse_lossy("PRETTY"), Format::Pretty);
        assert_eq!(Format::parse_lossy("logfmt"), Format::Logfmt);
        assert_eq!(Format::parse_lossy("nonsense"), Format::Compact);
    }

    #[test]
    fn test_level_into_config() {
        let config = Config::from(Level::Warn);
        assert_eq!(config.level, "warn");
    }
}
