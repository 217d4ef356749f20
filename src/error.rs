//! Error types for configuration and administrative operations

use std::fmt;

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while validating, toggling or reloading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Telegram credentials are missing, blank or still the shipped placeholder
    InvalidCredentials(String),

    /// The requested feature is not one of the toggleable enable flags
    UnknownFeature(String),

    /// The switch word could not be read as on or off
    InvalidSwitch(String),

    /// A key holds a value of the wrong type
    InvalidValue { key: String, expected: &'static str },

    /// The configuration document could not be parsed
    Parse(String),

    /// The persistence collaborator failed
    Store(String),

    /// I/O error (file access, etc.)
    IoError(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCredentials(msg) => {
                write!(f, "invalid telegram configuration: {}", msg)
            }
            ConfigError::UnknownFeature(name) => write!(f, "unknown feature: {}", name),
            ConfigError::InvalidSwitch(word) => {
                write!(f, "expected 'on' or 'off', got '{}'", word)
            }
            ConfigError::InvalidValue { key, expected } => {
                write!(f, "configuration key {} must be a {}", key, expected)
            }
            ConfigError::Parse(msg) => write!(f, "invalid configuration document: {}", msg),
            ConfigError::Store(msg) => write!(f, "configuration store error: {}", msg),
            ConfigError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
