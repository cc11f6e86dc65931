//! Error types for CLI operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Unknown app '{name}' (configured: {known})")]
    UnknownApp { name: String, known: String },

    #[error("No apps configured")]
    NoApps,

    #[error("Simulated watches did not connect within {secs}s")]
    ConnectTimeout { secs: u64 },

    #[error("Invalid hex input: {message}")]
    InvalidHex { message: String },

    #[error("Invalid dictionary JSON: {message}")]
    InvalidDictionary { message: String },
}

impl CliError {
    pub fn config_not_found(path: &std::path::Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn invalid_hex(message: impl Into<String>) -> Self {
        Self::InvalidHex {
            message: message.into(),
        }
    }
}
