//! Host errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Invalid protocol config: {message}")]
    InvalidProtocol { message: String },
}

impl HostError {
    pub fn invalid_protocol(message: impl Into<String>) -> Self {
        Self::InvalidProtocol {
            message: message.into(),
        }
    }
}
