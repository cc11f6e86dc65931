//! Registry error types

use contracts::WatchId;
use thiserror::Error;

/// Device registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Watch is not in the connected set
    #[error("watch '{0}' is not connected")]
    NotConnected(WatchId),
}
