//! AppId - 128-bit watch application identifier

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Size of an [`AppId`] on the wire.
pub const APP_ID_LEN: usize = 16;

/// UUID naming a logical watch application.
///
/// Shared contract between the host and the watch binary: the same UUID is
/// compiled into the watchapp and used by the host to address it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(Uuid);

impl AppId {
    /// Wrap an existing UUID.
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a random id (handy for tests and demos).
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build from the 16 wire bytes (big-endian UUID layout).
    pub const fn from_bytes(bytes: [u8; APP_ID_LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Wire representation.
    pub fn as_bytes(&self) -> &[u8; APP_ID_LEN] {
        self.0.as_bytes()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for AppId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for AppId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl fmt::Debug for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppId({})", self.0.hyphenated())
    }
}
