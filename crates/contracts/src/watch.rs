//! Connected watch metadata, reported by the transport on connect.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WatchId;

/// Firmware version reported by a watch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Free-form suffix (e.g. "beta3")
    #[serde(default)]
    pub tag: String,
}

impl FirmwareVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            tag: String::new(),
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.tag.is_empty() {
            write!(f, "-{}", self.tag)?;
        }
        Ok(())
    }
}

/// A watch currently paired and connected to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedWatch {
    pub id: WatchId,
    /// Human readable name
    pub name: String,
    /// Hardware platform (e.g. "basalt", "diorite")
    pub platform: String,
    /// Hardware revision
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub firmware: FirmwareVersion,
}

impl ConnectedWatch {
    /// Minimal metadata, used by simulated watches.
    pub fn new(id: impl Into<WatchId>, name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            platform: platform.into(),
            revision: String::new(),
            firmware: FirmwareVersion::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_display() {
        assert_eq!(FirmwareVersion::new(4, 3, 0).to_string(), "v4.3.0");

        let tagged = FirmwareVersion {
            tag: "beta3".into(),
            ..FirmwareVersion::new(4, 4, 1)
        };
        assert_eq!(tagged.to_string(), "v4.4.1-beta3");
    }
}
