//! WatchId - paired watch identifier

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifier of one paired watch.
///
/// Opaque to the protocol, which only compares ids by value. Every pending
/// delivery and result carries one, so clones share the allocation.
///
/// ```
/// use contracts::WatchId;
///
/// let id: WatchId = "pebble-time-1".into();
/// assert_eq!(id, "pebble-time-1");
/// assert_eq!(id.as_str(), "pebble-time-1");
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(Arc<str>);

impl WatchId {
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hash and Eq of Arc<str> match str, so maps keyed by WatchId accept &str lookups
impl Borrow<str> for WatchId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WatchId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WatchId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl fmt::Debug for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WatchId({:?})", self.0)
    }
}

impl PartialEq<str> for WatchId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for WatchId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Serialize for WatchId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WatchId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}
