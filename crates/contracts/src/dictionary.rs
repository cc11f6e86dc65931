//! Dictionary - typed key/value payload exchanged with a watchapp
//!
//! Each value carries a fixed wire width (integers) or an explicit length
//! (text, bytes). Keys are kept sorted so the encoding is canonical.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// Per-tuple header size used by the watch-side dictionary layout
/// (key: 4, type: 1, length: 2).
pub const TUPLE_HEADER_SIZE: usize = 7;

/// One typed dictionary value.
///
/// The variant fixes the wire width: re-encoding never widens or narrows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DictionaryItem {
    /// UTF-8 text
    Text(String),
    #[serde(rename = "uint8")]
    UInt8(u8),
    #[serde(rename = "uint16")]
    UInt16(u16),
    #[serde(rename = "uint32")]
    UInt32(u32),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    /// Opaque bytes
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl DictionaryItem {
    /// Size of the value in bytes, as stored on the watch.
    pub fn size(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::UInt8(_) | Self::Int8(_) => 1,
            Self::UInt16(_) | Self::Int16(_) => 2,
            Self::UInt32(_) | Self::Int32(_) => 4,
            Self::Bytes(b) => b.len(),
        }
    }

    /// Short variant name used in logs and CLI output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::UInt8(_) => "uint8",
            Self::UInt16(_) => "uint16",
            Self::UInt32(_) => "uint32",
            Self::Int8(_) => "int8",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<&str> for DictionaryItem {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DictionaryItem {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for DictionaryItem {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for DictionaryItem {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_int!(
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
);

/// Ordered key -> typed value mapping.
///
/// Insertion order is irrelevant; iteration is always by ascending key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary(BTreeMap<u32, DictionaryItem>);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value for the key if any.
    pub fn insert(&mut self, key: u32, item: impl Into<DictionaryItem>) -> Option<DictionaryItem> {
        self.0.insert(key, item.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: u32, item: impl Into<DictionaryItem>) -> Self {
        self.insert(key, item);
        self
    }

    pub fn get(&self, key: u32) -> Option<&DictionaryItem> {
        self.0.get(&key)
    }

    pub fn remove(&mut self, key: u32) -> Option<DictionaryItem> {
        self.0.remove(&key)
    }

    pub fn contains_key(&self, key: u32) -> bool {
        self.0.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries by ascending key.
    pub fn iter(&self) -> btree_map::Iter<'_, u32, DictionaryItem> {
        self.0.iter()
    }

    /// Serialized size once the watch has unpacked the dictionary.
    ///
    /// One byte for the tuple count plus a 7-byte header per tuple. Compare
    /// against the watchapp's inbox size before sending.
    pub fn size_in_bytes(&self) -> usize {
        1 + self
            .0
            .values()
            .map(|item| TUPLE_HEADER_SIZE + item.size())
            .sum::<usize>()
    }
}

impl FromIterator<(u32, DictionaryItem)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (u32, DictionaryItem)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Dictionary {
    type Item = (u32, DictionaryItem);
    type IntoIter = btree_map::IntoIter<u32, DictionaryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a u32, &'a DictionaryItem);
    type IntoIter = btree_map::Iter<'a, u32, DictionaryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
