//! Codec 错误类型

use thiserror::Error;

/// Decode failure. Decoding is all-or-nothing: any error discards the
/// whole dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than the layout requires
    #[error("truncated input: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes required to read the next field
        needed: usize,
        /// Bytes remaining
        have: usize,
    },

    /// Type tag not in the tag table
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    /// Same key appeared twice
    #[error("duplicate key {0}")]
    DuplicateKey(u32),

    /// Text payload is not valid UTF-8
    #[error("invalid utf-8 in text value for key {key}")]
    InvalidUtf8 { key: u32 },

    /// Varint longer than 10 bytes or wider than 64 bits
    #[error("varint overflow")]
    VarintOverflow,

    /// Key does not fit in 32 bits
    #[error("key {0} out of range")]
    KeyOutOfRange(u64),

    /// Input continued after the last declared item
    #[error("{0} trailing bytes after dictionary")]
    TrailingBytes(usize),
}

impl DecodeError {
    pub(crate) fn truncated(needed: usize, have: usize) -> Self {
        Self::Truncated { needed, have }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

/// Codec Result 类型别名
pub type Result<T> = std::result::Result<T, DecodeError>;
