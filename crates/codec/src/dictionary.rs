//! Dictionary encoding
//!
//! Layout: `[count: varint]` then, by ascending key,
//! `[key: varint][tag: u8][payload]`. Integers are little-endian at their
//! fixed width; text and bytes are `[len: varint][bytes]`.

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{Dictionary, DictionaryItem};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::error::{DecodeError, Result};
use crate::varint::{put_varint, varint_len, Reader};

/// Type tags
pub mod tag {
    pub const BYTES: u8 = 0x00;
    pub const TEXT: u8 = 0x01;
    pub const UINT8: u8 = 0x02;
    pub const UINT16: u8 = 0x03;
    pub const UINT32: u8 = 0x04;
    pub const INT8: u8 = 0x05;
    pub const INT16: u8 = 0x06;
    pub const INT32: u8 = 0x07;
}

/// Tag byte for an item.
pub fn tag_of(item: &DictionaryItem) -> u8 {
    match item {
        DictionaryItem::Bytes(_) => tag::BYTES,
        DictionaryItem::Text(_) => tag::TEXT,
        DictionaryItem::UInt8(_) => tag::UINT8,
        DictionaryItem::UInt16(_) => tag::UINT16,
        DictionaryItem::UInt32(_) => tag::UINT32,
        DictionaryItem::Int8(_) => tag::INT8,
        DictionaryItem::Int16(_) => tag::INT16,
        DictionaryItem::Int32(_) => tag::INT32,
    }
}

/// Exact number of bytes `encode` will produce.
pub fn encoded_len(dict: &Dictionary) -> usize {
    let items: usize = dict
        .iter()
        .map(|(key, item)| varint_len(*key as u64) + 1 + payload_len(item))
        .sum();
    varint_len(dict.len() as u64) + items
}

fn payload_len(item: &DictionaryItem) -> usize {
    match item {
        DictionaryItem::Text(s) => varint_len(s.len() as u64) + s.len(),
        DictionaryItem::Bytes(b) => varint_len(b.len() as u64) + b.len(),
        other => other.size(),
    }
}

/// Encode a dictionary.
pub fn encode(dict: &Dictionary) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(dict));
    encode_into(dict, &mut buf);
    buf.freeze()
}

/// Append the encoding of `dict` to `out`.
pub fn encode_into(dict: &Dictionary, out: &mut impl BufMut) {
    put_varint(out, dict.len() as u64);
    for (key, item) in dict {
        put_varint(out, *key as u64);
        out.put_u8(tag_of(item));
        match item {
            DictionaryItem::Text(s) => {
                put_varint(out, s.len() as u64);
                out.put_slice(s.as_bytes());
            }
            DictionaryItem::Bytes(b) => {
                put_varint(out, b.len() as u64);
                out.put_slice(b);
            }
            DictionaryItem::UInt8(v) => out.put_u8(*v),
            DictionaryItem::UInt16(v) => out.put_u16_le(*v),
            DictionaryItem::UInt32(v) => out.put_u32_le(*v),
            DictionaryItem::Int8(v) => out.put_i8(*v),
            DictionaryItem::Int16(v) => out.put_i16_le(*v),
            DictionaryItem::Int32(v) => out.put_i32_le(*v),
        }
    }
}

/// Decode a dictionary occupying all of `input`.
pub fn decode(input: &[u8]) -> Result<Dictionary> {
    let mut reader = Reader::new(input);
    let dict = decode_from(&mut reader)?;
    match reader.remaining() {
        0 => Ok(dict),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

pub(crate) fn decode_from(reader: &mut Reader<'_>) -> Result<Dictionary> {
    let count = reader.varint()?;
    let mut entries = BTreeMap::new();

    for _ in 0..count {
        let raw_key = reader.varint()?;
        let key = u32::try_from(raw_key).map_err(|_| DecodeError::KeyOutOfRange(raw_key))?;
        let item = decode_item(reader, key)?;

        match entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
            Entry::Occupied(_) => return Err(DecodeError::DuplicateKey(key)),
        }
    }

    Ok(entries.into_iter().collect())
}

fn decode_item(reader: &mut Reader<'_>, key: u32) -> Result<DictionaryItem> {
    let item = match reader.u8()? {
        tag::BYTES => DictionaryItem::Bytes(read_len_prefixed(reader)?.to_vec()),
        tag::TEXT => {
            let raw = read_len_prefixed(reader)?;
            let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8 { key })?;
            DictionaryItem::Text(text.to_owned())
        }
        tag::UINT8 => DictionaryItem::UInt8(reader.u8()?),
        tag::UINT16 => DictionaryItem::UInt16(u16::from_le_bytes(reader.take_array()?)),
        tag::UINT32 => DictionaryItem::UInt32(u32::from_le_bytes(reader.take_array()?)),
        tag::INT8 => DictionaryItem::Int8(i8::from_le_bytes(reader.take_array()?)),
        tag::INT16 => DictionaryItem::Int16(i16::from_le_bytes(reader.take_array()?)),
        tag::INT32 => DictionaryItem::Int32(i32::from_le_bytes(reader.take_array()?)),
        unknown => return Err(DecodeError::UnknownTag(unknown)),
    };
    Ok(item)
}

fn read_len_prefixed<'a>(reader: &mut Reader<'a>) -> Result<&'a [u8]> {
    let len = reader.varint()?;
    // A length that does not fit in usize can never be satisfied by the input.
    let len = usize::try_from(len).map_err(|_| DecodeError::truncated(usize::MAX, reader.remaining()))?;
    reader.take(len)
}
