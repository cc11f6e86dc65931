//! Message frame: `[AppId: 16][dictionary]`

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{AppId, Dictionary, APP_ID_LEN};

use crate::dictionary::{decode_from, encode_into, encoded_len};
use crate::error::{DecodeError, Result};
use crate::varint::Reader;

/// Fixed header size (the app UUID).
pub const FRAME_HEADER_SIZE: usize = APP_ID_LEN;

/// A decoded message frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub app: AppId,
    pub dictionary: Dictionary,
}

impl Frame {
    pub fn new(app: AppId, dictionary: Dictionary) -> Self {
        Self { app, dictionary }
    }

    pub fn encode(&self) -> Bytes {
        encode_frame(self.app, &self.dictionary)
    }
}

/// Encode a dictionary addressed to `app`.
pub fn encode_frame(app: AppId, dict: &Dictionary) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + encoded_len(dict));
    buf.put_slice(app.as_bytes());
    encode_into(dict, &mut buf);
    buf.freeze()
}

/// Decode a frame occupying all of `input`.
pub fn decode_frame(input: &[u8]) -> Result<Frame> {
    let mut reader = Reader::new(input);
    let app = AppId::from_bytes(reader.take_array::<FRAME_HEADER_SIZE>()?);
    let dictionary = decode_from(&mut reader)?;
    match reader.remaining() {
        0 => Ok(Frame { app, dictionary }),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

/// Read only the app id, without decoding the dictionary.
pub fn peek_app(input: &[u8]) -> Result<AppId> {
    Reader::new(input)
        .take_array::<FRAME_HEADER_SIZE>()
        .map(AppId::from_bytes)
}
