//! # Codec
//!
//! Wire encoding of dictionaries and message frames.
//!
//! Frame: `[AppId: 16][count: varint][items...]`,
//! item: `[key: varint][tag: u8][payload]`.
//!
//! `decode(encode(d)) == d` for every dictionary; decoding never panics and
//! never reads past the input.
//!
//! ```
//! use contracts::{AppId, Dictionary};
//!
//! let app = AppId::random();
//! let dict = Dictionary::new().with(1, "hi").with(2, 7u16);
//!
//! let bytes = codec::encode_frame(app, &dict);
//! let frame = codec::decode_frame(&bytes).unwrap();
//! assert_eq!(frame.app, app);
//! assert_eq!(frame.dictionary, dict);
//! ```

mod dictionary;
mod error;
mod frame;
mod varint;

pub use dictionary::{decode, encode, encode_into, encoded_len, tag, tag_of};
pub use error::{DecodeError, Result};
pub use frame::{decode_frame, encode_frame, peek_app, Frame, FRAME_HEADER_SIZE};
pub use varint::{put_varint, varint_len, MAX_VARINT_LEN};
