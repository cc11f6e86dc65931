//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All protocol crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - Every (send, target) pair ends in exactly one [`ReceiveResult`]
//! - Transport callbacks arrive as [`TransportEvent`] values, never as direct calls

mod app_id;
mod blueprint;
mod dictionary;
mod error;
mod listener;
mod responder;
mod result;
mod transport;
mod watch;
mod watch_id;

pub use app_id::{AppId, APP_ID_LEN};
pub use blueprint::*;
pub use dictionary::{Dictionary, DictionaryItem, TUPLE_HEADER_SIZE};
pub use error::*;
pub use listener::WatchListener;
pub use responder::{RespondError, Responder};
pub use result::*;
pub use transport::*;
pub use watch::{ConnectedWatch, FirmwareVersion};
pub use watch_id::WatchId;
