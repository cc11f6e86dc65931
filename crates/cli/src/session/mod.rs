//! Messaging session orchestration.

mod listener;
mod runner;
mod stats;

pub use runner::{Session, SessionConfig};
pub use stats::SessionStats;
