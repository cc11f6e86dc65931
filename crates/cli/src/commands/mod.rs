//! Command implementations.

mod frame;
mod info;
mod run;
mod validate;

pub use frame::{run_decode, run_encode};
pub use info::run_info;
pub use run::run_session;
pub use validate::run_validate;
