//! Bank wire contract
//!
//! One request/response shape serves both customer→branch and
//! branch→branch traffic; the two are told apart only by [`SourceKind`].
//! Messages travel as length-prefixed borsh frames over a TCP stream.

pub mod error;
pub mod frame;
pub mod types;

pub use error::WireError;
pub use frame::{read_frame, write_frame, MAX_FRAME_LEN};
pub use types::*;
