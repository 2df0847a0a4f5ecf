//! Wire errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}
