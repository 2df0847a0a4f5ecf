//! Length-prefixed framing
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (LE)  | borsh payload (len bytes) |
//! +----------------+---------------------------+
//! ```

use borsh::{BorshDeserialize, BorshSerialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;

/// Upper bound on a single frame payload
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Serialize `msg` and write it as one frame
pub async fn write_frame<W, T>(stream: &mut W, msg: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: BorshSerialize,
{
    let payload = borsh::to_vec(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);

    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one frame and decode it
///
/// EOF while waiting for the length prefix means the peer hung up between
/// messages and is reported as [`WireError::ConnectionClosed`].
pub async fn read_frame<R, T>(stream: &mut R) -> Result<T, WireError>
where
    R: AsyncRead + Unpin,
    T: BorshDeserialize,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(WireError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;

    borsh::from_slice(&payload).map_err(|e| WireError::Decode(e.to_string()))
}
