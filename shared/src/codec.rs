//! Length-prefixed bincode framing shared by client and server
//!
//! Every message on a connection is a 4-byte big-endian length followed by
//! the bincode payload. Readers reject lengths above [`MAX_FRAME_LEN`]
//! before allocating, so a hostile prefix cannot exhaust memory.

use crate::{ClientEvent, ProtocolError, MAX_FRAME_LEN};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Serializes a message into a complete frame, length prefix included.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = bincode::serialize(msg).map_err(ProtocolError::Encode)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Deserializes a frame payload (without its length prefix).
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    bincode::deserialize(payload).map_err(ProtocolError::Decode)
}

/// Decodes an inbound client intent and checks it before it reaches game state.
pub fn decode_client_event(payload: &[u8]) -> Result<ClientEvent, ProtocolError> {
    let event: ClientEvent = decode(payload)?;
    event.validate()?;
    Ok(event)
}

pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next frame payload.
///
/// Returns `Ok(None)` when the peer closed the connection before starting a
/// new frame. End of stream inside a payload is an I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
