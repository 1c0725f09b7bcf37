//! Length-prefixed framing for the reliable stream
//!
//! Format: [4 bytes little-endian length][bincode payload]

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::constants::net::{MAX_DATAGRAM_SIZE, MAX_MESSAGE_SIZE};
use crate::net::protocol::{self, ProtocolError};

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

fn closed_on_eof(e: io::Error) -> FramingError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FramingError::ConnectionClosed
    } else {
        FramingError::Io(e)
    }
}

/// Read one raw frame
pub async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(closed_on_eof)?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }

    let mut buf = vec![0u8; len];
    if len > 0 {
        stream.read_exact(&mut buf).await.map_err(closed_on_eof)?;
    }
    Ok(buf)
}

/// Write one raw frame and flush
pub async fn write_frame<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), FramingError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
    }
    stream.write_all(&(data.len() as u32).to_le_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Read and decode one message
pub async fn read_message<R, T>(stream: &mut R) -> Result<T, FramingError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let frame = read_frame(stream).await?;
    Ok(protocol::decode(&frame)?)
}

/// Encode and write one message
pub async fn write_message<W, T>(stream: &mut W, message: &T) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = protocol::encode(message)?;
    write_frame(stream, &bytes).await
}

/// Inputs arrive as unreliable datagrams which must fit a single packet
pub fn validate_datagram_size(data: &[u8]) -> Result<(), FramingError> {
    if data.len() > MAX_DATAGRAM_SIZE {
        Err(FramingError::MessageTooLarge(data.len(), MAX_DATAGRAM_SIZE))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{ClientMessage, PlayerInput, ServerMessage};
    use std::io::Cursor;

    #[tokio::test]
    async fn test_client_message_over_stream() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, &ClientMessage::Join { nickname: "Ace".into() })
            .await
            .unwrap();
        write_message(&mut buffer, &ClientMessage::Shoot).await.unwrap();

        let mut cursor = Cursor::new(buffer);
        let first: ClientMessage = read_message(&mut cursor).await.unwrap();
        assert!(matches!(first, ClientMessage::Join { nickname } if nickname == "Ace"));
        let second: ClientMessage = read_message(&mut cursor).await.unwrap();
        assert!(matches!(second, ClientMessage::Shoot));

        let end = read_message::<_, ClientMessage>(&mut cursor).await;
        assert!(matches!(end, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_length_prefix_is_little_endian() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"tank").await.unwrap();
        assert_eq!(&buffer[..4], &[4, 0, 0, 0]);
        assert_eq!(&buffer[4..], b"tank");
    }

    #[tokio::test]
    async fn test_empty_frame() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"").await.unwrap();
        let mut cursor = Cursor::new(buffer);
        assert!(read_frame(&mut cursor).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_frames_rejected() {
        let mut buffer = Vec::new();
        let result = write_frame(&mut buffer, &vec![0u8; MAX_MESSAGE_SIZE + 1]).await;
        assert!(matches!(result, Err(FramingError::MessageTooLarge(_, _))));

        let mut cursor = Cursor::new(((MAX_MESSAGE_SIZE + 1) as u32).to_le_bytes().to_vec());
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::MessageTooLarge(_, _))));
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&10u32.to_le_bytes());
        buffer.extend_from_slice(&[1, 2, 3]);

        let mut cursor = Cursor::new(buffer);
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_garbage_payload_is_protocol_error() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &[0xff, 0xff, 0xff, 0xff, 0x01]).await.unwrap();
        let mut cursor = Cursor::new(buffer);
        let result = read_message::<_, ServerMessage>(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::Protocol(_))));
    }

    #[test]
    fn test_input_fits_datagram() {
        let input = ClientMessage::Input(PlayerInput::default());
        let bytes = protocol::encode(&input).unwrap();
        assert!(validate_datagram_size(&bytes).is_ok());
        assert!(validate_datagram_size(&vec![0u8; MAX_DATAGRAM_SIZE + 1]).is_err());
    }
}
