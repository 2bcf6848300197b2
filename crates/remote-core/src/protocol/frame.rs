//! Length-prefixed framing shared by the TCP and RFCOMM transports.
//!
//! ```text
//! [length:4 BE][encrypted:1][payload:length-1]
//! ```
//!
//! `length` counts the flag byte plus the payload.  The flag is always written
//! as 0; this client has no decrypting peer to validate against, so an
//! inbound frame with a non-zero flag is rejected instead of guessed at.
//!
//! # Why framing is needed (for beginners)
//!
//! TCP and RFCOMM are *byte streams*: one `read()` may return half a packet,
//! or one and a half.  The length prefix tells the reader exactly how many
//! bytes belong to the current packet, so [`read_frame`] keeps reading until
//! it has all of them (or the stream ends).

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::codec::ProtocolError;

/// Size of the length prefix plus the encryption flag.
pub const FRAME_HEADER_LEN: usize = 5;

/// Default upper bound for the length field (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Value of the encryption flag for plaintext frames.
pub const FLAG_PLAINTEXT: u8 = 0;

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A socket-level I/O error.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was read.
    #[error("stream closed before a complete frame was read")]
    Closed,

    /// The declared length is above the configured maximum.
    #[error("frame length {len} exceeds the maximum of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// A length of zero cannot even cover the flag byte.
    #[error("frame length 0 does not cover the encryption flag")]
    EmptyFrame,

    /// The peer sent an encrypted frame.
    #[error("encrypted frames are not supported (flag 0x{0:02X})")]
    EncryptedPayload(u8),

    /// An operation that needs a live connection was attempted without one.
    #[error("not connected")]
    NotConnected,

    /// The connect attempt did not complete within the timeout.
    #[error("connecting to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// The connect attempt was refused or failed.
    #[error("connecting to {endpoint} failed: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The endpoint kind is not served by any configured connector.
    #[error("no connector available for {0}")]
    Unsupported(String),

    /// The frame payload could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Builds the complete frame bytes for `payload`.
///
/// # Errors
///
/// Returns [`TransportError::FrameTooLarge`] if the payload does not fit the
/// 32-bit length field.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let len = payload.len() + 1;
    let wire_len = u32::try_from(len).map_err(|_| TransportError::FrameTooLarge {
        len,
        max: u32::MAX as usize,
    })?;
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.extend_from_slice(&wire_len.to_be_bytes());
    buf.push(FLAG_PLAINTEXT);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Reads one frame and returns its payload (without header or flag).
///
/// Suspends until the whole frame has arrived or the stream closes.
///
/// # Errors
///
/// - [`TransportError::Closed`] on EOF, including EOF in the middle of a frame.
/// - [`TransportError::EmptyFrame`] / [`TransportError::FrameTooLarge`] for a
///   bad length field; the payload is never allocated in that case.
/// - [`TransportError::EncryptedPayload`] for a non-zero flag.
/// - [`TransportError::Io`] for other socket errors.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut len_buf = [0u8; 4];
    read_exact_or_closed(reader, &mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(TransportError::EmptyFrame);
    }
    if len > max_len {
        return Err(TransportError::FrameTooLarge { len, max: max_len });
    }

    let mut flag = [0u8; 1];
    read_exact_or_closed(reader, &mut flag).await?;
    if flag[0] != FLAG_PLAINTEXT {
        return Err(TransportError::EncryptedPayload(flag[0]));
    }

    let mut payload = vec![0u8; len - 1];
    read_exact_or_closed(reader, &mut payload).await?;
    Ok(payload)
}

/// Writes one frame carrying `payload` and flushes the stream.
///
/// The header and payload are written as one buffer through `write_all`, which
/// retries partial writes until everything is sent or the socket fails.
///
/// # Errors
///
/// Returns [`TransportError::Io`] if the socket fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_exact_or_closed<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(TransportError::Closed),
        Err(e) => Err(TransportError::Io(e)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_frame_length_includes_flag_byte() {
        let frame = encode_frame(&[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(frame, vec![0, 0, 0, 4, FLAG_PLAINTEXT, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_encode_empty_payload_still_carries_flag() {
        assert_eq!(encode_frame(&[]).unwrap(), vec![0, 0, 0, 1, 0]);
    }

    #[tokio::test]
    async fn test_write_frame_emits_header_and_payload() {
        // Arrange
        let mut stream = Builder::new().write(&[0, 0, 0, 3, 0, 1, 2]).build();

        // Act / Assert (the mock panics on unexpected bytes)
        write_frame(&mut stream, &[1, 2]).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_frame_reassembles_split_reads() {
        // Arrange: header and payload delivered in three separate chunks
        let mut stream = Builder::new()
            .read(&[0, 0])
            .read(&[0, 4, 0, 9])
            .read(&[8, 7])
            .build();

        // Act
        let payload = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await.unwrap();

        // Assert
        assert_eq!(payload, vec![9, 8, 7]);
    }

    #[tokio::test]
    async fn test_read_frame_round_trips_written_frame() {
        // Arrange
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let frame = encode_frame(&payload).unwrap();
        let mut stream = Builder::new().read(&frame).build();

        // Act
        let read = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await.unwrap();

        // Assert
        assert_eq!(read, payload);
    }

    #[tokio::test]
    async fn test_read_frame_at_exact_maximum_is_accepted() {
        let payload = vec![0x55; 15];
        let frame = encode_frame(&payload).unwrap();
        let mut stream = Builder::new().read(&frame).build();
        assert_eq!(read_frame(&mut stream, 16).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized_length_before_allocating() {
        let mut stream = Builder::new().read(&[0x7F, 0xFF, 0xFF, 0xFF]).build();
        let result = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(
            result,
            Err(TransportError::FrameTooLarge { len: 0x7FFF_FFFF, .. })
        ));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_zero_length() {
        let mut stream = Builder::new().read(&[0, 0, 0, 0]).build();
        let result = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(TransportError::EmptyFrame)));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_encrypted_flag() {
        let mut stream = Builder::new().read(&[0, 0, 0, 2, 1]).build();
        let result = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(TransportError::EncryptedPayload(1))));
    }

    #[tokio::test]
    async fn test_read_frame_eof_mid_payload_is_closed() {
        let mut stream = Builder::new().read(&[0, 0, 0, 10, 0, 1, 2]).build();
        let result = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_read_frame_clean_eof_is_closed() {
        let mut stream = Builder::new().build();
        let result = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_read_frame_propagates_io_error() {
        let mut stream = Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let result = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_duplex_write_then_read() {
        // Arrange
        let (mut a, mut b) = tokio::io::duplex(64);

        // Act
        write_frame(&mut a, b"hello").await.unwrap();
        let payload = read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await.unwrap();

        // Assert
        assert_eq!(payload, b"hello");
    }
}
