//! gRPC wire framing.
//!
//! Every unary gRPC message travels inside a single frame: a 1-byte
//! compression flag, a big-endian u32 payload length, then exactly that
//! many payload bytes. The bridge assumes one frame per unary call and
//! never concatenates frames inside one HTTP message.

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the gRPC frame header in bytes (flag + u32 length).
pub const GRPC_FRAME_HEADER_SIZE: usize = 5;

/// Compression flag for an uncompressed frame.
pub const GRPC_FH_DEFAULT: u8 = 0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("gRPC frame requires at least {GRPC_FRAME_HEADER_SIZE} bytes, got {0}")]
    TooSmall(usize),
}

/// Prepend the 5-byte gRPC frame header to `payload`.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(GRPC_FRAME_HEADER_SIZE + payload.len());
    buf.put_u8(GRPC_FH_DEFAULT);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Strip the 5-byte gRPC frame header and return the message payload.
pub fn decode_frame(buf: &[u8]) -> Result<Bytes, FrameError> {
    if buf.len() < GRPC_FRAME_HEADER_SIZE {
        return Err(FrameError::TooSmall(buf.len()));
    }
    Ok(Bytes::copy_from_slice(&buf[GRPC_FRAME_HEADER_SIZE..]))
}
