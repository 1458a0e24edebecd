use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;

use crate::error::{FrameError, Result};
use crate::proto::IpcFrame;

/// Frame header: a 4-byte little-endian payload length.
pub const HEADER_SIZE: usize = 4;

/// Default decode capacity: 128 KiB, the daemon's IPC buffer size.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 128 * 1024;

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────────────┐
/// │ Length (4B)  │ IpcFrame protobuf            │
/// │ LE u32       │ (Length bytes)               │
/// └──────────────┴──────────────────────────────┘
/// ```
///
/// Only the `u32` range of the header is enforced; the receiver's capacity
/// is the receiver's problem.
pub fn encode_frame(frame: &IpcFrame, dst: &mut BytesMut) -> Result<()> {
    let len = frame.encoded_len();
    if len > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + len);
    dst.put_u32_le(len as u32);
    frame.encode(dst)?;
    Ok(())
}

/// Encode a frame into a fresh buffer.
pub fn encode_to_bytes(frame: &IpcFrame) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_frame(frame, &mut dst)?;
    Ok(dst.freeze())
}

/// Parse one frame body (the bytes after the length header).
pub fn parse_frame(body: Bytes) -> Result<IpcFrame> {
    Ok(IpcFrame::decode(body)?)
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<IpcFrame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let len = read_header(&src[..HEADER_SIZE]);
    if len > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    if src.len() < HEADER_SIZE + len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(len).freeze();
    parse_frame(body).map(Some)
}

pub(crate) fn read_header(header: &[u8]) -> usize {
    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&header[..HEADER_SIZE]);
    u32::from_le_bytes(raw) as usize
}
