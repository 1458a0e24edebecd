//! Length-prefixed protobuf framing for the tracing daemon's consumer IPC.
//!
//! Every message on the socket is:
//! - A 4-byte little-endian payload length
//! - An [`IpcFrame`] protobuf of exactly that length
//!
//! [`FrameDecoder`] rebuilds frames from arbitrarily split reads while
//! keeping its working buffer within a fixed bound.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod proto;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    decode_frame, encode_frame, encode_to_bytes, parse_frame, DEFAULT_MAX_FRAME_SIZE,
    HEADER_SIZE,
};
pub use decoder::FrameDecoder;
pub use error::{FrameError, Result};
pub use proto::{FrameBody, IpcFrame};

#[cfg(feature = "async")]
pub use tokio_codec::IpcFrameCodec;
