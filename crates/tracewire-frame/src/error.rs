/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame header declared more bytes than the decoder may buffer.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The frame body is not a valid protobuf message.
    #[error("malformed frame: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Encoding a message into the output buffer failed.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] prost::EncodeError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
