use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, DEFAULT_MAX_FRAME_SIZE};
use crate::error::FrameError;
use crate::proto::IpcFrame;

/// `tokio_util` codec for driving the consumer protocol over async streams.
///
/// Applies the same frame size bound as [`FrameDecoder`](crate::FrameDecoder).
#[derive(Debug, Clone)]
pub struct IpcFrameCodec {
    max_frame_size: usize,
}

impl IpcFrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for IpcFrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for IpcFrameCodec {
    type Item = IpcFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, self.max_frame_size)
    }
}

impl Encoder<IpcFrame> for IpcFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: IpcFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    #[test]
    fn encoder_output_decodes() {
        let mut codec = IpcFrameCodec::default();
        let mut buf = BytesMut::new();
        let frame = IpcFrame::invoke_method(3, 1, 4, &b"cfg"[..]);

        codec.encode(frame.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(frame));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decoder_waits_for_full_frame() {
        let mut codec = IpcFrameCodec::default();
        let mut wire = BytesMut::new();
        codec
            .encode(IpcFrame::bind_service(1, "ConsumerPort"), &mut wire)
            .unwrap();

        let mut buf = wire.split_to(3);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.unsplit(wire);
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn decoder_enforces_bound() {
        let mut codec = IpcFrameCodec::new(8);
        let mut buf = BytesMut::new();
        buf.put_u32_le(9);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 9, max: 8 }));
    }
}
