use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{parse_frame, read_header, DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::proto::IpcFrame;

/// Incremental decoder for length-prefixed frames arriving in arbitrary chunks.
///
/// Frames are pulled one at a time with [`FrameDecoder::next_frame`], which
/// consumes from the front of the caller's chunk. Whatever is left of a
/// partial header or body is kept in a working buffer that never holds more
/// than `max_frame_size` bytes: a header declaring a larger frame fails
/// with [`FrameError::FrameTooLarge`] before anything is copied.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    frame_len: Option<usize>,
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameDecoder {
    /// Create a decoder with the given working buffer capacity.
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_frame_size.max(HEADER_SIZE)),
            frame_len: None,
            max_frame_size,
        }
    }

    /// Capacity of the working buffer.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Bytes held over from previous chunks.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Consume bytes from `src` until one frame is complete.
    ///
    /// Returns `Ok(None)` once `src` is exhausted without completing a frame;
    /// the partial data stays buffered for the next chunk. Call repeatedly
    /// until it returns `None` to drain pipelined frames.
    pub fn next_frame(&mut self, src: &mut &[u8]) -> Result<Option<IpcFrame>> {
        loop {
            match self.frame_len {
                None => {
                    self.fill(src, HEADER_SIZE);
                    if self.buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }
                    let len = read_header(&self.buf);
                    self.buf.clear();
                    if len > self.max_frame_size {
                        debug!(size = len, max = self.max_frame_size, "rejecting oversized frame");
                        return Err(FrameError::FrameTooLarge {
                            size: len,
                            max: self.max_frame_size,
                        });
                    }
                    self.frame_len = Some(len);
                }
                Some(len) => {
                    self.fill(src, len);
                    if self.buf.len() < len {
                        return Ok(None);
                    }
                    self.frame_len = None;
                    trace!(len, "frame complete");
                    let body = self.buf.split().freeze();
                    return parse_frame(body).map(Some);
                }
            }
        }
    }

    /// Decode every frame completed by `chunk`.
    pub fn decode_chunk(&mut self, mut chunk: &[u8]) -> Result<Vec<IpcFrame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame(&mut chunk)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Drop any partially buffered frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.frame_len = None;
    }

    fn fill(&mut self, src: &mut &[u8], target: usize) {
        let take = target.saturating_sub(self.buf.len()).min(src.len());
        let (head, rest) = src.split_at(take);
        self.buf.extend_from_slice(head);
        *src = rest;
    }
}
