#[cfg(unix)]
use std::io::{ErrorKind, Write};

#[cfg(unix)]
use tracing::debug;

use crate::error::Result;
#[cfg(unix)]
use crate::error::TransportError;
#[cfg(unix)]
use crate::traits::IpcStream;

/// Write side of a duplex byte stream, as seen by a tracing session.
///
/// Incoming data and closure are not part of this trait: the owner of the
/// read side forwards them to the session, so the session never has to
/// share the channel with a reader.
pub trait ByteChannel {
    /// Write all of `bytes` to the remote end.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Whether the channel can still carry data.
    fn is_open(&self) -> bool;

    /// Close the channel. Closing an already closed channel is a no-op.
    fn close(&mut self);
}

/// [`ByteChannel`] over the write half of an [`IpcStream`].
#[cfg(unix)]
#[derive(Debug)]
pub struct StreamChannel {
    stream: IpcStream,
    open: bool,
}

#[cfg(unix)]
impl StreamChannel {
    /// Wrap a connected stream.
    pub fn new(stream: IpcStream) -> Self {
        Self { stream, open: true }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &IpcStream {
        &self.stream
    }
}

#[cfg(unix)]
impl ByteChannel for StreamChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::Closed);
        }

        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.stream.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.stream.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(err) = self.stream.shutdown() {
            // The peer may already have gone away.
            debug!(%err, "shutdown on close failed");
        }
    }
}
