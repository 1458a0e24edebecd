use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use crate::error::Result;

/// A connected local stream to the daemon.
///
/// Reads and writes can be split across two handles with
/// [`IpcStream::try_clone`]. Shutting down either handle unblocks a reader
/// on the other, which is how a session's teardown ends its pump loop.
#[derive(Debug)]
pub struct IpcStream(UnixStream);

impl IpcStream {
    /// Wrap a connected Unix domain socket stream.
    pub fn from_unix(stream: UnixStream) -> Self {
        Self(stream)
    }

    /// Bounded blocking reads. `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.0.set_read_timeout(timeout)?)
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.0.set_write_timeout(timeout)?)
    }

    /// Second handle on the same connection (a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self(self.0.try_clone()?))
    }

    /// Shut down both directions. Affects every clone of this stream.
    pub fn shutdown(&self) -> Result<()> {
        match self.0.shutdown(Shutdown::Both) {
            // Already disconnected by the other side.
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => Ok(other?),
        }
    }
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
