use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use tracewire_transport::{ByteChannel, TransportError};
use tracing::{debug, trace};

use crate::error::{Result, SessionError};
use crate::listener::SessionListener;
use crate::session::TracingSession;

/// Default size of a single read from the transport.
pub const DEFAULT_READ_CHUNK: usize = 16 * 1024;

/// Outcome of one [`SessionReader::pump_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    /// This many bytes were forwarded to the session.
    Data(usize),
    /// The read timed out with nothing to forward.
    Idle,
    /// The transport reached end-of-stream, or the session is already done.
    Closed,
}

/// Read side of a session's transport.
///
/// Owns the reading half of the stream and feeds what it reads into a
/// [`TracingSession`]. Set a read timeout on the stream to get regular
/// [`Pump::Idle`] returns, e.g. to poll for stats or user input.
#[derive(Debug)]
pub struct SessionReader<R> {
    inner: R,
    scratch: Vec<u8>,
}

impl<R: Read> SessionReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, DEFAULT_READ_CHUNK)
    }

    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            scratch: vec![0; chunk_size.max(1)],
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Do one read and forward the result to `session`.
    ///
    /// End-of-stream and read errors are reported to the session through
    /// [`TracingSession::on_close`]; read errors are also returned.
    pub fn pump_once<C, L>(&mut self, session: &mut TracingSession<C, L>) -> Result<Pump>
    where
        C: ByteChannel,
        L: SessionListener,
    {
        if session.state().is_terminal() {
            return Ok(Pump::Closed);
        }

        loop {
            match self.inner.read(&mut self.scratch) {
                Ok(0) => {
                    debug!("transport reached end of stream");
                    session.on_close();
                    return Ok(Pump::Closed);
                }
                Ok(n) => {
                    trace!(bytes = n, "read from transport");
                    session.on_data(&self.scratch[..n]);
                    return Ok(Pump::Data(n));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
                    return Ok(Pump::Idle);
                }
                Err(err) => {
                    debug!(%err, "transport read failed");
                    session.on_close();
                    return Err(TransportError::Io(err).into());
                }
            }
        }
    }

    /// Pump until `done` holds, the session ends, or `timeout` elapses.
    pub fn run_until<C, L, F>(
        &mut self,
        session: &mut TracingSession<C, L>,
        timeout: Option<Duration>,
        mut done: F,
    ) -> Result<()>
    where
        C: ByteChannel,
        L: SessionListener,
        F: FnMut(&TracingSession<C, L>) -> bool,
    {
        let deadline = timeout.map(|timeout| (Instant::now() + timeout, timeout));
        loop {
            if done(session) || session.state().is_terminal() {
                return Ok(());
            }
            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    return Err(SessionError::Timeout(timeout));
                }
            }
            if self.pump_once(session)? == Pump::Closed {
                return Ok(());
            }
        }
    }

    /// Pump until the session terminates.
    pub fn run_to_completion<C, L>(&mut self, session: &mut TracingSession<C, L>) -> Result<()>
    where
        C: ByteChannel,
        L: SessionListener,
    {
        self.run_until(session, None, |_| false)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;
    use tracewire_frame::encode_to_bytes;
    use tracewire_frame::proto::{BindServiceReply, FrameBody, IpcFrame, MethodInfo};

    use super::*;
    use crate::listener::TraceCollector;
    use crate::session::SessionState;

    #[derive(Debug, Default)]
    struct SinkChannel {
        closed: bool,
    }

    impl ByteChannel for SinkChannel {
        fn write(&mut self, _bytes: &[u8]) -> tracewire_transport::Result<()> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            !self.closed
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    struct TimedOutReader;

    impl Read for TimedOutReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::ConnectionReset))
        }
    }

    fn bind_reply_bytes() -> Bytes {
        encode_to_bytes(&IpcFrame {
            request_id: 1,
            body: Some(FrameBody::BindServiceReply(BindServiceReply {
                success: true,
                service_id: 1,
                methods: vec![MethodInfo {
                    id: 1,
                    name: "EnableTracing".to_string(),
                }],
            })),
        })
        .unwrap()
    }

    fn session() -> TracingSession<SinkChannel, TraceCollector> {
        TracingSession::new(SinkChannel::default(), TraceCollector::default())
    }

    #[test]
    fn small_reads_still_bind() {
        let mut session = session();
        session.init_connection().unwrap();
        let mut reader = SessionReader::with_chunk_size(Cursor::new(bind_reply_bytes()), 3);

        reader
            .run_until(&mut session, None, TracingSession::is_bound)
            .unwrap();

        assert_eq!(session.state(), SessionState::Bound);
    }

    #[test]
    fn end_of_stream_closes_session() {
        let mut session = session();
        session.init_connection().unwrap();
        let mut reader = SessionReader::new(Cursor::new(Vec::<u8>::new()));

        assert_eq!(reader.pump_once(&mut session).unwrap(), Pump::Closed);
        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(session.listener().errors.len(), 1);
        assert_eq!(reader.pump_once(&mut session).unwrap(), Pump::Closed);
    }

    #[test]
    fn timeout_is_idle() {
        let mut session = session();
        let mut reader = SessionReader::new(TimedOutReader);

        assert_eq!(reader.pump_once(&mut session).unwrap(), Pump::Idle);
        assert_eq!(session.state(), SessionState::Unbound);
    }

    #[test]
    fn run_until_honours_deadline() {
        let mut session = session();
        session.init_connection().unwrap();
        let mut reader = SessionReader::new(TimedOutReader);

        let err = reader
            .run_until(&mut session, Some(Duration::from_millis(20)), TracingSession::is_bound)
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
    }

    #[test]
    fn read_error_is_returned_and_closes_session() {
        let mut session = session();
        let mut reader = SessionReader::new(BrokenReader);

        let err = reader.pump_once(&mut session).unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Io(_))));
        assert_eq!(session.state(), SessionState::Terminated);
    }
}
