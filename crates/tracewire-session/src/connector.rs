use std::path::Path;
use std::time::Duration;

use tracewire_transport::{IpcStream, StreamChannel, UnixDomainSocket};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::listener::SessionListener;
use crate::pump::SessionReader;
use crate::session::TracingSession;

/// How long [`connect`] waits for the bind reply.
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout on the reading half, so pumping loops wake up regularly.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A bound session and the reader that drives it.
#[derive(Debug)]
pub struct Connection<L> {
    pub session: TracingSession<StreamChannel, L>,
    pub reader: SessionReader<IpcStream>,
}

/// Connect to the consumer socket at `path` and bind the consumer service.
pub fn connect<L: SessionListener>(path: impl AsRef<Path>, listener: L) -> Result<Connection<L>> {
    connect_with_config(path, listener, SessionConfig::default(), DEFAULT_BIND_TIMEOUT)
}

/// Connect with explicit configuration.
///
/// Blocks until the bind reply arrives, the daemon hangs up, or
/// `bind_timeout` elapses.
pub fn connect_with_config<L: SessionListener>(
    path: impl AsRef<Path>,
    listener: L,
    config: SessionConfig,
    bind_timeout: Duration,
) -> Result<Connection<L>> {
    let path = path.as_ref();
    let stream = UnixDomainSocket::connect(path)?;
    let reader_stream = stream.try_clone()?;
    reader_stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;
    debug!(path = %path.display(), "connected to consumer socket");

    let mut session = TracingSession::with_config(StreamChannel::new(stream), listener, config);
    let mut reader = SessionReader::new(reader_stream);

    let mut waiter = session.init_connection()?;
    reader.run_until(&mut session, Some(bind_timeout), TracingSession::is_bound)?;
    match waiter.try_complete() {
        Some(Ok(())) => Ok(Connection { session, reader }),
        Some(Err(err)) => Err(err),
        None => Err(SessionError::Disconnected(format!(
            "session {} before binding completed",
            session.state()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::path::PathBuf;
    use std::thread;

    use bytes::{Bytes, BytesMut};
    use prost::Message;
    use tracewire_frame::proto::{
        BindServiceReply, EnableTracingResponse, FrameBody, IpcFrame, MethodInfo,
        ReadBuffersResponse, Slice, TraceConfig,
    };
    use tracewire_frame::{decode_frame, encode_to_bytes, DEFAULT_MAX_FRAME_SIZE};

    use super::*;
    use crate::listener::TraceCollector;
    use crate::session::SessionState;

    fn make_sock_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "twc-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("consumer.sock")
    }

    /// Minimal daemon side: reads frames and answers them in order.
    struct FakeDaemon {
        stream: IpcStream,
        buf: BytesMut,
    }

    impl FakeDaemon {
        fn recv(&mut self) -> Option<IpcFrame> {
            loop {
                if let Some(frame) =
                    decode_frame(&mut self.buf, DEFAULT_MAX_FRAME_SIZE).expect("valid frame")
                {
                    return Some(frame);
                }
                let mut chunk = [0u8; 1024];
                let n = self.stream.read(&mut chunk).expect("daemon read");
                if n == 0 {
                    return None;
                }
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }

        fn send(&mut self, frame: &IpcFrame) {
            let wire = encode_to_bytes(frame).expect("encodable frame");
            self.stream.write_all(&wire).expect("daemon write");
        }

        fn reply(&mut self, request_id: u64, has_more: bool, message: impl Message) {
            self.send(&IpcFrame::invoke_reply(
                request_id,
                true,
                has_more,
                message.encode_to_vec(),
            ));
        }
    }

    fn method_id(frame: &IpcFrame) -> u32 {
        match &frame.body {
            Some(FrameBody::InvokeMethod(invoke)) => invoke.method_id,
            other => panic!("expected invoke_method, got {other:?}"),
        }
    }

    #[test]
    fn records_against_fake_daemon() {
        let sock_path = make_sock_path("record");
        let socket = UnixDomainSocket::bind(&sock_path).expect("socket should bind");

        let daemon = thread::spawn(move || {
            let mut daemon = FakeDaemon {
                stream: socket.accept().expect("daemon should accept"),
                buf: BytesMut::new(),
            };

            let bind = daemon.recv().expect("bind request");
            assert_eq!(bind.body_name(), "bind_service");
            daemon.send(&IpcFrame {
                request_id: bind.request_id,
                body: Some(FrameBody::BindServiceReply(BindServiceReply {
                    success: true,
                    service_id: 3,
                    methods: ["EnableTracing", "FreeBuffers", "ReadBuffers"]
                        .iter()
                        .zip(1u32..)
                        .map(|(name, id)| MethodInfo {
                            id,
                            name: name.to_string(),
                        })
                        .collect(),
                })),
            });

            let enable = daemon.recv().expect("enable tracing");
            assert_eq!(method_id(&enable), 1);
            daemon.reply(enable.request_id, false, EnableTracingResponse::default());

            let read = daemon.recv().expect("read buffers");
            assert_eq!(method_id(&read), 3);
            daemon.reply(
                read.request_id,
                false,
                ReadBuffersResponse {
                    slices: vec![Slice {
                        data: Bytes::from_static(b"pkt"),
                        last_slice_for_packet: true,
                    }],
                },
            );

            let free = daemon.recv().expect("free buffers");
            assert_eq!(method_id(&free), 2);
            assert!(daemon.recv().is_none(), "client should hang up");
        });

        let Connection {
            mut session,
            mut reader,
        } = connect(&sock_path, TraceCollector::default()).expect("client should bind");
        assert_eq!(session.state(), SessionState::Bound);

        session
            .start(TraceConfig::single_buffer(64, 0, &[]))
            .expect("start should succeed");
        reader
            .run_to_completion(&mut session)
            .expect("session should complete");

        assert_eq!(session.state(), SessionState::Terminated);
        let trace = session.listener_mut().take_trace().expect("trace delivered");
        assert_eq!(trace.as_ref(), b"\x0A\x03pkt");

        daemon.join().expect("daemon thread should complete");
        let _ = std::fs::remove_dir_all(sock_path.parent().expect("socket dir"));
    }

    #[test]
    fn daemon_hanging_up_during_bind_fails() {
        let sock_path = make_sock_path("hangup");
        let socket = UnixDomainSocket::bind(&sock_path).expect("socket should bind");

        let daemon = thread::spawn(move || {
            let mut daemon = FakeDaemon {
                stream: socket.accept().expect("daemon should accept"),
                buf: BytesMut::new(),
            };
            daemon.recv().expect("bind request");
        });

        let err = connect(&sock_path, TraceCollector::default()).unwrap_err();
        assert!(matches!(err, SessionError::Disconnected(_)));

        daemon.join().expect("daemon thread should complete");
        let _ = std::fs::remove_dir_all(sock_path.parent().expect("socket dir"));
    }

    #[test]
    fn silent_daemon_times_out() {
        let sock_path = make_sock_path("silent");
        let socket = UnixDomainSocket::bind(&sock_path).expect("socket should bind");

        let daemon = thread::spawn(move || {
            let mut stream = socket.accept().expect("daemon should accept");
            let mut sink = Vec::new();
            let _ = stream.read_to_end(&mut sink);
        });

        let err = connect_with_config(
            &sock_path,
            TraceCollector::default(),
            SessionConfig::default(),
            Duration::from_millis(300),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));

        daemon.join().expect("daemon thread should complete");
        let _ = std::fs::remove_dir_all(sock_path.parent().expect("socket dir"));
    }
}
