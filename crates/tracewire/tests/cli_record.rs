#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::Command;
use std::thread;

use bytes::{Bytes, BytesMut};
use prost::Message;
use tracewire_frame::proto::{
    BindServiceReply, BufferStats, EnableTracingResponse, FrameBody, GetTraceStatsResponse,
    IpcFrame, MethodInfo, ReadBuffersResponse, Slice, TraceStats,
};
use tracewire_frame::{decode_frame, encode_to_bytes, DEFAULT_MAX_FRAME_SIZE};
use tracewire_transport::{IpcStream, UnixDomainSocket};

const ENABLE_TRACING: u32 = 1;
const DISABLE_TRACING: u32 = 2;
const FREE_BUFFERS: u32 = 3;
const READ_BUFFERS: u32 = 4;
const GET_TRACE_STATS: u32 = 5;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/twcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// Daemon end of one consumer connection.
struct FakeDaemon {
    stream: IpcStream,
    buf: BytesMut,
}

impl FakeDaemon {
    fn accept(socket: &UnixDomainSocket) -> Self {
        Self {
            stream: socket.accept().expect("daemon should accept"),
            buf: BytesMut::new(),
        }
    }

    fn recv(&mut self) -> Option<IpcFrame> {
        loop {
            if let Some(frame) =
                decode_frame(&mut self.buf, DEFAULT_MAX_FRAME_SIZE).expect("valid frame")
            {
                return Some(frame);
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).ok()?;
            if n == 0 {
                return None;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn send(&mut self, frame: &IpcFrame) {
        let wire = encode_to_bytes(frame).expect("encodable frame");
        // The client may already have hung up.
        let _ = self.stream.write_all(&wire);
    }

    fn reply(&mut self, request_id: u64, has_more: bool, message: impl Message) {
        self.send(&IpcFrame::invoke_reply(
            request_id,
            true,
            has_more,
            message.encode_to_vec(),
        ));
    }

    fn bind(&mut self) {
        let bind = self.recv().expect("bind request");
        assert_eq!(bind.body_name(), "bind_service");
        let methods = [
            ("EnableTracing", ENABLE_TRACING),
            ("DisableTracing", DISABLE_TRACING),
            ("FreeBuffers", FREE_BUFFERS),
            ("ReadBuffers", READ_BUFFERS),
            ("GetTraceStats", GET_TRACE_STATS),
        ]
        .into_iter()
        .map(|(name, id)| MethodInfo {
            id,
            name: name.to_string(),
        })
        .collect();
        self.send(&IpcFrame {
            request_id: bind.request_id,
            body: Some(FrameBody::BindServiceReply(BindServiceReply {
                success: true,
                service_id: 1,
                methods,
            })),
        });
    }
}

fn invoked(frame: &IpcFrame) -> u32 {
    match &frame.body {
        Some(FrameBody::InvokeMethod(invoke)) => invoke.method_id,
        other => panic!("expected invoke_method, got {other:?}"),
    }
}

fn slice(data: &'static [u8], last: bool) -> Slice {
    Slice {
        data: Bytes::from_static(data),
        last_slice_for_packet: last,
    }
}

/// Serves one recording and returns the method ids it saw, in order.
fn serve_recording(socket: UnixDomainSocket) -> Vec<u32> {
    let mut daemon = FakeDaemon::accept(&socket);
    daemon.bind();

    let mut seen = Vec::new();
    while let Some(frame) = daemon.recv() {
        let method = invoked(&frame);
        seen.push(method);
        match method {
            ENABLE_TRACING => {
                daemon.reply(frame.request_id, false, EnableTracingResponse::default());
            }
            GET_TRACE_STATS => daemon.reply(
                frame.request_id,
                false,
                GetTraceStatsResponse {
                    trace_stats: Some(TraceStats {
                        buffer_stats: vec![BufferStats {
                            bytes_written: Some(16),
                            buffer_size: Some(64),
                        }],
                    }),
                },
            ),
            READ_BUFFERS => {
                daemon.reply(
                    frame.request_id,
                    true,
                    ReadBuffersResponse {
                        slices: vec![slice(b"A", false), slice(b"B", true), slice(b"C", false)],
                    },
                );
                daemon.reply(
                    frame.request_id,
                    false,
                    ReadBuffersResponse {
                        slices: vec![slice(b"D", false), slice(b"E", true)],
                    },
                );
            }
            _ => {}
        }
    }
    seen
}

#[test]
fn record_against_fake_daemon_writes_trace() {
    let dir = unique_temp_dir("record");
    let sock_path = dir.join("consumer.sock");
    let out_path = dir.join("trace.pftrace");
    let socket = UnixDomainSocket::bind(&sock_path).expect("socket should bind");
    let daemon = thread::spawn(move || serve_recording(socket));

    let output = Command::new(env!("CARGO_BIN_EXE_tracewire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("record")
        .arg(&sock_path)
        .arg("--out")
        .arg(&out_path)
        .arg("--duration")
        .arg("200ms")
        .arg("--data-source")
        .arg("linux.ftrace")
        .output()
        .expect("record should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("record-summary.schema.json"));
    assert!(stdout.contains("\"trace_bytes\":9"));
    assert!(stdout.contains("\"duration_ms\":200"));

    let trace = std::fs::read(&out_path).expect("trace file should exist");
    assert_eq!(trace, b"\x0A\x02AB\x0A\x03CDE");

    let seen = daemon.join().expect("daemon thread should complete");
    assert_eq!(seen.first(), Some(&ENABLE_TRACING));
    assert!(seen.contains(&READ_BUFFERS));
    assert_eq!(seen.last(), Some(&FREE_BUFFERS));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn protocol_violation_fails_recording() {
    let dir = unique_temp_dir("violation");
    let sock_path = dir.join("consumer.sock");
    let out_path = dir.join("trace.pftrace");
    let socket = UnixDomainSocket::bind(&sock_path).expect("socket should bind");

    let daemon = thread::spawn(move || {
        let mut daemon = FakeDaemon::accept(&socket);
        daemon.bind();
        let enable = daemon.recv().expect("enable tracing");
        assert_eq!(invoked(&enable), ENABLE_TRACING);
        daemon.reply(enable.request_id + 100, false, EnableTracingResponse::default());
        while daemon.recv().is_some() {}
    });

    let output = Command::new(env!("CARGO_BIN_EXE_tracewire"))
        .arg("--log-level")
        .arg("off")
        .arg("record")
        .arg(&sock_path)
        .arg("--out")
        .arg(&out_path)
        .output()
        .expect("record should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown request id"), "stderr: {stderr}");
    assert!(!out_path.exists());

    daemon.join().expect("daemon thread should complete");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn record_missing_socket_is_transport_error() {
    let dir = unique_temp_dir("missing");
    let output = Command::new(env!("CARGO_BIN_EXE_tracewire"))
        .arg("record")
        .arg(dir.join("absent.sock"))
        .arg("--out")
        .arg(dir.join("trace.pftrace"))
        .output()
        .expect("record should run");

    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_tracewire"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("tracewire {}", env!("CARGO_PKG_VERSION")));
}
