use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use prost::Message;
use tokio::sync::oneshot;
use tracewire_frame::proto::{
    BindServiceReply, DisableTracingRequest, EnableTracingRequest, FreeBuffersRequest, FrameBody,
    GetTraceStatsRequest, InvokeMethodReply, IpcFrame, ReadBuffersRequest, TraceConfig, TraceStats,
};
use tracewire_frame::{encode_to_bytes, FrameDecoder};
use tracewire_transport::ByteChannel;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::listener::SessionListener;
use crate::method::{ConsumerMethod, MethodTable};
use crate::reassembler::PacketReassembler;
use crate::registry::RequestRegistry;
use crate::reply::{decode_reply, ConsumerReply};
use crate::stats::{BufferUsage, PendingStatsQueue, StatsWaiter};

/// Lifecycle of a [`TracingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing sent yet.
    Unbound,
    /// Bind request sent, waiting for the method table.
    Binding,
    /// Method table known, tracing not started.
    Bound,
    /// `EnableTracing` sent, the daemon is recording.
    Recording,
    /// `ReadBuffers` sent, trace data is streaming back.
    ReadingBack,
    /// Buffers freed and transport closed.
    Terminated,
    /// Torn down after a protocol violation or an unexpected disconnect.
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::Errored)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unbound => "unbound",
            SessionState::Binding => "binding",
            SessionState::Bound => "bound",
            SessionState::Recording => "recording",
            SessionState::ReadingBack => "reading back",
            SessionState::Terminated => "terminated",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Resolves once the remote service's method table has arrived.
///
/// Resolves to [`SessionError::Disconnected`] if the session is torn down
/// before that happens.
#[derive(Debug)]
pub struct BindWaiter {
    rx: oneshot::Receiver<()>,
}

impl BindWaiter {
    /// Check for completion without blocking.
    pub fn try_complete(&mut self) -> Option<Result<()>> {
        match self.rx.try_recv() {
            Ok(()) => Some(Ok(())),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(SessionError::Disconnected(
                "session closed before binding completed".to_string(),
            ))),
        }
    }
}

impl Future for BindWaiter {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.map_err(|_| {
                SessionError::Disconnected("session closed before binding completed".to_string())
            })
        })
    }
}

/// Client side of one recording against the daemon's consumer port.
///
/// The session writes requests to its [`ByteChannel`] and is driven by the
/// owner of the read side, which forwards incoming bytes to
/// [`on_data`](Self::on_data) and end-of-stream to
/// [`on_close`](Self::on_close). Every method takes `&mut self`, so all state
/// changes happen on one logical thread.
///
/// Happy path: [`init_connection`](Self::init_connection) →
/// [`start`](Self::start) → (daemon finishes or [`stop`](Self::stop)) →
/// automatic read-back → [`SessionListener::on_trace_data`] → teardown.
pub struct TracingSession<C, L> {
    channel: C,
    listener: L,
    config: SessionConfig,
    state: SessionState,
    decoder: FrameDecoder,
    methods: Option<MethodTable>,
    registry: RequestRegistry,
    reassembler: PacketReassembler,
    pending_stats: PendingStatsQueue,
    next_request_id: u64,
    bind_requested: bool,
    bind_tx: Option<oneshot::Sender<()>>,
}

impl<C: ByteChannel, L: SessionListener> TracingSession<C, L> {
    /// Create a session with default configuration.
    pub fn new(channel: C, listener: L) -> Self {
        Self::with_config(channel, listener, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config(channel: C, listener: L, config: SessionConfig) -> Self {
        Self {
            channel,
            listener,
            decoder: FrameDecoder::new(config.max_frame_size),
            config,
            state: SessionState::Unbound,
            methods: None,
            registry: RequestRegistry::default(),
            reassembler: PacketReassembler::default(),
            pending_stats: PendingStatsQueue::default(),
            next_request_id: 1,
            bind_requested: false,
            bind_tx: None,
        }
    }

    /// Send the bind request for the consumer service.
    ///
    /// Binding happens at most once per session; a second call fails with
    /// [`SessionError::AlreadyBound`].
    pub fn init_connection(&mut self) -> Result<BindWaiter> {
        if self.bind_requested {
            return Err(SessionError::AlreadyBound);
        }
        self.bind_requested = true;

        let request_id = self.next_id();
        let frame = IpcFrame::bind_service(request_id, self.config.service_name.clone());
        if let Err(err) = self.write_frame(&frame) {
            self.fail(&err);
            return Err(err);
        }
        self.state = SessionState::Binding;

        let (tx, rx) = oneshot::channel();
        self.bind_tx = Some(tx);
        Ok(BindWaiter { rx })
    }

    /// Start recording with `config`.
    ///
    /// Read-back begins on its own once the daemon answers `EnableTracing`,
    /// which it does when the configured duration elapses or after
    /// [`stop`](Self::stop).
    pub fn start(&mut self, config: TraceConfig) -> Result<()> {
        if self.methods.is_some() && self.state != SessionState::Bound {
            return Err(SessionError::InvalidState {
                operation: "start tracing",
                state: self.state,
            });
        }

        let duration_ms = config.duration_ms;
        let args = EnableTracingRequest {
            trace_config: Some(config),
        };
        if !self.invoke(ConsumerMethod::EnableTracing, args.encode_to_vec().into())? {
            return Ok(());
        }
        self.state = SessionState::Recording;

        let status = if duration_ms > 0 {
            format!("Recording in progress for {duration_ms} ms...")
        } else {
            "Recording in progress...".to_string()
        };
        self.listener.on_status(&status);
        Ok(())
    }

    /// Ask the daemon to stop recording early.
    pub fn stop(&mut self) -> Result<()> {
        self.invoke(
            ConsumerMethod::DisableTracing,
            DisableTracingRequest {}.encode_to_vec().into(),
        )?;
        Ok(())
    }

    /// Tear the session down regardless of its state.
    ///
    /// Pending stats resolve empty, the daemon is asked to free its buffers,
    /// and the transport is closed. Calling it again does nothing.
    pub fn cancel(&mut self) {
        self.teardown(true);
        if !self.state.is_terminal() {
            info!("session cancelled");
            self.state = SessionState::Terminated;
        }
    }

    /// Request buffer statistics.
    ///
    /// Resolves to empty stats, without sending anything, if the transport
    /// is closed. If the remote build has no `GetTraceStats`, the listener
    /// is told and the waiter resolves empty; the session keeps going.
    pub fn get_trace_stats(&mut self) -> StatsWaiter {
        if !self.channel.is_open() {
            return StatsWaiter::resolved(TraceStats::default());
        }

        let args = GetTraceStatsRequest {}.encode_to_vec();
        match self.invoke(ConsumerMethod::GetTraceStats, args.into()) {
            Ok(true) => self.pending_stats.push(),
            Ok(false) => StatsWaiter::resolved(TraceStats::default()),
            Err(err @ SessionError::MethodNotSupported(_)) => {
                warn!(%err, "trace stats unavailable");
                self.listener.on_error(&err.to_string());
                StatsWaiter::resolved(TraceStats::default())
            }
            // Write failures have already torn the session down.
            Err(_) => StatsWaiter::resolved(TraceStats::default()),
        }
    }

    /// Occupancy of the fullest daemon-side buffer, as a fraction.
    ///
    /// See [`buffer_usage`](crate::stats::buffer_usage) for the exact rules.
    /// Resolves to 0.0 immediately if the transport is closed.
    pub fn get_trace_buffer_usage(&mut self) -> BufferUsage {
        if !self.channel.is_open() {
            return BufferUsage::ready(0.0);
        }
        BufferUsage::waiting(self.get_trace_stats())
    }

    /// Feed bytes received from the transport.
    pub fn on_data(&mut self, chunk: &[u8]) {
        if self.state.is_terminal() {
            debug!(len = chunk.len(), state = %self.state, "dropping data after teardown");
            return;
        }

        let mut rest = chunk;
        loop {
            match self.decoder.next_frame(&mut rest) {
                Ok(Some(frame)) => {
                    self.handle_frame(frame);
                    if self.state.is_terminal() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(err) => {
                    self.fail(&SessionError::from(err));
                    return;
                }
            }
        }
    }

    /// The transport was closed by the remote end.
    pub fn on_close(&mut self) {
        match self.state {
            SessionState::Terminated | SessionState::Errored => {
                self.pending_stats.resolve_all_empty();
            }
            SessionState::Binding | SessionState::Recording | SessionState::ReadingBack => {
                let err = SessionError::Disconnected(format!("connection closed while {}", self.state));
                warn!(%err, "transport closed with work outstanding");
                self.teardown(false);
                self.state = SessionState::Errored;
                self.listener.on_error(&err.to_string());
            }
            SessionState::Unbound | SessionState::Bound => {
                debug!(state = %self.state, "transport closed");
                self.teardown(false);
                self.state = SessionState::Terminated;
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.methods.is_some()
    }

    /// The method table, once bound.
    pub fn method_table(&self) -> Option<&MethodTable> {
        self.methods.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Requests still waiting for their final reply.
    pub fn outstanding_requests(&self) -> usize {
        self.registry.len()
    }

    /// Stats calls still waiting for a reply.
    pub fn pending_stats(&self) -> usize {
        self.pending_stats.len()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Consume the session and return its channel and listener.
    pub fn into_parts(self) -> (C, L) {
        (self.channel, self.listener)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Send `method`, tearing the session down if the write fails.
    ///
    /// Returns `Ok(false)` when the transport is already closed and nothing
    /// was sent.
    fn invoke(&mut self, method: ConsumerMethod, args: Bytes) -> Result<bool> {
        match self.send_invoke(method, args) {
            Err(err) if !matches!(err, SessionError::MethodNotSupported(_)) => {
                self.fail(&err);
                Err(err)
            }
            other => other,
        }
    }

    fn send_invoke(&mut self, method: ConsumerMethod, args: Bytes) -> Result<bool> {
        let table = self
            .methods
            .as_ref()
            .ok_or(SessionError::MethodNotSupported(method.name()))?;
        let method_id = table
            .id_of(method)
            .ok_or(SessionError::MethodNotSupported(method.name()))?;
        let service_id = table.service_id();

        if !self.channel.is_open() {
            debug!(%method, "transport closed; not sending");
            return Ok(false);
        }

        let request_id = self.next_id();
        debug!(%method, request_id, method_id, "invoking method");
        self.write_frame(&IpcFrame::invoke_method(request_id, service_id, method_id, args))?;
        self.registry.register(request_id, method);
        Ok(true)
    }

    fn write_frame(&mut self, frame: &IpcFrame) -> Result<()> {
        let wire = encode_to_bytes(frame)?;
        self.channel.write(&wire)?;
        Ok(())
    }

    fn handle_frame(&mut self, frame: IpcFrame) {
        let kind = frame.body_name();
        debug!(request_id = frame.request_id, kind, "received frame");
        match frame.body {
            Some(FrameBody::BindServiceReply(reply)) => self.handle_bind_reply(reply),
            Some(FrameBody::InvokeMethodReply(reply)) => {
                self.handle_invoke_reply(frame.request_id, reply)
            }
            _ => self.fail(&SessionError::UnrecognizedFrame(kind)),
        }
    }

    fn handle_bind_reply(&mut self, reply: BindServiceReply) {
        if self.methods.is_some() {
            warn!("ignoring bind reply for an already bound session");
            return;
        }
        let Some(table) = MethodTable::from_reply(&reply) else {
            warn!(
                success = reply.success,
                service_id = reply.service_id,
                methods = reply.methods.len(),
                "ignoring malformed bind reply"
            );
            return;
        };

        info!(
            service_id = table.service_id(),
            methods = table.len(),
            "bound to {}",
            self.config.service_name
        );
        self.methods = Some(table);
        if self.state == SessionState::Binding {
            self.state = SessionState::Bound;
        }
        if let Some(tx) = self.bind_tx.take() {
            let _ = tx.send(());
        }
    }

    fn handle_invoke_reply(&mut self, request_id: u64, reply: InvokeMethodReply) {
        let has_more = reply.has_more;
        let Some(method) = self.registry.resolve(request_id, has_more) else {
            self.fail(&SessionError::UnknownRequestId(request_id));
            return;
        };
        if !reply.success {
            warn!(%method, request_id, "remote reported failure; ignoring reply");
            if method == ConsumerMethod::GetTraceStats && !has_more {
                self.pending_stats.resolve_next(TraceStats::default());
            }
            return;
        }

        let decoded = match decode_reply(method, reply.reply_proto) {
            Ok(decoded) => decoded,
            Err(source) => {
                self.fail(&SessionError::UndecodableReply { method, source });
                return;
            }
        };

        match decoded {
            ConsumerReply::ReadBuffers(response) => {
                let completed = self.reassembler.push_slices(response.slices);
                debug!(
                    completed,
                    total = self.reassembler.packets(),
                    has_more,
                    "read buffers chunk"
                );
                if !has_more {
                    self.finish_trace();
                }
            }
            ConsumerReply::EnableTracing(response) => {
                if let Some(message) = response.error.filter(|message| !message.is_empty()) {
                    warn!(%message, "daemon reported a tracing error");
                    self.listener.on_status(&format!("Tracing failed: {message}"));
                }
                info!("tracing finished; reading back buffers");
                self.state = SessionState::ReadingBack;
                let args = ReadBuffersRequest {}.encode_to_vec();
                if let Err(err) = self.invoke(ConsumerMethod::ReadBuffers, args.into()) {
                    self.fail(&err);
                }
            }
            ConsumerReply::GetTraceStats(stats) => {
                if !self.pending_stats.resolve_next(stats) {
                    debug!(request_id, "stats reply with nobody waiting");
                }
            }
            // Teardown and stop need no follow-up.
            ConsumerReply::DisableTracing | ConsumerReply::FreeBuffers => {}
        }
    }

    fn finish_trace(&mut self) {
        let packets = self.reassembler.packets();
        let trace = self.reassembler.finish();
        info!(bytes = trace.len(), packets, "trace read back");
        self.listener.on_trace_data(trace);
        self.teardown(true);
        self.state = SessionState::Terminated;
    }

    fn fail(&mut self, err: &SessionError) {
        if self.state.is_terminal() {
            debug!(%err, "error after teardown");
            return;
        }
        error!(%err, state = %self.state, "tearing down session");
        self.teardown(true);
        self.state = SessionState::Errored;
        self.listener.on_error(&err.to_string());
    }

    /// Release everything the session holds. Safe to call repeatedly.
    fn teardown(&mut self, free_buffers: bool) {
        let resolved = self.pending_stats.resolve_all_empty();
        if resolved > 0 {
            debug!(resolved, "resolved pending stats as empty");
        }
        self.bind_tx = None;

        if self.channel.is_open() {
            let can_free = self
                .methods
                .as_ref()
                .is_some_and(|table| table.supports(ConsumerMethod::FreeBuffers));
            if free_buffers && can_free {
                let args = FreeBuffersRequest {}.encode_to_vec();
                if let Err(err) = self.send_invoke(ConsumerMethod::FreeBuffers, args.into()) {
                    debug!(%err, "free buffers failed during teardown");
                }
            }
            self.channel.close();
        }

        self.registry.clear();
        self.decoder.reset();
        self.reassembler = PacketReassembler::default();
    }
}

impl<C, L> fmt::Debug for TracingSession<C, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingSession")
            .field("state", &self.state)
            .field("service", &self.config.service_name)
            .field("outstanding_requests", &self.registry.len())
            .field("pending_stats", &self.pending_stats.len())
            .finish()
    }
}
