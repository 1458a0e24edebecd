//! Consumer-side tracing session for the daemon's IPC protocol.
//!
//! A [`TracingSession`] binds the consumer service, starts a recording,
//! reads the trace back when recording ends and frees the daemon's buffers.
//! It only writes; whoever owns the read side feeds it incoming bytes, which
//! [`SessionReader`] does for blocking streams.

#[cfg(unix)]
pub mod connector;
pub mod config;
pub mod error;
pub mod listener;
pub mod method;
pub mod pump;
pub mod reassembler;
pub mod registry;
pub mod reply;
pub mod session;
pub mod stats;

pub use config::{SessionConfig, CONSUMER_PORT_SERVICE};
#[cfg(unix)]
pub use connector::{connect, connect_with_config, Connection};
pub use error::{Result, SessionError};
pub use listener::{SessionListener, TraceCollector};
pub use method::{ConsumerMethod, MethodTable};
pub use pump::{Pump, SessionReader};
pub use reassembler::PacketReassembler;
pub use registry::RequestRegistry;
pub use reply::{decode_reply, ConsumerReply};
pub use session::{BindWaiter, SessionState, TracingSession};
pub use stats::{buffer_usage, BufferUsage, PendingStatsQueue, StatsWaiter};
