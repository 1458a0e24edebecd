//! Consumer client for the tracing daemon's IPC protocol.
//!
//! tracewire connects to the daemon's consumer socket, starts a recording,
//! streams the trace back when it ends and writes it out as a trace file.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix socket transport and the `ByteChannel` write seam
//! - [`frame`]: length-prefixed protobuf framing and wire messages
//! - [`session`]: the tracing session state machine and its helpers

/// Re-export transport types.
pub mod transport {
    pub use tracewire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use tracewire_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use tracewire_session::*;
}
