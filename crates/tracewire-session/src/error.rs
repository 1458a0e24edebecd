use std::time::Duration;

use crate::method::ConsumerMethod;
use crate::session::SessionState;

/// Errors that can occur in session operations.
///
/// `UnknownRequestId`, `UndecodableReply`, `UnrecognizedFrame` and `Frame`
/// are protocol violations: the session tears itself down and reports them
/// through the listener. The rest are returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] tracewire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] tracewire_frame::FrameError),

    /// The method is absent from the bound method table (or nothing is bound yet).
    #[error("method {0} not supported by the target")]
    MethodNotSupported(&'static str),

    /// `init_connection` was called on a session that already started binding.
    #[error("session already bound")]
    AlreadyBound,

    /// The operation is not legal in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A reply referenced a request id that was never sent.
    #[error("unknown request id: {0}")]
    UnknownRequestId(u64),

    /// A reply payload did not decode as the method's reply message.
    #[error("unable to decode {method} reply: {source}")]
    UndecodableReply {
        method: ConsumerMethod,
        source: prost::DecodeError,
    },

    /// A frame body this client never expects to receive.
    #[error("unrecognized frame message: {0}")]
    UnrecognizedFrame(&'static str),

    /// The remote closed the connection.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// A blocking wait ran out of time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl SessionError {
    /// Whether this error tears down the session when it occurs on the receive path.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            SessionError::Frame(_)
                | SessionError::UnknownRequestId(_)
                | SessionError::UndecodableReply { .. }
                | SessionError::UnrecognizedFrame(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
