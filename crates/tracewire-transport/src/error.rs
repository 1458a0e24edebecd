use std::path::PathBuf;

/// Failures on the consumer socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Creating the listening socket failed (fake daemons and tests).
    #[error("cannot listen on {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The daemon's consumer socket could not be reached.
    #[error("cannot reach consumer socket {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(std::io::Error),

    /// Reading or writing the connected stream failed.
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// `sun_path` cannot hold the path.
    #[error("socket path is {len} bytes, limit is {max}: {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Written to after `close`, or the peer stopped accepting bytes.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
