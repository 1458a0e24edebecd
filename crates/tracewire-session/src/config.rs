use tracewire_frame::DEFAULT_MAX_FRAME_SIZE;

/// Service the consumer binds to on the daemon.
pub const CONSUMER_PORT_SERVICE: &str = "ConsumerPort";

/// Configuration for a tracing session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name of the remote service to bind.
    pub service_name: String,
    /// Largest frame the receive path will buffer. Bigger frames are fatal.
    pub max_frame_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_name: CONSUMER_PORT_SERVICE.to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
