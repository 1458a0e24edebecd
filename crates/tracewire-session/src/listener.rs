use bytes::Bytes;

/// Receives the outcome of a tracing session.
pub trait SessionListener {
    /// Progress text suitable for showing to a user.
    fn on_status(&mut self, message: &str);

    /// The finished trace. Called once, when read-back completes.
    fn on_trace_data(&mut self, trace: Bytes);

    /// A failure. Fatal conditions are reported once, after teardown.
    fn on_error(&mut self, message: &str);
}

impl<T: SessionListener + ?Sized> SessionListener for &mut T {
    fn on_status(&mut self, message: &str) {
        (**self).on_status(message);
    }

    fn on_trace_data(&mut self, trace: Bytes) {
        (**self).on_trace_data(trace);
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message);
    }
}

/// Listener that keeps everything it is told.
#[derive(Debug, Default)]
pub struct TraceCollector {
    pub statuses: Vec<String>,
    pub trace: Option<Bytes>,
    pub errors: Vec<String>,
}

impl TraceCollector {
    /// Take the trace, if one was delivered.
    pub fn take_trace(&mut self) -> Option<Bytes> {
        self.trace.take()
    }
}

impl SessionListener for TraceCollector {
    fn on_status(&mut self, message: &str) {
        self.statuses.push(message.to_string());
    }

    fn on_trace_data(&mut self, trace: Bytes) {
        self.trace = Some(trace);
    }

    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}
