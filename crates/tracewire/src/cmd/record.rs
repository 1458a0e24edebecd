use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::FutureExt;
use tracewire_frame::proto::TraceConfig;
use tracewire_frame::HEADER_SIZE;
use tracewire_session::{
    connect_with_config, BufferUsage, Connection, SessionConfig, SessionListener, SessionState,
    TraceCollector,
};
use tracewire_transport::UnixDomainSocket;
use tracing::{error, info, warn};

use crate::cmd::RecordArgs;
use crate::exit::{io_error, session_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_record_summary, OutputFormat, RecordSummary};

pub fn run(args: RecordArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    let stats_interval = parse_duration(&args.stats_interval)?;
    let bind_timeout = parse_duration(&args.bind_timeout)?;
    let duration_ms = u32::try_from(duration.as_millis())
        .map_err(|_| CliError::new(USAGE, format!("duration too long: {}", args.duration)))?;
    if args.max_frame_size <= HEADER_SIZE {
        return Err(CliError::new(
            USAGE,
            format!("--max-frame-size must be larger than {HEADER_SIZE}"),
        ));
    }

    let interrupts = Arc::new(AtomicUsize::new(0));
    install_ctrlc_handler(interrupts.clone())?;

    let path = args
        .path
        .clone()
        .unwrap_or_else(UnixDomainSocket::default_consumer_path);
    let config = SessionConfig {
        max_frame_size: args.max_frame_size,
        ..SessionConfig::default()
    };

    let started = Instant::now();
    let Connection {
        mut session,
        mut reader,
    } = connect_with_config(&path, RecordListener::default(), config, bind_timeout)
        .map_err(|err| session_error("connect failed", err))?;
    if let Some(table) = session.method_table() {
        info!(path = %path.display(), methods = ?table.names(), "consumer service bound");
    }

    let trace_config = TraceConfig::single_buffer(args.buffer_kb, duration_ms, &args.data_sources);
    session
        .start(trace_config)
        .map_err(|err| session_error("start failed", err))?;

    let mut handled = 0usize;
    let mut usage: Option<BufferUsage> = None;
    let mut next_stats = Instant::now() + stats_interval;
    let mut peak_usage = 0.0f64;

    while !session.state().is_terminal() {
        let pressed = interrupts.load(Ordering::SeqCst);
        if pressed > handled {
            if pressed >= 2 {
                warn!("interrupted again; cancelling recording");
                session.cancel();
                break;
            }
            info!("interrupted; stopping recording early (press Ctrl-C again to cancel)");
            if let Err(err) = session.stop() {
                warn!(%err, "could not stop recording early");
            }
            handled = pressed;
        }

        if let Some(pending) = usage.as_mut() {
            if let Some(value) = pending.now_or_never() {
                usage = None;
                peak_usage = peak_usage.max(value);
                info!(usage = %format!("{:.1}%", value * 100.0), "trace buffer usage");
            }
        }
        if usage.is_none()
            && session.state() == SessionState::Recording
            && Instant::now() >= next_stats
        {
            usage = Some(session.get_trace_buffer_usage());
            next_stats = Instant::now() + stats_interval;
        }

        reader
            .pump_once(&mut session)
            .map_err(|err| session_error("receive failed", err))?;
    }

    let state = session.state();
    let (_, mut listener) = session.into_parts();
    if state == SessionState::Errored {
        let message = listener
            .collector
            .errors
            .last()
            .cloned()
            .unwrap_or_else(|| "session failed".to_string());
        return Err(CliError::new(FAILURE, format!("recording failed: {message}")));
    }
    let Some(trace) = listener.collector.take_trace() else {
        return Err(CliError::new(
            FAILURE,
            "recording cancelled before the trace was read back",
        ));
    };

    fs::write(&args.out, &trace)
        .map_err(|err| io_error(&format!("failed writing {}", args.out.display()), err))?;
    info!(path = %args.out.display(), bytes = trace.len(), "trace written");

    let summary = RecordSummary {
        schema_id: "https://schemas.3leaps.dev/tracewire/cli/v1/record-summary.schema.json",
        socket: path.display().to_string(),
        output: args.out.display().to_string(),
        trace_bytes: trace.len(),
        duration_ms,
        elapsed_ms: started.elapsed().as_millis() as u64,
        peak_buffer_usage: peak_usage,
        stopped_early: handled > 0,
        statuses: listener.collector.statuses,
    };
    print_record_summary(&summary, format);
    Ok(SUCCESS)
}

/// Logs session progress as it happens and keeps it for the summary.
#[derive(Debug, Default)]
struct RecordListener {
    collector: TraceCollector,
}

impl SessionListener for RecordListener {
    fn on_status(&mut self, message: &str) {
        info!("{message}");
        self.collector.on_status(message);
    }

    fn on_trace_data(&mut self, trace: Bytes) {
        self.collector.on_trace_data(trace);
    }

    fn on_error(&mut self, message: &str) {
        error!("{message}");
        self.collector.on_error(message);
    }
}

fn install_ctrlc_handler(interrupts: Arc<AtomicUsize>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        interrupts.fetch_add(1, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn listener_keeps_statuses_and_trace() {
        let mut listener = RecordListener::default();
        listener.on_status("Recording in progress...");
        listener.on_trace_data(Bytes::from_static(b"\x0A\x00"));

        assert_eq!(listener.collector.statuses.len(), 1);
        assert_eq!(
            listener.collector.take_trace().as_deref(),
            Some(&b"\x0A\x00"[..])
        );
    }
}
