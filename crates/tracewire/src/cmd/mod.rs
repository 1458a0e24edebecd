use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod record;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a trace from the tracing daemon into a file.
    Record(RecordArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Record(args) => record::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Consumer socket path. Default: $PERFETTO_CONSUMER_SOCK_NAME or the platform socket.
    pub path: Option<PathBuf>,
    /// File to write the trace to.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub out: PathBuf,
    /// Recording length (e.g. 10s, 500ms).
    #[arg(long, short = 'd', default_value = "10s")]
    pub duration: String,
    /// Size of the daemon-side trace buffer in KiB.
    #[arg(long, default_value_t = 32 * 1024)]
    pub buffer_kb: u32,
    /// Data source to enable. Repeat for more than one.
    #[arg(long = "data-source", value_name = "NAME", default_values_t = [String::from("track_event")])]
    pub data_sources: Vec<String>,
    /// How often to log buffer usage while recording (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub stats_interval: String,
    /// Largest frame accepted from the daemon, in bytes.
    #[arg(long, default_value_t = tracewire_frame::DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// Maximum time to wait for the daemon to bind the consumer service.
    #[arg(long, default_value = "5s")]
    pub bind_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
