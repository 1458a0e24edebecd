use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordSummary {
    pub schema_id: &'static str,
    pub socket: String,
    pub output: String,
    pub trace_bytes: usize,
    pub duration_ms: u32,
    pub elapsed_ms: u64,
    pub peak_buffer_usage: f64,
    pub stopped_early: bool,
    pub statuses: Vec<String>,
}

pub fn print_record_summary(summary: &RecordSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OUTPUT", "BYTES", "REQUESTED", "ELAPSED", "PEAK USAGE"])
                .add_row(vec![
                    summary.output.clone(),
                    summary.trace_bytes.to_string(),
                    format!("{}ms", summary.duration_ms),
                    format!("{}ms", summary.elapsed_ms),
                    percent(summary.peak_buffer_usage),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Recording:");
            println!("  Socket:        {}", summary.socket);
            println!("  Output:        {}", summary.output);
            println!("  Trace size:    {} bytes", summary.trace_bytes);
            println!("  Requested:     {}ms", summary.duration_ms);
            println!("  Elapsed:       {}ms", summary.elapsed_ms);
            println!("  Peak usage:    {}", percent(summary.peak_buffer_usage));
            if summary.stopped_early {
                println!("  Stopped early: yes");
            }
            for status in &summary.statuses {
                println!("  Status:        {status}");
            }
        }
        OutputFormat::Raw => {
            println!("{}", summary.output);
        }
    }
}

fn percent(usage: f64) -> String {
    format!("{:.1}%", usage * 100.0)
}
