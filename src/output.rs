use std::io::{self, Write};

use serde::Serialize;

use crate::app::RunResult;
use crate::fetcher::FetchSummary;
use crate::merge::MergeSummary;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_fetch(summary: &FetchSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_merge(summary: &MergeSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Forwards progress to the log.
pub struct LogSink;

impl crate::app::ProgressSink for LogSink {
    fn event(&self, event: crate::app::ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!("{}", event.message),
        }
    }
}
