use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::ResultCounters;

/// Final counters of a run plus when it started and finished.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub counters: ResultCounters,
    pub started_at: String,
    pub finished_at: String,
}

/// Write the plain-text summary.
pub fn write_summary(out: &mut impl Write, counters: &ResultCounters) -> io::Result<()> {
    writeln!(out, "Total TCP Listeners Set up:  {}", counters.tcp_listeners)?;
    writeln!(out, "Total UDP Listeners Set up:  {}", counters.udp_listeners)?;
    writeln!(out)?;
    writeln!(out, "Total TCP Requests Received:  {}", counters.tcp_requests_received)?;
    writeln!(out, "Total UDP Requests Received:  {}", counters.udp_requests_received)?;
    writeln!(out)?;
    writeln!(out, "Total TCP Responses Received:  {}", counters.tcp_responses_received)?;
    Ok(())
}

pub fn write_report_json(path: &Path, report: &RunReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report file {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

/// RFC3339 UTC timestamp.
pub fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
