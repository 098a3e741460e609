//! Trace writers.

use crate::runner::Trace;
use std::io::Write;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Csv,
}

pub fn write_trace<W: Write>(trace: &Trace, format: Format, mut out: W) -> anyhow::Result<()> {
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut out, trace)?;
            writeln!(out)?;
        }
        Format::Csv => {
            writeln!(out, "{}", trace.columns.join(","))?;
            for row in &trace.rows {
                let line: Vec<String> = row.iter().map(f64::to_string).collect();
                writeln!(out, "{}", line.join(","))?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
