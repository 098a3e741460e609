use anyhow::Result;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use substratum_lib::{load_scenario, run_scenario, write_trace, Format};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file
    #[arg(short, long, default_value = "scenarios/drug_bolus.toml")]
    config: PathBuf,

    /// Output format of the sampled trace
    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    substratum_core::init_logging(if args.quiet { "warn" } else { "info" });

    let config = load_scenario(&args.config)?;
    tracing::info!(
        scenario = %args.config.display(),
        fingerprint = %config.fingerprint(),
        "Scenario loaded"
    );
    let trace = run_scenario(&config)?;

    match &args.output {
        Some(path) => write_trace(&trace, args.format, BufWriter::new(File::create(path)?))?,
        None => write_trace(&trace, args.format, std::io::stdout().lock())?,
    }
    Ok(())
}
