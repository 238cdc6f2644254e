use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use firmlog::decoder;
use firmlog::table::FormatTable;

/// Decode a binary device log into human-readable lines.
///
/// Rendered log lines go to stdout; all diagnostics go to stderr. Set
/// RUST_LOG=debug for per-frame CRC detail and page progress.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the binary log file
    binary_file: PathBuf,

    /// Path to the JSON format string table
    #[arg(short = 'm', long = "map")]
    map: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    tracing::info!("Binary file: {}", cli.binary_file.display());
    tracing::info!("Format table: {}", cli.map.display());

    let table = FormatTable::load(&cli.map)
        .with_context(|| format!("failed to load format table {}", cli.map.display()))?;
    tracing::info!("Loaded {} format strings", table.len());

    let stdout = io::stdout().lock();
    let mut out = BufWriter::new(stdout);
    decoder::decode_file(&cli.binary_file, &table, &mut out)
        .with_context(|| format!("failed to decode {}", cli.binary_file.display()))?;
    out.flush()?;

    Ok(())
}
