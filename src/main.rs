use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use log::info;

use dem_spectra::{
    table, CommandTableComputer, FileTableReader, SpectralModel, SpectralParameters, TableSource,
};

/// Resolve a spectral response table: read a stored one, or compute a new
/// one with an external atomic-physics program.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Stored spectral table (.parquet, .json or .csv)
    #[arg(short, long, conflicts_with_all = ["config", "program"])]
    table: Option<PathBuf>,

    /// JSON file with parameter overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Program that computes the table: `program [ARGS..] <params.json> <output>`
    #[arg(short, long)]
    program: Option<String>,

    /// Extra argument passed to the program (repeatable)
    #[arg(long = "program-arg", allow_hyphen_values = true)]
    program_args: Vec<String>,

    /// Where to write the resolved table
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let params = match &args.config {
        Some(path) => SpectralParameters::from_json_file(path)?,
        None => SpectralParameters::default(),
    };

    if args.table.is_none() && args.program.is_none() {
        bail!("either --table or --program is required");
    }
    // Only invoked on the compute branch, where --program is set.
    let computer = CommandTableComputer::new(args.program.clone().unwrap_or_default())
        .args(args.program_args.iter());
    let source = args.table.clone().map_or(TableSource::Default, TableSource::Reference);

    let model = SpectralModel::new(source, params, &FileTableReader, &computer)?;
    let spectral_table = model.spectral_table();
    info!("{spectral_table}");
    println!("{spectral_table}");

    if let Some(output) = &args.output {
        table::write_file(output, spectral_table)?;
        info!("wrote {}", output.display());
    }
    Ok(())
}
