use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tab separated identifications (one PSM per row)
    #[arg(short, long)]
    pub identifications: PathBuf,

    /// Directory holding one .ndjson scan file per spectra file
    #[arg(short, long)]
    pub spectra_dir: PathBuf,

    /// Tab separated experimental design, every file is its own sample when missing
    #[arg(short = 'e', long)]
    pub design: Option<PathBuf>,

    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Enable match between runs (will over-write the config file)
    #[arg(long)]
    pub mbr: bool,

    /// Enable normalization (will over-write the config file)
    #[arg(long)]
    pub normalize: bool,

    /// Use the weighted protein estimator (will over-write the config file)
    #[arg(long)]
    pub advanced_protein_quant: bool,

    /// m/z tolerance in ppm (will over-write the config file)
    #[arg(long)]
    pub ppm_tolerance: Option<f64>,

    /// Number of worker threads (will over-write the config file)
    #[arg(short, long)]
    pub threads: Option<i32>,

    /// Hide progress bars
    #[arg(long)]
    pub silent: bool,
}
