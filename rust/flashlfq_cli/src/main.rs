mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use cli::Cli;
use tracing::level_filters::LevelFilter;
use tracing::{
    error,
    info,
};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), errors::CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    let args = Cli::parse();
    let config = config::load_config(&args)?;
    info!("Parsed configuration: {:#?}", config);

    if let Err(e) = processing::process(&args, config) {
        error!("Quantification failed: {}", e);
        return Err(e);
    }
    Ok(())
}
