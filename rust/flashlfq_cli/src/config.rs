use crate::cli::Cli;
use crate::errors::CliError;
use flashlfq::FlashLfqConfig;

/// Config file values (or defaults), with command line flags on top.
pub fn load_config(args: &Cli) -> Result<FlashLfqConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|e| CliError::Io {
                source: e,
                path: path.clone(),
            })?;
            serde_json::from_reader(file)?
        }
        None => FlashLfqConfig::default(),
    };

    if args.mbr {
        config.match_between_runs = true;
    }
    if args.normalize {
        config.normalize = true;
    }
    if args.advanced_protein_quant {
        config.advanced_protein_quant = true;
    }
    if args.silent {
        config.silent = true;
    }
    if let Some(ppm) = args.ppm_tolerance {
        config.ppm_tolerance = ppm;
        config.mbr_ppm_tolerance = ppm;
    }
    if let Some(threads) = args.threads {
        config.max_threads = threads;
    }
    config.validate()?;
    Ok(config)
}
