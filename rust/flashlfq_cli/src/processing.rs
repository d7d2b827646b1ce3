use crate::cli::Cli;
use crate::errors::CliError;
use flashlfq::data_sources::{
    default_design,
    read_experimental_design,
    read_identification_records,
    resolve_identifications,
};
use flashlfq::{
    FlashLfqConfig,
    FlashLfqEngine,
    NdjsonScanSource,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const PEAKS_FILE: &str = "QuantifiedPeaks.tsv";
const PEPTIDES_FILE: &str = "QuantifiedPeptides.tsv";
const PROTEINS_FILE: &str = "QuantifiedProteins.tsv";

pub fn process(args: &Cli, config: FlashLfqConfig) -> Result<(), CliError> {
    let start = Instant::now();
    let records = read_identification_records(&args.identifications)?;
    let spectra_files = match &args.design {
        Some(path) => read_experimental_design(path, &args.spectra_dir)?,
        None => default_design(
            records.iter().map(|x| x.file_name.as_str()),
            &args.spectra_dir,
        ),
    };
    let identifications =
        resolve_identifications(records, &spectra_files, &args.identifications)?;
    info!(
        "Loaded {} identifications for {} spectra files in {:?}",
        identifications.len(),
        spectra_files.len(),
        start.elapsed()
    );

    let engine = FlashLfqEngine::new(identifications, Arc::new(NdjsonScanSource), config)?
        .with_spectra_files(spectra_files);
    let results = engine.run()?;

    std::fs::create_dir_all(&args.output_dir).map_err(|e| CliError::Io {
        source: e,
        path: args.output_dir.clone(),
    })?;
    let peaks_path = args.output_dir.join(PEAKS_FILE);
    let peptides_path = args.output_dir.join(PEPTIDES_FILE);
    let proteins_path = args.output_dir.join(PROTEINS_FILE);
    results.write_results(
        Some(peaks_path.as_path()),
        Some(peptides_path.as_path()),
        Some(proteins_path.as_path()),
    )?;

    println!("{}", results.summary());
    println!(
        "Finished in {:?}, results written to {}",
        start.elapsed(),
        args.output_dir.display()
    );
    Ok(())
}
