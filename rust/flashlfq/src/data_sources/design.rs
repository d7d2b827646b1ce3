use super::identifications::stem_of;
use crate::errors::DataReadingError;
use crate::models::SpectraFile;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

const SCAN_FILE_EXTENSION: &str = "ndjson";

#[derive(Debug, Clone, Deserialize)]
struct DesignRow {
    #[serde(rename = "FileName")]
    file_name: String,
    #[serde(rename = "Condition", default)]
    condition: String,
    #[serde(rename = "Biorep", default)]
    biorep: u32,
    #[serde(rename = "Fraction", default)]
    fraction: u32,
    #[serde(rename = "Techrep", default)]
    techrep: u32,
}

/// Path of the scan file for a file name from the inputs.
///
/// Names without an extension get `.ndjson`, relative names are resolved
/// against `spectra_dir`.
pub fn scan_file_path(spectra_dir: &Path, file_name: &str) -> PathBuf {
    let mut path = spectra_dir.join(file_name);
    if path.extension().is_none() {
        path.set_extension(SCAN_FILE_EXTENSION);
    }
    path
}

/// Reads a tab separated experimental design
/// (`FileName`, `Condition`, `Biorep`, `Fraction`, `Techrep`).
pub fn read_experimental_design<T: AsRef<Path>>(
    path: T,
    spectra_dir: &Path,
) -> Result<Vec<SpectraFile>, DataReadingError> {
    let path = path.as_ref();
    let file_handle =
        std::fs::File::open(path).map_err(|e| DataReadingError::FileReadingError {
            source: e,
            context: "Error opening experimental design",
            path: PathBuf::from(path),
        })?;
    let out = parse_design(file_handle, spectra_dir).map_err(|e| {
        DataReadingError::TableParsingError {
            source: e,
            path: PathBuf::from(path),
        }
    })?;
    info!("Experimental design lists {} spectra files", out.len());
    Ok(out)
}

fn parse_design<R: std::io::Read>(
    reader: R,
    spectra_dir: &Path,
) -> Result<Vec<SpectraFile>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader);
    let mut out = Vec::new();
    for row in rdr.deserialize() {
        let row: DesignRow = row?;
        out.push(SpectraFile::new(
            scan_file_path(spectra_dir, &row.file_name),
            row.condition,
            row.biorep,
            row.techrep,
            row.fraction,
        ));
    }
    out.sort();
    Ok(out)
}

/// One file per distinct file stem, with an empty condition and zero indices.
pub fn default_design<'a>(
    file_names: impl IntoIterator<Item = &'a str>,
    spectra_dir: &Path,
) -> Vec<SpectraFile> {
    let stems: BTreeSet<String> = file_names.into_iter().map(stem_of).collect();
    stems
        .into_iter()
        .map(|stem| SpectraFile::new(scan_file_path(spectra_dir, &stem), "", 0, 0, 0))
        .collect()
}
