use crate::errors::DataReadingError;
use crate::models::{
    Identification,
    ProteinGroup,
    SpectraFile,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    info,
    warn,
};

/// One row of a tab separated identification table.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentificationRecord {
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "Base Sequence")]
    pub base_sequence: String,
    #[serde(rename = "Full Sequence")]
    pub full_sequence: String,
    #[serde(rename = "Peptide Monoisotopic Mass")]
    pub monoisotopic_mass: f64,
    #[serde(rename = "Scan Retention Time")]
    pub retention_time: f64,
    #[serde(rename = "Precursor Charge")]
    pub precursor_charge: i32,
    #[serde(rename = "Protein Accession")]
    pub protein_accessions: String,
    #[serde(rename = "Gene", default)]
    pub genes: Option<String>,
    #[serde(rename = "Organism", default)]
    pub organism: Option<String>,
    #[serde(rename = "Formula", default)]
    pub formula: Option<String>,
}

impl IdentificationRecord {
    /// File name as written in the table, without directory or extension.
    pub fn file_stem(&self) -> String {
        stem_of(&self.file_name)
    }

    /// Builds the protein groups, pairing the `;` separated accessions with
    /// genes by position.
    fn protein_groups(&self) -> Vec<ProteinGroup> {
        let genes: Vec<&str> = self
            .genes
            .as_deref()
            .map(|x| x.split(';').collect())
            .unwrap_or_default();
        let organism = self.organism.as_deref().unwrap_or("");
        self.protein_accessions
            .split(';')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .enumerate()
            .map(|(i, acc)| {
                let gene = genes.get(i).copied().unwrap_or("").trim();
                ProteinGroup::new(acc, gene, organism)
            })
            .collect()
    }

    pub fn into_identification(self, spectra_file: SpectraFile) -> Identification {
        let protein_groups = self.protein_groups();
        let id = Identification::new(
            spectra_file,
            self.base_sequence,
            self.full_sequence,
            self.monoisotopic_mass,
            self.retention_time,
            self.precursor_charge,
            protein_groups,
        );
        match self.formula {
            Some(f) if !f.trim().is_empty() => id.with_formula(f.trim()),
            _ => id,
        }
    }
}

pub(crate) fn stem_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|x| x.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string())
}

pub fn read_identification_records<T: AsRef<Path>>(
    path: T,
) -> Result<Vec<IdentificationRecord>, DataReadingError> {
    let path = path.as_ref();
    let file_handle =
        std::fs::File::open(path).map_err(|e| DataReadingError::FileReadingError {
            source: e,
            context: "Error opening identification file",
            path: PathBuf::from(path),
        })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(file_handle);

    let records = rdr
        .deserialize()
        .collect::<Result<Vec<IdentificationRecord>, csv::Error>>()
        .map_err(|e| DataReadingError::TableParsingError {
            source: e,
            path: PathBuf::from(path),
        })?;
    info!(
        "Read {} identifications from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Attaches each record to its spectra file, matched by file stem.
///
/// Records whose mass or retention time is not finite are kept; the engine
/// reports them as empty peaks.
pub fn resolve_identifications(
    records: Vec<IdentificationRecord>,
    spectra_files: &[SpectraFile],
    source_path: &Path,
) -> Result<Vec<Identification>, DataReadingError> {
    let by_stem: HashMap<String, &SpectraFile> = spectra_files
        .iter()
        .map(|x| (x.file_name_without_extension(), x))
        .collect();

    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let stem = record.file_stem();
        let Some(file) = by_stem.get(&stem) else {
            return Err(DataReadingError::UnknownSpectraFile {
                file_name: record.file_name,
                path: PathBuf::from(source_path),
            });
        };
        if !record.monoisotopic_mass.is_finite() {
            warn!("Identification {} has a non-finite mass", record.full_sequence);
        }
        out.push(record.into_identification((*file).clone()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "File Name\tBase Sequence\tFull Sequence\tPeptide Monoisotopic Mass\tScan Retention Time\tPrecursor Charge\tProtein Accession\tGene\n\
        run1.raw\tPEPTIDE\tPEPT[Phospho]IDE\t879.3\t10.5\t2\tP1;P2\tG1;G2\n";

    #[test]
    fn test_parse_records() {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(SAMPLE.as_bytes());
        let records: Vec<IdentificationRecord> =
            rdr.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_stem(), "run1");
        assert_eq!(records[0].formula, None);

        let files = vec![SpectraFile::new("/data/run1.ndjson", "A", 1, 0, 0)];
        let ids = resolve_identifications(records, &files, Path::new("ids.tsv")).unwrap();
        assert_eq!(ids[0].protein_accessions(), "P1;P2");
        assert_eq!(ids[0].protein_groups[1].gene, "G2");
        assert_eq!(ids[0].spectra_file.condition, "A");
        assert_eq!(ids[0].modified_sequence, "PEPT[Phospho]IDE");
    }

    #[test]
    fn test_unknown_file_is_an_error() {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(SAMPLE.as_bytes());
        let records: Vec<IdentificationRecord> =
            rdr.deserialize().collect::<Result<_, _>>().unwrap();
        let files = vec![SpectraFile::new("/data/run2.ndjson", "A", 1, 0, 0)];
        assert!(matches!(
            resolve_identifications(records, &files, Path::new("ids.tsv")),
            Err(DataReadingError::UnknownSpectraFile { .. })
        ));
    }
}
