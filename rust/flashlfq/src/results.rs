use crate::errors::{
    ConfigError,
    FlashLfqError,
    Result,
};
use crate::models::{
    ChromatographicPeak,
    DetectionType,
    Identification,
    Peptide,
    ProteinGroupQuant,
    SpectraFile,
};
use crate::quantification::ProteinQuantEstimator;
use crate::utils::mass_to_mz;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;
use tracing::info;

/// Everything a run produces, in deterministic order.
#[derive(Debug, Clone, Default)]
pub struct FlashLfqResults {
    pub spectra_files: Vec<SpectraFile>,
    pub peaks: BTreeMap<SpectraFile, Vec<ChromatographicPeak>>,
    /// Keyed by modified sequence.
    pub peptides: BTreeMap<String, Peptide>,
    /// Keyed by accession.
    pub protein_groups: BTreeMap<String, ProteinGroupQuant>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultsSummary {
    pub num_files: usize,
    pub num_peaks: usize,
    pub num_empty_peaks: usize,
    pub num_ambiguous_peaks: usize,
    pub num_mbr_peaks: usize,
    pub num_peptides: usize,
    pub num_protein_groups: usize,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files, {} peaks ({} not detected, {} ambiguous, {} MBR), {} peptides, {} protein groups",
            self.num_files,
            self.num_peaks,
            self.num_empty_peaks,
            self.num_ambiguous_peaks,
            self.num_mbr_peaks,
            self.num_peptides,
            self.num_protein_groups
        )
    }
}

#[derive(Default)]
struct PeptideEvidence {
    msms: Option<f64>,
    mbr: Option<f64>,
    ambiguous: bool,
}

impl FlashLfqResults {
    /// Empty tables for a set of files: one peptide per modified sequence
    /// and one entry per protein group of the identifications.
    pub fn new(mut spectra_files: Vec<SpectraFile>, identifications: &[Arc<Identification>]) -> Self {
        spectra_files.sort();
        spectra_files.dedup();

        let mut peptides: BTreeMap<String, Peptide> = BTreeMap::new();
        let mut protein_groups: BTreeMap<String, ProteinGroupQuant> = BTreeMap::new();
        for id in identifications {
            let peptide = peptides
                .entry(id.modified_sequence.clone())
                .or_insert_with(|| {
                    Peptide::new(
                        id.modified_sequence.clone(),
                        id.base_sequence.clone(),
                        id.use_for_protein_quant,
                    )
                });
            peptide.use_for_protein_quant &= id.use_for_protein_quant;
            peptide
                .protein_groups
                .extend(id.protein_groups.iter().cloned());
            for pg in &id.protein_groups {
                protein_groups
                    .entry(pg.accession.clone())
                    .or_insert_with(|| ProteinGroupQuant::new(pg.clone()));
            }
        }

        let peaks = spectra_files.iter().map(|x| (x.clone(), Vec::new())).collect();
        Self {
            spectra_files,
            peaks,
            peptides,
            protein_groups,
        }
    }

    /// Recomputes every peptide intensity and detection type from the peaks.
    ///
    /// The intensity in a file is the most intense non-ambiguous peak carrying
    /// the sequence, MS/MS peaks taking precedence over MBR peaks. A sequence
    /// only seen in ambiguous peaks gets 0.
    pub fn calculate_peptide_results(&mut self) {
        for file in self.spectra_files.iter() {
            let mut evidence: BTreeMap<&str, PeptideEvidence> = BTreeMap::new();
            for peak in self.peaks.get(file).map(|x| x.as_slice()).unwrap_or_default() {
                if peak.apex().is_none() {
                    continue;
                }
                let sequences: BTreeSet<&str> = peak
                    .identifications
                    .iter()
                    .map(|x| x.modified_sequence.as_str())
                    .collect();
                for seq in sequences {
                    let entry = evidence.entry(seq).or_default();
                    match (peak.is_ambiguous(), peak.is_mbr_peak) {
                        (true, false) => entry.ambiguous = true,
                        (true, true) => {}
                        (false, false) => {
                            entry.msms = Some(entry.msms.unwrap_or(0.0).max(peak.intensity))
                        }
                        (false, true) => {
                            entry.mbr = Some(entry.mbr.unwrap_or(0.0).max(peak.intensity))
                        }
                    }
                }
            }

            for (seq, peptide) in self.peptides.iter_mut() {
                peptide.clear_file(file);
                let (intensity, detection) = match evidence.get(seq.as_str()) {
                    Some(PeptideEvidence {
                        msms: Some(x), ..
                    }) => (*x, DetectionType::Msms),
                    Some(PeptideEvidence { mbr: Some(x), .. }) => (*x, DetectionType::Mbr),
                    Some(PeptideEvidence {
                        ambiguous: true, ..
                    }) => (0.0, DetectionType::MsmsAmbiguousPeakfinding),
                    _ => (0.0, DetectionType::NotDetected),
                };
                peptide.set_intensity(file, intensity);
                peptide.set_detection_type(file, detection);
            }
        }
    }

    /// Rolls peptides up into protein groups.
    ///
    /// A protein group is reported as 0 in files where none of its eligible
    /// peptides was detected by MS/MS.
    pub fn calculate_protein_results(
        &mut self,
        estimator: &dyn ProteinQuantEstimator,
        use_shared_peptides: bool,
    ) {
        let mut by_protein: BTreeMap<&str, Vec<&Peptide>> = BTreeMap::new();
        for peptide in self.peptides.values() {
            if !peptide.use_for_protein_quant {
                continue;
            }
            if !use_shared_peptides && !peptide.is_unique_to_one_protein_group() {
                continue;
            }
            for pg in peptide.protein_groups.iter() {
                by_protein.entry(pg.accession.as_str()).or_default().push(peptide);
            }
        }

        for (accession, quant) in self.protein_groups.iter_mut() {
            let eligible = by_protein
                .get(accession.as_str())
                .map(|x| x.as_slice())
                .unwrap_or_default();
            let estimates = if eligible.is_empty() {
                BTreeMap::new()
            } else {
                estimator.estimate(eligible, &self.spectra_files)
            };
            for file in self.spectra_files.iter() {
                let has_msms = eligible
                    .iter()
                    .any(|p| p.detection_type(file) == DetectionType::Msms);
                let value = if has_msms {
                    estimates.get(file).copied().unwrap_or(0.0)
                } else {
                    0.0
                };
                quant.set_intensity(file, value);
            }
        }
    }

    /// Folds the results of a disjoint set of files into this one.
    pub fn merge_results_with(&mut self, other: FlashLfqResults) -> std::result::Result<(), ConfigError> {
        let overlap: Vec<String> = other
            .spectra_files
            .iter()
            .filter(|x| self.spectra_files.contains(x))
            .map(|x| x.full_path.to_string_lossy().to_string())
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::OverlappingSpectraFiles { files: overlap });
        }

        self.spectra_files.extend(other.spectra_files);
        self.spectra_files.sort();
        self.peaks.extend(other.peaks);
        for (seq, peptide) in other.peptides {
            match self.peptides.get_mut(&seq) {
                Some(existing) => existing.absorb(peptide),
                None => {
                    self.peptides.insert(seq, peptide);
                }
            }
        }
        for (accession, pg) in other.protein_groups {
            match self.protein_groups.get_mut(&accession) {
                Some(existing) => existing.absorb(pg),
                None => {
                    self.protein_groups.insert(accession, pg);
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> ResultsSummary {
        let all_peaks = self.peaks.values().flatten();
        let mut out = ResultsSummary {
            num_files: self.spectra_files.len(),
            num_peptides: self.peptides.len(),
            num_protein_groups: self.protein_groups.len(),
            ..Default::default()
        };
        for peak in all_peaks {
            out.num_peaks += 1;
            if peak.apex().is_none() {
                out.num_empty_peaks += 1;
            }
            if peak.is_ambiguous() {
                out.num_ambiguous_peaks += 1;
            }
            if peak.is_mbr_peak {
                out.num_mbr_peaks += 1;
            }
        }
        out
    }

    /// Writes the requested tables as tab separated files.
    pub fn write_results(
        &self,
        peaks_path: Option<&Path>,
        peptides_path: Option<&Path>,
        proteins_path: Option<&Path>,
    ) -> Result<()> {
        if let Some(path) = peaks_path {
            write_table(path, self.peak_table())?;
            info!("Wrote peaks to {}", path.display());
        }
        if let Some(path) = peptides_path {
            write_table(path, self.peptide_table())?;
            info!("Wrote peptides to {}", path.display());
        }
        if let Some(path) = proteins_path {
            write_table(path, self.protein_table())?;
            info!("Wrote protein groups to {}", path.display());
        }
        Ok(())
    }

    fn column_labels(&self) -> Vec<String> {
        self.spectra_files
            .iter()
            .map(|x| x.column_label(&self.spectra_files))
            .collect()
    }

    fn peak_table(&self) -> Vec<Vec<String>> {
        let header = [
            "File Name",
            "Base Sequence",
            "Full Sequence",
            "Protein Group",
            "Peptide Monoisotopic Mass",
            "MS2 Retention Time",
            "Precursor Charge",
            "Theoretical MZ",
            "Peak intensity",
            "Peak RT Apex",
            "Peak Split Retention Time",
            "Num Isotopic Envelopes",
            "PPM Error",
            "Peak Detection Type",
            "Num Identifications By Base Seq",
            "Num Identifications By Full Seq",
        ];
        let mut rows = vec![header.iter().map(|x| x.to_string()).collect()];
        for (file, peaks) in self.peaks.iter() {
            let label = file.column_label(&self.spectra_files);
            for peak in peaks {
                let seed = peak.seed_identification();
                let base: BTreeSet<&str> = peak
                    .identifications
                    .iter()
                    .map(|x| x.base_sequence.as_str())
                    .collect();
                let full: BTreeSet<&str> = peak
                    .identifications
                    .iter()
                    .map(|x| x.modified_sequence.as_str())
                    .collect();
                let proteins: BTreeSet<&str> = peak
                    .identifications
                    .iter()
                    .flat_map(|x| x.protein_groups.iter().map(|pg| pg.accession.as_str()))
                    .collect();
                let charge = peak.apex().map(|x| x.charge).unwrap_or(seed.precursor_charge);
                let detection = if peak.is_mbr_peak { "MBR" } else { "MSMS" };
                rows.push(vec![
                    label.clone(),
                    join(&base, "|"),
                    join(&full, "|"),
                    join(&proteins, ";"),
                    seed.monoisotopic_mass.to_string(),
                    seed.ms2_retention_time.to_string(),
                    charge.to_string(),
                    mass_to_mz(seed.monoisotopic_mass, charge).to_string(),
                    peak.intensity.to_string(),
                    optional(peak.apex_rt()),
                    optional(peak.split_rt),
                    peak.envelopes().len().to_string(),
                    optional(peak.apex().map(|_| peak.mass_error_ppm)),
                    detection.to_string(),
                    peak.num_identifications_by_base_seq.to_string(),
                    peak.num_identifications_by_full_seq.to_string(),
                ]);
            }
        }
        rows
    }

    fn peptide_table(&self) -> Vec<Vec<String>> {
        let labels = self.column_labels();
        let mut header: Vec<String> = ["Sequence", "Base Sequence", "Protein Groups", "Gene Names", "Organism"]
            .iter()
            .map(|x| x.to_string())
            .collect();
        header.extend(labels.iter().map(|x| format!("Intensity_{}", x)));
        header.extend(labels.iter().map(|x| format!("Detection Type_{}", x)));

        let mut rows = vec![header];
        for peptide in self.peptides.values() {
            let accessions: BTreeSet<&str> = peptide
                .protein_groups
                .iter()
                .map(|x| x.accession.as_str())
                .collect();
            let genes: BTreeSet<&str> = peptide
                .protein_groups
                .iter()
                .map(|x| x.gene.as_str())
                .filter(|x| !x.is_empty())
                .collect();
            let organisms: BTreeSet<&str> = peptide
                .protein_groups
                .iter()
                .map(|x| x.organism.as_str())
                .filter(|x| !x.is_empty())
                .collect();
            let mut row = vec![
                peptide.sequence.clone(),
                peptide.base_sequence.clone(),
                join(&accessions, ";"),
                join(&genes, ";"),
                join(&organisms, ";"),
            ];
            row.extend(
                self.spectra_files
                    .iter()
                    .map(|f| peptide.intensity(f).to_string()),
            );
            row.extend(
                self.spectra_files
                    .iter()
                    .map(|f| peptide.detection_type(f).to_string()),
            );
            rows.push(row);
        }
        rows
    }

    fn protein_table(&self) -> Vec<Vec<String>> {
        let labels = self.column_labels();
        let mut header: Vec<String> = ["Protein Groups", "Gene Name", "Organism"]
            .iter()
            .map(|x| x.to_string())
            .collect();
        header.extend(labels.iter().map(|x| format!("Intensity_{}", x)));

        let mut rows = vec![header];
        for quant in self.protein_groups.values() {
            let mut row = vec![
                quant.protein_group.accession.clone(),
                quant.protein_group.gene.clone(),
                quant.protein_group.organism.clone(),
            ];
            row.extend(
                self.spectra_files
                    .iter()
                    .map(|f| quant.intensity(f).to_string()),
            );
            rows.push(row);
        }
        rows
    }
}

fn join(values: &BTreeSet<&str>, sep: &str) -> String {
    values.iter().copied().collect::<Vec<_>>().join(sep)
}

fn optional(value: Option<f64>) -> String {
    value.map(|x| x.to_string()).unwrap_or_default()
}

fn write_table(path: &Path, rows: Vec<Vec<String>>) -> Result<()> {
    let to_err = |e: csv::Error| FlashLfqError::TableWriting {
        source: e,
        path: PathBuf::from(path),
    };
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(to_err)?;
    for row in rows {
        wtr.write_record(&row).map_err(to_err)?;
    }
    wtr.flush().map_err(|e| FlashLfqError::Io {
        source: e,
        path: Some(PathBuf::from(path)),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        IndexedPeak,
        IsotopicEnvelope,
        ProteinGroup,
    };
    use crate::quantification::TopNEstimator;

    fn id(file: &SpectraFile, seq: &str, protein: &str) -> Arc<Identification> {
        Arc::new(Identification::new(
            file.clone(),
            seq,
            seq,
            1000.0,
            1.0,
            2,
            vec![ProteinGroup::new(protein, "gene", "org")],
        ))
    }

    fn peak(file: &SpectraFile, ids: &[Arc<Identification>], intensity: f64, mbr: bool) -> ChromatographicPeak {
        let mut peak = ChromatographicPeak::new(ids[0].clone(), mbr, file.clone());
        peak.identifications = ids.to_vec();
        peak.set_envelopes(vec![IsotopicEnvelope::new(
            IndexedPeak::new(501.0, intensity, 0, 1.0),
            2,
            intensity,
        )]);
        peak.calculate_intensity(false);
        peak.resolve_identifications();
        peak
    }

    #[test]
    fn test_peptide_and_protein_tables() {
        let f1 = SpectraFile::new("a.ndjson", "a", 0, 0, 0);
        let f2 = SpectraFile::new("b.ndjson", "a", 1, 0, 0);
        let a1 = id(&f1, "AAA", "P1");
        let b1 = id(&f1, "BBB", "P1");
        let c1 = id(&f1, "CCC", "P2");
        let d1 = id(&f1, "DDD", "P2");
        let ids = vec![a1.clone(), b1.clone(), c1.clone(), d1.clone()];
        let mut results = FlashLfqResults::new(vec![f2.clone(), f1.clone()], &ids);
        assert_eq!(results.spectra_files[0], f1);

        results.peaks.insert(
            f1.clone(),
            vec![
                peak(&f1, &[a1.clone()], 100.0, false),
                peak(&f1, &[b1.clone()], 50.0, false),
                peak(&f1, &[c1.clone(), d1.clone()], 70.0, false),
            ],
        );
        results.peaks.insert(f2.clone(), vec![peak(&f2, &[c1.clone()], 30.0, true)]);
        results.calculate_peptide_results();

        let a = &results.peptides["AAA"];
        assert_eq!(a.intensity(&f1), 100.0);
        assert_eq!(a.detection_type(&f1), DetectionType::Msms);
        assert_eq!(a.detection_type(&f2), DetectionType::NotDetected);
        let c = &results.peptides["CCC"];
        assert_eq!(c.intensity(&f1), 0.0);
        assert_eq!(c.detection_type(&f1), DetectionType::MsmsAmbiguousPeakfinding);
        assert_eq!(c.intensity(&f2), 30.0);
        assert_eq!(c.detection_type(&f2), DetectionType::Mbr);

        results.calculate_protein_results(&TopNEstimator { n: 3 }, false);
        assert_eq!(results.protein_groups["P1"].intensity(&f1), 150.0);
        assert_eq!(results.protein_groups["P1"].intensity(&f2), 0.0);
        // Only ambiguous in f1 and only MBR in f2.
        assert_eq!(results.protein_groups["P2"].intensity(&f1), 0.0);
        assert_eq!(results.protein_groups["P2"].intensity(&f2), 0.0);

        let summary = results.summary();
        assert_eq!(summary.num_peaks, 4);
        assert_eq!(summary.num_ambiguous_peaks, 1);
        assert_eq!(summary.num_mbr_peaks, 1);
    }

    #[test]
    fn test_merge_rejects_overlap() {
        let f1 = SpectraFile::new("a.ndjson", "a", 0, 0, 0);
        let f2 = SpectraFile::new("b.ndjson", "b", 0, 0, 0);
        let mut r1 = FlashLfqResults::new(vec![f1.clone()], &[id(&f1, "AAA", "P1")]);
        let r2 = FlashLfqResults::new(vec![f2.clone()], &[id(&f2, "AAA", "P1")]);
        let r3 = FlashLfqResults::new(vec![f1.clone()], &[id(&f1, "BBB", "P1")]);

        r1.merge_results_with(r2).unwrap();
        assert_eq!(r1.spectra_files.len(), 2);
        assert_eq!(r1.peptides.len(), 1);
        assert_eq!(r1.peaks.len(), 2);
        assert!(matches!(
            r1.merge_results_with(r3),
            Err(ConfigError::OverlappingSpectraFiles { .. })
        ));
    }

    #[test]
    fn test_tables_have_one_column_per_file() {
        let f1 = SpectraFile::new("a.ndjson", "a", 0, 0, 0);
        let f2 = SpectraFile::new("b.ndjson", "a", 1, 0, 0);
        let a1 = id(&f1, "AAA", "P1");
        let mut results = FlashLfqResults::new(vec![f1.clone(), f2.clone()], &[a1.clone()]);
        results.peaks.insert(f1.clone(), vec![peak(&f1, &[a1], 100.0, false)]);
        results.calculate_peptide_results();

        let peptides = results.peptide_table();
        assert_eq!(peptides[0].len(), 5 + 2 * 2);
        assert_eq!(peptides[0][5], "Intensity_a");
        assert_eq!(peptides[1][5], "100");
        assert_eq!(peptides[1][8], "NotDetected");

        let peaks = results.peak_table();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[1][13], "MSMS");
        assert_eq!(peaks[1][10], "");
    }
}
