use crate::models::{
    Peptide,
    SpectraFile,
};
use crate::utils::median;
use std::collections::BTreeMap;

/// Rolls the intensities of a protein's peptides up into one value per file.
///
/// Implementations only see the eligible peptides; whether the protein may
/// be reported in a file at all is decided by the caller.
pub trait ProteinQuantEstimator: Send + Sync {
    fn estimate(&self, peptides: &[&Peptide], spectra_files: &[SpectraFile]) -> BTreeMap<SpectraFile, f64>;
}

/// Sum of the N most intense peptides in each file.
#[derive(Debug, Clone, Copy)]
pub struct TopNEstimator {
    pub n: usize,
}

impl ProteinQuantEstimator for TopNEstimator {
    fn estimate(&self, peptides: &[&Peptide], spectra_files: &[SpectraFile]) -> BTreeMap<SpectraFile, f64> {
        spectra_files
            .iter()
            .map(|file| {
                let mut values: Vec<f64> = peptides
                    .iter()
                    .map(|p| p.intensity(file))
                    .filter(|x| *x > 0.0)
                    .collect();
                values.sort_unstable_by(|a, b| b.total_cmp(a));
                (file.clone(), values.iter().take(self.n).sum())
            })
            .collect()
    }
}

/// Weighted sum of peptide intensities, down-weighting peptides whose
/// profile across files disagrees with the protein consensus.
///
/// Profiles are compared in log2 space after centering every peptide on its
/// median, and weights follow Tukey's biweight on the RMS residual.
#[derive(Debug, Clone, Copy)]
pub struct WeightedEstimator {
    pub outlier_cutoff_log2: f64,
    pub fallback: TopNEstimator,
}

impl WeightedEstimator {
    /// One weight per peptide, in input order.
    pub fn peptide_weights(&self, peptides: &[&Peptide], spectra_files: &[SpectraFile]) -> Vec<f64> {
        let centered: Vec<Vec<f64>> = peptides
            .iter()
            .map(|p| {
                let row: Vec<f64> = spectra_files
                    .iter()
                    .map(|f| {
                        let x = p.intensity(f);
                        if x > 0.0 { x.log2() } else { f64::NAN }
                    })
                    .collect();
                let center = median(&mut row.clone()).unwrap_or(f64::NAN);
                row.into_iter().map(|x| x - center).collect()
            })
            .collect();

        let consensus: Vec<f64> = (0..spectra_files.len())
            .map(|j| {
                let mut column: Vec<f64> = centered.iter().map(|row| row[j]).collect();
                median(&mut column).unwrap_or(f64::NAN)
            })
            .collect();

        centered
            .iter()
            .map(|row| {
                let sq: Vec<f64> = row
                    .iter()
                    .zip(consensus.iter())
                    .filter(|(x, c)| x.is_finite() && c.is_finite())
                    .map(|(x, c)| (x - c).powi(2))
                    .collect();
                if sq.is_empty() {
                    return 0.0;
                }
                let residual = (sq.iter().sum::<f64>() / sq.len() as f64).sqrt();
                tukey_biweight(residual, self.outlier_cutoff_log2)
            })
            .collect()
    }
}

fn tukey_biweight(residual: f64, cutoff: f64) -> f64 {
    if residual < cutoff {
        let u = residual / cutoff;
        (1.0 - u * u).powi(2)
    } else {
        0.0
    }
}

impl ProteinQuantEstimator for WeightedEstimator {
    fn estimate(&self, peptides: &[&Peptide], spectra_files: &[SpectraFile]) -> BTreeMap<SpectraFile, f64> {
        let weights = self.peptide_weights(peptides, spectra_files);
        if weights.iter().all(|w| *w == 0.0) {
            return self.fallback.estimate(peptides, spectra_files);
        }
        spectra_files
            .iter()
            .map(|file| {
                let total = peptides
                    .iter()
                    .zip(weights.iter())
                    .map(|(p, w)| w * p.intensity(file))
                    .sum();
                (file.clone(), total)
            })
            .collect()
    }
}
