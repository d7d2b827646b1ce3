//! Multiplicative normalization across the experimental design.
//!
//! Passes run from the finest level to the coarsest. Each pass computes one
//! factor per spectra file, the caller scales the peaks of that file and
//! recomputes peptide intensities before the next pass.

use crate::models::{
    Peptide,
    SpectraFile,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NormalizationLevel {
    TechnicalReplicate,
    Fraction,
    BiologicalReplicate,
    Condition,
}

/// Order in which the passes run.
pub const NORMALIZATION_PASSES: [NormalizationLevel; 4] = [
    NormalizationLevel::TechnicalReplicate,
    NormalizationLevel::Fraction,
    NormalizationLevel::BiologicalReplicate,
    NormalizationLevel::Condition,
];

impl std::fmt::Display for NormalizationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NormalizationLevel::TechnicalReplicate => "technical replicate",
            NormalizationLevel::Fraction => "fraction",
            NormalizationLevel::BiologicalReplicate => "biological replicate",
            NormalizationLevel::Condition => "condition",
        };
        write!(f, "{}", label)
    }
}

// Field order matches the ordering of SpectraFile, so the first unit of a
// group is the one holding the earliest file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct DesignKey {
    condition: Option<String>,
    biological_replicate: Option<u32>,
    fraction: Option<u32>,
    technical_replicate: Option<u32>,
    path: Option<PathBuf>,
}

impl DesignKey {
    fn of_file(file: &SpectraFile) -> Self {
        Self {
            condition: Some(file.condition.clone()),
            biological_replicate: Some(file.biological_replicate),
            fraction: Some(file.fraction),
            technical_replicate: Some(file.technical_replicate),
            path: Some(file.full_path.clone()),
        }
    }

    fn empty() -> Self {
        Self {
            condition: None,
            biological_replicate: None,
            fraction: None,
            technical_replicate: None,
            path: None,
        }
    }
}

impl NormalizationLevel {
    fn unit_key(&self, file: &SpectraFile) -> DesignKey {
        match self {
            NormalizationLevel::TechnicalReplicate | NormalizationLevel::Fraction => {
                DesignKey::of_file(file)
            }
            NormalizationLevel::BiologicalReplicate => DesignKey {
                condition: Some(file.condition.clone()),
                biological_replicate: Some(file.biological_replicate),
                ..DesignKey::empty()
            },
            NormalizationLevel::Condition => DesignKey {
                condition: Some(file.condition.clone()),
                ..DesignKey::empty()
            },
        }
    }

    fn group_key(&self, file: &SpectraFile) -> DesignKey {
        match self {
            NormalizationLevel::TechnicalReplicate => DesignKey {
                condition: Some(file.condition.clone()),
                biological_replicate: Some(file.biological_replicate),
                fraction: Some(file.fraction),
                ..DesignKey::empty()
            },
            NormalizationLevel::Fraction => DesignKey {
                condition: Some(file.condition.clone()),
                technical_replicate: Some(file.technical_replicate),
                fraction: Some(file.fraction),
                ..DesignKey::empty()
            },
            NormalizationLevel::BiologicalReplicate => DesignKey {
                condition: Some(file.condition.clone()),
                ..DesignKey::empty()
            },
            NormalizationLevel::Condition => DesignKey::empty(),
        }
    }
}

/// Factors of one pass.
#[derive(Debug, Clone)]
pub struct NormalizationPass {
    pub level: NormalizationLevel,
    pub factors: BTreeMap<SpectraFile, f64>,
}

impl NormalizationPass {
    pub fn is_identity(&self) -> bool {
        self.factors.values().all(|x| *x == 1.0)
    }
}

/// Per-sample intensity of a peptide within a unit.
///
/// A sample is one (biorep, techrep) injection series; its fractions are
/// summed. The unit value is the mean over the samples that saw the peptide,
/// so units holding more replicates are not inflated.
fn unit_intensity(peptide: &Peptide, files: &[&SpectraFile]) -> f64 {
    let mut samples: BTreeMap<(u32, u32), f64> = BTreeMap::new();
    for file in files {
        *samples
            .entry((file.biological_replicate, file.technical_replicate))
            .or_default() += peptide.intensity(file);
    }
    let detected: Vec<f64> = samples.into_values().filter(|x| *x > 0.0).collect();
    if detected.is_empty() {
        return 0.0;
    }
    detected.iter().sum::<f64>() / detected.len() as f64
}

/// Scale factor of every file for one level.
///
/// Within a group each unit is compared to the first one, over the peptides
/// with positive intensity in both. A unit sharing nothing with the reference
/// keeps a factor of 1.
pub fn normalization_factors(
    level: NormalizationLevel,
    spectra_files: &[SpectraFile],
    peptides: &BTreeMap<String, Peptide>,
) -> NormalizationPass {
    let mut groups: BTreeMap<DesignKey, BTreeMap<DesignKey, Vec<&SpectraFile>>> = BTreeMap::new();
    for file in spectra_files {
        groups
            .entry(level.group_key(file))
            .or_default()
            .entry(level.unit_key(file))
            .or_default()
            .push(file);
    }

    let mut factors: BTreeMap<SpectraFile, f64> =
        spectra_files.iter().map(|x| (x.clone(), 1.0)).collect();

    for units in groups.values() {
        if units.len() < 2 {
            continue;
        }
        let unit_intensities: Vec<(&Vec<&SpectraFile>, Vec<f64>)> = units
            .values()
            .map(|files| {
                let values = peptides.values().map(|p| unit_intensity(p, files)).collect();
                (files, values)
            })
            .collect();

        let (_, reference) = &unit_intensities[0];
        for (files, intensities) in unit_intensities.iter().skip(1) {
            let mut ref_sum = 0.0;
            let mut unit_sum = 0.0;
            for (r, u) in reference.iter().zip(intensities.iter()) {
                if *r > 0.0 && *u > 0.0 {
                    ref_sum += r;
                    unit_sum += u;
                }
            }
            let factor = if unit_sum > 0.0 && ref_sum > 0.0 {
                ref_sum / unit_sum
            } else {
                1.0
            };
            for file in files.iter() {
                factors.insert((*file).clone(), factor);
            }
        }
    }

    NormalizationPass { level, factors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peptides(values: &[(&str, &SpectraFile, f64)]) -> BTreeMap<String, Peptide> {
        let mut out: BTreeMap<String, Peptide> = BTreeMap::new();
        for (seq, file, intensity) in values {
            out.entry(seq.to_string())
                .or_insert_with(|| Peptide::new(*seq, *seq, true))
                .set_intensity(file, *intensity);
        }
        out
    }

    #[test]
    fn test_condition_pass() {
        let a = SpectraFile::new("a.ndjson", "a", 0, 0, 0);
        let b = SpectraFile::new("b.ndjson", "b", 0, 0, 0);
        let files = vec![a.clone(), b.clone()];
        let peps = peptides(&[
            ("P1", &a, 100.0),
            ("P1", &b, 200.0),
            ("P2", &a, 50.0),
            ("P2", &b, 100.0),
            ("P3", &b, 1000.0),
        ]);
        let tech = normalization_factors(NormalizationLevel::TechnicalReplicate, &files, &peps);
        assert!(tech.is_identity());

        let cond = normalization_factors(NormalizationLevel::Condition, &files, &peps);
        assert_eq!(cond.factors[&a], 1.0);
        assert!((cond.factors[&b] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_biorep_units_sum_fractions() {
        let r0f0 = SpectraFile::new("r0f0.ndjson", "a", 0, 0, 0);
        let r0f1 = SpectraFile::new("r0f1.ndjson", "a", 0, 0, 1);
        let r1f0 = SpectraFile::new("r1f0.ndjson", "a", 1, 0, 0);
        let files = vec![r0f0.clone(), r0f1.clone(), r1f0.clone()];
        let peps = peptides(&[
            ("P1", &r0f0, 10.0),
            ("P1", &r0f1, 30.0),
            ("P1", &r1f0, 20.0),
        ]);
        let pass = normalization_factors(NormalizationLevel::BiologicalReplicate, &files, &peps);
        assert_eq!(pass.factors[&r0f0], 1.0);
        assert_eq!(pass.factors[&r0f1], 1.0);
        assert!((pass.factors[&r1f0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_units_with_more_replicates_are_averaged() {
        let a0 = SpectraFile::new("a0.ndjson", "a", 0, 0, 0);
        let a1 = SpectraFile::new("a1.ndjson", "a", 1, 0, 0);
        let b0 = SpectraFile::new("b0.ndjson", "b", 0, 0, 0);
        let files = vec![a0.clone(), a1.clone(), b0.clone()];
        let peps = peptides(&[("P1", &a0, 100.0), ("P1", &a1, 100.0), ("P1", &b0, 100.0)]);
        let cond = normalization_factors(NormalizationLevel::Condition, &files, &peps);
        assert!(cond.is_identity());

        let t0 = SpectraFile::new("t0.ndjson", "a", 0, 0, 0);
        let t1 = SpectraFile::new("t1.ndjson", "a", 0, 1, 0);
        let r1 = SpectraFile::new("r1.ndjson", "a", 1, 0, 0);
        let files = vec![t0.clone(), t1.clone(), r1.clone()];
        let peps = peptides(&[("P1", &t0, 100.0), ("P1", &t1, 100.0), ("P1", &r1, 50.0)]);
        let biorep = normalization_factors(NormalizationLevel::BiologicalReplicate, &files, &peps);
        assert_eq!(biorep.factors[&t0], 1.0);
        assert_eq!(biorep.factors[&t1], 1.0);
        assert!((biorep.factors[&r1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_nothing_in_common_keeps_factor_one() {
        let a = SpectraFile::new("a.ndjson", "a", 0, 0, 0);
        let b = SpectraFile::new("b.ndjson", "a", 0, 1, 0);
        let files = vec![a.clone(), b.clone()];
        let peps = peptides(&[("P1", &a, 100.0), ("P2", &b, 200.0)]);
        let pass = normalization_factors(NormalizationLevel::TechnicalReplicate, &files, &peps);
        assert!(pass.is_identity());
    }
}
