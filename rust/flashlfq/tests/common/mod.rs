#![allow(dead_code)]

use flashlfq::isotopes::{
    ConvolutionIsotopeProvider,
    IsotopeProvider,
};
use flashlfq::utils::mass_to_mz;
use flashlfq::{
    FlashLfqConfig,
    FlashLfqEngine,
    FlashLfqResults,
    Identification,
    InMemoryScanSource,
    ProteinGroup,
    Scan,
    SpectraFile,
};
use std::sync::Arc;

pub const PEPTIDE: f64 = 799.35996;
pub const PEPTIDEV: f64 = 898.42837;
pub const PEPTIDEVV: f64 = 997.49678;
pub const PEPTIDEVVV: f64 = 1096.56519;
pub const PEPTIDEVVVV: f64 = 1195.6336;
pub const EGFQVADGPLYR: f64 = 1350.65681;

// Present in every scan so no scan is empty.
const NOISE_MZ: f64 = 401.0;
const NOISE_INTENSITY: f64 = 1000.0;

/// An analyte with one abundance scale per scan (0 leaves it out of the scan).
pub struct Analyte {
    pub mass: f64,
    pub charge: i32,
    pub profile: Vec<f64>,
}

impl Analyte {
    pub fn new(mass: f64, charge: i32, profile: &[f64]) -> Self {
        Self {
            mass,
            charge,
            profile: profile.to_vec(),
        }
    }

    /// Present at `scale` in one scan only.
    pub fn single(mass: f64, charge: i32, scan: usize, num_scans: usize, scale: f64) -> Self {
        let mut profile = vec![0.0; num_scans];
        profile[scan] = scale;
        Self {
            mass,
            charge,
            profile,
        }
    }
}

/// (m/z, relative abundance) of the theoretical isotopes the engine will look for.
pub fn isotope_peaks(mass: f64, charge: i32) -> Vec<(f64, f64)> {
    ConvolutionIsotopeProvider::default()
        .distribution(None, mass)
        .unwrap()
        .iter()
        .map(|x| (mass_to_mz(mass + x.mass_offset, charge), x.abundance))
        .collect()
}

pub fn synthetic_scans(rts: &[f64], analytes: &[Analyte]) -> Vec<Scan> {
    rts.iter()
        .enumerate()
        .map(|(s, rt)| {
            let mut mz = vec![NOISE_MZ];
            let mut intensity = vec![NOISE_INTENSITY];
            for analyte in analytes {
                let scale = analyte.profile[s];
                if scale <= 0.0 {
                    continue;
                }
                for (peak_mz, abundance) in isotope_peaks(analyte.mass, analyte.charge) {
                    mz.push(peak_mz);
                    intensity.push(scale * abundance);
                }
            }
            Scan::ms1(*rt, mz, intensity)
        })
        .collect()
}

/// Evenly spaced retention times starting at `start`.
pub fn rts(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + (i as f64) * step).collect()
}

pub fn protein(accession: &str) -> ProteinGroup {
    ProteinGroup::new(accession, "gene", "org")
}

pub fn identification(
    file: &SpectraFile,
    sequence: &str,
    mass: f64,
    rt: f64,
    charge: i32,
    protein_group: &ProteinGroup,
) -> Identification {
    Identification::new(
        file.clone(),
        sequence,
        sequence,
        mass,
        rt,
        charge,
        vec![protein_group.clone()],
    )
}

pub fn quiet_config() -> FlashLfqConfig {
    FlashLfqConfig {
        silent: true,
        max_threads: 2,
        ..Default::default()
    }
}

pub fn run(
    identifications: Vec<Identification>,
    scans: Vec<(SpectraFile, Vec<Scan>)>,
    config: FlashLfqConfig,
) -> FlashLfqResults {
    let mut source = InMemoryScanSource::new();
    for (file, file_scans) in scans {
        source.insert(file, file_scans);
    }
    FlashLfqEngine::new(identifications, Arc::new(source), config)
        .unwrap()
        .run()
        .unwrap()
}
