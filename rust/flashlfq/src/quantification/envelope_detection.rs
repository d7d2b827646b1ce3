use crate::indexing::SpectralIndex;
use crate::isotopes::IsotopePeak;
use crate::models::IsotopicEnvelope;
use crate::utils::mass_to_mz;

/// Finds the isotopic envelope of a species at one scan and charge.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeDetector<'a> {
    index: &'a SpectralIndex,
    ppm_tolerance: f64,
    num_isotopes_required: usize,
}

impl<'a> EnvelopeDetector<'a> {
    pub fn new(index: &'a SpectralIndex, ppm_tolerance: f64, num_isotopes_required: usize) -> Self {
        Self {
            index,
            ppm_tolerance,
            num_isotopes_required,
        }
    }

    /// The envelope at `scan_index`, if the monoisotopic peak is there and
    /// enough isotope peaks match.
    ///
    /// The intensity is the abundance-weighted sum of the matched peaks.
    pub fn detect(
        &self,
        isotopes: &[IsotopePeak],
        monoisotopic_mass: f64,
        charge: i32,
        scan_index: usize,
    ) -> Option<IsotopicEnvelope> {
        if isotopes.is_empty() || !monoisotopic_mass.is_finite() || charge == 0 {
            return None;
        }
        let max_abundance = isotopes.iter().map(|x| x.abundance).fold(0.0, f64::max);
        if max_abundance <= 0.0 {
            return None;
        }

        let mono_mz = mass_to_mz(monoisotopic_mass + isotopes[0].mass_offset, charge);
        let mono = self.index.best_peak(mono_mz, self.ppm_tolerance, scan_index)?;

        let mut num_matched = 1;
        let mut intensity = mono.intensity * (isotopes[0].abundance / max_abundance);
        for isotope in &isotopes[1..] {
            let mz = mass_to_mz(monoisotopic_mass + isotope.mass_offset, charge);
            if let Some(peak) = self.index.best_peak(mz, self.ppm_tolerance, scan_index) {
                num_matched += 1;
                intensity += peak.intensity * (isotope.abundance / max_abundance);
            }
        }

        let required = self.num_isotopes_required.min(isotopes.len());
        if num_matched < required {
            return None;
        }
        Some(IsotopicEnvelope::new(*mono, charge, intensity))
    }
}
