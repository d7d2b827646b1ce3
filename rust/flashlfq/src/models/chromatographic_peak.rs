use super::envelope::IsotopicEnvelope;
use super::identification::Identification;
use super::spectra_file::SpectraFile;
use crate::utils::{
    mass_to_mz,
    ppm_error,
    TupleRange,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// An elution peak in one file, as a retention-time ordered trace of isotopic envelopes.
///
/// A peak claimed by identifications of more than one modified sequence is
/// ambiguous: it is kept and reported but never quantified for any of them.
#[derive(Debug, Clone)]
pub struct ChromatographicPeak {
    pub spectra_file: SpectraFile,
    pub identifications: Vec<Arc<Identification>>,
    pub intensity: f64,
    pub split_rt: Option<f64>,
    pub is_mbr_peak: bool,
    pub num_identifications_by_base_seq: usize,
    pub num_identifications_by_full_seq: usize,
    pub mass_error_ppm: f64,
    envelopes: Vec<IsotopicEnvelope>,
    apex: Option<IsotopicEnvelope>,
}

impl ChromatographicPeak {
    /// An empty peak for a seed identification.
    pub fn new(identification: Arc<Identification>, is_mbr_peak: bool, spectra_file: SpectraFile) -> Self {
        Self {
            spectra_file,
            identifications: vec![identification],
            intensity: 0.0,
            split_rt: None,
            is_mbr_peak,
            num_identifications_by_base_seq: 1,
            num_identifications_by_full_seq: 1,
            mass_error_ppm: f64::NAN,
            envelopes: Vec::new(),
            apex: None,
        }
    }

    pub fn envelopes(&self) -> &[IsotopicEnvelope] {
        &self.envelopes
    }

    pub fn apex(&self) -> Option<&IsotopicEnvelope> {
        self.apex.as_ref()
    }

    pub fn apex_rt(&self) -> Option<f64> {
        self.apex.map(|x| x.retention_time())
    }

    /// The first identification, the one the peak was seeded from.
    pub fn seed_identification(&self) -> &Arc<Identification> {
        &self.identifications[0]
    }

    pub fn is_ambiguous(&self) -> bool {
        self.num_identifications_by_full_seq > 1
    }

    /// Retention time span from the first to the last envelope.
    pub fn rt_window(&self) -> Option<TupleRange<f64>> {
        let first = self.envelopes.first()?.retention_time();
        let last = self.envelopes.last()?.retention_time();
        TupleRange::try_new(first, last).ok()
    }

    /// Replaces the trace. Keeps the most intense envelope per scan and
    /// sorts by scan index.
    pub fn set_envelopes(&mut self, envelopes: Vec<IsotopicEnvelope>) {
        self.envelopes = dedup_by_scan(envelopes);
    }

    pub fn retain_envelopes(&mut self, f: impl FnMut(&IsotopicEnvelope) -> bool) {
        self.envelopes.retain(f);
    }

    /// Picks the apex, then the intensity: the apex envelope's intensity,
    /// or the sum over the trace when `integrate` is set.
    ///
    /// Ties for the apex resolve to the earliest scan.
    pub fn calculate_intensity(&mut self, integrate: bool) {
        self.apex = self
            .envelopes
            .iter()
            .fold(None::<IsotopicEnvelope>, |best, env| match best {
                Some(b) if b.intensity >= env.intensity => Some(b),
                _ => Some(*env),
            });

        match self.apex {
            None => {
                self.intensity = 0.0;
                self.mass_error_ppm = f64::NAN;
            }
            Some(apex) => {
                self.intensity = if integrate {
                    self.envelopes.iter().map(|x| x.intensity).sum()
                } else {
                    apex.intensity
                };
                let theoretical = mass_to_mz(self.seed_identification().monoisotopic_mass, apex.charge);
                self.mass_error_ppm = ppm_error(apex.indexed_peak.mz, theoretical);
            }
        }
    }

    /// Refreshes the ambiguity counters from the attached identifications.
    pub fn resolve_identifications(&mut self) {
        self.identifications.sort_by(|a, b| {
            a.modified_sequence
                .cmp(&b.modified_sequence)
                .then(a.ms2_retention_time.total_cmp(&b.ms2_retention_time))
        });
        let base: BTreeSet<&str> = self
            .identifications
            .iter()
            .map(|x| x.base_sequence.as_str())
            .collect();
        let full: BTreeSet<&str> = self
            .identifications
            .iter()
            .map(|x| x.modified_sequence.as_str())
            .collect();
        self.num_identifications_by_base_seq = base.len();
        self.num_identifications_by_full_seq = full.len();
    }

    /// Folds another peak of the same file into this one.
    ///
    /// Envelopes are unioned (one per scan, most intense wins), identifications
    /// are unioned and the apex is re-picked.
    pub fn merge_with(&mut self, other: ChromatographicPeak, integrate: bool) {
        let mut envelopes = std::mem::take(&mut self.envelopes);
        envelopes.extend(other.envelopes);
        self.envelopes = dedup_by_scan(envelopes);
        for id in other.identifications {
            if !self.identifications.iter().any(|x| Arc::ptr_eq(x, &id)) {
                self.identifications.push(id);
            }
        }
        self.split_rt = match (self.split_rt, other.split_rt) {
            (Some(a), _) => Some(a),
            (None, b) => b,
        };
        self.resolve_identifications();
        self.calculate_intensity(integrate);
    }

    /// Multiplies every envelope and the peak intensity by a normalization factor.
    pub fn scale(&mut self, factor: f64) {
        self.envelopes.iter_mut().for_each(|x| x.scale(factor));
        if let Some(apex) = self.apex.as_mut() {
            apex.scale(factor);
        }
        self.intensity *= factor;
    }
}

fn dedup_by_scan(mut envelopes: Vec<IsotopicEnvelope>) -> Vec<IsotopicEnvelope> {
    // Most intense first within a scan, so dedup keeps it.
    envelopes.sort_by(|a, b| {
        a.scan_index()
            .cmp(&b.scan_index())
            .then(b.intensity.total_cmp(&a.intensity))
    });
    envelopes.dedup_by_key(|x| x.scan_index());
    envelopes
}

impl std::fmt::Display for ChromatographicPeak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let seq = self
            .identifications
            .iter()
            .map(|x| x.modified_sequence.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
            .join("|");
        match self.apex {
            Some(apex) => write!(
                f,
                "{}\t{}\t{:.0}\t{:.4}\t{}{}",
                self.spectra_file,
                seq,
                self.intensity,
                apex.retention_time(),
                self.envelopes.len(),
                if self.is_mbr_peak { "\tMBR" } else { "" }
            ),
            None => write!(f, "{}\t{}\tnot detected", self.spectra_file, seq),
        }
    }
}
