//! Chromatographic peak construction for one spectra file.
//!
//! Peaks are grown scan by scan from a seed, cut at deep valleys and then
//! reconciled: peaks of one sequence close in time are merged, peaks of
//! different sequences sharing an apex become a single ambiguous peak.

use super::envelope_detection::EnvelopeDetector;
use crate::config::FlashLfqConfig;
use crate::indexing::SpectralIndex;
use crate::isotopes::{
    IsotopeCache,
    IsotopePeak,
};
use crate::models::{
    ChromatographicPeak,
    Identification,
    IsotopicEnvelope,
    SpectraFile,
};
use crate::utils::TupleRange;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::sync::Arc;
use tracing::debug;

pub struct PeakBuilder<'a> {
    index: &'a SpectralIndex,
    isotopes: &'a IsotopeCache,
    config: &'a FlashLfqConfig,
    spectra_file: &'a SpectraFile,
}

impl<'a> PeakBuilder<'a> {
    pub fn new(
        index: &'a SpectralIndex,
        isotopes: &'a IsotopeCache,
        config: &'a FlashLfqConfig,
        spectra_file: &'a SpectraFile,
    ) -> Self {
        Self {
            index,
            isotopes,
            config,
            spectra_file,
        }
    }

    /// Builds, cuts and reconciles the peaks of every identification of the file.
    ///
    /// An identification whose trace comes up empty is only reported, as an
    /// empty peak, when no other identification of its modified sequence was
    /// detected in the file. Otherwise it is dropped.
    #[tracing::instrument(level = "debug", skip_all, fields(file = %self.spectra_file))]
    pub fn quantify_identifications(
        &self,
        identifications: &[Arc<Identification>],
    ) -> Vec<ChromatographicPeak> {
        let mut charges_by_sequence: BTreeMap<&str, BTreeSet<i32>> = BTreeMap::new();
        for id in identifications {
            charges_by_sequence
                .entry(id.modified_sequence.as_str())
                .or_default()
                .insert(id.precursor_charge);
        }

        let peaks: Vec<ChromatographicPeak> = identifications
            .iter()
            .map(|id| {
                let charges: Vec<i32> = if self.config.id_specific_charge_state {
                    vec![id.precursor_charge]
                } else {
                    charges_by_sequence[id.modified_sequence.as_str()]
                        .iter()
                        .copied()
                        .collect()
                };
                self.build_msms_peak(id, &charges)
            })
            .collect();

        let peaks = merge_same_sequence_peaks(peaks, self.config);
        let peaks = merge_shared_apex_peaks(peaks, self.config.integrate);
        debug!(
            "{} identifications resolved into {} peaks",
            identifications.len(),
            peaks.len()
        );
        peaks
    }

    fn build_msms_peak(&self, id: &Arc<Identification>, charges: &[i32]) -> ChromatographicPeak {
        let mut peak = ChromatographicPeak::new(id.clone(), false, self.spectra_file.clone());
        let isotopes = self.isotopes.get(id);
        let Some(seed_scan) = self.index.closest_scan_index(id.ms2_retention_time) else {
            peak.calculate_intensity(self.config.integrate);
            return peak;
        };

        let detector = EnvelopeDetector::new(
            self.index,
            self.config.ppm_tolerance,
            self.config.num_isotopes_required,
        );
        let envelopes = charges
            .iter()
            .flat_map(|&z| self.trace(&detector, &isotopes, id.monoisotopic_mass, z, seed_scan))
            .collect();
        peak.set_envelopes(envelopes);
        peak.calculate_intensity(self.config.integrate);
        self.cut_peak(&mut peak, id.ms2_retention_time);
        peak
    }

    /// Recovers a peak for a donor identification inside a retention time window.
    ///
    /// Seeds at the most intense envelope in the window. Returns None when
    /// nothing is found or the resulting apex falls outside the window.
    pub fn build_mbr_peak(
        &self,
        donor_identification: &Arc<Identification>,
        charges: &[i32],
        projected_rt: f64,
        rt_window: TupleRange<f64>,
    ) -> Option<ChromatographicPeak> {
        let isotopes = self.isotopes.get(donor_identification);
        let mass = donor_identification.monoisotopic_mass;
        let scans = self.index.scan_range_for_rt(rt_window)?;
        let detector = EnvelopeDetector::new(
            self.index,
            self.config.mbr_ppm_tolerance,
            self.config.num_isotopes_required,
        );

        let mut seed: Option<IsotopicEnvelope> = None;
        for scan_index in scans.start()..=scans.end() {
            for &z in charges {
                let Some(env) = detector.detect(&isotopes, mass, z, scan_index) else {
                    continue;
                };
                match seed {
                    Some(s) if s.intensity >= env.intensity => {}
                    _ => seed = Some(env),
                }
            }
        }
        let seed = seed?;

        let mut peak = ChromatographicPeak::new(
            donor_identification.clone(),
            true,
            self.spectra_file.clone(),
        );
        let envelopes = charges
            .iter()
            .flat_map(|&z| self.trace(&detector, &isotopes, mass, z, seed.scan_index()))
            .collect();
        peak.set_envelopes(envelopes);
        peak.calculate_intensity(self.config.integrate);
        self.cut_peak(&mut peak, projected_rt);

        match peak.apex_rt() {
            Some(rt) if rt_window.contains(rt) => Some(peak),
            _ => None,
        }
    }

    /// Walks right from the seed scan, then left from the scan before it.
    /// Each direction stops after more than `max_missed_scans` consecutive misses.
    fn trace(
        &self,
        detector: &EnvelopeDetector<'_>,
        isotopes: &[IsotopePeak],
        mass: f64,
        charge: i32,
        seed_scan: usize,
    ) -> Vec<IsotopicEnvelope> {
        let max_missed = self.config.max_missed_scans;
        let mut out = Vec::new();

        let mut missed = 0;
        for scan_index in seed_scan..self.index.num_scans() {
            match detector.detect(isotopes, mass, charge, scan_index) {
                Some(env) => {
                    out.push(env);
                    missed = 0;
                }
                None => {
                    missed += 1;
                    if missed > max_missed {
                        break;
                    }
                }
            }
        }

        missed = 0;
        for scan_index in (0..seed_scan).rev() {
            match detector.detect(isotopes, mass, charge, scan_index) {
                Some(env) => {
                    out.push(env);
                    missed = 0;
                }
                None => {
                    missed += 1;
                    if missed > max_missed {
                        break;
                    }
                }
            }
        }
        out
    }

    /// Splits the peak at the first deep enough valley on either side of the
    /// apex, keeping the side that holds `identification_rt`. Repeats until
    /// no valley qualifies.
    pub fn cut_peak(&self, peak: &mut ChromatographicPeak, identification_rt: f64) {
        while let Some(valley) = find_valley(
            peak,
            self.config.discrimination_factor_to_cut_peak,
            self.config.min_envelopes_to_cut,
        ) {
            let valley_rt = valley.retention_time();
            if identification_rt > valley_rt {
                peak.retain_envelopes(|x| x.retention_time() > valley_rt);
            } else {
                peak.retain_envelopes(|x| x.retention_time() < valley_rt);
            }
            peak.split_rt = Some(valley_rt);
            peak.calculate_intensity(self.config.integrate);
        }
    }
}

fn find_valley(
    peak: &ChromatographicPeak,
    discrimination_factor: f64,
    min_envelopes_to_cut: usize,
) -> Option<IsotopicEnvelope> {
    let envelopes = peak.envelopes();
    if envelopes.len() < min_envelopes_to_cut {
        return None;
    }
    let apex = peak.apex()?;
    let apex_idx = envelopes
        .iter()
        .position(|x| x.scan_index() == apex.scan_index())?;

    let right = envelopes[apex_idx + 1..].iter();
    let left = envelopes[..apex_idx].iter().rev();
    scan_for_valley(apex, right, discrimination_factor)
        .or_else(|| scan_for_valley(apex, left, discrimination_factor))
}

fn scan_for_valley<'b>(
    apex: &IsotopicEnvelope,
    walk: impl Iterator<Item = &'b IsotopicEnvelope>,
    discrimination_factor: f64,
) -> Option<IsotopicEnvelope> {
    let mut valley = *apex;
    for env in walk {
        if env.intensity < valley.intensity {
            valley = *env;
        }
        let discrimination = (env.intensity - valley.intensity) / env.intensity;
        if discrimination > discrimination_factor {
            return Some(valley);
        }
    }
    None
}

fn separated_by_split(a: &ChromatographicPeak, b: &ChromatographicPeak) -> bool {
    let (Some(wa), Some(wb)) = (a.rt_window(), b.rt_window()) else {
        return false;
    };
    let (first, second) = if wa.start() <= wb.start() {
        (wa, wb)
    } else {
        (wb, wa)
    };
    let lo = first.end().min(second.start());
    let hi = first.end().max(second.start());
    [a.split_rt, b.split_rt]
        .into_iter()
        .flatten()
        .any(|s| lo <= s && s <= hi)
}

fn within_merge_window(a: &ChromatographicPeak, b: &ChromatographicPeak, window: f64) -> bool {
    let (Some(wa), Some(wb)) = (a.rt_window(), b.rt_window()) else {
        return false;
    };
    let gap = (wb.start() - wa.end()).max(wa.start() - wb.end());
    gap <= window
}

/// Merges detected peaks of the same modified sequence that are close in time
/// and not separated by a cut. Empty peaks of a sequence collapse into one,
/// which is dropped when the sequence was detected.
fn merge_same_sequence_peaks(
    peaks: Vec<ChromatographicPeak>,
    config: &FlashLfqConfig,
) -> Vec<ChromatographicPeak> {
    let mut by_sequence: BTreeMap<String, Vec<ChromatographicPeak>> = BTreeMap::new();
    for peak in peaks {
        by_sequence
            .entry(peak.seed_identification().modified_sequence.clone())
            .or_default()
            .push(peak);
    }

    let mut out = Vec::new();
    for (_, group) in by_sequence {
        let (detected, empty): (Vec<_>, Vec<_>) =
            group.into_iter().partition(|x| x.apex().is_some());

        let mut merged: Vec<ChromatographicPeak> = Vec::with_capacity(detected.len());
        for peak in detected {
            merged.push(peak);
            // Absorbing a peak widens the window, so keep folding until stable.
            let mut changed = true;
            while changed {
                changed = false;
                let last = merged.len() - 1;
                if let Some(pos) = merged[..last].iter().position(|other| {
                    within_merge_window(other, &merged[last], config.merge_window_minutes)
                        && !separated_by_split(other, &merged[last])
                }) {
                    let current = merged.remove(last);
                    let mut target = merged.remove(pos);
                    target.merge_with(current, config.integrate);
                    merged.push(target);
                    changed = true;
                }
            }
        }

        if merged.is_empty() {
            let mut empty = empty.into_iter();
            if let Some(mut first) = empty.next() {
                for other in empty {
                    first.merge_with(other, config.integrate);
                }
                out.push(first);
            }
        } else {
            out.extend(merged);
        }
    }
    out
}

/// Peaks whose apex is the same centroid are one elution peak, whatever the
/// sequences claiming it.
pub(crate) fn merge_shared_apex_peaks(
    peaks: Vec<ChromatographicPeak>,
    integrate: bool,
) -> Vec<ChromatographicPeak> {
    let mut by_apex: BTreeMap<(usize, u64), ChromatographicPeak> = BTreeMap::new();
    let mut out = Vec::new();
    for mut peak in peaks {
        let Some(apex) = peak.apex() else {
            peak.resolve_identifications();
            out.push(peak);
            continue;
        };
        let key = (apex.scan_index(), apex.indexed_peak.mz.to_bits());
        match by_apex.get_mut(&key) {
            Some(existing) => existing.merge_with(peak, integrate),
            None => {
                peak.resolve_identifications();
                by_apex.insert(key, peak);
            }
        }
    }
    out.extend(by_apex.into_values());
    sort_peaks(&mut out);
    out
}

/// Deterministic order: by apex retention time, empty peaks last, then by sequence.
pub(crate) fn sort_peaks(peaks: &mut [ChromatographicPeak]) {
    peaks.sort_by(|a, b| {
        let rt_a = a.apex_rt().unwrap_or(f64::INFINITY);
        let rt_b = b.apex_rt().unwrap_or(f64::INFINITY);
        rt_a.total_cmp(&rt_b).then_with(|| {
            a.seed_identification()
                .modified_sequence
                .cmp(&b.seed_identification().modified_sequence)
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isotopes::ConvolutionIsotopeProvider;
    use crate::models::{
        IndexedPeak,
        ProteinGroup,
        Scan,
    };
    use crate::utils::mass_to_mz;

    const MASS: f64 = 1350.65681;

    fn file() -> SpectraFile {
        SpectraFile::new("run.ndjson", "", 0, 0, 0)
    }

    fn id(seq: &str, rt: f64) -> Arc<Identification> {
        Arc::new(Identification::new(
            file(),
            seq,
            seq,
            MASS,
            rt,
            2,
            vec![ProteinGroup::new("P", "", "")],
        ))
    }

    // One scan every 0.1 min from 1.0, an envelope of `amount` where non-zero.
    fn scans(amounts: &[f64], isotopes: &[IsotopePeak]) -> Vec<Scan> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| {
                let rt = 1.0 + i as f64 / 10.0;
                if amount == 0.0 {
                    return Scan::ms1(rt, vec![], vec![]);
                }
                let mz = isotopes
                    .iter()
                    .map(|x| mass_to_mz(MASS + x.mass_offset, 2))
                    .collect();
                let intensity = isotopes.iter().map(|x| x.abundance * amount).collect();
                Scan::ms1(rt, mz, intensity)
            })
            .collect()
    }

    fn run(amounts: &[f64], ids: &[Arc<Identification>]) -> Vec<ChromatographicPeak> {
        let provider = ConvolutionIsotopeProvider::default();
        let cache = IsotopeCache::build(&provider, ids).unwrap();
        let isotopes = cache.get(&ids[0]);
        let (index, _) = SpectralIndex::from_scans(&scans(amounts, &isotopes)).unwrap();
        let config = FlashLfqConfig::default();
        let f = file();
        PeakBuilder::new(&index, &cache, &config, &f).quantify_identifications(ids)
    }

    fn env(scan: usize, intensity: f64) -> IsotopicEnvelope {
        IsotopicEnvelope::new(
            IndexedPeak::new(500.0, intensity, scan, 1.0 + scan as f64 / 10.0),
            2,
            intensity,
        )
    }

    #[test]
    fn test_valley_search() {
        let mut peak = ChromatographicPeak::new(id("A", 1.0), false, file());
        let trace = [1.0, 3.0, 1.0, 1.0, 3.0, 5.0, 10.0, 5.0, 3.0, 1.0];
        peak.set_envelopes(trace.iter().enumerate().map(|(i, &x)| env(i, x)).collect());
        peak.calculate_intensity(false);
        let valley = find_valley(&peak, 0.6, 5).unwrap();
        assert_eq!(valley.scan_index(), 3);
        assert!(find_valley(&peak, 0.6, 11).is_none());
    }

    #[test]
    fn test_split_keeps_identified_side() {
        let peaks = run(
            &[1.0, 3.0, 1.0, 1.0, 3.0, 5.0, 10.0, 5.0, 3.0, 1.0],
            &[id("EGFQVADGPLYR", 1.701)],
        );
        assert_eq!(peaks.len(), 1);
        let peak = &peaks[0];
        assert_eq!(peak.envelopes().len(), 6);
        assert!((peak.apex_rt().unwrap() - 1.6).abs() < 1e-9);
        assert!((peak.split_rt.unwrap() - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_trace_stops_after_missed_scans() {
        // Two empty scans in a row end the walk.
        let peaks = run(&[1.0, 3.0, 0.0, 0.0, 5.0], &[id("EGFQVADGPLYR", 1.101)]);
        assert_eq!(peaks[0].envelopes().len(), 2);
        // A single empty scan is bridged.
        let peaks = run(&[1.0, 3.0, 0.0, 2.0, 5.0], &[id("EGFQVADGPLYR", 1.101)]);
        assert_eq!(peaks[0].envelopes().len(), 4);
        assert!((peaks[0].apex_rt().unwrap() - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_same_sequence_peaks_merge() {
        let peaks = run(
            &[1.0, 3.0, 0.0, 0.0, 1.0],
            &[id("EGFQVADGPLYR", 1.101), id("EGFQVADGPLYR", 1.401)],
        );
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].envelopes().len(), 3);
        assert_eq!(peaks[0].identifications.len(), 2);
        assert!((peaks[0].apex_rt().unwrap() - 1.1).abs() < 1e-9);
        assert!(!peaks[0].is_ambiguous());
    }

    #[test]
    fn test_undetected_id_of_detected_sequence_is_dropped() {
        let peaks = run(
            &[1.0, 3.0, 0.0, 0.0, 0.0, 0.0],
            &[id("EGFQVADGPLYR", 1.101), id("EGFQVADGPLYR", 1.501)],
        );
        assert_eq!(peaks.len(), 1);
        assert!(peaks[0].apex().is_some());
        assert_eq!(peaks[0].identifications.len(), 1);
        assert!((peaks[0].seed_identification().ms2_retention_time - 1.101).abs() < 1e-9);
    }

    #[test]
    fn test_shared_apex_is_ambiguous() {
        let peaks = run(
            &[1.0, 3.0, 5.0, 3.0, 1.0],
            &[id("EGFQVADGPLRY", 1.201), id("EGFQVADGPLYR", 1.101)],
        );
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].num_identifications_by_full_seq, 2);
        assert!(peaks[0].is_ambiguous());
    }

    #[test]
    fn test_nan_mass_gives_empty_peak() {
        let good = id("EGFQVADGPLYR", 1.1);
        let bad = Arc::new(Identification::new(
            file(),
            "NANPEPTIDE",
            "NANPEPTIDE",
            f64::NAN,
            1.1,
            2,
            vec![],
        ));
        let peaks = run(&[1.0, 3.0, 1.0], &[good, bad]);
        assert_eq!(peaks.len(), 2);
        let empty = peaks.iter().find(|x| x.apex().is_none()).unwrap();
        assert_eq!(empty.intensity, 0.0);
        assert_eq!(empty.seed_identification().modified_sequence, "NANPEPTIDE");
    }
}
