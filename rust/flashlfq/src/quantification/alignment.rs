use crate::config::FlashLfqConfig;
use crate::models::{
    ChromatographicPeak,
    SpectraFile,
};
use crate::utils::{
    median,
    median_absolute_deviation,
    TupleRange,
};
use std::collections::BTreeMap;

/// Retention time relationship between a donor and an acceptor file.
#[derive(Debug, Clone, PartialEq)]
pub struct RtAlignment {
    pub donor: SpectraFile,
    pub acceptor: SpectraFile,
    /// Median of (donor apex RT - acceptor apex RT) over the anchors.
    pub offset: f64,
    /// Median absolute deviation of the anchor differences around the offset.
    pub mad: f64,
    pub num_anchors: usize,
}

impl RtAlignment {
    pub fn project(&self, donor_rt: f64) -> f64 {
        donor_rt - self.offset
    }

    pub fn window_half_width(&self, config: &FlashLfqConfig) -> f64 {
        config
            .mbr_rt_window
            .min(config.mbr_min_rt_window.max(4.0 * self.mad))
    }

    /// Window in the acceptor where a donor apex at `donor_rt` is expected.
    pub fn acceptor_window(&self, donor_rt: f64, config: &FlashLfqConfig) -> Option<TupleRange<f64>> {
        let center = self.project(donor_rt);
        let half = self.window_half_width(config);
        TupleRange::try_new(center - half, center + half).ok()
    }
}

/// Apex RT of every sequence usable as an alignment anchor in a file.
///
/// Anchors come from detected, non-ambiguous MS/MS peaks with at least one
/// identification allowed for alignment. The most intense peak wins when a
/// sequence has several.
pub fn anchor_rts(peaks: &[ChromatographicPeak]) -> BTreeMap<&str, f64> {
    let mut best: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for peak in peaks {
        if peak.is_mbr_peak || peak.is_ambiguous() {
            continue;
        }
        let Some(rt) = peak.apex_rt() else {
            continue;
        };
        if !peak.identifications.iter().any(|x| x.use_for_alignment) {
            continue;
        }
        let seq = peak.seed_identification().modified_sequence.as_str();
        match best.get(seq) {
            Some((intensity, _)) if *intensity >= peak.intensity => {}
            _ => {
                best.insert(seq, (peak.intensity, rt));
            }
        }
    }
    best.into_iter().map(|(k, (_, rt))| (k, rt)).collect()
}

/// Aligns two files on their shared anchors. None when they share none.
pub fn align_files(
    donor: &SpectraFile,
    donor_anchors: &BTreeMap<&str, f64>,
    acceptor: &SpectraFile,
    acceptor_anchors: &BTreeMap<&str, f64>,
) -> Option<RtAlignment> {
    let mut diffs: Vec<f64> = donor_anchors
        .iter()
        .filter_map(|(seq, donor_rt)| acceptor_anchors.get(seq).map(|acc_rt| donor_rt - acc_rt))
        .collect();
    let num_anchors = diffs.len();
    let offset = median(&mut diffs)?;
    let mad = median_absolute_deviation(&diffs, offset)?;
    Some(RtAlignment {
        donor: donor.clone(),
        acceptor: acceptor.clone(),
        offset,
        mad,
        num_anchors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_offset_and_window() {
        let donor = SpectraFile::new("a.ndjson", "a", 0, 0, 0);
        let acceptor = SpectraFile::new("b.ndjson", "a", 1, 0, 0);
        let d: BTreeMap<&str, f64> = [("A", 1.01), ("B", 1.02), ("C", 1.03), ("D", 1.04), ("E", 1.05)]
            .into_iter()
            .collect();
        let a: BTreeMap<&str, f64> = [("A", 1.00), ("B", 1.025), ("D", 1.055), ("E", 1.07)]
            .into_iter()
            .collect();
        let alignment = align_files(&donor, &d, &acceptor, &a).unwrap();
        assert_eq!(alignment.num_anchors, 4);
        assert!((alignment.offset + 0.01).abs() < 1e-9);
        assert!((alignment.mad - 0.0075).abs() < 1e-9);
        assert!((alignment.project(1.03) - 1.04).abs() < 1e-9);

        let config = FlashLfqConfig::default();
        assert!((alignment.window_half_width(&config) - 0.05).abs() < 1e-12);
        let window = alignment.acceptor_window(1.03, &config).unwrap();
        assert!(window.contains(1.08));
        assert!(!window.contains(1.1));
    }

    #[test]
    fn test_no_shared_anchors() {
        let donor = SpectraFile::new("a.ndjson", "a", 0, 0, 0);
        let d: BTreeMap<&str, f64> = [("A", 1.0)].into_iter().collect();
        let a: BTreeMap<&str, f64> = [("B", 1.0)].into_iter().collect();
        assert!(align_files(&donor, &d, &donor, &a).is_none());
    }
}
