//! Match-between-runs: recovers peaks for sequences identified in other files.

use super::alignment::{
    align_files,
    anchor_rts,
    RtAlignment,
};
use super::peak_builder::{
    merge_shared_apex_peaks,
    PeakBuilder,
};
use crate::config::FlashLfqConfig;
use crate::models::{
    ChromatographicPeak,
    Identification,
    SpectraFile,
};
use crate::utils::TupleRange;
use std::collections::{
    BTreeMap,
    BTreeSet,
    HashSet,
};
use std::sync::Arc;
use tracing::debug;

/// A peak to look for in an acceptor file.
#[derive(Debug, Clone)]
pub struct MbrRequest {
    pub donor: SpectraFile,
    pub identification: Arc<Identification>,
    pub charges: Vec<i32>,
    pub projected_rt: f64,
    pub rt_window: TupleRange<f64>,
}

// Most intense detected, non-ambiguous MS/MS peak per sequence.
fn donor_peaks(peaks: &[ChromatographicPeak]) -> BTreeMap<&str, &ChromatographicPeak> {
    let mut out: BTreeMap<&str, &ChromatographicPeak> = BTreeMap::new();
    for peak in peaks {
        if peak.is_mbr_peak || peak.is_ambiguous() || peak.apex().is_none() {
            continue;
        }
        let seq = peak.seed_identification().modified_sequence.as_str();
        match out.get(seq) {
            Some(best) if best.intensity >= peak.intensity => {}
            _ => {
                out.insert(seq, peak);
            }
        }
    }
    out
}

/// Every pairwise alignment, keyed by acceptor. Donors keep file order.
pub fn align_all(
    peaks_by_file: &BTreeMap<SpectraFile, Vec<ChromatographicPeak>>,
) -> BTreeMap<SpectraFile, Vec<RtAlignment>> {
    let anchors: BTreeMap<&SpectraFile, BTreeMap<&str, f64>> = peaks_by_file
        .iter()
        .map(|(file, peaks)| (file, anchor_rts(peaks)))
        .collect();

    let mut out = BTreeMap::new();
    for (acceptor, acceptor_anchors) in anchors.iter() {
        let alignments: Vec<RtAlignment> = anchors
            .iter()
            .filter(|(donor, _)| donor != &acceptor)
            .filter_map(|(donor, donor_anchors)| {
                align_files(donor, donor_anchors, acceptor, acceptor_anchors)
            })
            .collect();
        for a in alignments.iter() {
            debug!(
                "RT alignment {} -> {}: offset {:.4} min, MAD {:.4} min, {} anchors",
                a.donor, a.acceptor, a.offset, a.mad, a.num_anchors
            );
        }
        out.insert((*acceptor).clone(), alignments);
    }
    out
}

/// Decides, for every acceptor file, which sequences to look for and where.
///
/// A sequence is requested in a file where it was never identified, from the
/// donor sharing the most anchors with that file (earliest file on ties).
pub fn plan_requests(
    peaks_by_file: &BTreeMap<SpectraFile, Vec<ChromatographicPeak>>,
    alignments: &BTreeMap<SpectraFile, Vec<RtAlignment>>,
    config: &FlashLfqConfig,
) -> BTreeMap<SpectraFile, Vec<MbrRequest>> {
    let donors: BTreeMap<&SpectraFile, BTreeMap<&str, &ChromatographicPeak>> = peaks_by_file
        .iter()
        .map(|(file, peaks)| (file, donor_peaks(peaks)))
        .collect();
    let donated: BTreeSet<&str> = donors.values().flat_map(|x| x.keys().copied()).collect();

    let mut out = BTreeMap::new();
    for (acceptor, peaks) in peaks_by_file.iter() {
        let identified: BTreeSet<&str> = peaks
            .iter()
            .flat_map(|p| p.identifications.iter().map(|x| x.modified_sequence.as_str()))
            .collect();
        let Some(file_alignments) = alignments.get(acceptor) else {
            continue;
        };

        let mut requests = Vec::new();
        for seq in donated.iter().filter(|s| !identified.contains(*s)) {
            let mut chosen: Option<(&RtAlignment, &ChromatographicPeak)> = None;
            for alignment in file_alignments {
                let Some(peak) = donors.get(&alignment.donor).and_then(|x| x.get(seq)) else {
                    continue;
                };
                match chosen {
                    Some((best, _)) if best.num_anchors >= alignment.num_anchors => {}
                    _ => chosen = Some((alignment, *peak)),
                }
            }
            let Some((alignment, donor_peak)) = chosen else {
                continue;
            };
            let Some(donor_rt) = donor_peak.apex_rt() else {
                continue;
            };
            let Some(rt_window) = alignment.acceptor_window(donor_rt, config) else {
                continue;
            };
            let mut charges: BTreeSet<i32> =
                donor_peak.envelopes().iter().map(|x| x.charge).collect();
            charges.insert(donor_peak.seed_identification().precursor_charge);

            requests.push(MbrRequest {
                donor: alignment.donor.clone(),
                identification: donor_peak.seed_identification().clone(),
                charges: charges.into_iter().collect(),
                projected_rt: alignment.project(donor_rt),
                rt_window,
            });
        }
        out.insert(acceptor.clone(), requests);
    }
    out
}

/// Runs the requests of one acceptor file.
///
/// Peaks landing on the apex of an MS/MS peak of the file are discarded.
#[tracing::instrument(level = "debug", skip_all)]
pub fn recover_peaks(
    builder: &PeakBuilder<'_>,
    requests: &[MbrRequest],
    existing_peaks: &[ChromatographicPeak],
    integrate: bool,
) -> Vec<ChromatographicPeak> {
    let taken: HashSet<(usize, u64)> = existing_peaks
        .iter()
        .filter(|x| !x.is_mbr_peak)
        .filter_map(|x| x.apex())
        .map(|x| (x.scan_index(), x.indexed_peak.mz.to_bits()))
        .collect();

    let recovered: Vec<ChromatographicPeak> = requests
        .iter()
        .filter_map(|req| {
            builder.build_mbr_peak(
                &req.identification,
                &req.charges,
                req.projected_rt,
                req.rt_window,
            )
        })
        .filter(|peak| {
            peak.apex()
                .is_some_and(|x| !taken.contains(&(x.scan_index(), x.indexed_peak.mz.to_bits())))
        })
        .collect();
    debug!(
        "Recovered {} of {} requested peaks",
        recovered.len(),
        requests.len()
    );
    merge_shared_apex_peaks(recovered, integrate)
}
