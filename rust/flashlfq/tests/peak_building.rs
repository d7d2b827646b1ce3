mod common;

use common::*;
use flashlfq::{
    DetectionType,
    SpectraFile,
};

const SPLIT_LEFT: [f64; 10] = [1.0, 3.0, 1.0, 1.0, 3.0, 5.0, 10.0, 5.0, 3.0, 1.0];
const SPLIT_RIGHT: [f64; 10] = [1.0, 3.0, 5.0, 10.0, 5.0, 3.0, 1.0, 1.0, 3.0, 1.0];

fn single_peptide_run(profile: &[f64], id_rts: &[f64]) -> flashlfq::FlashLfqResults {
    let file = SpectraFile::new("single.ndjson", "", 0, 0, 0);
    let pg = protein("MyProtein");
    let profile: Vec<f64> = profile.iter().map(|x| x * 1e6).collect();
    let scans = synthetic_scans(
        &rts(1.0, 0.1, profile.len()),
        &[Analyte::new(PEPTIDE, 1, &profile)],
    );
    let ids = id_rts
        .iter()
        .map(|rt| identification(&file, "PEPTIDE", PEPTIDE, *rt, 1, &pg))
        .collect();
    run(ids, vec![(file, scans)], quiet_config())
}

fn only_peak(results: &flashlfq::FlashLfqResults) -> &flashlfq::ChromatographicPeak {
    let peaks = results.peaks.values().next().unwrap();
    assert_eq!(peaks.len(), 1);
    &peaks[0]
}

#[test]
fn test_peak_splitting_left() {
    let results = single_peptide_run(&SPLIT_LEFT, &[1.701]);
    let peak = only_peak(&results);

    assert!((peak.apex_rt().unwrap() - 1.6).abs() < 1e-9);
    assert!((peak.split_rt.unwrap() - 1.3).abs() < 1e-9);
    assert!(peak.envelopes().iter().all(|x| x.retention_time() > 1.3 + 1e-9));
    assert_eq!(peak.envelopes().len(), 6);
}

#[test]
fn test_peak_splitting_right() {
    let results = single_peptide_run(&SPLIT_RIGHT, &[1.301]);
    let peak = only_peak(&results);

    assert!((peak.apex_rt().unwrap() - 1.3).abs() < 1e-9);
    assert!((peak.split_rt.unwrap() - 1.6).abs() < 1e-9);
    assert!(peak.envelopes().iter().all(|x| x.retention_time() < 1.6 - 1e-9));
    assert_eq!(peak.envelopes().len(), 6);
}

#[test]
fn test_peak_splitting_right_with_empty_scan() {
    let mut profile = SPLIT_RIGHT;
    profile[7] = 0.0;
    let results = single_peptide_run(&profile, &[1.301]);
    let peak = only_peak(&results);

    assert!((peak.apex_rt().unwrap() - 1.3).abs() < 1e-9);
    assert!((peak.split_rt.unwrap() - 1.6).abs() < 1e-9);
    assert_eq!(peak.envelopes().len(), 6);
}

#[test]
fn test_peak_splitting_left_with_empty_scan() {
    let mut profile = SPLIT_LEFT;
    profile[2] = 0.0;
    let results = single_peptide_run(&profile, &[1.301]);
    let peak = only_peak(&results);

    assert!((peak.apex_rt().unwrap() - 1.6).abs() < 1e-9);
    assert!((peak.split_rt.unwrap() - 1.3).abs() < 1e-9);
    assert!(peak.envelopes().iter().all(|x| x.retention_time() > 1.3 + 1e-9));
    assert_eq!(peak.envelopes().len(), 6);
}

#[test]
fn test_nearby_peaks_of_one_sequence_merge() {
    let results = single_peptide_run(&[1.0, 3.0, 0.0, 0.0, 1.0], &[1.101, 1.401]);
    let peak = only_peak(&results);

    assert!((peak.apex_rt().unwrap() - 1.1).abs() < 1e-9);
    assert_eq!(peak.envelopes().len(), 3);
    assert_eq!(peak.identifications.len(), 2);
    assert!(!peak.is_ambiguous());
}

#[test]
fn test_peak_merging_across_missed_scans() {
    let results = single_peptide_run(
        &[1.0, 3.0, 5.0, 10.0, 5.0, 3.0, 1.0, 0.0, 0.0, 1.0],
        &[1.301, 1.901],
    );
    let peak = only_peak(&results);

    assert!((peak.apex_rt().unwrap() - 1.3).abs() < 1e-9);
    assert_eq!(peak.envelopes().len(), 8);
}

#[test]
fn test_quantifies_egfqvadgplyr() {
    let file = SpectraFile::new("sliced.ndjson", "a", 0, 0, 0);
    let pg = protein("MyProtein");
    let profile = [0.5, 1.0, 2.0, 4.0, 7.0, 10.0, 7.0, 4.0, 2.0, 1.0, 0.5];
    let profile: Vec<f64> = profile.iter().map(|x| x * 1e5).collect();
    let scans = synthetic_scans(
        &rts(93.98, 0.02, profile.len()),
        &[Analyte::new(EGFQVADGPLYR, 2, &profile)],
    );
    let ids = vec![
        identification(&file, "EGFQVADGPLYR", EGFQVADGPLYR, 94.12193, 2, &pg),
        identification(&file, "EGFQVADGPLYR", EGFQVADGPLYR, 94.05811, 2, &pg),
    ];
    let results = run(ids, vec![(file.clone(), scans)], quiet_config());

    let peaks = &results.peaks[&file];
    assert_eq!(peaks.len(), 1);
    let peak = &peaks[0];
    assert!(peak.intensity > 0.0);
    assert!(!peak.is_mbr_peak);
    assert!((peak.apex_rt().unwrap() - 94.08).abs() < 1e-9);
    assert_eq!(peak.apex().unwrap().charge, 2);
    assert!(peak.mass_error_ppm.abs() < 1.0);

    let peptide = &results.peptides["EGFQVADGPLYR"];
    assert_eq!(peptide.intensity(&file), peak.intensity);
    assert_eq!(peptide.detection_type(&file), DetectionType::Msms);
    assert_eq!(results.protein_groups["MyProtein"].intensity(&file), peak.intensity);
}

#[test]
fn test_integrated_intensity_sums_the_trace() {
    let file = SpectraFile::new("integrate.ndjson", "a", 0, 0, 0);
    let pg = protein("MyProtein");
    let scans = synthetic_scans(
        &rts(1.0, 0.1, 3),
        &[Analyte::new(PEPTIDE, 1, &[1e6, 2e6, 1e6])],
    );
    let ids = vec![identification(&file, "PEPTIDE", PEPTIDE, 1.1, 1, &pg)];

    let apex = run(ids.clone(), vec![(file.clone(), scans.clone())], quiet_config());
    let integrated = run(
        ids,
        vec![(file.clone(), scans)],
        flashlfq::FlashLfqConfig {
            integrate: true,
            ..quiet_config()
        },
    );
    let apex_intensity = apex.peaks[&file][0].intensity;
    let total = integrated.peaks[&file][0].intensity;
    assert!((total - 2.0 * apex_intensity).abs() / total < 1e-9);
}

#[test]
fn test_ambiguous_peak_reports_zero() {
    let file = SpectraFile::new("ambiguous.ndjson", "a", 0, 1, 0);
    let pg = protein("MyProtein");
    let profile = [0.5, 1.0, 2.0, 4.0, 7.0, 10.0, 7.0, 4.0, 2.0, 1.0, 0.5];
    let profile: Vec<f64> = profile.iter().map(|x| x * 1e5).collect();
    let scans = synthetic_scans(
        &rts(93.98, 0.02, profile.len()),
        &[Analyte::new(EGFQVADGPLYR, 2, &profile)],
    );
    let ids = vec![
        identification(&file, "EGFQVADGPLRY", EGFQVADGPLYR, 94.12193, 2, &pg),
        identification(&file, "EGFQVADGPLYR", EGFQVADGPLYR, 94.05811, 2, &pg),
    ];
    let results = run(ids, vec![(file.clone(), scans)], quiet_config());

    let peaks = &results.peaks[&file];
    assert_eq!(peaks.len(), 1);
    assert!(peaks[0].intensity > 0.0);
    assert!(!peaks[0].is_mbr_peak);
    assert_eq!(peaks[0].num_identifications_by_full_seq, 2);
    assert!(peaks[0].is_ambiguous());

    for seq in ["EGFQVADGPLYR", "EGFQVADGPLRY"] {
        assert_eq!(results.peptides[seq].intensity(&file), 0.0);
        assert_eq!(
            results.peptides[seq].detection_type(&file),
            DetectionType::MsmsAmbiguousPeakfinding
        );
    }
    assert_eq!(results.protein_groups["MyProtein"].intensity(&file), 0.0);
    assert_eq!(results.summary().num_ambiguous_peaks, 1);
}

#[test]
fn test_undetected_peptides_are_kept() {
    let file = SpectraFile::new("silac.ndjson", "", 0, 0, 0);
    let light = protein("P01027");
    let heavy = protein("P01027+8.014");
    let scans = synthetic_scans(&rts(98.5, 0.05, 10), &[]);
    let light_seq = "RDILSSNNQHGILPLSWNIPELVNM[Common Variable:Oxidation on M]GQWK";
    let heavy_seq = "RDILSSNNQHGILPLSWNIPELVNM[Common Variable:Oxidation on M]GQWa";
    let ids = vec![
        identification(&file, light_seq, 3374.7193792, 98.814005, 3, &light),
        identification(&file, heavy_seq, 3382.733578, 98.814005, 3, &heavy),
        identification(&file, light_seq, 3374.7193792, 98.7193782, 4, &light),
        identification(&file, heavy_seq, 3382.733578, 98.7193782, 4, &heavy),
    ];
    let config = flashlfq::FlashLfqConfig {
        ppm_tolerance: 5.0,
        max_threads: 7,
        ..quiet_config()
    };
    let results = run(ids, vec![(file.clone(), scans)], config);

    assert_eq!(results.peptides.len(), 2);
    assert_eq!(results.peaks[&file].len(), 2);
    assert!(results.peaks[&file].iter().all(|x| x.intensity == 0.0));
    assert_eq!(
        results.peptides[light_seq].detection_type(&file),
        DetectionType::NotDetected
    );
}

#[test]
fn test_nan_mass_yields_empty_peak() {
    let file = SpectraFile::new("nan.ndjson", "", 0, 0, 0);
    let pg = protein("MyProtein");
    let scans = synthetic_scans(&rts(1.0, 0.1, 3), &[Analyte::new(PEPTIDE, 1, &[1e6, 1e6, 1e6])]);
    let ids = vec![
        identification(&file, "PEPTIDE", PEPTIDE, 1.1, 1, &pg),
        identification(&file, "BROKEN", f64::NAN, 1.1, 1, &pg),
    ];
    let results = run(ids, vec![(file.clone(), scans)], quiet_config());

    assert!(results.peptides["PEPTIDE"].intensity(&file) > 0.0);
    assert_eq!(results.peptides["BROKEN"].intensity(&file), 0.0);
    let empty = results.peaks[&file]
        .iter()
        .find(|x| x.seed_identification().modified_sequence == "BROKEN")
        .unwrap();
    assert!(empty.apex().is_none());
    assert_eq!(empty.intensity, 0.0);
}
