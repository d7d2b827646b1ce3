use rayon::prelude::*;
use tracing::debug;

use crate::errors::DataProcessingError;
use crate::models::{
    IndexedPeak,
    Scan,
};
use crate::utils::OptionallyRestricted::{
    Restricted,
    Unrestricted,
};
use crate::utils::{
    OptionallyRestricted,
    TupleRange,
};

// 2**12 peaks per bucket
const DEFAULT_BUCKET_SIZE: usize = 4096;

/// Holds the MS1 peaks of one spectra file, organized into buckets
/// of consecutive m/z. Each bucket is internally sorted by scan index.
///
/// The main flow is:
/// 1. Build it from the scans of a file (call [SpectralIndex::from_scans])
/// 2. Query it by m/z and scan window using [SpectralIndex::query_peaks]
///    or pick the closest peak at one scan with [SpectralIndex::best_peak]
#[derive(Debug, Clone)]
pub struct SpectralIndex {
    peaks: Vec<IndexedPeak>,
    bucket_mz_ranges: Vec<TupleRange<f64>>,
    bucket_size: usize,
    scan_rts: Vec<f64>,
}

/// Statistics about the building of a SpectralIndex.
///
/// Usually used for logging.
#[derive(Debug, Clone)]
pub struct SpectralIndexStats {
    pub num_scans: usize,
    pub num_skipped_scans: usize,
    pub num_peaks: usize,
    pub num_dropped_peaks: usize,
    pub num_buckets: usize,
    pub build_time: std::time::Duration,
}

impl std::fmt::Display for SpectralIndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} MS1 scans ({} non-MS1 skipped), {} peaks ({} dropped) in {} buckets, built in {:.2?}",
            self.num_scans,
            self.num_skipped_scans,
            self.num_peaks,
            self.num_dropped_peaks,
            self.num_buckets,
            self.build_time
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct PeakBucket<'a> {
    inner: &'a [IndexedPeak],
}

impl<'a> PeakBucket<'a> {
    // Returns a range such that all peaks within self.inner[range]
    // have scan_index within the provided scan_range.
    fn find_scan_range(&self, scan_range: TupleRange<usize>) -> std::ops::Range<usize> {
        let start_idx = self
            .inner
            .partition_point(|x| x.scan_index < scan_range.start());
        let end_idx = start_idx
            + self.inner[start_idx..].partition_point(|x| x.scan_index <= scan_range.end());
        start_idx..end_idx
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl SpectralIndex {
    /// Builds the index from the scans of one file.
    ///
    /// Non-MS1 scans are skipped. MS1 scans are ordered by retention time and
    /// numbered from zero. Zero-intensity and non-finite peaks are dropped.
    pub fn from_scans(scans: &[Scan]) -> Result<(Self, SpectralIndexStats), DataProcessingError> {
        let st = std::time::Instant::now();
        let mut ms1: Vec<&Scan> = Vec::with_capacity(scans.len());
        for scan in scans.iter() {
            if scan.ms_level != 1 {
                continue;
            }
            if scan.mz.len() != scan.intensity.len() {
                return Err(DataProcessingError::ExpectedSlicesSameLength {
                    expected: scan.mz.len(),
                    other: scan.intensity.len(),
                    context: format!("m/z and intensity arrays of scan at RT {}", scan.retention_time),
                });
            }
            if !scan.retention_time.is_finite() {
                return Err(DataProcessingError::ExpectedFiniteNonNanData {
                    context: "scan retention time".to_string(),
                });
            }
            ms1.push(scan);
        }
        let num_skipped_scans = scans.len() - ms1.len();
        ms1.sort_by(|a, b| a.retention_time.total_cmp(&b.retention_time));

        let mut num_dropped_peaks = 0;
        let mut peaks = Vec::with_capacity(ms1.iter().map(|x| x.mz.len()).sum());
        for (scan_index, scan) in ms1.iter().enumerate() {
            for (&mz, &intensity) in scan.mz.iter().zip(scan.intensity.iter()) {
                if mz.is_finite() && intensity.is_finite() && intensity > 0.0 {
                    peaks.push(IndexedPeak::new(mz, intensity, scan_index, scan.retention_time));
                } else {
                    num_dropped_peaks += 1;
                }
            }
        }
        let scan_rts = ms1.iter().map(|x| x.retention_time).collect();

        let out = Self::new(peaks, scan_rts, DEFAULT_BUCKET_SIZE);
        let stats = SpectralIndexStats {
            num_scans: out.scan_rts.len(),
            num_skipped_scans,
            num_peaks: out.peaks.len(),
            num_dropped_peaks,
            num_buckets: out.bucket_mz_ranges.len(),
            build_time: st.elapsed(),
        };
        debug!("Built spectral index: {}", stats);
        Ok((out, stats))
    }

    /// All bucketing logic lives here.
    ///
    /// Peaks must already be finite; `scan_rts` must be sorted.
    pub(crate) fn new(mut peaks: Vec<IndexedPeak>, scan_rts: Vec<f64>, bucket_size: usize) -> Self {
        peaks.par_sort_unstable_by(|x, y| x.mz.total_cmp(&y.mz));

        let bucket_mz_ranges: Vec<_> = peaks
            .par_chunks_mut(bucket_size)
            .map(|chunk| {
                // Chunks are never empty and peaks are sorted by m/z.
                let start = chunk[0].mz;
                let end = chunk[chunk.len() - 1].mz;
                chunk.sort_unstable_by(|x, y| {
                    x.scan_index
                        .cmp(&y.scan_index)
                        .then(x.mz.total_cmp(&y.mz))
                });
                TupleRange::try_new(start, end).expect("Incoming vec should have been sorted")
            })
            .collect();

        Self {
            peaks,
            bucket_mz_ranges,
            bucket_size,
            scan_rts,
        }
    }

    pub fn num_scans(&self) -> usize {
        self.scan_rts.len()
    }

    pub fn num_peaks(&self) -> usize {
        self.peaks.len()
    }

    pub fn rt_of(&self, scan_index: usize) -> Option<f64> {
        self.scan_rts.get(scan_index).copied()
    }

    /// Scan whose retention time is closest to `rt`. Ties go to the earlier scan.
    pub fn closest_scan_index(&self, rt: f64) -> Option<usize> {
        if self.scan_rts.is_empty() || !rt.is_finite() {
            return None;
        }
        let pos = self.scan_rts.partition_point(|x| *x <= rt);
        if pos == 0 {
            Some(0)
        } else if pos >= self.scan_rts.len() {
            Some(self.scan_rts.len() - 1)
        } else {
            let before = self.scan_rts[pos - 1];
            let after = self.scan_rts[pos];
            if rt - before <= after - rt {
                Some(pos - 1)
            } else {
                Some(pos)
            }
        }
    }

    /// Scans whose retention times fall within the range, None if there are none.
    pub fn scan_range_for_rt(&self, rt_range: TupleRange<f64>) -> Option<TupleRange<usize>> {
        let start = self.scan_rts.partition_point(|x| *x < rt_range.start());
        let end = self.scan_rts.partition_point(|x| *x <= rt_range.end());
        if start >= end {
            return None;
        }
        TupleRange::try_new(start, end - 1).ok()
    }

    /// Query peaks within an m/z range (inclusive) and optionally a scan window (inclusive).
    pub fn query_peaks(
        &self,
        mz_range: TupleRange<f64>,
        scan_range: OptionallyRestricted<TupleRange<usize>>,
    ) -> impl Iterator<Item = &IndexedPeak> {
        QueryPeaksIterator::new(self, mz_range, scan_range)
    }

    /// Peak closest in m/z to `mz` at one scan, within a ppm tolerance.
    pub fn best_peak(&self, mz: f64, ppm_tolerance: f64, scan_index: usize) -> Option<&IndexedPeak> {
        let mz_range = ppm_range(mz, ppm_tolerance)?;
        let scan_range = TupleRange::try_new(scan_index, scan_index).ok()?;
        self.query_peaks(mz_range, Restricted(scan_range))
            .min_by(|a, b| (a.mz - mz).abs().total_cmp(&(b.mz - mz).abs()))
    }

    /// Query the bucket indices that overlap with the given m/z range.
    fn query_bucket_range(&self, mz_range: TupleRange<f64>) -> std::ops::Range<usize> {
        // Neighbouring buckets can share a boundary value, so compare strictly.
        let start_idx = self
            .bucket_mz_ranges
            .partition_point(|x| x.end() < mz_range.start());
        let end_idx = start_idx
            + self.bucket_mz_ranges[start_idx..].partition_point(|x| x.start() <= mz_range.end());
        start_idx..end_idx
    }

    fn get_bucket(&self, bucket_idx: usize) -> Option<PeakBucket<'_>> {
        let start = bucket_idx * self.bucket_size;
        if start >= self.peaks.len() {
            return None;
        }
        let end = ((bucket_idx + 1) * self.bucket_size).min(self.peaks.len());
        Some(PeakBucket {
            inner: &self.peaks[start..end],
        })
    }
}

/// Symmetric ppm window around an m/z, None for non-finite input.
pub fn ppm_range(mz: f64, ppm_tolerance: f64) -> Option<TupleRange<f64>> {
    let delta = mz.abs() * ppm_tolerance / 1e6;
    TupleRange::try_new(mz - delta, mz + delta).ok()
}

/// Walks the matching buckets one after the other, so the borrow of the
/// index stays in a single struct.
#[derive(Debug)]
struct QueryPeaksIterator<'a> {
    index: &'a SpectralIndex,
    mz_range: TupleRange<f64>,
    scan_range: OptionallyRestricted<TupleRange<usize>>,
    bucket_idx: usize,
    bucket_end: usize,
    position_in_bucket: usize,
    end_of_current_bucket: usize,
    current_bucket: Option<PeakBucket<'a>>,
}

impl<'a> QueryPeaksIterator<'a> {
    fn new(
        index: &'a SpectralIndex,
        mz_range: TupleRange<f64>,
        scan_range: OptionallyRestricted<TupleRange<usize>>,
    ) -> Self {
        let bucket_range = index.query_bucket_range(mz_range);
        Self {
            index,
            mz_range,
            scan_range,
            bucket_idx: bucket_range.start,
            bucket_end: bucket_range.end,
            position_in_bucket: 0,
            end_of_current_bucket: 0,
            current_bucket: None,
        }
    }

    fn advance_bucket(&mut self) -> Option<usize> {
        if self.bucket_idx >= self.bucket_end {
            return None;
        }
        let curr_bucket = self.index.get_bucket(self.bucket_idx)?;
        self.bucket_idx += 1;
        match self.scan_range {
            Restricted(scan_range) => {
                let idx_range = curr_bucket.find_scan_range(scan_range);
                self.position_in_bucket = idx_range.start;
                self.end_of_current_bucket = idx_range.end;
            }
            Unrestricted => {
                self.position_in_bucket = 0;
                self.end_of_current_bucket = curr_bucket.len();
            }
        }
        self.current_bucket = Some(curr_bucket);
        Some(self.bucket_idx - 1)
    }

    fn next_in_current_bucket(&mut self) -> Option<&'a IndexedPeak> {
        let bucket = self.current_bucket?;
        while self.position_in_bucket < self.end_of_current_bucket {
            let peak = &bucket.inner[self.position_in_bucket];
            self.position_in_bucket += 1;
            if self.mz_range.contains(peak.mz) {
                return Some(peak);
            }
        }
        None
    }
}

impl<'a> Iterator for QueryPeaksIterator<'a> {
    type Item = &'a IndexedPeak;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(peak) = self.next_in_current_bucket() {
                return Some(peak);
            }
            self.advance_bucket()?;
        }
    }
}
