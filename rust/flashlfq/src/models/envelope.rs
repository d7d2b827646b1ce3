use serde::{
    Deserialize,
    Serialize,
};
use std::hash::{
    Hash,
    Hasher,
};

/// One observed MS1 centroid.
///
/// `scan_index` is the zero-based position of its scan among the MS1 scans of
/// the file, `retention_time` is in minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexedPeak {
    pub mz: f64,
    pub intensity: f64,
    pub scan_index: usize,
    pub retention_time: f64,
}

impl IndexedPeak {
    pub fn new(mz: f64, intensity: f64, scan_index: usize, retention_time: f64) -> Self {
        Self {
            mz,
            intensity,
            scan_index,
            retention_time,
        }
    }
}

// Bitwise equality, two peaks are the same only if they come from
// the same centroid.
impl PartialEq for IndexedPeak {
    fn eq(&self, other: &Self) -> bool {
        self.mz.to_bits() == other.mz.to_bits()
            && self.intensity.to_bits() == other.intensity.to_bits()
            && self.scan_index == other.scan_index
            && self.retention_time.to_bits() == other.retention_time.to_bits()
    }
}

impl Eq for IndexedPeak {}

impl Hash for IndexedPeak {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mz.to_bits().hash(state);
        self.intensity.to_bits().hash(state);
        self.scan_index.hash(state);
        self.retention_time.to_bits().hash(state);
    }
}

impl std::fmt::Display for IndexedPeak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}; {}", self.mz, self.scan_index)
    }
}

/// The isotope peaks of one charge state of one species in one scan.
///
/// `indexed_peak` is the monoisotopic peak, `intensity` the abundance-weighted
/// sum over the matched isotope peaks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IsotopicEnvelope {
    pub indexed_peak: IndexedPeak,
    pub charge: i32,
    pub intensity: f64,
}

impl IsotopicEnvelope {
    pub fn new(indexed_peak: IndexedPeak, charge: i32, intensity: f64) -> Self {
        Self {
            indexed_peak,
            charge,
            intensity,
        }
    }

    pub fn scan_index(&self) -> usize {
        self.indexed_peak.scan_index
    }

    pub fn retention_time(&self) -> f64 {
        self.indexed_peak.retention_time
    }

    fn rounded_intensity(&self) -> i64 {
        self.intensity.round() as i64
    }

    /// Applies a normalization factor.
    pub fn scale(&mut self, factor: f64) {
        self.intensity *= factor;
    }
}

impl PartialEq for IsotopicEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.indexed_peak == other.indexed_peak
            && self.charge == other.charge
            && self.rounded_intensity() == other.rounded_intensity()
    }
}

impl Eq for IsotopicEnvelope {}

impl Hash for IsotopicEnvelope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.indexed_peak.hash(state);
        self.charge.hash(state);
        self.rounded_intensity().hash(state);
    }
}

impl std::fmt::Display for IsotopicEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "+{}|{}|{:.3}|{}",
            self.charge,
            self.rounded_intensity(),
            self.indexed_peak.mz,
            self.indexed_peak.scan_index
        )
    }
}
