use serde::{
    Deserialize,
    Serialize,
};

fn default_ms_level() -> u8 {
    1
}

/// A centroided scan as handed over by a scan source.
///
/// Retention time is in minutes. Only MS1 scans are indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    #[serde(default = "default_ms_level")]
    pub ms_level: u8,
    pub retention_time: f64,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl Scan {
    pub fn ms1(retention_time: f64, mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        Self {
            ms_level: 1,
            retention_time,
            mz,
            intensity,
        }
    }
}
