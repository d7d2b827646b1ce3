use crate::errors::ConfigError;
use serde::{
    Deserialize,
    Serialize,
};

/// Engine settings.
///
/// Every field has a default, so a config file only needs the values it changes:
///
/// ```
/// use flashlfq::FlashLfqConfig;
///
/// let config: FlashLfqConfig =
///     serde_json::from_str(r#"{"ppm_tolerance": 5.0, "normalize": true}"#).unwrap();
/// assert_eq!(config.ppm_tolerance, 5.0);
/// assert!(config.normalize);
/// assert_eq!(config.top_n, 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlashLfqConfig {
    /// m/z tolerance for envelope detection of identified peptides.
    pub ppm_tolerance: f64,
    /// m/z tolerance used while recovering match-between-runs peaks.
    pub mbr_ppm_tolerance: f64,
    pub normalize: bool,
    pub match_between_runs: bool,
    pub advanced_protein_quant: bool,
    /// Values <= 0 let rayon pick.
    pub max_threads: i32,
    pub silent: bool,

    /// Report the summed trace instead of the apex envelope.
    pub integrate: bool,
    /// Isotope peaks (monoisotope included) an envelope needs, capped at the
    /// number of theoretical isotopes.
    pub num_isotopes_required: usize,
    /// Consecutive scans without an envelope tolerated while extending a peak.
    pub max_missed_scans: usize,
    /// Relative rise from a valley that splits a peak.
    pub discrimination_factor_to_cut_peak: f64,
    /// Peaks with fewer envelopes are never split.
    pub min_envelopes_to_cut: usize,
    /// Max gap in minutes between the traces of two peaks of one sequence for them to merge.
    pub merge_window_minutes: f64,
    /// Upper bound for the half-width of the MBR retention time window, in minutes.
    pub mbr_rt_window: f64,
    /// Lower bound for the half-width of the MBR retention time window, in minutes.
    pub mbr_min_rt_window: f64,
    pub top_n: usize,
    pub use_shared_peptides_for_protein_quant: bool,
    /// Residual (log2 units) above which the weighted protein estimator ignores a peptide.
    pub outlier_cutoff_log2: f64,
    /// Only search the charge of each identification instead of every charge
    /// observed for its sequence in the file.
    pub id_specific_charge_state: bool,
}

impl Default for FlashLfqConfig {
    fn default() -> Self {
        Self {
            ppm_tolerance: 10.0,
            mbr_ppm_tolerance: 10.0,
            normalize: false,
            match_between_runs: false,
            advanced_protein_quant: false,
            max_threads: -1,
            silent: false,
            integrate: false,
            num_isotopes_required: 2,
            max_missed_scans: 1,
            discrimination_factor_to_cut_peak: 0.6,
            min_envelopes_to_cut: 5,
            merge_window_minutes: 0.5,
            mbr_rt_window: 2.5,
            mbr_min_rt_window: 0.05,
            top_n: 3,
            use_shared_peptides_for_protein_quant: false,
            outlier_cutoff_log2: 0.5,
            id_specific_charge_state: false,
        }
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidTolerance { name, value })
    }
}

impl FlashLfqConfig {
    /// Fails fast on settings that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("ppm_tolerance", self.ppm_tolerance)?;
        check_positive("mbr_ppm_tolerance", self.mbr_ppm_tolerance)?;
        check_positive("mbr_rt_window", self.mbr_rt_window)?;
        check_positive("mbr_min_rt_window", self.mbr_min_rt_window)?;
        check_positive("outlier_cutoff_log2", self.outlier_cutoff_log2)?;
        if !(self.merge_window_minutes.is_finite() && self.merge_window_minutes >= 0.0) {
            return Err(ConfigError::InvalidTolerance {
                name: "merge_window_minutes",
                value: self.merge_window_minutes,
            });
        }
        if !(self.discrimination_factor_to_cut_peak > 0.0
            && self.discrimination_factor_to_cut_peak < 1.0)
        {
            return Err(ConfigError::InvalidParameter {
                name: "discrimination_factor_to_cut_peak",
                value: self.discrimination_factor_to_cut_peak.to_string(),
                reason: "must be in (0, 1)",
            });
        }
        if self.num_isotopes_required == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "num_isotopes_required",
                value: "0".to_string(),
                reason: "the monoisotopic peak is always required",
            });
        }
        if self.top_n == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "top_n",
                value: "0".to_string(),
                reason: "at least one peptide is needed per protein",
            });
        }
        Ok(())
    }

    /// Number of worker threads, None lets rayon decide.
    pub fn num_threads(&self) -> Option<usize> {
        if self.max_threads > 0 {
            Some(self.max_threads as usize)
        } else {
            None
        }
    }
}
