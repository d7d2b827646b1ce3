use super::identification::ProteinGroup;
use super::spectra_file::SpectraFile;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::{
    BTreeMap,
    BTreeSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DetectionType {
    #[default]
    NotDetected,
    #[serde(rename = "MSMS")]
    Msms,
    #[serde(rename = "MBR")]
    Mbr,
    #[serde(rename = "MSMSAmbiguousPeakfinding")]
    MsmsAmbiguousPeakfinding,
    /// Reserved for downstream imputation, the engine never assigns it.
    Imputed,
}

impl std::fmt::Display for DetectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DetectionType::NotDetected => "NotDetected",
            DetectionType::Msms => "MSMS",
            DetectionType::Mbr => "MBR",
            DetectionType::MsmsAmbiguousPeakfinding => "MSMSAmbiguousPeakfinding",
            DetectionType::Imputed => "Imputed",
        };
        write!(f, "{}", label)
    }
}

/// Peptide-level quantification, keyed by modified sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peptide {
    pub sequence: String,
    pub base_sequence: String,
    pub protein_groups: BTreeSet<ProteinGroup>,
    pub use_for_protein_quant: bool,
    intensities: BTreeMap<SpectraFile, f64>,
    detection_types: BTreeMap<SpectraFile, DetectionType>,
}

impl Peptide {
    pub fn new(
        sequence: impl Into<String>,
        base_sequence: impl Into<String>,
        use_for_protein_quant: bool,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            base_sequence: base_sequence.into(),
            protein_groups: BTreeSet::new(),
            use_for_protein_quant,
            intensities: BTreeMap::new(),
            detection_types: BTreeMap::new(),
        }
    }

    pub fn intensity(&self, file: &SpectraFile) -> f64 {
        self.intensities.get(file).copied().unwrap_or(0.0)
    }

    pub fn set_intensity(&mut self, file: &SpectraFile, intensity: f64) {
        self.intensities.insert(file.clone(), intensity);
    }

    pub fn detection_type(&self, file: &SpectraFile) -> DetectionType {
        self.detection_types.get(file).copied().unwrap_or_default()
    }

    pub fn set_detection_type(&mut self, file: &SpectraFile, detection_type: DetectionType) {
        self.detection_types.insert(file.clone(), detection_type);
    }

    /// Forgets everything measured for a file, used before re-aggregating peaks.
    pub fn clear_file(&mut self, file: &SpectraFile) {
        self.intensities.remove(file);
        self.detection_types.remove(file);
    }

    pub fn is_unique_to_one_protein_group(&self) -> bool {
        self.protein_groups.len() == 1
    }

    /// Takes over the per-file values of another entry for the same sequence.
    pub fn absorb(&mut self, other: Peptide) {
        self.protein_groups.extend(other.protein_groups);
        self.use_for_protein_quant &= other.use_for_protein_quant;
        self.intensities.extend(other.intensities);
        self.detection_types.extend(other.detection_types);
    }
}

/// Protein-level quantification, keyed by accession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProteinGroupQuant {
    pub protein_group: ProteinGroup,
    intensities: BTreeMap<SpectraFile, f64>,
}

impl ProteinGroupQuant {
    pub fn new(protein_group: ProteinGroup) -> Self {
        Self {
            protein_group,
            intensities: BTreeMap::new(),
        }
    }

    pub fn intensity(&self, file: &SpectraFile) -> f64 {
        self.intensities.get(file).copied().unwrap_or(0.0)
    }

    pub fn set_intensity(&mut self, file: &SpectraFile, intensity: f64) {
        self.intensities.insert(file.clone(), intensity);
    }

    pub fn absorb(&mut self, other: ProteinGroupQuant) {
        self.intensities.extend(other.intensities);
    }
}
