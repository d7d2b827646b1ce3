use super::spectra_file::SpectraFile;
use serde::{
    Deserialize,
    Serialize,
};
use std::cmp::Ordering;
use std::hash::{
    Hash,
    Hasher,
};

/// A protein (or indistinguishable set of proteins) an identification maps to.
///
/// Equality, hashing and ordering only look at the accession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProteinGroup {
    pub accession: String,
    pub gene: String,
    pub organism: String,
}

impl ProteinGroup {
    pub fn new(
        accession: impl Into<String>,
        gene: impl Into<String>,
        organism: impl Into<String>,
    ) -> Self {
        Self {
            accession: accession.into(),
            gene: gene.into(),
            organism: organism.into(),
        }
    }
}

impl PartialEq for ProteinGroup {
    fn eq(&self, other: &Self) -> bool {
        self.accession == other.accession
    }
}

impl Eq for ProteinGroup {}

impl Hash for ProteinGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.accession.hash(state);
    }
}

impl Ord for ProteinGroup {
    fn cmp(&self, other: &Self) -> Ordering {
        self.accession.cmp(&other.accession)
    }
}

impl PartialOrd for ProteinGroup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A peptide-spectrum match produced upstream. Read-only to the engine.
///
/// Retention times are in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identification {
    pub spectra_file: SpectraFile,
    pub base_sequence: String,
    pub modified_sequence: String,
    pub monoisotopic_mass: f64,
    pub ms2_retention_time: f64,
    pub precursor_charge: i32,
    pub protein_groups: Vec<ProteinGroup>,
    pub formula: Option<String>,
    pub use_for_alignment: bool,
    pub use_for_protein_quant: bool,
}

impl Identification {
    pub fn new(
        spectra_file: SpectraFile,
        base_sequence: impl Into<String>,
        modified_sequence: impl Into<String>,
        monoisotopic_mass: f64,
        ms2_retention_time: f64,
        precursor_charge: i32,
        mut protein_groups: Vec<ProteinGroup>,
    ) -> Self {
        protein_groups.sort();
        protein_groups.dedup();
        Self {
            spectra_file,
            base_sequence: base_sequence.into(),
            modified_sequence: modified_sequence.into(),
            monoisotopic_mass,
            ms2_retention_time,
            precursor_charge,
            protein_groups,
            formula: None,
            use_for_alignment: true,
            use_for_protein_quant: true,
        }
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn with_use_for_alignment(mut self, use_for_alignment: bool) -> Self {
        self.use_for_alignment = use_for_alignment;
        self
    }

    pub fn with_use_for_protein_quant(mut self, use_for_protein_quant: bool) -> Self {
        self.use_for_protein_quant = use_for_protein_quant;
        self
    }

    /// Semicolon separated accessions, in accession order.
    pub fn protein_accessions(&self) -> String {
        self.protein_groups
            .iter()
            .map(|x| x.accession.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl std::fmt::Display for Identification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|+{}|{:.3}min",
            self.spectra_file, self.modified_sequence, self.precursor_charge, self.ms2_retention_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_protein_group_equality_by_accession() {
        let a = ProteinGroup::new("P1", "gene", "org");
        let b = ProteinGroup::new("P1", "other_gene", "other_org");
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_identification_dedups_proteins() {
        let file = SpectraFile::new("run.mzml", "", 0, 0, 0);
        let id = Identification::new(
            file,
            "PEPTIDE",
            "PEPTIDE",
            799.36,
            1.0,
            1,
            vec![
                ProteinGroup::new("B", "", ""),
                ProteinGroup::new("A", "", ""),
                ProteinGroup::new("B", "", ""),
            ],
        );
        assert_eq!(id.protein_accessions(), "A;B");
        assert!(id.use_for_alignment);
    }
}
