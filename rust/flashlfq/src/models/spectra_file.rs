use serde::{
    Deserialize,
    Serialize,
};
use std::cmp::Ordering;
use std::path::{
    Path,
    PathBuf,
};

/// One LC-MS run plus its position in the experimental design.
///
/// Value-equal and ordered by (condition, biological replicate, fraction,
/// technical replicate, path), which is the order every output table uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpectraFile {
    pub full_path: PathBuf,
    pub condition: String,
    pub biological_replicate: u32,
    pub technical_replicate: u32,
    pub fraction: u32,
}

impl SpectraFile {
    pub fn new(
        full_path: impl Into<PathBuf>,
        condition: impl Into<String>,
        biological_replicate: u32,
        technical_replicate: u32,
        fraction: u32,
    ) -> Self {
        Self {
            full_path: full_path.into(),
            condition: condition.into(),
            biological_replicate,
            technical_replicate,
            fraction,
        }
    }

    /// File name without directory or extension, used as the column label in tables.
    pub fn file_name_without_extension(&self) -> String {
        file_stem(&self.full_path)
    }

    /// Label for per-file table columns. Falls back to the full path when
    /// the stem alone would be ambiguous (eg. "a/run.mzml" and "b/run.mzml").
    pub fn column_label(&self, all_files: &[SpectraFile]) -> String {
        let stem = self.file_name_without_extension();
        let n_same_stem = all_files
            .iter()
            .filter(|f| f.file_name_without_extension() == stem)
            .count();
        if n_same_stem > 1 {
            self.full_path.to_string_lossy().to_string()
        } else {
            stem
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|x| x.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

impl Ord for SpectraFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.condition
            .cmp(&other.condition)
            .then(self.biological_replicate.cmp(&other.biological_replicate))
            .then(self.fraction.cmp(&other.fraction))
            .then(self.technical_replicate.cmp(&other.technical_replicate))
            .then(self.full_path.cmp(&other.full_path))
    }
}

impl PartialOrd for SpectraFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for SpectraFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name_without_extension())
    }
}
