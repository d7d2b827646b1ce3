pub mod chromatographic_peak;
pub mod envelope;
pub mod identification;
pub mod peptide;
pub mod scan;
pub mod spectra_file;

pub use chromatographic_peak::ChromatographicPeak;
pub use envelope::{
    IndexedPeak,
    IsotopicEnvelope,
};
pub use identification::{
    Identification,
    ProteinGroup,
};
pub use peptide::{
    DetectionType,
    Peptide,
    ProteinGroupQuant,
};
pub use scan::Scan;
pub use spectra_file::SpectraFile;
