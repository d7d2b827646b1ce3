pub mod design;
pub mod identifications;
pub mod scans;

pub use design::{
    default_design,
    read_experimental_design,
    scan_file_path,
};
pub use identifications::{
    read_identification_records,
    resolve_identifications,
    IdentificationRecord,
};
pub use scans::{
    InMemoryScanSource,
    NdjsonScanSource,
    ScanSource,
};
