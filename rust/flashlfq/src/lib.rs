pub mod config;
pub mod data_sources;
pub mod engine;
pub mod errors;
pub mod indexing;
pub mod isotopes;
pub mod models;
pub mod quantification;
pub mod results;
pub mod utils;

pub use config::FlashLfqConfig;
pub use data_sources::{
    InMemoryScanSource,
    NdjsonScanSource,
    ScanSource,
};
pub use engine::FlashLfqEngine;
pub use errors::{
    ConfigError,
    DataReadingError,
    FlashLfqError,
};
pub use models::{
    ChromatographicPeak,
    DetectionType,
    Identification,
    Peptide,
    ProteinGroup,
    ProteinGroupQuant,
    Scan,
    SpectraFile,
};
pub use results::{
    FlashLfqResults,
    ResultsSummary,
};
