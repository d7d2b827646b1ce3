pub mod alignment;
pub mod envelope_detection;
pub mod mbr;
pub mod normalization;
pub mod peak_builder;
pub mod protein_quant;

pub use alignment::RtAlignment;
pub use envelope_detection::EnvelopeDetector;
pub use normalization::{
    NormalizationLevel,
    NormalizationPass,
    NORMALIZATION_PASSES,
};
pub use peak_builder::PeakBuilder;
pub use protein_quant::{
    ProteinQuantEstimator,
    TopNEstimator,
    WeightedEstimator,
};
