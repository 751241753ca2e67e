pub mod diagnosis;
pub mod enums;
pub mod filters;

pub use diagnosis::{DiagnosisRecord, TrackResult};
pub use enums::{AnalysisVariant, Domain, ModelFidelity, Track};
pub use filters::DiagnosisFilter;
