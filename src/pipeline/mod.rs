//! Diagnostic pipeline: orchestration of classifier tracks and atomic
//! persistence of the merged envelope.

pub mod orchestrator;
pub mod persist;

pub use orchestrator::{diagnose, DiagnosisEnvelope};
pub use persist::{delete_diagnosis, persist_envelope};

use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::db::DatabaseError;
use crate::models::enums::Domain;

#[derive(Error, Debug)]
pub enum DiagnoseError {
    /// No loaded classifier can serve the requested domain/variant.
    /// Surfaced to callers as a service-unavailable condition.
    #[error("No model available for domain {domain}")]
    ModelUnavailable { domain: Domain },

    /// Rejected before any adapter invocation: undecodable image or a
    /// variant the domain does not declare.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Result store write failed; the whole diagnosis attempt is failed
    /// and no partial record exists.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),

    /// Artifact upload failed before the record could be written.
    #[error("Artifact storage failed: {0}")]
    Artifact(#[from] ArtifactError),
}
