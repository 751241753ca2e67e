use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AnalysisVariant, Domain, ModelFidelity, Track};

/// One classifier track's raw output as persisted inside a record.
///
/// Every track that ran is kept here, including ones not chosen as
/// primary. The distribution maps each label of the track's fixed label
/// set to its probability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackResult {
    pub label: String,
    pub confidence: f64,
    pub distribution: BTreeMap<String, f64>,
    /// Whether a full-fidelity model or a substituted fallback produced
    /// this result. Recorded so stored results stay clinically
    /// interpretable.
    pub fidelity: ModelFidelity,
}

/// The persisted unit of work: one row per successful orchestration call.
///
/// `primary_label`/`primary_confidence` always duplicate the entry of
/// `track_results` keyed by `primary_track`. `notes` is the only field
/// mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub domain: Domain,
    pub analysis_variant: Option<AnalysisVariant>,
    pub primary_track: Track,
    pub primary_label: String,
    pub primary_confidence: f64,
    pub track_results: BTreeMap<Track, TrackResult>,
    /// Blob-store reference to the source image.
    pub image_ref: String,
    /// Blob-store reference to a derived overlay artifact, if one exists.
    pub overlay_ref: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl DiagnosisRecord {
    /// The primary result as stored among the per-track results.
    pub fn primary_result(&self) -> Option<&TrackResult> {
        self.track_results.get(&self.primary_track)
    }
}
