//! Diagnostic orchestrator: resolves which classifier tracks to run,
//! runs them, and merges the per-track outputs into one envelope with a
//! single authoritative primary result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::inference::preprocess::NormalizedImage;
use crate::inference::registry::ModelRegistry;
use crate::models::enums::{AnalysisVariant, Domain, Track};
use crate::models::TrackResult;

use super::DiagnoseError;

/// The complete orchestration output, handed to persistence as one atomic
/// unit. `tracks` holds every surviving track's raw output; the entry
/// keyed by `primary_track` is the authoritative result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisEnvelope {
    pub domain: Domain,
    pub resolved_variant: Option<AnalysisVariant>,
    pub primary_track: Track,
    pub tracks: BTreeMap<Track, TrackResult>,
    /// Resolved tracks that had no loaded model. Partial availability is
    /// reported, not hidden.
    pub unavailable_tracks: Vec<Track>,
    /// Resolved tracks whose adapter errored during inference.
    pub failed_tracks: Vec<Track>,
}

impl DiagnosisEnvelope {
    pub fn primary(&self) -> &TrackResult {
        // primary_track is always a key of tracks, by construction
        &self.tracks[&self.primary_track]
    }
}

/// Run a diagnosis: validate input, resolve tracks, invoke whichever
/// adapters are loaded, merge.
///
/// A failing adapter is logged and dropped without cancelling siblings;
/// the call fails with `ModelUnavailable` only when no track survives.
pub fn diagnose(
    registry: &ModelRegistry,
    domain: Domain,
    variant: Option<AnalysisVariant>,
    image_bytes: &[u8],
) -> Result<DiagnosisEnvelope, DiagnoseError> {
    if let Some(v) = variant {
        if !domain.variants().contains(&v) {
            return Err(DiagnoseError::InvalidInput(format!(
                "domain {domain} does not declare analysis variant {v}"
            )));
        }
    }

    let image = NormalizedImage::decode(image_bytes)
        .map_err(|e| DiagnoseError::InvalidInput(e.to_string()))?;

    let resolved = resolve_tracks(domain, variant);
    let (available, unavailable): (Vec<Track>, Vec<Track>) = resolved
        .into_iter()
        .partition(|t| registry.is_available(*t));

    if available.is_empty() {
        tracing::warn!(domain = domain.as_str(), "no classifier loaded for request");
        return Err(DiagnoseError::ModelUnavailable { domain });
    }

    let mut tracks: BTreeMap<Track, TrackResult> = BTreeMap::new();
    let mut failed: Vec<Track> = Vec::new();

    for track in available {
        let adapter = registry
            .adapter(track)
            .expect("availability checked above");
        match adapter.classify(&image) {
            Ok(output) => {
                tracks.insert(
                    track,
                    TrackResult {
                        label: output.label,
                        confidence: output.confidence,
                        distribution: output.distribution,
                        fidelity: adapter.fidelity(),
                    },
                );
            }
            Err(e) => {
                tracing::error!(track = track.as_str(), "adapter failed, dropping track: {e}");
                failed.push(track);
            }
        }
    }

    if tracks.is_empty() {
        return Err(DiagnoseError::ModelUnavailable { domain });
    }

    let primary_track = select_primary(&tracks);

    Ok(DiagnosisEnvelope {
        domain,
        resolved_variant: resolve_variant_label(domain, variant),
        primary_track,
        tracks,
        unavailable_tracks: unavailable,
        failed_tracks: failed,
    })
}

/// Which tracks a (domain, variant) request maps to. An omitted variant
/// or the "both" sentinel runs everything the domain registers.
fn resolve_tracks(domain: Domain, variant: Option<AnalysisVariant>) -> Vec<Track> {
    match (domain, variant) {
        (Domain::BreastCancer, Some(AnalysisVariant::Birads)) => vec![Track::Birads],
        (Domain::BreastCancer, Some(AnalysisVariant::Pathological)) => vec![Track::Pathological],
        _ => domain.tracks().to_vec(),
    }
}

/// The variant label stamped on the persisted record. Breast cancer
/// defaults to the "both" sentinel when the caller omitted a selector;
/// single-track domains carry none.
fn resolve_variant_label(
    domain: Domain,
    variant: Option<AnalysisVariant>,
) -> Option<AnalysisVariant> {
    match domain {
        Domain::BreastCancer => Some(variant.unwrap_or(AnalysisVariant::Both)),
        _ => None,
    }
}

/// Primary-result selection. Clinical precedence rule for breast cancer:
/// when both tracks ran, the tissue-level (pathological) finding overrides
/// the imaging impression only when it indicates malignancy; otherwise the
/// BIRADS result is primary. A sole surviving track is primary
/// unconditionally. Pure function of the completed results — completion
/// order cannot affect the outcome.
fn select_primary(tracks: &BTreeMap<Track, TrackResult>) -> Track {
    if tracks.contains_key(&Track::Birads) {
        if let Some(pathological) = tracks.get(&Track::Pathological) {
            return if pathological.label == "malignant" {
                Track::Pathological
            } else {
                Track::Birads
            };
        }
    }
    // Single-track result set
    *tracks.keys().next().expect("merge called with empty track set")
}
