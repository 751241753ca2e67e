//! Envelope persistence: artifact upload plus a single atomic record
//! insert. Either the full diagnosis record exists afterwards or nothing
//! does — uploaded blobs are released again when the insert fails.

use rusqlite::Connection;
use uuid::Uuid;

use crate::artifacts::{release_artifact, ArtifactKind, ArtifactStore};
use crate::db::repository;
use crate::models::DiagnosisRecord;

use super::orchestrator::DiagnosisEnvelope;
use super::DiagnoseError;

/// Persist a completed envelope for `subject_id`.
///
/// Uploads the source image (and optional overlay) to the blob store,
/// then inserts the record in one statement. On insert failure the
/// uploaded artifacts are best-effort released and the error propagates —
/// readers never observe a partial envelope.
pub fn persist_envelope(
    conn: &Connection,
    store: &dyn ArtifactStore,
    subject_id: Uuid,
    envelope: &DiagnosisEnvelope,
    image_bytes: &[u8],
    overlay_bytes: Option<&[u8]>,
    notes: Option<String>,
) -> Result<DiagnosisRecord, DiagnoseError> {
    let image_ref = store.put(&subject_id, ArtifactKind::SourceImage, image_bytes)?;

    let overlay_ref = match overlay_bytes {
        Some(bytes) => match store.put(&subject_id, ArtifactKind::Overlay, bytes) {
            Ok(r) => Some(r),
            Err(e) => {
                release_artifact(store, &image_ref);
                return Err(e.into());
            }
        },
        None => None,
    };

    let primary = envelope.primary();
    let record = DiagnosisRecord {
        id: Uuid::new_v4(),
        subject_id,
        domain: envelope.domain,
        analysis_variant: envelope.resolved_variant,
        primary_track: envelope.primary_track,
        primary_label: primary.label.clone(),
        primary_confidence: primary.confidence,
        track_results: envelope.tracks.clone(),
        image_ref,
        overlay_ref,
        notes,
        created_at: chrono::Local::now().naive_local(),
    };

    if let Err(e) = repository::insert_diagnosis(conn, &record) {
        // No partial record exists; drop the now-orphaned blobs too.
        release_artifact(store, &record.image_ref);
        if let Some(ref overlay) = record.overlay_ref {
            release_artifact(store, overlay);
        }
        return Err(e.into());
    }

    tracing::info!(
        record_id = %record.id,
        domain = record.domain.as_str(),
        primary = %record.primary_label,
        "diagnosis persisted"
    );

    Ok(record)
}

/// Owner-initiated hard delete: remove the record, then signal the blob
/// store to release its artifacts. Artifact deletion failures are logged
/// and swallowed.
pub fn delete_diagnosis(
    conn: &Connection,
    store: &dyn ArtifactStore,
    id: &Uuid,
    subject_id: &Uuid,
) -> Result<(), DiagnoseError> {
    let record = repository::delete_diagnosis(conn, id, subject_id)?;

    release_artifact(store, &record.image_ref);
    if let Some(ref overlay) = record.overlay_ref {
        release_artifact(store, overlay);
    }

    tracing::info!(record_id = %id, "diagnosis deleted");
    Ok(())
}
