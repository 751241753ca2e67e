use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::enums::{AnalysisVariant, Domain, Track};
use crate::models::{DiagnosisFilter, DiagnosisRecord, TrackResult};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const RECORD_COLUMNS: &str = "id, subject_id, domain, analysis_variant, primary_track, \
     primary_label, primary_confidence, track_results, image_ref, overlay_ref, notes, created_at";

// ═══════════════════════════════════════════
// Diagnosis Record Repository
// ═══════════════════════════════════════════

/// Insert a full diagnosis record. A single INSERT, so the whole envelope
/// is committed atomically or not at all.
pub fn insert_diagnosis(conn: &Connection, record: &DiagnosisRecord) -> Result<(), DatabaseError> {
    let track_json = tracks_to_json(&record.track_results, "track_results")?;
    conn.execute(
        "INSERT INTO diagnosis_records (id, subject_id, domain, analysis_variant, primary_track,
         primary_label, primary_confidence, track_results, image_ref, overlay_ref, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.id.to_string(),
            record.subject_id.to_string(),
            record.domain.as_str(),
            record.analysis_variant.map(|v| v.as_str()),
            record.primary_track.as_str(),
            record.primary_label,
            record.primary_confidence,
            track_json,
            record.image_ref,
            record.overlay_ref,
            record.notes,
            record.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

/// Point lookup by id, scoped to the owning subject.
pub fn get_diagnosis(
    conn: &Connection,
    id: &Uuid,
    subject_id: &Uuid,
) -> Result<Option<DiagnosisRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM diagnosis_records WHERE id = ?1 AND subject_id = ?2"
    );
    let mut stmt = conn.prepare(&sql)?;

    let result = stmt.query_row(params![id.to_string(), subject_id.to_string()], row_to_raw);

    match result {
        Ok(raw) => Ok(Some(record_from_raw(raw)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Filtered listing for one subject, newest first. Domain/time-range
/// constraints and offset/limit pagination come from the filter.
pub fn list_diagnoses(
    conn: &Connection,
    subject_id: &Uuid,
    filter: &DiagnosisFilter,
) -> Result<Vec<DiagnosisRecord>, DatabaseError> {
    let mut sql = format!(
        "SELECT {RECORD_COLUMNS} FROM diagnosis_records WHERE subject_id = ?1"
    );
    let mut binds: Vec<String> = vec![subject_id.to_string()];

    if let Some(domain) = filter.domain {
        binds.push(domain.as_str().to_string());
        sql.push_str(&format!(" AND domain = ?{}", binds.len()));
    }
    if let Some(from) = filter.from {
        binds.push(from.format(DATETIME_FMT).to_string());
        sql.push_str(&format!(" AND created_at >= ?{}", binds.len()));
    }
    if let Some(to) = filter.to {
        binds.push(to.format(DATETIME_FMT).to_string());
        sql.push_str(&format!(" AND created_at <= ?{}", binds.len()));
    }

    sql.push_str(" ORDER BY created_at DESC");
    // LIMIT -1 means unbounded in SQLite
    sql.push_str(&format!(
        " LIMIT {} OFFSET {}",
        filter.limit.map(i64::from).unwrap_or(-1),
        filter.offset.unwrap_or(0)
    ));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(binds.iter()), row_to_raw)?;

    let mut records = Vec::new();
    for raw in rows {
        records.push(record_from_raw(raw?)?);
    }
    Ok(records)
}

/// All records for one subject in chronological order (oldest first).
/// The statistics engine's working set.
pub fn list_all_for_subject(
    conn: &Connection,
    subject_id: &Uuid,
) -> Result<Vec<DiagnosisRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM diagnosis_records
         WHERE subject_id = ?1 ORDER BY created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![subject_id.to_string()], row_to_raw)?;

    let mut records = Vec::new();
    for raw in rows {
        records.push(record_from_raw(raw?)?);
    }
    Ok(records)
}

/// Update annotator notes — the only permitted post-creation mutation.
pub fn update_notes(
    conn: &Connection,
    id: &Uuid,
    subject_id: &Uuid,
    notes: Option<&str>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE diagnosis_records SET notes = ?1 WHERE id = ?2 AND subject_id = ?3",
        params![notes, id.to_string(), subject_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "diagnosis_record".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Hard-delete a record by id+owner. Returns the deleted record so the
/// caller can release its blob artifacts.
pub fn delete_diagnosis(
    conn: &Connection,
    id: &Uuid,
    subject_id: &Uuid,
) -> Result<DiagnosisRecord, DatabaseError> {
    let record = get_diagnosis(conn, id, subject_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "diagnosis_record".into(),
        id: id.to_string(),
    })?;

    conn.execute(
        "DELETE FROM diagnosis_records WHERE id = ?1 AND subject_id = ?2",
        params![id.to_string(), subject_id.to_string()],
    )?;

    Ok(record)
}

// ── Count helpers for the statistics engine ────────────────────────────────

pub fn count_for_subject(conn: &Connection, subject_id: &Uuid) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM diagnosis_records WHERE subject_id = ?1",
        params![subject_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_for_domain(
    conn: &Connection,
    subject_id: &Uuid,
    domain: Domain,
) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM diagnosis_records WHERE subject_id = ?1 AND domain = ?2",
        params![subject_id.to_string(), domain.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_high_confidence(
    conn: &Connection,
    subject_id: &Uuid,
    threshold: f64,
) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM diagnosis_records
         WHERE subject_id = ?1 AND primary_confidence >= ?2",
        params![subject_id.to_string(), threshold],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ── Row mapping ────────────────────────────────────────────────────────────

struct RecordRow {
    id: String,
    subject_id: String,
    domain: String,
    analysis_variant: Option<String>,
    primary_track: String,
    primary_label: String,
    primary_confidence: f64,
    track_results: String,
    image_ref: String,
    overlay_ref: Option<String>,
    notes: Option<String>,
    created_at: String,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        domain: row.get(2)?,
        analysis_variant: row.get(3)?,
        primary_track: row.get(4)?,
        primary_label: row.get(5)?,
        primary_confidence: row.get(6)?,
        track_results: row.get(7)?,
        image_ref: row.get(8)?,
        overlay_ref: row.get(9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn record_from_raw(raw: RecordRow) -> Result<DiagnosisRecord, DatabaseError> {
    let track_results: BTreeMap<Track, TrackResult> = serde_json::from_str(&raw.track_results)
        .map_err(|e| DatabaseError::InvalidJson {
            column: "track_results".into(),
            reason: e.to_string(),
        })?;

    Ok(DiagnosisRecord {
        id: parse_uuid(&raw.id)?,
        subject_id: parse_uuid(&raw.subject_id)?,
        domain: Domain::from_str(&raw.domain)?,
        analysis_variant: raw
            .analysis_variant
            .as_deref()
            .map(AnalysisVariant::from_str)
            .transpose()?,
        primary_track: Track::from_str(&raw.primary_track)?,
        primary_label: raw.primary_label,
        primary_confidence: raw.primary_confidence,
        track_results,
        image_ref: raw.image_ref,
        overlay_ref: raw.overlay_ref,
        notes: raw.notes,
        created_at: NaiveDateTime::parse_from_str(&raw.created_at, DATETIME_FMT).map_err(|e| {
            DatabaseError::InvalidEnum {
                field: "created_at".into(),
                value: format!("{}: {e}", raw.created_at),
            }
        })?,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|_| DatabaseError::InvalidEnum {
        field: "uuid".into(),
        value: s.into(),
    })
}

fn tracks_to_json(
    tracks: &BTreeMap<Track, TrackResult>,
    column: &str,
) -> Result<String, DatabaseError> {
    serde_json::to_string(tracks).map_err(|e| DatabaseError::InvalidJson {
        column: column.into(),
        reason: e.to_string(),
    })
}
