//! Statistics derivation over the persisted record set.
//!
//! Every function is read-only, scoped to one subject, and total: empty
//! data yields well-formed zero/empty structures, never an error beyond
//! genuine storage failures. Nothing is cached — aggregates are
//! recomputed from committed records on every call, so severity policy
//! changes apply retroactively.

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::enums::Domain;
use crate::models::{DiagnosisFilter, DiagnosisRecord};
use crate::severity::{classify_severity, SeverityTier};

use super::types::*;

/// High-confidence threshold backing the dashboard accuracy proxy.
const ACCURACY_PROXY_THRESHOLD: f64 = 0.8;
/// Daily-accuracy floor: only records at or above this confidence count
/// toward a day's accuracy figure.
const DAILY_CONFIDENCE_FLOOR: f64 = 0.7;

/// Main dashboard aggregates. The accuracy rate is a documented heuristic
/// (share of confident predictions), not measured accuracy.
pub fn dashboard_summary(
    conn: &Connection,
    subject_id: &Uuid,
) -> Result<DashboardSummary, DatabaseError> {
    let total = repository::count_for_subject(conn, subject_id)?;
    let tumor = repository::count_for_domain(conn, subject_id, Domain::Tumor)?;
    let breast = repository::count_for_domain(conn, subject_id, Domain::BreastCancer)?;
    let stroke = repository::count_for_domain(conn, subject_id, Domain::Stroke)?;

    let mut critical = 0;
    let mut normal = 0;
    let mut warning = 0;
    for record in repository::list_all_for_subject(conn, subject_id)? {
        match severity_of(&record) {
            SeverityTier::Critical => critical += 1,
            SeverityTier::Normal => normal += 1,
            SeverityTier::Warning => warning += 1,
        }
    }

    Ok(DashboardSummary {
        total_diagnoses: total,
        tumor_diagnoses: tumor,
        breast_cancer_diagnoses: breast,
        stroke_diagnoses: stroke,
        critical_findings: critical,
        normal_findings: normal,
        warning_findings: warning,
        accuracy_rate: accuracy_proxy(conn, subject_id, total)?,
    })
}

fn accuracy_proxy(
    conn: &Connection,
    subject_id: &Uuid,
    total: u32,
) -> Result<f64, DatabaseError> {
    if total == 0 {
        return Ok(95.0);
    }
    let confident =
        repository::count_high_confidence(conn, subject_id, ACCURACY_PROXY_THRESHOLD)?;
    let rate = (confident as f64 / total as f64) * 100.0;
    Ok(round1(rate.clamp(85.0, 99.0)))
}

/// Group a domain's records by primary label: count and share of the
/// domain total, sorted descending by count. Empty domain gives `[]`.
pub fn label_distribution(
    conn: &Connection,
    subject_id: &Uuid,
    domain: Domain,
) -> Result<Vec<LabelShare>, DatabaseError> {
    let records =
        repository::list_diagnoses(conn, subject_id, &DiagnosisFilter::for_domain(domain))?;
    let total = records.len() as u32;
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut counts: Vec<(String, u32)> = Vec::new();
    for record in &records {
        let name = display_label(domain, &record.primary_label);
        match counts.iter_mut().find(|(n, _)| *n == name) {
            Some((_, c)) => *c += 1,
            None => counts.push((name, 1)),
        }
    }

    let mut shares: Vec<LabelShare> = counts
        .into_iter()
        .map(|(name, count)| LabelShare {
            name,
            count,
            percentage: round1((count as f64 / total as f64) * 100.0),
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then(a.name.cmp(&b.name)));
    Ok(shares)
}

/// Display formatting for raw tumor class names; other domains keep their
/// persisted labels.
fn display_label(domain: Domain, label: &str) -> String {
    if domain != Domain::Tumor {
        return label.to_string();
    }
    match label.to_ascii_lowercase().as_str() {
        "glioma" => "Glioma".to_string(),
        "meningioma" => "Meningioma".to_string(),
        "pituitary" => "Pituitary Tumor".to_string(),
        "notumor" => "No Tumor".to_string(),
        _ => label.to_string(),
    }
}

/// The past 7 calendar days ending today (inclusive), oldest first.
pub fn weekly_series(
    conn: &Connection,
    subject_id: &Uuid,
) -> Result<Vec<WeeklyPoint>, DatabaseError> {
    weekly_series_at(conn, subject_id, chrono::Local::now().date_naive())
}

/// Deterministic core of `weekly_series`: always exactly 7 buckets, one
/// per day, regardless of record count.
pub fn weekly_series_at(
    conn: &Connection,
    subject_id: &Uuid,
    today: NaiveDate,
) -> Result<Vec<WeeklyPoint>, DatabaseError> {
    let records = repository::list_all_for_subject(conn, subject_id)?;

    let mut series = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset);
        let day_confidences: Vec<f64> = records
            .iter()
            .filter(|r| r.created_at.date() == date)
            .map(|r| r.primary_confidence)
            .collect();

        let confident: Vec<f64> = day_confidences
            .iter()
            .copied()
            .filter(|&c| c >= DAILY_CONFIDENCE_FLOOR)
            .collect();
        let accuracy = if confident.is_empty() {
            0.0
        } else {
            round1(confident.iter().sum::<f64>() / confident.len() as f64 * 100.0)
        };

        series.push(WeeklyPoint {
            day: date.format("%a").to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            analyses: day_confidences.len() as u32,
            accuracy,
        });
    }

    Ok(series)
}

/// Monthly trend buckets ending at the current month, oldest first.
/// `months` is clamped into 1..=12.
pub fn monthly_series(
    conn: &Connection,
    subject_id: &Uuid,
    months: u32,
) -> Result<Vec<MonthlyPoint>, DatabaseError> {
    monthly_series_at(conn, subject_id, chrono::Local::now().date_naive(), months)
}

/// Deterministic core of `monthly_series`, anchored at `anchor`'s month.
pub fn monthly_series_at(
    conn: &Connection,
    subject_id: &Uuid,
    anchor: NaiveDate,
    months: u32,
) -> Result<Vec<MonthlyPoint>, DatabaseError> {
    let months = months.clamp(1, 12);
    let records = repository::list_all_for_subject(conn, subject_id)?;

    let mut series = Vec::with_capacity(months as usize);
    for back in (0..months).rev() {
        let (year, month) = rollback_month(anchor.year(), anchor.month(), back);

        let bucket: Vec<&DiagnosisRecord> = records
            .iter()
            .filter(|r| r.created_at.year() == year && r.created_at.month() == month)
            .collect();

        let mut critical = 0;
        let mut normal = 0;
        for record in &bucket {
            match severity_of(record) {
                SeverityTier::Critical => critical += 1,
                SeverityTier::Normal => normal += 1,
                SeverityTier::Warning => {}
            }
        }

        let average_confidence = if bucket.is_empty() {
            0.0
        } else {
            round3(
                bucket.iter().map(|r| r.primary_confidence).sum::<f64>() / bucket.len() as f64,
            )
        };

        series.push(MonthlyPoint {
            month: month_name(month),
            year,
            total_diagnoses: bucket.len() as u32,
            critical_findings: critical,
            normal_findings: normal,
            average_confidence,
        });
    }

    Ok(series)
}

/// Step `back` months backwards from (year, month), rolling over year
/// boundaries.
fn rollback_month(year: i32, month: u32, back: u32) -> (i32, u32) {
    let zero_based = year as i64 * 12 + (month as i64 - 1) - back as i64;
    ((zero_based / 12) as i32, (zero_based % 12 + 1) as u32)
}

fn month_name(month: u32) -> String {
    // %B on any date in that month
    NaiveDate::from_ymd_opt(2000, month, 1)
        .map(|d| d.format("%B").to_string())
        .unwrap_or_default()
}

/// The most recent records (newest first), each annotated with its derived
/// severity tier. `limit` is clamped into 1..=50.
pub fn recent_activity(
    conn: &Connection,
    subject_id: &Uuid,
    limit: u32,
) -> Result<Vec<ActivityItem>, DatabaseError> {
    let filter = DiagnosisFilter {
        limit: Some(limit.clamp(1, 50)),
        ..Default::default()
    };
    let records = repository::list_diagnoses(conn, subject_id, &filter)?;

    Ok(records
        .into_iter()
        .map(|record| {
            let severity = severity_of(&record);
            ActivityItem {
                id: record.id,
                domain: record.domain,
                analysis_variant: record.analysis_variant,
                label: record.primary_label,
                confidence: record.primary_confidence,
                image_ref: record.image_ref,
                overlay_ref: record.overlay_ref,
                notes: record.notes,
                created_at: record.created_at,
                severity,
            }
        })
        .collect())
}

/// Lifetime summary for one subject. All-zero/absent fields when the
/// subject has no records. The most-frequent label tie-breaks by first
/// appearance in chronological order, which keeps the result
/// deterministic.
pub fn subject_summary(
    conn: &Connection,
    subject_id: &Uuid,
) -> Result<SubjectSummary, DatabaseError> {
    let records = repository::list_all_for_subject(conn, subject_id)?;

    if records.is_empty() {
        return Ok(SubjectSummary {
            subject_id: *subject_id,
            total_uploads: 0,
            first_diagnosis_at: None,
            last_diagnosis_at: None,
            most_common_label: None,
            average_confidence: 0.0,
            tumor_scans: 0,
            breast_cancer_scans: 0,
            stroke_scans: 0,
        });
    }

    let mut label_counts: Vec<(String, u32)> = Vec::new();
    let mut tumor = 0;
    let mut breast = 0;
    let mut stroke = 0;
    let mut confidence_sum = 0.0;

    for record in &records {
        match label_counts
            .iter_mut()
            .find(|(l, _)| *l == record.primary_label)
        {
            Some((_, c)) => *c += 1,
            None => label_counts.push((record.primary_label.clone(), 1)),
        }
        confidence_sum += record.primary_confidence;
        match record.domain {
            Domain::Tumor => tumor += 1,
            Domain::BreastCancer => breast += 1,
            Domain::Stroke => stroke += 1,
        }
    }

    // Strictly-greater scan: the first-seen label wins ties
    let mut most_common: Option<&(String, u32)> = None;
    for entry in &label_counts {
        match most_common {
            Some(best) if entry.1 <= best.1 => {}
            _ => most_common = Some(entry),
        }
    }
    let most_common = most_common.map(|(l, _)| l.clone());

    Ok(SubjectSummary {
        subject_id: *subject_id,
        total_uploads: records.len() as u32,
        first_diagnosis_at: records.first().map(|r| r.created_at),
        last_diagnosis_at: records.last().map(|r| r.created_at),
        most_common_label: most_common,
        average_confidence: round3(confidence_sum / records.len() as f64),
        tumor_scans: tumor,
        breast_cancer_scans: breast,
        stroke_scans: stroke,
    })
}

/// Assemble the complete statistics surface in one call.
pub fn full_report(conn: &Connection, subject_id: &Uuid) -> Result<StatisticsReport, DatabaseError> {
    Ok(StatisticsReport {
        dashboard: dashboard_summary(conn, subject_id)?,
        tumor_distribution: label_distribution(conn, subject_id, Domain::Tumor)?,
        weekly: weekly_series(conn, subject_id)?,
        monthly: monthly_series(conn, subject_id, 6)?,
        recent_activity: recent_activity(conn, subject_id, 10)?,
    })
}

fn severity_of(record: &DiagnosisRecord) -> SeverityTier {
    classify_severity(record.domain, &record.primary_label, record.primary_confidence)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::enums::{ModelFidelity, Track};
    use crate::models::TrackResult;
    use chrono::NaiveDateTime;
    use std::collections::BTreeMap;

    fn insert(
        conn: &Connection,
        subject: Uuid,
        domain: Domain,
        track: Track,
        label: &str,
        confidence: f64,
        at: NaiveDateTime,
    ) {
        let mut tracks = BTreeMap::new();
        tracks.insert(
            track,
            TrackResult {
                label: label.to_string(),
                confidence,
                distribution: BTreeMap::from([(label.to_string(), confidence)]),
                fidelity: ModelFidelity::Full,
            },
        );
        let record = DiagnosisRecord {
            id: Uuid::new_v4(),
            subject_id: subject,
            domain,
            analysis_variant: None,
            primary_track: track,
            primary_label: label.to_string(),
            primary_confidence: confidence,
            track_results: tracks,
            image_ref: "img.bin".into(),
            overlay_ref: None,
            notes: None,
            created_at: at,
        };
        repository::insert_diagnosis(conn, &record).unwrap();
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn dashboard_empty_subject_is_all_zero_with_default_accuracy() {
        let conn = open_memory_database().unwrap();
        let summary = dashboard_summary(&conn, &Uuid::new_v4()).unwrap();

        assert_eq!(summary.total_diagnoses, 0);
        assert_eq!(summary.critical_findings, 0);
        assert_eq!(summary.accuracy_rate, 95.0);
    }

    #[test]
    fn dashboard_counts_domains_and_severities() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        // critical: tumor at high confidence
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.9, at(2026, 3, 1, 9));
        // normal: no tumor
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "notumor", 0.95, at(2026, 3, 2, 9));
        // warning: stroke at mid confidence
        insert(
            &conn, subject, Domain::Stroke, Track::Stroke, "ischemic_stroke", 0.65,
            at(2026, 3, 3, 9),
        );

        let summary = dashboard_summary(&conn, &subject).unwrap();
        assert_eq!(summary.total_diagnoses, 3);
        assert_eq!(summary.tumor_diagnoses, 2);
        assert_eq!(summary.stroke_diagnoses, 1);
        assert_eq!(summary.breast_cancer_diagnoses, 0);
        assert_eq!(summary.critical_findings, 1);
        assert_eq!(summary.normal_findings, 1);
        assert_eq!(summary.warning_findings, 1);
    }

    #[test]
    fn accuracy_proxy_clamped_into_bounds() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        // 0% confident records would be 0.0 unclamped
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.5, at(2026, 3, 1, 9));
        let low = dashboard_summary(&conn, &subject).unwrap();
        assert_eq!(low.accuracy_rate, 85.0);

        // 100% confident records clamp down to 99
        let subject2 = Uuid::new_v4();
        insert(&conn, subject2, Domain::Tumor, Track::Tumor, "glioma", 0.9, at(2026, 3, 1, 9));
        let high = dashboard_summary(&conn, &subject2).unwrap();
        assert_eq!(high.accuracy_rate, 99.0);
    }

    #[test]
    fn label_distribution_percentages_sum_to_100() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        for (label, n) in [("glioma", 3), ("meningioma", 2), ("notumor", 1)] {
            for i in 0..n {
                insert(
                    &conn, subject, Domain::Tumor, Track::Tumor, label, 0.9,
                    at(2026, 3, 1 + i, 9),
                );
            }
        }

        let shares = label_distribution(&conn, &subject, Domain::Tumor).unwrap();
        assert_eq!(shares.len(), 3);
        // Sorted descending by count, display names applied
        assert_eq!(shares[0].name, "Glioma");
        assert_eq!(shares[0].count, 3);
        assert_eq!(shares[2].name, "No Tumor");

        let sum: f64 = shares.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() < 0.5, "percentages summed to {sum}");
    }

    #[test]
    fn label_distribution_empty_domain_is_empty() {
        let conn = open_memory_database().unwrap();
        let shares = label_distribution(&conn, &Uuid::new_v4(), Domain::Tumor).unwrap();
        assert!(shares.is_empty());
    }

    #[test]
    fn weekly_series_always_seven_buckets() {
        let conn = open_memory_database().unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let empty = weekly_series_at(&conn, &Uuid::new_v4(), today).unwrap();
        assert_eq!(empty.len(), 7);
        assert!(empty.iter().all(|p| p.analyses == 0 && p.accuracy == 0.0));
        // Oldest first, today inclusive
        assert_eq!(empty[0].date, "2026-03-04");
        assert_eq!(empty[6].date, "2026-03-10");
        assert_eq!(empty[6].day, "Tue");
    }

    #[test]
    fn weekly_accuracy_ignores_low_confidence_records() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        // Same day: one confident (0.8), one below the 0.7 floor
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.8, at(2026, 3, 10, 9));
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.5, at(2026, 3, 10, 10));

        let series = weekly_series_at(&conn, &subject, today).unwrap();
        let today_point = &series[6];
        assert_eq!(today_point.analyses, 2);
        assert_eq!(today_point.accuracy, 80.0);
    }

    #[test]
    fn monthly_series_rolls_over_year_boundary() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.9, at(2025, 12, 15, 9));
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "notumor", 0.9, at(2026, 1, 10, 9));
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.7, at(2026, 2, 5, 9));

        let anchor = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let series = monthly_series_at(&conn, &subject, anchor, 3).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!((series[0].month.as_str(), series[0].year), ("December", 2025));
        assert_eq!((series[1].month.as_str(), series[1].year), ("January", 2026));
        assert_eq!((series[2].month.as_str(), series[2].year), ("February", 2026));

        assert_eq!(series[0].total_diagnoses, 1);
        assert_eq!(series[0].critical_findings, 1);
        assert_eq!(series[1].normal_findings, 1);
        assert_eq!(series[2].average_confidence, 0.7);
    }

    #[test]
    fn monthly_series_clamps_month_count() {
        let conn = open_memory_database().unwrap();
        let anchor = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let subject = Uuid::new_v4();

        assert_eq!(monthly_series_at(&conn, &subject, anchor, 0).unwrap().len(), 1);
        assert_eq!(monthly_series_at(&conn, &subject, anchor, 40).unwrap().len(), 12);
    }

    #[test]
    fn empty_month_has_zero_average_confidence() {
        let conn = open_memory_database().unwrap();
        let anchor = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let series = monthly_series_at(&conn, &Uuid::new_v4(), anchor, 2).unwrap();
        assert!(series.iter().all(|p| p.average_confidence == 0.0));
    }

    #[test]
    fn recent_activity_newest_first_with_derived_severity() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        // Older record: low confidence -> normal
        insert(
            &conn, subject, Domain::Stroke, Track::Stroke, "ischemic_stroke", 0.5,
            at(2026, 3, 1, 9),
        );
        // Newer record: high confidence -> critical
        insert(
            &conn, subject, Domain::Stroke, Track::Stroke, "ischemic_stroke", 0.9,
            at(2026, 3, 2, 9),
        );

        let activity = recent_activity(&conn, &subject, 2).unwrap();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].severity, SeverityTier::Critical);
        assert_eq!(activity[1].severity, SeverityTier::Normal);
        assert!(activity[0].created_at > activity[1].created_at);
    }

    #[test]
    fn recent_activity_clamps_limit() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        for day in 1..=3 {
            insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.9, at(2026, 3, day, 9));
        }

        // limit 0 clamps up to 1
        assert_eq!(recent_activity(&conn, &subject, 0).unwrap().len(), 1);
        // oversized limit is fine
        assert_eq!(recent_activity(&conn, &subject, 500).unwrap().len(), 3);
    }

    #[test]
    fn subject_summary_empty() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        let summary = subject_summary(&conn, &subject).unwrap();

        assert_eq!(summary.total_uploads, 0);
        assert!(summary.first_diagnosis_at.is_none());
        assert!(summary.most_common_label.is_none());
        assert_eq!(summary.average_confidence, 0.0);
    }

    #[test]
    fn subject_summary_ties_break_by_first_appearance() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        // glioma appears first, then meningioma; both end at 2 occurrences
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.8, at(2026, 3, 1, 9));
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "meningioma", 0.8, at(2026, 3, 2, 9));
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "meningioma", 0.8, at(2026, 3, 3, 9));
        insert(&conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.8, at(2026, 3, 4, 9));

        let summary = subject_summary(&conn, &subject).unwrap();
        assert_eq!(summary.most_common_label.as_deref(), Some("glioma"));
        assert_eq!(summary.total_uploads, 4);
        assert_eq!(summary.first_diagnosis_at, Some(at(2026, 3, 1, 9)));
        assert_eq!(summary.last_diagnosis_at, Some(at(2026, 3, 4, 9)));
        assert_eq!(summary.tumor_scans, 4);
        assert_eq!(summary.average_confidence, 0.8);
    }

    #[test]
    fn full_report_assembles_all_sections() {
        let conn = open_memory_database().unwrap();
        let subject = Uuid::new_v4();
        insert(
            &conn, subject, Domain::Tumor, Track::Tumor, "glioma", 0.9,
            chrono::Local::now().naive_local(),
        );

        let report = full_report(&conn, &subject).unwrap();
        assert_eq!(report.dashboard.total_diagnoses, 1);
        assert_eq!(report.weekly.len(), 7);
        assert_eq!(report.monthly.len(), 6);
        assert_eq!(report.recent_activity.len(), 1);
        assert_eq!(report.tumor_distribution.len(), 1);
    }
}
