use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{AnalysisVariant, Domain};
use crate::severity::SeverityTier;

/// Main dashboard aggregates for one subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    pub total_diagnoses: u32,
    pub tumor_diagnoses: u32,
    pub breast_cancer_diagnoses: u32,
    pub stroke_diagnoses: u32,
    pub critical_findings: u32,
    pub normal_findings: u32,
    pub warning_findings: u32,
    /// Heuristic substitute for ground-truth accuracy: the percentage of
    /// records with confidence >= 0.8, clamped into [85, 99], 95.0 when no
    /// records exist. Not a measured metric.
    pub accuracy_rate: f64,
}

/// One primary label's share of a domain's records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelShare {
    pub name: String,
    pub count: u32,
    pub percentage: f64,
}

/// One calendar day in the weekly series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyPoint {
    /// Abbreviated day-of-week label (Mon, Tue, ...).
    pub day: String,
    /// ISO date, YYYY-MM-DD.
    pub date: String,
    pub analyses: u32,
    /// Mean confidence of that day's records with confidence >= 0.7, as a
    /// percentage. 0.0 when no such records.
    pub accuracy: f64,
}

/// One calendar month in the trend series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyPoint {
    pub month: String,
    pub year: i32,
    pub total_diagnoses: u32,
    pub critical_findings: u32,
    pub normal_findings: u32,
    pub average_confidence: f64,
}

/// A recent record annotated with its derived severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: Uuid,
    pub domain: Domain,
    pub analysis_variant: Option<AnalysisVariant>,
    pub label: String,
    pub confidence: f64,
    pub image_ref: String,
    pub overlay_ref: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub severity: SeverityTier,
}

/// Lifetime summary for one subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectSummary {
    pub subject_id: Uuid,
    pub total_uploads: u32,
    pub first_diagnosis_at: Option<NaiveDateTime>,
    pub last_diagnosis_at: Option<NaiveDateTime>,
    pub most_common_label: Option<String>,
    pub average_confidence: f64,
    pub tumor_scans: u32,
    pub breast_cancer_scans: u32,
    pub stroke_scans: u32,
}

/// Everything the statistics surface offers, assembled in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub dashboard: DashboardSummary,
    pub tumor_distribution: Vec<LabelShare>,
    pub weekly: Vec<WeeklyPoint>,
    pub monthly: Vec<MonthlyPoint>,
    pub recent_activity: Vec<ActivityItem>,
}
