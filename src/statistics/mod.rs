//! Statistics engine — longitudinal aggregates derived from the
//! persisted diagnosis records. Read-only, per-subject, recomputed on
//! every call; severity tiers are derived here at read time, never
//! stored.

pub mod engine;
pub mod types;

pub use engine::{
    dashboard_summary, full_report, label_distribution, monthly_series, monthly_series_at,
    recent_activity, subject_summary, weekly_series, weekly_series_at,
};
pub use types::{
    ActivityItem, DashboardSummary, LabelShare, MonthlyPoint, StatisticsReport, SubjectSummary,
    WeeklyPoint,
};
