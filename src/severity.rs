//! Severity derivation — a pure function of (domain, label, confidence).
//!
//! Tiers are computed at read time only and never stored, so a policy
//! change here applies retroactively to every persisted record without a
//! migration. Label strings are resolved into per-domain enums once, then
//! the rule tables match on tags instead of scattering substring checks.

use serde::{Deserialize, Serialize};

use crate::models::enums::Domain;

/// Ordered: Normal < Warning < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Normal,
    Warning,
    Critical,
}

impl SeverityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityTier::Normal => "normal",
            SeverityTier::Warning => "warning",
            SeverityTier::Critical => "critical",
        }
    }
}

enum TumorLabel {
    NoTumor,
    /// Any tumor-indicating label, recognized or not, takes the
    /// confidence-threshold path.
    TumorPresent,
}

enum BreastLabel {
    Birads(u8),
    Benign,
    Malignant,
    NormalTissue,
    Unrecognized,
}

enum StrokeLabel {
    NoStroke,
    Stroke,
    Unrecognized,
}

fn resolve_tumor(label: &str) -> TumorLabel {
    if label.eq_ignore_ascii_case("notumor") {
        TumorLabel::NoTumor
    } else {
        TumorLabel::TumorPresent
    }
}

fn resolve_breast(label: &str) -> BreastLabel {
    // "BI-RADS n (…)" — the ordinal imaging category
    if let Some(rest) = label.strip_prefix("BI-RADS ") {
        if let Some(digit) = rest.chars().next().and_then(|c| c.to_digit(10)) {
            return BreastLabel::Birads(digit as u8);
        }
    }
    let lower = label.to_ascii_lowercase();
    match lower.as_str() {
        "benign" => BreastLabel::Benign,
        "malignant" => BreastLabel::Malignant,
        "normal" => BreastLabel::NormalTissue,
        _ => BreastLabel::Unrecognized,
    }
}

fn resolve_stroke(label: &str) -> StrokeLabel {
    match label.to_ascii_lowercase().as_str() {
        "no_stroke" => StrokeLabel::NoStroke,
        "hemorrhagic_stroke" | "ischemic_stroke" => StrokeLabel::Stroke,
        _ => StrokeLabel::Unrecognized,
    }
}

/// Confidence thresholds shared by the tumor and stroke rule tables.
fn threshold_tier(confidence: f64) -> SeverityTier {
    if confidence >= 0.8 {
        SeverityTier::Critical
    } else if confidence >= 0.6 {
        SeverityTier::Warning
    } else {
        SeverityTier::Normal
    }
}

/// Derive the severity tier for one record. Total: every input maps to a
/// tier, and unrecognized labels never default to Critical.
pub fn classify_severity(domain: Domain, label: &str, confidence: f64) -> SeverityTier {
    match domain {
        Domain::Tumor => match resolve_tumor(label) {
            TumorLabel::NoTumor => SeverityTier::Normal,
            TumorLabel::TumorPresent => threshold_tier(confidence),
        },
        Domain::BreastCancer => match resolve_breast(label) {
            BreastLabel::Birads(1..=2) => SeverityTier::Normal,
            BreastLabel::Birads(3) => SeverityTier::Warning,
            BreastLabel::Birads(4..=5) => SeverityTier::Critical,
            BreastLabel::Benign | BreastLabel::NormalTissue => SeverityTier::Normal,
            BreastLabel::Malignant => SeverityTier::Critical,
            // Out-of-range ordinal or unknown tissue label: conservative
            // but not silent
            BreastLabel::Birads(_) | BreastLabel::Unrecognized => SeverityTier::Warning,
        },
        Domain::Stroke => match resolve_stroke(label) {
            StrokeLabel::NoStroke => SeverityTier::Normal,
            StrokeLabel::Stroke => threshold_tier(confidence),
            StrokeLabel::Unrecognized => SeverityTier::Warning,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering() {
        assert!(SeverityTier::Normal < SeverityTier::Warning);
        assert!(SeverityTier::Warning < SeverityTier::Critical);
    }

    #[test]
    fn tumor_label_overrides_confidence() {
        // High-confidence "no tumor" stays normal
        assert_eq!(
            classify_severity(Domain::Tumor, "notumor", 0.95),
            SeverityTier::Normal
        );
        assert_eq!(
            classify_severity(Domain::Tumor, "glioma", 0.95),
            SeverityTier::Critical
        );
        assert_eq!(
            classify_severity(Domain::Tumor, "meningioma", 0.65),
            SeverityTier::Warning
        );
        assert_eq!(
            classify_severity(Domain::Tumor, "pituitary", 0.4),
            SeverityTier::Normal
        );
    }

    #[test]
    fn tumor_severity_monotonic_in_confidence() {
        let mut last = SeverityTier::Normal;
        for step in 0..=100 {
            let tier = classify_severity(Domain::Tumor, "glioma", step as f64 / 100.0);
            assert!(tier >= last, "severity decreased at confidence {step}");
            last = tier;
        }
    }

    #[test]
    fn birads_ordinal_scale() {
        let cases = [
            ("BI-RADS 1 (Negative)", SeverityTier::Normal),
            ("BI-RADS 2 (Benign)", SeverityTier::Normal),
            ("BI-RADS 3 (Probably Benign)", SeverityTier::Warning),
            ("BI-RADS 4 (Suspicious)", SeverityTier::Critical),
            ("BI-RADS 5 (Highly Suspicious)", SeverityTier::Critical),
        ];
        for (label, expected) in cases {
            assert_eq!(
                classify_severity(Domain::BreastCancer, label, 0.5),
                expected,
                "label {label}"
            );
        }
    }

    #[test]
    fn breast_tissue_labels() {
        assert_eq!(
            classify_severity(Domain::BreastCancer, "benign", 0.99),
            SeverityTier::Normal
        );
        assert_eq!(
            classify_severity(Domain::BreastCancer, "normal", 0.99),
            SeverityTier::Normal
        );
        assert_eq!(
            classify_severity(Domain::BreastCancer, "malignant", 0.3),
            SeverityTier::Critical
        );
    }

    #[test]
    fn breast_unrecognized_defaults_to_warning() {
        assert_eq!(
            classify_severity(Domain::BreastCancer, "inconclusive", 0.99),
            SeverityTier::Warning
        );
        assert_eq!(
            classify_severity(Domain::BreastCancer, "BI-RADS 9", 0.99),
            SeverityTier::Warning
        );
    }

    #[test]
    fn stroke_rule_table() {
        assert_eq!(
            classify_severity(Domain::Stroke, "no_stroke", 0.99),
            SeverityTier::Normal
        );
        assert_eq!(
            classify_severity(Domain::Stroke, "ischemic_stroke", 0.9),
            SeverityTier::Critical
        );
        assert_eq!(
            classify_severity(Domain::Stroke, "hemorrhagic_stroke", 0.7),
            SeverityTier::Warning
        );
        assert_eq!(
            classify_severity(Domain::Stroke, "ischemic_stroke", 0.5),
            SeverityTier::Normal
        );
        assert_eq!(
            classify_severity(Domain::Stroke, "lacunar", 0.99),
            SeverityTier::Warning
        );
    }

    #[test]
    fn stroke_severity_monotonic_in_confidence() {
        let mut last = SeverityTier::Normal;
        for step in 0..=100 {
            let tier = classify_severity(Domain::Stroke, "hemorrhagic_stroke", step as f64 / 100.0);
            assert!(tier >= last);
            last = tier;
        }
    }
}
