use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Domain {
    Tumor => "tumor",
    BreastCancer => "breast_cancer",
    Stroke => "stroke",
});

str_enum!(AnalysisVariant {
    Birads => "birads",
    Pathological => "pathological",
    Both => "both",
});

str_enum!(Track {
    Tumor => "tumor",
    Birads => "birads",
    Pathological => "pathological",
    Stroke => "stroke",
});

str_enum!(ModelFidelity {
    Full => "full",
    Fallback => "fallback",
});

impl Domain {
    /// All classifier tracks that can contribute to this domain.
    pub fn tracks(&self) -> &'static [Track] {
        match self {
            Domain::Tumor => &[Track::Tumor],
            Domain::BreastCancer => &[Track::Birads, Track::Pathological],
            Domain::Stroke => &[Track::Stroke],
        }
    }

    /// Analysis variants a caller may request for this domain.
    /// Only breast cancer has more than one classifier track.
    pub fn variants(&self) -> &'static [AnalysisVariant] {
        match self {
            Domain::BreastCancer => &[
                AnalysisVariant::Birads,
                AnalysisVariant::Pathological,
                AnalysisVariant::Both,
            ],
            _ => &[],
        }
    }
}

impl Track {
    /// The fixed label set this track's classifier draws from.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Track::Tumor => &["glioma", "meningioma", "notumor", "pituitary"],
            Track::Birads => &[
                "BI-RADS 1 (Negative)",
                "BI-RADS 2 (Benign)",
                "BI-RADS 3 (Probably Benign)",
                "BI-RADS 4 (Suspicious)",
                "BI-RADS 5 (Highly Suspicious)",
            ],
            Track::Pathological => &["benign", "malignant", "normal"],
            Track::Stroke => &["hemorrhagic_stroke", "ischemic_stroke", "no_stroke"],
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Track::Tumor => Domain::Tumor,
            Track::Birads | Track::Pathological => Domain::BreastCancer,
            Track::Stroke => Domain::Stroke,
        }
    }
}
