use chrono::NaiveDateTime;

use super::enums::Domain;

/// Filter for diagnosis record listings. All fields optional; `None`
/// means no constraint on that axis.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisFilter {
    pub domain: Option<Domain>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl DiagnosisFilter {
    pub fn for_domain(domain: Domain) -> Self {
        Self {
            domain: Some(domain),
            ..Default::default()
        }
    }
}
