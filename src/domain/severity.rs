use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Severity bucket for a certificate relative to its expiry date.
///
/// Dashboards, listing filters, and alert grouping all classify through
/// [`Severity::for_expiry`] so the boundaries never drift between views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Expired,
    Critical,
    Warning,
    Attention,
    Valid,
}

impl Severity {
    /// Pure classification of `expires_on` as seen from `today`.
    ///
    /// Buckets by whole calendar days: expired below zero, critical through
    /// day 5, warning through day 15, attention through day 30, valid beyond.
    #[must_use]
    pub fn for_expiry(expires_on: NaiveDate, today: NaiveDate) -> Self {
        let days = (expires_on - today).num_days();
        if days < 0 {
            Self::Expired
        } else if days <= 5 {
            Self::Critical
        } else if days <= 15 {
            Self::Warning
        } else if days <= 30 {
            Self::Attention
        } else {
            Self::Valid
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Attention => "attention",
            Self::Valid => "valid",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "expired" => Some(Self::Expired),
            "critical" => Some(Self::Critical),
            "warning" => Some(Self::Warning),
            "attention" => Some(Self::Attention),
            "valid" => Some(Self::Valid),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
