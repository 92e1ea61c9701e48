use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Role, Severity};

/// Subscription plan of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Basic,
    Professional,
    Enterprise,
}

impl PlanTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "basic" => Some(Self::Basic),
            "professional" => Some(Self::Professional),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

/// Supported certificate types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CertificateKind {
    #[serde(rename = "e-cnpj")]
    ECnpj,
    #[serde(rename = "e-cpf")]
    ECpf,
}

impl CertificateKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ECnpj => "e-cnpj",
            Self::ECpf => "e-cpf",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "e-cnpj" => Some(Self::ECnpj),
            "e-cpf" => Some(Self::ECpf),
            _ => None,
        }
    }
}

/// Tenant boundary. Owns users, companies, and groups.
#[derive(Debug, Clone)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub legal_id: String,
    pub contact_email: String,
    pub plan: PlanTier,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub mfa_enabled: bool,
    pub mfa_secret: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Client company managed by an organization.
#[derive(Debug, Clone)]
pub struct Company {
    pub id: Uuid,
    pub org_id: Uuid,
    pub group_id: Option<Uuid>,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub legal_id: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A tracked certificate. The password is held only as an encrypted envelope;
/// the plaintext never reaches a store.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub id: Uuid,
    pub org_id: Uuid,
    pub company_id: Uuid,
    pub kind: CertificateKind,
    pub name: String,
    pub issued_on: NaiveDate,
    pub expires_on: NaiveDate,
    pub file_ref: String,
    pub password_ciphertext: Vec<u8>,
    pub password_iv: Vec<u8>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Certificate {
    /// Whole calendar days from `today` to expiry. Negative once expired.
    #[must_use]
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expires_on - today).num_days()
    }

    #[must_use]
    pub fn severity(&self, today: NaiveDate) -> Severity {
        Severity::for_expiry(self.expires_on, today)
    }
}

/// Single-use invitation to join an organization.
///
/// Only the token hash is stored; the raw token travels once, inside the
/// invitation link.
#[derive(Debug, Clone)]
pub struct Invitation {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token_hash: Vec<u8>,
    pub created_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    /// Expiry is computed, never stored as a state transition.
    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Append-only audit record. Never updated or deleted.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub detail: Option<String>,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row per (certificate, threshold) crossing, enforced by a uniqueness
/// constraint in the store.
#[derive(Debug, Clone)]
pub struct ExpiryAlert {
    pub id: Uuid,
    pub org_id: Uuid,
    pub certificate_id: Uuid,
    pub threshold_days: i32,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

/// Server-side session record. Keyed by token hash, never the raw token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::unwrap_used)]
    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn kind_round_trips_wire_names() {
        assert_eq!(CertificateKind::parse("e-cnpj"), Some(CertificateKind::ECnpj));
        assert_eq!(CertificateKind::ECpf.as_str(), "e-cpf");
        assert_eq!(CertificateKind::parse("a1"), None);
    }

    #[test]
    fn plan_defaults_to_free() {
        assert_eq!(PlanTier::default(), PlanTier::Free);
        assert_eq!(PlanTier::parse("professional"), Some(PlanTier::Professional));
    }

    #[test]
    fn days_until_expiry_is_signed() {
        let cert = Certificate {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            kind: CertificateKind::ECnpj,
            name: "matriz".to_string(),
            issued_on: date(2024, 1, 1),
            expires_on: date(2025, 1, 1),
            file_ref: "s3://bucket/cert.p12".to_string(),
            password_ciphertext: vec![0u8; 16],
            password_iv: vec![0u8; 16],
            uploaded_by: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        assert_eq!(cert.days_until_expiry(date(2024, 12, 31)), 1);
        assert_eq!(cert.days_until_expiry(date(2025, 1, 1)), 0);
        assert_eq!(cert.days_until_expiry(date(2025, 1, 2)), -1);
        assert_eq!(cert.severity(date(2025, 1, 2)), Severity::Expired);
    }

    #[test]
    fn invitation_expiry_is_computed() {
        let now = Utc::now();
        let invite = Invitation {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            email: "b@acme.com".to_string(),
            role: Role::Operator,
            token_hash: vec![1u8; 32],
            created_by: Uuid::new_v4(),
            expires_at: now + chrono::Duration::days(7),
            used: false,
            created_at: now,
        };
        assert!(!invite.expired(now + chrono::Duration::days(7)));
        assert!(invite.expired(now + chrono::Duration::days(8)));
    }
}
