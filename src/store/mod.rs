//! Persistence seams.
//!
//! Every aggregate is reached through one of the traits below, so the engine
//! code is identical over Postgres and the in-memory store. Methods that must
//! be atomic (invite consumption, tenant registration, insert-if-absent
//! alerts) are store primitives rather than service-side check-then-act
//! sequences.
//!
//! Tenant scoping is part of the trait contract: lookup methods take the
//! caller's organization id and treat rows owned by another organization as
//! nonexistent.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::Result;
use crate::domain::{
    AuditEntry, Certificate, CertificateKind, Company, ExpiryAlert, Group, Invitation,
    Organization, Session, User,
};

/// Filters for certificate listings. Severity filtering happens in the
/// service layer through the shared classification function, never in SQL.
#[derive(Debug, Clone, Default)]
pub struct CertificateFilter {
    pub company_id: Option<Uuid>,
    pub kind: Option<CertificateKind>,
}

/// Filters for the audit listing. `action` matches as a substring.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            action: None,
            from: None,
            to: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Organizations plus the companies and groups they own.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Creates an organization together with its first admin user, as one
    /// atomic unit. Fails with `Conflict` when the email or legal id is
    /// already taken.
    async fn register_organization(&self, org: &Organization, admin: &User) -> Result<()>;

    async fn get_organization(&self, org_id: Uuid) -> Result<Option<Organization>>;

    async fn create_company(&self, company: &Company) -> Result<()>;

    async fn get_company(&self, org_id: Uuid, company_id: Uuid) -> Result<Option<Company>>;

    async fn list_companies(&self, org_id: Uuid) -> Result<Vec<Company>>;

    /// Deletes a company unless certificates still reference it, in which
    /// case the delete fails with `Conflict`. Returns false when the company
    /// does not exist in this organization.
    async fn delete_company(&self, org_id: Uuid, company_id: Uuid) -> Result<bool>;

    async fn create_group(&self, group: &Group) -> Result<()>;

    async fn get_group(&self, org_id: Uuid, group_id: Uuid) -> Result<Option<Group>>;

    async fn list_groups(&self, org_id: Uuid) -> Result<Vec<Group>>;

    /// Deletes a group unless companies still reference it.
    async fn delete_group(&self, org_id: Uuid, group_id: Uuid) -> Result<bool>;
}

/// Users, invitations, and sessions.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Unscoped lookup, used only to resolve an authenticated session back to
    /// its principal. Entity access on behalf of that principal goes through
    /// the scoped methods.
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn get_user(&self, org_id: Uuid, user_id: Uuid) -> Result<Option<User>>;

    async fn list_users(&self, org_id: Uuid) -> Result<Vec<User>>;

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Commits or clears the MFA secret on the user record. Enabling only
    /// happens after the auth layer verified a code against the staged
    /// secret.
    async fn set_user_mfa(&self, user_id: Uuid, secret: Option<String>, enabled: bool)
        -> Result<()>;

    /// Flips the active flag on a same-organization user. Returns false when
    /// no such user exists in the organization.
    async fn set_user_active(&self, org_id: Uuid, user_id: Uuid, active: bool) -> Result<bool>;

    async fn create_invitation(&self, invitation: &Invitation) -> Result<()>;

    async fn find_invitation_by_token_hash(&self, token_hash: &[u8])
        -> Result<Option<Invitation>>;

    /// Atomically marks the invitation used and creates the user. Returns
    /// false when the invitation was already used or expired by the time the
    /// write ran; neither side effect is applied in that case.
    async fn accept_invitation(
        &self,
        token_hash: &[u8],
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    async fn insert_session(&self, session: &Session) -> Result<()>;

    /// Looks up a live session; expired rows are treated as absent.
    async fn find_session(&self, token_hash: &[u8], now: DateTime<Utc>)
        -> Result<Option<Session>>;

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()>;
}

/// Certificates and expiry alerts.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<()>;

    async fn get_certificate(
        &self,
        org_id: Uuid,
        certificate_id: Uuid,
    ) -> Result<Option<Certificate>>;

    /// Tenant-scoped listing ordered by expiry date, soonest first.
    async fn list_certificates(
        &self,
        org_id: Uuid,
        filter: &CertificateFilter,
    ) -> Result<Vec<Certificate>>;

    async fn delete_certificate(&self, org_id: Uuid, certificate_id: Uuid) -> Result<bool>;

    /// All certificates, in any organization, expiring between the two
    /// calendar days inclusive. Scanner use only.
    async fn list_expiring_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Certificate>>;

    /// Inserts the alert unless one already exists for the same
    /// (certificate, threshold) pair. Returns true when a row was written.
    /// Safe under concurrent scanners.
    async fn insert_alert_if_absent(&self, alert: &ExpiryAlert) -> Result<bool>;

    async fn mark_alert_notified(&self, alert_id: Uuid) -> Result<()>;

    async fn list_alerts(&self, org_id: Uuid) -> Result<Vec<ExpiryAlert>>;
}

/// Append-only audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<()>;

    /// Tenant-scoped listing, newest first.
    async fn list(&self, org_id: Uuid, filter: &AuditFilter) -> Result<Vec<AuditEntry>>;
}
