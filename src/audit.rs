//! Append-only audit trail.
//!
//! Entries are written by the services after the transition they describe has
//! succeeded, never before, so a crash mid-operation cannot log an action
//! that did not happen. Listing is tenant-scoped and gated to admins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AuditEntry, Role, User};
use crate::store::{AuditFilter, AuditStore};
use crate::{Error, Result};

/// Audit action tags. One vocabulary for writers and for listing filters.
pub mod action {
    pub const LOGIN: &str = "login";
    pub const LOGIN_MFA: &str = "login_mfa";
    pub const LOGOUT: &str = "logout";
    pub const MFA_ENABLED: &str = "mfa_enabled";
    pub const MFA_DISABLED: &str = "mfa_disabled";
    pub const ORGANIZATION_REGISTERED: &str = "organization_registered";
    pub const INVITE_SENT: &str = "invite_sent";
    pub const INVITE_ACCEPTED: &str = "invite_accepted";
    pub const USER_ACTIVATED: &str = "user_activated";
    pub const USER_DEACTIVATED: &str = "user_deactivated";
    pub const CERTIFICATE_UPLOADED: &str = "certificate_uploaded";
    pub const CERTIFICATE_DELETED: &str = "certificate_deleted";
    pub const PASSWORD_REVEALED: &str = "password_revealed";
    pub const COMPANY_CREATED: &str = "company_created";
    pub const COMPANY_DELETED: &str = "company_deleted";
    pub const GROUP_CREATED: &str = "group_created";
    pub const GROUP_DELETED: &str = "group_deleted";
}

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Appends one entry. Callers invoke this only after the action itself
    /// has been applied.
    pub async fn record(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        action: &str,
        detail: Option<String>,
        ip: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            org_id,
            user_id,
            action: action.to_string(),
            detail,
            ip,
            created_at: at,
        };
        self.store.append(&entry).await
    }

    /// Tenant-scoped listing. Requires admin or above.
    pub async fn list(&self, actor: &User, filter: AuditFilter) -> Result<Vec<AuditEntry>> {
        if !actor.role.satisfies(Role::Admin) {
            return Err(Error::Forbidden);
        }
        self.store.list(actor.org_id, &filter).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn actor(role: Role, org_id: Uuid) -> User {
        User {
            id: Uuid::new_v4(),
            org_id,
            name: "Ana".to_string(),
            email: "ana@acme.com".to_string(),
            password_hash: "hash".to_string(),
            role,
            active: true,
            mfa_enabled: false,
            mfa_secret: None,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn operator_cannot_list_audit_entries() {
        let store = Arc::new(MemoryStore::new());
        let trail = AuditTrail::new(store);
        let operator = actor(Role::Operator, Uuid::new_v4());
        let result = trail.list(&operator, AuditFilter::default()).await;
        assert!(matches!(result, Err(Error::Forbidden)));
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_actor_tenant() {
        let store = Arc::new(MemoryStore::new());
        let trail = AuditTrail::new(store);
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let admin_a = actor(Role::Admin, org_a);
        let now = Utc::now();

        trail
            .record(org_a, admin_a.id, action::LOGIN, None, None, now)
            .await
            .unwrap();
        trail
            .record(org_b, Uuid::new_v4(), action::LOGIN, None, None, now)
            .await
            .unwrap();

        let entries = trail.list(&admin_a, AuditFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.first().unwrap().org_id, org_a);
    }

    #[tokio::test]
    async fn action_filter_matches_substring() {
        let store = Arc::new(MemoryStore::new());
        let trail = AuditTrail::new(store);
        let org_id = Uuid::new_v4();
        let admin = actor(Role::MasterAdmin, org_id);
        let now = Utc::now();

        trail
            .record(org_id, admin.id, action::MFA_ENABLED, None, None, now)
            .await
            .unwrap();
        trail
            .record(org_id, admin.id, action::LOGOUT, None, None, now)
            .await
            .unwrap();

        let filter = AuditFilter {
            action: Some("mfa".to_string()),
            ..AuditFilter::default()
        };
        let entries = trail.list(&admin, filter).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.first().unwrap().action, action::MFA_ENABLED);
    }
}
