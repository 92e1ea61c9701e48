//! Mutex-guarded in-memory store.
//!
//! Backs the test suite and DSN-less local runs. Every method takes the
//! single lock once, which gives the multi-step primitives (registration,
//! invite consumption) their atomicity for free.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AuditFilter, AuditStore, CertificateFilter, CertificateStore, OrganizationStore, UserStore,
};
use crate::domain::{
    AuditEntry, Certificate, Company, ExpiryAlert, Group, Invitation, Organization, Session, User,
};
use crate::{Error, Result};

#[derive(Default)]
struct Inner {
    organizations: HashMap<Uuid, Organization>,
    users: HashMap<Uuid, User>,
    companies: HashMap<Uuid, Company>,
    groups: HashMap<Uuid, Group>,
    certificates: HashMap<Uuid, Certificate>,
    invitations: HashMap<Uuid, Invitation>,
    alerts: Vec<ExpiryAlert>,
    audit: Vec<AuditEntry>,
    sessions: HashMap<Vec<u8>, Session>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrganizationStore for MemoryStore {
    async fn register_organization(&self, org: &Organization, admin: &User) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|u| u.email == admin.email) {
            return Err(Error::conflict("a user with this email already exists"));
        }
        if inner
            .organizations
            .values()
            .any(|o| o.legal_id == org.legal_id)
        {
            return Err(Error::conflict(
                "an organization with this legal id already exists",
            ));
        }
        inner.organizations.insert(org.id, org.clone());
        inner.users.insert(admin.id, admin.clone());
        Ok(())
    }

    async fn get_organization(&self, org_id: Uuid) -> Result<Option<Organization>> {
        let inner = self.inner.lock().await;
        Ok(inner.organizations.get(&org_id).cloned())
    }

    async fn create_company(&self, company: &Company) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.companies.insert(company.id, company.clone());
        Ok(())
    }

    async fn get_company(&self, org_id: Uuid, company_id: Uuid) -> Result<Option<Company>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .companies
            .get(&company_id)
            .filter(|c| c.org_id == org_id)
            .cloned())
    }

    async fn list_companies(&self, org_id: Uuid) -> Result<Vec<Company>> {
        let inner = self.inner.lock().await;
        let mut companies: Vec<Company> = inner
            .companies
            .values()
            .filter(|c| c.org_id == org_id)
            .cloned()
            .collect();
        companies.sort_by(|a, b| a.legal_name.cmp(&b.legal_name));
        Ok(companies)
    }

    async fn delete_company(&self, org_id: Uuid, company_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let exists = inner
            .companies
            .get(&company_id)
            .is_some_and(|c| c.org_id == org_id);
        if !exists {
            return Ok(false);
        }
        if inner
            .certificates
            .values()
            .any(|c| c.company_id == company_id)
        {
            return Err(Error::conflict("company still has certificates"));
        }
        inner.companies.remove(&company_id);
        Ok(true)
    }

    async fn create_group(&self, group: &Group) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_group(&self, org_id: Uuid, group_id: Uuid) -> Result<Option<Group>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .groups
            .get(&group_id)
            .filter(|g| g.org_id == org_id)
            .cloned())
    }

    async fn list_groups(&self, org_id: Uuid) -> Result<Vec<Group>> {
        let inner = self.inner.lock().await;
        let mut groups: Vec<Group> = inner
            .groups
            .values()
            .filter(|g| g.org_id == org_id)
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn delete_group(&self, org_id: Uuid, group_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let exists = inner
            .groups
            .get(&group_id)
            .is_some_and(|g| g.org_id == org_id);
        if !exists {
            return Ok(false);
        }
        if inner
            .companies
            .values()
            .any(|c| c.group_id == Some(group_id))
        {
            return Err(Error::conflict("group still has companies"));
        }
        inner.groups.remove(&group_id);
        Ok(true)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn get_user(&self, org_id: Uuid, user_id: Uuid) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .get(&user_id)
            .filter(|u| u.org_id == org_id)
            .cloned())
    }

    async fn list_users(&self, org_id: Uuid) -> Result<Vec<User>> {
        let inner = self.inner.lock().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.org_id == org_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn set_user_mfa(
        &self,
        user_id: Uuid,
        secret: Option<String>,
        enabled: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.mfa_secret = secret;
            user.mfa_enabled = enabled;
        }
        Ok(())
    }

    async fn set_user_active(&self, org_id: Uuid, user_id: Uuid, active: bool) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&user_id) {
            Some(user) if user.org_id == org_id => {
                user.active = active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_invitation(&self, invitation: &Invitation) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner
            .invitations
            .values()
            .any(|i| i.token_hash == invitation.token_hash)
        {
            return Err(Error::conflict("invitation token already exists"));
        }
        inner.invitations.insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn find_invitation_by_token_hash(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<Invitation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .invitations
            .values()
            .find(|i| i.token_hash == token_hash)
            .cloned())
    }

    async fn accept_invitation(
        &self,
        token_hash: &[u8],
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(Error::conflict("a user with this email already exists"));
        }
        let invitation_id = match inner
            .invitations
            .values()
            .find(|i| i.token_hash == token_hash && !i.used && !i.expired(now))
        {
            Some(invitation) => invitation.id,
            None => return Ok(false),
        };
        if let Some(invitation) = inner.invitations.get_mut(&invitation_id) {
            invitation.used = true;
        }
        inner.users.insert(user.id, user.clone());
        Ok(true)
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_session(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sessions
            .get(token_hash)
            .filter(|s| s.expires_at > now)
            .cloned())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(token_hash);
        Ok(())
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .certificates
            .insert(certificate.id, certificate.clone());
        Ok(())
    }

    async fn get_certificate(
        &self,
        org_id: Uuid,
        certificate_id: Uuid,
    ) -> Result<Option<Certificate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .certificates
            .get(&certificate_id)
            .filter(|c| c.org_id == org_id)
            .cloned())
    }

    async fn list_certificates(
        &self,
        org_id: Uuid,
        filter: &CertificateFilter,
    ) -> Result<Vec<Certificate>> {
        let inner = self.inner.lock().await;
        let mut certificates: Vec<Certificate> = inner
            .certificates
            .values()
            .filter(|c| c.org_id == org_id)
            .filter(|c| filter.company_id.is_none_or(|id| c.company_id == id))
            .filter(|c| filter.kind.is_none_or(|kind| c.kind == kind))
            .cloned()
            .collect();
        certificates.sort_by_key(|c| c.expires_on);
        Ok(certificates)
    }

    async fn delete_certificate(&self, org_id: Uuid, certificate_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let exists = inner
            .certificates
            .get(&certificate_id)
            .is_some_and(|c| c.org_id == org_id);
        if exists {
            inner.certificates.remove(&certificate_id);
            // Alerts are derived data and go with their certificate.
            inner.alerts.retain(|a| a.certificate_id != certificate_id);
        }
        Ok(exists)
    }

    async fn list_expiring_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Certificate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .certificates
            .values()
            .filter(|c| c.expires_on >= from && c.expires_on <= to)
            .cloned()
            .collect())
    }

    async fn insert_alert_if_absent(&self, alert: &ExpiryAlert) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let exists = inner.alerts.iter().any(|a| {
            a.certificate_id == alert.certificate_id && a.threshold_days == alert.threshold_days
        });
        if exists {
            return Ok(false);
        }
        inner.alerts.push(alert.clone());
        Ok(true)
    }

    async fn mark_alert_notified(&self, alert_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(alert) = inner.alerts.iter_mut().find(|a| a.id == alert_id) {
            alert.notified = true;
        }
        Ok(())
    }

    async fn list_alerts(&self, org_id: Uuid) -> Result<Vec<ExpiryAlert>> {
        let inner = self.inner.lock().await;
        let mut alerts: Vec<ExpiryAlert> = inner
            .alerts
            .iter()
            .filter(|a| a.org_id == org_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.audit.push(entry.clone());
        Ok(())
    }

    async fn list(&self, org_id: Uuid, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<AuditEntry> = inner
            .audit
            .iter()
            .filter(|e| e.org_id == org_id)
            .filter(|e| filter.user_id.is_none_or(|id| e.user_id == id))
            .filter(|e| {
                filter
                    .action
                    .as_deref()
                    .is_none_or(|action| e.action.contains(action))
            })
            .filter(|e| filter.from.is_none_or(|from| e.created_at >= from))
            .filter(|e| filter.to.is_none_or(|to| e.created_at < to))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = usize::try_from(filter.offset).unwrap_or(0);
        let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }
}
