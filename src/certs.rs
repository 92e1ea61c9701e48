//! Company registry and certificate tracking.
//!
//! Certificate passwords are encrypted before they reach a store and only
//! decrypted again through [`CertificateService::certificate_password`],
//! which leaves an audit entry every time it is used. Every lookup here is
//! scoped to the acting user's organization; ids from another tenant read
//! as absent.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::audit::{action, AuditTrail};
use crate::auth::utils::{normalize_email, valid_cnpj, valid_email};
use crate::crypto::CredentialCipher;
use crate::domain::{
    Certificate, CertificateKind, Clock, Company, ExpiryAlert, Group, Role, Severity, User,
};
use crate::store::{CertificateFilter, CertificateStore, OrganizationStore};
use crate::{Error, Result};

/// Upload payload. The password arrives in plaintext and leaves this module
/// only as ciphertext.
pub struct UploadCertificate {
    pub company_id: Uuid,
    pub kind: CertificateKind,
    pub name: String,
    pub issued_on: NaiveDate,
    pub expires_on: NaiveDate,
    pub file_ref: String,
    pub password: String,
}

pub struct NewCompany {
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub legal_id: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub group_id: Option<Uuid>,
}

/// Listing filter. Company and kind narrow the query; status is computed
/// from the expiry date at call time and filtered after the fetch.
#[derive(Debug, Default)]
pub struct CertificateQuery {
    pub company_id: Option<Uuid>,
    pub kind: Option<CertificateKind>,
    pub status: Option<Severity>,
}

/// Dashboard counts, one bucket per severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryCounts {
    pub total: usize,
    pub expired: usize,
    pub critical: usize,
    pub warning: usize,
    pub attention: usize,
    pub valid: usize,
}

#[derive(Clone)]
pub struct CertificateService {
    certificates: Arc<dyn CertificateStore>,
    orgs: Arc<dyn OrganizationStore>,
    cipher: CredentialCipher,
    audit: AuditTrail,
    clock: Arc<dyn Clock>,
}

impl CertificateService {
    pub fn new(
        certificates: Arc<dyn CertificateStore>,
        orgs: Arc<dyn OrganizationStore>,
        cipher: CredentialCipher,
        audit: AuditTrail,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            certificates,
            orgs,
            cipher,
            audit,
            clock,
        }
    }

    /// Today in UTC, per the injected clock.
    #[must_use]
    pub fn today(&self) -> chrono::NaiveDate {
        self.clock.now().date_naive()
    }

    /// Encrypts the password and stores the certificate under the actor's
    /// organization. The named company must belong to that organization.
    pub async fn upload_certificate(
        &self,
        actor: &User,
        req: UploadCertificate,
        ip: Option<String>,
    ) -> Result<Certificate> {
        let now = self.clock.now();
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("certificate name is required"));
        }
        if req.issued_on >= req.expires_on {
            return Err(Error::validation("issue date must precede the expiry date"));
        }
        if self
            .orgs
            .get_company(actor.org_id, req.company_id)
            .await?
            .is_none()
        {
            return Err(Error::NotFound);
        }
        let (password_ciphertext, password_iv) = self.cipher.encrypt(&req.password)?;
        let certificate = Certificate {
            id: Uuid::new_v4(),
            org_id: actor.org_id,
            company_id: req.company_id,
            kind: req.kind,
            name,
            issued_on: req.issued_on,
            expires_on: req.expires_on,
            file_ref: req.file_ref,
            password_ciphertext,
            password_iv,
            uploaded_by: actor.id,
            created_at: now,
        };
        self.certificates.insert_certificate(&certificate).await?;
        self.audit
            .record(
                actor.org_id,
                actor.id,
                action::CERTIFICATE_UPLOADED,
                Some(certificate.name.clone()),
                ip,
                now,
            )
            .await?;
        Ok(certificate)
    }

    pub async fn get_certificate(&self, actor: &User, certificate_id: Uuid) -> Result<Certificate> {
        self.certificates
            .get_certificate(actor.org_id, certificate_id)
            .await?
            .ok_or(Error::NotFound)
    }

    /// Certificates for the actor's organization, soonest expiry first.
    pub async fn list_certificates(
        &self,
        actor: &User,
        query: CertificateQuery,
    ) -> Result<Vec<Certificate>> {
        let today = self.clock.now().date_naive();
        let filter = CertificateFilter {
            company_id: query.company_id,
            kind: query.kind,
        };
        let mut certificates = self
            .certificates
            .list_certificates(actor.org_id, &filter)
            .await?;
        if let Some(status) = query.status {
            certificates.retain(|certificate| certificate.severity(today) == status);
        }
        Ok(certificates)
    }

    /// Removes a certificate and its derived alerts. Admin only.
    pub async fn delete_certificate(
        &self,
        actor: &User,
        certificate_id: Uuid,
        ip: Option<String>,
    ) -> Result<()> {
        let now = self.clock.now();
        if !actor.role.satisfies(Role::Admin) {
            return Err(Error::Forbidden);
        }
        let Some(certificate) = self
            .certificates
            .get_certificate(actor.org_id, certificate_id)
            .await?
        else {
            return Err(Error::NotFound);
        };
        if !self
            .certificates
            .delete_certificate(actor.org_id, certificate_id)
            .await?
        {
            return Err(Error::NotFound);
        }
        self.audit
            .record(
                actor.org_id,
                actor.id,
                action::CERTIFICATE_DELETED,
                Some(certificate.name.clone()),
                ip,
                now,
            )
            .await
    }

    /// Decrypts a certificate password for display. Every call is audited.
    pub async fn certificate_password(
        &self,
        actor: &User,
        certificate_id: Uuid,
        ip: Option<String>,
    ) -> Result<String> {
        let now = self.clock.now();
        let Some(certificate) = self
            .certificates
            .get_certificate(actor.org_id, certificate_id)
            .await?
        else {
            return Err(Error::NotFound);
        };
        let password = self
            .cipher
            .decrypt(&certificate.password_ciphertext, &certificate.password_iv)?;
        self.audit
            .record(
                actor.org_id,
                actor.id,
                action::PASSWORD_REVEALED,
                Some(certificate.name.clone()),
                ip,
                now,
            )
            .await?;
        Ok(password)
    }

    /// Severity buckets across the organization's whole portfolio.
    pub async fn certificate_summary(&self, actor: &User) -> Result<SummaryCounts> {
        let today = self.clock.now().date_naive();
        let certificates = self
            .certificates
            .list_certificates(actor.org_id, &CertificateFilter::default())
            .await?;
        let mut counts = SummaryCounts {
            total: certificates.len(),
            expired: 0,
            critical: 0,
            warning: 0,
            attention: 0,
            valid: 0,
        };
        for certificate in &certificates {
            match certificate.severity(today) {
                Severity::Expired => counts.expired += 1,
                Severity::Critical => counts.critical += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Attention => counts.attention += 1,
                Severity::Valid => counts.valid += 1,
            }
        }
        Ok(counts)
    }

    pub async fn list_alerts(&self, actor: &User) -> Result<Vec<ExpiryAlert>> {
        self.certificates.list_alerts(actor.org_id).await
    }

    pub async fn create_company(
        &self,
        actor: &User,
        req: NewCompany,
        ip: Option<String>,
    ) -> Result<Company> {
        let now = self.clock.now();
        let legal_name = req.legal_name.trim().to_string();
        if legal_name.is_empty() {
            return Err(Error::validation("company legal name is required"));
        }
        let legal_id = req.legal_id.trim().to_string();
        if !valid_cnpj(&legal_id) {
            return Err(Error::validation(
                "legal id must use the NN.NNN.NNN/NNNN-NN format",
            ));
        }
        let contact_email = match req.contact_email {
            Some(raw) => {
                let normalized = normalize_email(&raw);
                if !valid_email(&normalized) {
                    return Err(Error::validation("a valid contact email is required"));
                }
                Some(normalized)
            }
            None => None,
        };
        if let Some(group_id) = req.group_id {
            if self.orgs.get_group(actor.org_id, group_id).await?.is_none() {
                return Err(Error::NotFound);
            }
        }
        let company = Company {
            id: Uuid::new_v4(),
            org_id: actor.org_id,
            group_id: req.group_id,
            legal_name,
            trade_name: req.trade_name.map(|name| name.trim().to_string()),
            legal_id,
            contact_email,
            phone: req.phone,
            created_at: now,
        };
        self.orgs.create_company(&company).await?;
        self.audit
            .record(
                actor.org_id,
                actor.id,
                action::COMPANY_CREATED,
                Some(company.legal_name.clone()),
                ip,
                now,
            )
            .await?;
        Ok(company)
    }

    pub async fn get_company(&self, actor: &User, company_id: Uuid) -> Result<Company> {
        self.orgs
            .get_company(actor.org_id, company_id)
            .await?
            .ok_or(Error::NotFound)
    }

    pub async fn list_companies(&self, actor: &User) -> Result<Vec<Company>> {
        self.orgs.list_companies(actor.org_id).await
    }

    /// Admin only. Fails with a conflict while certificates still reference
    /// the company.
    pub async fn delete_company(
        &self,
        actor: &User,
        company_id: Uuid,
        ip: Option<String>,
    ) -> Result<()> {
        let now = self.clock.now();
        if !actor.role.satisfies(Role::Admin) {
            return Err(Error::Forbidden);
        }
        let Some(company) = self.orgs.get_company(actor.org_id, company_id).await? else {
            return Err(Error::NotFound);
        };
        if !self.orgs.delete_company(actor.org_id, company_id).await? {
            return Err(Error::NotFound);
        }
        self.audit
            .record(
                actor.org_id,
                actor.id,
                action::COMPANY_DELETED,
                Some(company.legal_name.clone()),
                ip,
                now,
            )
            .await
    }

    pub async fn create_group(
        &self,
        actor: &User,
        name: &str,
        ip: Option<String>,
    ) -> Result<Group> {
        let now = self.clock.now();
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("group name is required"));
        }
        let group = Group {
            id: Uuid::new_v4(),
            org_id: actor.org_id,
            name,
            created_at: now,
        };
        self.orgs.create_group(&group).await?;
        self.audit
            .record(
                actor.org_id,
                actor.id,
                action::GROUP_CREATED,
                Some(group.name.clone()),
                ip,
                now,
            )
            .await?;
        Ok(group)
    }

    pub async fn list_groups(&self, actor: &User) -> Result<Vec<Group>> {
        self.orgs.list_groups(actor.org_id).await
    }

    /// Admin only. Fails with a conflict while companies still sit in the
    /// group.
    pub async fn delete_group(&self, actor: &User, group_id: Uuid, ip: Option<String>) -> Result<()> {
        let now = self.clock.now();
        if !actor.role.satisfies(Role::Admin) {
            return Err(Error::Forbidden);
        }
        let Some(group) = self.orgs.get_group(actor.org_id, group_id).await? else {
            return Err(Error::NotFound);
        };
        if !self.orgs.delete_group(actor.org_id, group_id).await? {
            return Err(Error::NotFound);
        }
        self.audit
            .record(
                actor.org_id,
                actor.id,
                action::GROUP_DELETED,
                Some(group.name.clone()),
                ip,
                now,
            )
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::{Organization, PlanTier};
    use crate::store::{AuditFilter, AuditStore, MemoryStore, OrganizationStore};
    use chrono::{DateTime, TimeZone, Utc};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    // 2025-03-10, the reference day for all severity math below
    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
        ))
    }

    fn user(org_id: Uuid, role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            org_id,
            name: "Ana".to_string(),
            email: format!("{}@acme.com", Uuid::new_v4()),
            password_hash: "hash".to_string(),
            role,
            active: true,
            mfa_enabled: false,
            mfa_secret: None,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    async fn seed_org(store: &Arc<MemoryStore>, legal_id: &str) -> (Organization, User) {
        let org = Organization {
            id: Uuid::new_v4(),
            name: "Acme Contabilidade".to_string(),
            legal_id: legal_id.to_string(),
            contact_email: "contact@acme.com".to_string(),
            plan: PlanTier::Free,
            active: true,
            created_at: Utc::now(),
        };
        let admin = user(org.id, Role::Admin);
        store.register_organization(&org, &admin).await.unwrap();
        (org, admin)
    }

    async fn service_with_org() -> (CertificateService, Arc<MemoryStore>, Organization, User) {
        let store = Arc::new(MemoryStore::new());
        let (org, admin) = seed_org(&store, "12.345.678/0001-99").await;
        let service = CertificateService::new(
            store.clone(),
            store.clone(),
            CredentialCipher::new("test-master-secret"),
            AuditTrail::new(store.clone()),
            clock(),
        );
        (service, store, org, admin)
    }

    async fn seed_company(service: &CertificateService, actor: &User) -> Company {
        service
            .create_company(
                actor,
                NewCompany {
                    legal_name: "Acme Filial Ltda".to_string(),
                    trade_name: None,
                    legal_id: "98.765.432/0001-10".to_string(),
                    contact_email: None,
                    phone: None,
                    group_id: None,
                },
                None,
            )
            .await
            .unwrap()
    }

    fn upload(company_id: Uuid, name: &str, expires_on: NaiveDate) -> UploadCertificate {
        UploadCertificate {
            company_id,
            kind: CertificateKind::ECnpj,
            name: name.to_string(),
            issued_on: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            expires_on,
            file_ref: format!("uploads/{name}.pfx"),
            password: "cert-secret".to_string(),
        }
    }

    fn day(year: i32, month: u32, dayofm: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, dayofm).unwrap()
    }

    #[tokio::test]
    async fn upload_rejects_inverted_dates() {
        let (service, _, _, admin) = service_with_org().await;
        let company = seed_company(&service, &admin).await;

        let req = upload(company.id, "bad-dates", day(2024, 1, 1));
        let result = service.upload_certificate(&admin, req, None).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn password_reveal_round_trips_and_is_audited() {
        let (service, store, org, admin) = service_with_org().await;
        let company = seed_company(&service, &admin).await;
        let certificate = service
            .upload_certificate(&admin, upload(company.id, "matriz", day(2025, 12, 1)), None)
            .await
            .unwrap();
        assert_ne!(certificate.password_ciphertext, b"cert-secret".to_vec());

        let password = service
            .certificate_password(&admin, certificate.id, None)
            .await
            .unwrap();
        assert_eq!(password, "cert-secret");

        let filter = AuditFilter {
            action: Some(action::PASSWORD_REVEALED.to_string()),
            ..AuditFilter::default()
        };
        let entries = store.list(org.id, &filter).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn listing_filters_by_computed_status() {
        let (service, _, _, admin) = service_with_org().await;
        let company = seed_company(&service, &admin).await;
        for (name, expires_on) in [
            ("expired", day(2025, 3, 1)),
            ("critical", day(2025, 3, 13)),
            ("warning", day(2025, 3, 20)),
            ("attention", day(2025, 4, 5)),
            ("valid", day(2025, 6, 1)),
        ] {
            service
                .upload_certificate(&admin, upload(company.id, name, expires_on), None)
                .await
                .unwrap();
        }

        let critical = service
            .list_certificates(
                &admin,
                CertificateQuery {
                    status: Some(Severity::Critical),
                    ..CertificateQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical.first().unwrap().name, "critical");

        let all = service
            .list_certificates(&admin, CertificateQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
        // soonest expiry first
        assert_eq!(all.first().unwrap().name, "expired");
    }

    #[tokio::test]
    async fn summary_counts_every_bucket() {
        let (service, _, _, admin) = service_with_org().await;
        let company = seed_company(&service, &admin).await;
        for (name, expires_on) in [
            ("expired", day(2025, 3, 1)),
            ("critical", day(2025, 3, 13)),
            ("warning", day(2025, 3, 20)),
            ("attention", day(2025, 4, 5)),
            ("valid", day(2025, 6, 1)),
        ] {
            service
                .upload_certificate(&admin, upload(company.id, name, expires_on), None)
                .await
                .unwrap();
        }

        let summary = service.certificate_summary(&admin).await.unwrap();
        assert_eq!(
            summary,
            SummaryCounts {
                total: 5,
                expired: 1,
                critical: 1,
                warning: 1,
                attention: 1,
                valid: 1,
            }
        );
    }

    #[tokio::test]
    async fn cross_tenant_ids_read_as_absent() {
        let (service, store, _, admin) = service_with_org().await;
        let company = seed_company(&service, &admin).await;
        let certificate = service
            .upload_certificate(&admin, upload(company.id, "matriz", day(2025, 12, 1)), None)
            .await
            .unwrap();

        let (other_org, _) = seed_org(&store, "11.222.333/0001-44").await;
        let outsider = user(other_org.id, Role::MasterAdmin);

        let lookup = service.get_certificate(&outsider, certificate.id).await;
        assert!(matches!(lookup, Err(Error::NotFound)));
        let reveal = service
            .certificate_password(&outsider, certificate.id, None)
            .await;
        assert!(matches!(reveal, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn operator_cannot_delete_certificates() {
        let (service, _, org, admin) = service_with_org().await;
        let company = seed_company(&service, &admin).await;
        let certificate = service
            .upload_certificate(&admin, upload(company.id, "matriz", day(2025, 12, 1)), None)
            .await
            .unwrap();

        let operator = user(org.id, Role::Operator);
        let result = service
            .delete_certificate(&operator, certificate.id, None)
            .await;
        assert!(matches!(result, Err(Error::Forbidden)));
    }

    #[tokio::test]
    async fn company_delete_conflicts_while_certificates_exist() {
        let (service, _, _, admin) = service_with_org().await;
        let company = seed_company(&service, &admin).await;
        service
            .upload_certificate(&admin, upload(company.id, "matriz", day(2025, 12, 1)), None)
            .await
            .unwrap();

        let blocked = service.delete_company(&admin, company.id, None).await;
        assert!(matches!(blocked, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn company_with_unknown_group_is_rejected() {
        let (service, _, _, admin) = service_with_org().await;
        let result = service
            .create_company(
                &admin,
                NewCompany {
                    legal_name: "Acme Filial Ltda".to_string(),
                    trade_name: None,
                    legal_id: "98.765.432/0001-10".to_string(),
                    contact_email: None,
                    phone: None,
                    group_id: Some(Uuid::new_v4()),
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::NotFound)));
    }
}
