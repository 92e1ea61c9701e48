//! Shared fixtures for the in-process integration suite.
//!
//! Every scenario runs the real services against the in-memory store with a
//! hand-cranked clock, so no database, SMTP relay, or wall-clock waiting is
//! involved. TOTP codes are generated from the enrolled secret the same way a
//! phone authenticator would.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use guardiao::audit::AuditTrail;
use guardiao::auth::{AuthService, IssuedSession, LoginOutcome, RegisterTenant};
use guardiao::certs::{CertificateService, NewCompany, UploadCertificate};
use guardiao::crypto::CredentialCipher;
use guardiao::domain::{
    Certificate, CertificateKind, Clock, Company, Organization, User,
};
use guardiao::mfa::MfaEngine;
use guardiao::notify::{AlertMessage, Notifier};
use guardiao::scanner::ExpiryScanner;
use guardiao::store::MemoryStore;

/// Password used by every fixture account.
pub const PASSWORD: &str = "Passw0rd!";

pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    fn starting_at(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(start)))
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.0.lock() {
            *now += by;
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        Clock::now(self)
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

/// Captures every dispatched alert; flips to errors when `fail` is set.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<AlertMessage>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, _: &[String], _: &str, message: &AlertMessage) -> Result<()> {
        if self.fail {
            bail!("smtp unreachable");
        }
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier mutex poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

/// The full service stack over one shared in-memory store.
pub struct Harness {
    pub auth: AuthService,
    pub certs: CertificateService,
    pub audit: AuditTrail,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<TestClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn scanner(&self) -> ExpiryScanner {
        self.scanner_with(self.notifier.clone())
    }

    pub fn scanner_with(&self, notifier: Arc<RecordingNotifier>) -> ExpiryScanner {
        ExpiryScanner::new(
            self.store.clone(),
            self.store.clone(),
            notifier,
            self.clock.clone(),
        )
        .with_recipients(vec!["alerts@guardiao.dev".to_string()])
    }
}

/// Builds the stack with the clock parked on 2025-03-10 12:00 UTC.
pub fn harness() -> Result<Harness> {
    let store = Arc::new(MemoryStore::new());
    let start = Utc
        .with_ymd_and_hms(2025, 3, 10, 12, 0, 0)
        .single()
        .context("fixture start time is ambiguous")?;
    let clock = TestClock::starting_at(start);
    let notifier = Arc::new(RecordingNotifier::default());
    let audit = AuditTrail::new(store.clone());
    let auth = AuthService::new(
        store.clone(),
        store.clone(),
        MfaEngine::new("Guardiao"),
        audit.clone(),
        clock.clone(),
    );
    let certs = CertificateService::new(
        store.clone(),
        store.clone(),
        CredentialCipher::new("integration-master-secret"),
        audit.clone(),
        clock.clone(),
    );
    Ok(Harness {
        auth,
        certs,
        audit,
        store,
        clock,
        notifier,
    })
}

pub fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid calendar date")
}

pub async fn register_org(
    auth: &AuthService,
    org_name: &str,
    legal_id: &str,
    admin_email: &str,
) -> Result<(Organization, User)> {
    let registered = auth
        .register_tenant(
            RegisterTenant {
                org_name: org_name.to_string(),
                legal_id: legal_id.to_string(),
                contact_email: format!("contact@{}", domain_of(admin_email)),
                plan: None,
                admin_name: "Ana".to_string(),
                admin_email: admin_email.to_string(),
                admin_password: PASSWORD.to_string(),
            },
            None,
        )
        .await?;
    Ok(registered)
}

pub async fn register_acme(auth: &AuthService) -> Result<(Organization, User)> {
    register_org(auth, "Acme Contabilidade", "12.345.678/0001-99", "a@acme.com").await
}

fn domain_of(email: &str) -> &str {
    email.rsplit('@').next().unwrap_or("example.com")
}

/// Logs in and insists on a direct session, failing the test on a staged
/// MFA challenge.
pub async fn login(auth: &AuthService, email: &str, password: &str) -> Result<IssuedSession> {
    match auth.login(email, password, None).await? {
        LoginOutcome::Authenticated(session) => Ok(session),
        LoginOutcome::MfaPending { .. } => bail!("expected a direct session for {email}"),
    }
}

pub async fn seed_company(
    harness: &Harness,
    actor: &User,
    legal_name: &str,
    legal_id: &str,
) -> Result<Company> {
    let company = harness
        .certs
        .create_company(
            actor,
            NewCompany {
                legal_name: legal_name.to_string(),
                trade_name: None,
                legal_id: legal_id.to_string(),
                contact_email: None,
                phone: None,
                group_id: None,
            },
            None,
        )
        .await?;
    Ok(company)
}

pub async fn upload_certificate(
    harness: &Harness,
    actor: &User,
    company_id: Uuid,
    name: &str,
    expires_on: NaiveDate,
    password: &str,
) -> Result<Certificate> {
    let certificate = harness
        .certs
        .upload_certificate(
            actor,
            UploadCertificate {
                company_id,
                kind: CertificateKind::ECnpj,
                name: name.to_string(),
                issued_on: expires_on - chrono::Duration::days(365),
                expires_on,
                file_ref: format!("uploads/{name}.pfx"),
                password: password.to_string(),
            },
            None,
        )
        .await?;
    Ok(certificate)
}

/// The code a phone authenticator would show for `secret` at `at`.
pub fn code_at(secret: &str, at: DateTime<Utc>) -> Result<String> {
    let secret_bytes = Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|err| anyhow::anyhow!("invalid TOTP secret: {err:?}"))?;
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret_bytes,
        Some("Guardiao".to_string()),
        "test".to_string(),
    )
    .map_err(|err| anyhow::anyhow!("invalid TOTP parameters: {err:?}"))?;
    Ok(totp.generate(u64::try_from(at.timestamp())?))
}

/// A six-digit string that is not valid in any accepted step around `at`.
pub fn wrong_code(secret: &str, at: DateTime<Utc>) -> Result<String> {
    let mut taken = Vec::new();
    for offset in [-30i64, 0, 30] {
        taken.push(code_at(secret, at + chrono::Duration::seconds(offset))?);
    }
    ["000000", "111111", "222222", "333333"]
        .iter()
        .find(|candidate| !taken.contains(&(*candidate).to_string()))
        .map(|candidate| (*candidate).to_string())
        .context("every candidate collided with a live code")
}

/// Enrolls TOTP for `user` and returns the confirmed secret.
pub async fn enroll_mfa(harness: &Harness, user: &User) -> Result<String> {
    let enrollment = harness.auth.begin_mfa_enrollment(user)?;
    let code = code_at(&enrollment.secret, harness.clock.now())?;
    harness
        .auth
        .confirm_mfa_enrollment(user, &enrollment.secret, &code, None)
        .await?;
    Ok(enrollment.secret)
}
