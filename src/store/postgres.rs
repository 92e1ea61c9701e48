//! Postgres store.
//!
//! Plain `sqlx::query` over a shared pool, each statement wrapped in a
//! `db.query` span. The atomic primitives (registration, invite consumption)
//! run inside transactions; alert insertion relies on the
//! (certificate_id, threshold_days) uniqueness constraint with
//! `ON CONFLICT DO NOTHING` so concurrent scanners cannot double-insert.
//!
//! Expected layout: `organizations`, `users`, `companies`, `groups`,
//! `certificates`, `invitations`, `expiry_alerts`, `audit_entries` and
//! `sessions` tables with foreign keys along the ownership edges.
//! `certificates -> companies` and `companies -> groups` restrict deletes;
//! `expiry_alerts -> certificates` cascades.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{
    AuditFilter, AuditStore, CertificateFilter, CertificateStore, OrganizationStore, UserStore,
};
use crate::domain::{
    AuditEntry, Certificate, CertificateKind, Company, ExpiryAlert, Group, Invitation,
    Organization, PlanTier, Role, Session, User,
};
use crate::{Error, Result};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23503"),
        _ => false,
    }
}

fn map_organization(row: &PgRow) -> anyhow::Result<Organization> {
    let plan_str: String = row.try_get("plan")?;
    let plan = PlanTier::parse(&plan_str).ok_or_else(|| anyhow!("unknown plan: {plan_str}"))?;
    Ok(Organization {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        legal_id: row.try_get("legal_id")?,
        contact_email: row.try_get("contact_email")?,
        plan,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_user(row: &PgRow) -> anyhow::Result<User> {
    let role_str: String = row.try_get("role")?;
    let role = Role::parse(&role_str).ok_or_else(|| anyhow!("unknown role: {role_str}"))?;
    Ok(User {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
        active: row.try_get("active")?,
        mfa_enabled: row.try_get("mfa_enabled")?,
        mfa_secret: row.try_get("mfa_secret")?,
        last_login_at: row.try_get("last_login_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_company(row: &PgRow) -> anyhow::Result<Company> {
    Ok(Company {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        group_id: row.try_get("group_id")?,
        legal_name: row.try_get("legal_name")?,
        trade_name: row.try_get("trade_name")?,
        legal_id: row.try_get("legal_id")?,
        contact_email: row.try_get("contact_email")?,
        phone: row.try_get("phone")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_group(row: &PgRow) -> anyhow::Result<Group> {
    Ok(Group {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_certificate(row: &PgRow) -> anyhow::Result<Certificate> {
    let kind_str: String = row.try_get("kind")?;
    let kind =
        CertificateKind::parse(&kind_str).ok_or_else(|| anyhow!("unknown kind: {kind_str}"))?;
    Ok(Certificate {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        company_id: row.try_get("company_id")?,
        kind,
        name: row.try_get("name")?,
        issued_on: row.try_get("issued_on")?,
        expires_on: row.try_get("expires_on")?,
        file_ref: row.try_get("file_ref")?,
        password_ciphertext: row.try_get("password_ciphertext")?,
        password_iv: row.try_get("password_iv")?,
        uploaded_by: row.try_get("uploaded_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_invitation(row: &PgRow) -> anyhow::Result<Invitation> {
    let role_str: String = row.try_get("role")?;
    let role = Role::parse(&role_str).ok_or_else(|| anyhow!("unknown role: {role_str}"))?;
    Ok(Invitation {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        email: row.try_get("email")?,
        role,
        token_hash: row.try_get("token_hash")?,
        created_by: row.try_get("created_by")?,
        expires_at: row.try_get("expires_at")?,
        used: row.try_get("used")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_alert(row: &PgRow) -> anyhow::Result<ExpiryAlert> {
    Ok(ExpiryAlert {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        certificate_id: row.try_get("certificate_id")?,
        threshold_days: row.try_get("threshold_days")?,
        notified: row.try_get("notified")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_audit_entry(row: &PgRow) -> anyhow::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        user_id: row.try_get("user_id")?,
        action: row.try_get("action")?,
        detail: row.try_get("detail")?,
        ip: row.try_get("ip")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_session(row: &PgRow) -> anyhow::Result<Session> {
    Ok(Session {
        token_hash: row.try_get("token_hash")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[async_trait]
impl OrganizationStore for PgStore {
    async fn register_organization(&self, org: &Organization, admin: &User) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start registration transaction")?;

        let query = r"
            INSERT INTO organizations (id, name, legal_id, contact_email, plan, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let inserted = sqlx::query(query)
            .bind(org.id)
            .bind(&org.name)
            .bind(&org.legal_id)
            .bind(&org.contact_email)
            .bind(org.plan.as_str())
            .bind(org.active)
            .bind(org.created_at)
            .execute(&mut *tx)
            .instrument(span)
            .await;
        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(Error::conflict(
                    "an organization with this legal id already exists",
                ));
            }
            return Err(anyhow::Error::new(err)
                .context("failed to insert organization")
                .into());
        }

        insert_user(&mut tx, admin).await?;

        tx.commit()
            .await
            .context("failed to commit registration transaction")?;
        Ok(())
    }

    async fn get_organization(&self, org_id: Uuid) -> Result<Option<Organization>> {
        let query = r"
            SELECT id, name, legal_id, contact_email, plan, active, created_at
            FROM organizations
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(org_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load organization")?;
        row.as_ref().map(map_organization).transpose().map_err(Into::into)
    }

    async fn create_company(&self, company: &Company) -> Result<()> {
        let query = r"
            INSERT INTO companies
                (id, org_id, group_id, legal_name, trade_name, legal_id, contact_email, phone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(company.id)
            .bind(company.org_id)
            .bind(company.group_id)
            .bind(&company.legal_name)
            .bind(&company.trade_name)
            .bind(&company.legal_id)
            .bind(&company.contact_email)
            .bind(&company.phone)
            .bind(company.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert company")?;
        Ok(())
    }

    async fn get_company(&self, org_id: Uuid, company_id: Uuid) -> Result<Option<Company>> {
        let query = r"
            SELECT id, org_id, group_id, legal_name, trade_name, legal_id, contact_email, phone, created_at
            FROM companies
            WHERE id = $1 AND org_id = $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(company_id)
            .bind(org_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load company")?;
        row.as_ref().map(map_company).transpose().map_err(Into::into)
    }

    async fn list_companies(&self, org_id: Uuid) -> Result<Vec<Company>> {
        let query = r"
            SELECT id, org_id, group_id, legal_name, trade_name, legal_id, contact_email, phone, created_at
            FROM companies
            WHERE org_id = $1
            ORDER BY legal_name ASC
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(org_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list companies")?;
        rows.iter().map(map_company).collect::<anyhow::Result<_>>().map_err(Into::into)
    }

    async fn delete_company(&self, org_id: Uuid, company_id: Uuid) -> Result<bool> {
        // The certificates FK restricts deletes; the violation is the
        // race-free child check.
        let query = r"DELETE FROM companies WHERE id = $1 AND org_id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(company_id)
            .bind(org_id)
            .execute(&self.pool)
            .instrument(span)
            .await;
        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(Error::conflict("company still has certificates"))
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to delete company")
                .into()),
        }
    }

    async fn create_group(&self, group: &Group) -> Result<()> {
        let query = r"
            INSERT INTO groups (id, org_id, name, created_at)
            VALUES ($1, $2, $3, $4)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(group.id)
            .bind(group.org_id)
            .bind(&group.name)
            .bind(group.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert group")?;
        Ok(())
    }

    async fn get_group(&self, org_id: Uuid, group_id: Uuid) -> Result<Option<Group>> {
        let query = r"
            SELECT id, org_id, name, created_at
            FROM groups
            WHERE id = $1 AND org_id = $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(group_id)
            .bind(org_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load group")?;
        row.as_ref().map(map_group).transpose().map_err(Into::into)
    }

    async fn list_groups(&self, org_id: Uuid) -> Result<Vec<Group>> {
        let query = r"
            SELECT id, org_id, name, created_at
            FROM groups
            WHERE org_id = $1
            ORDER BY name ASC
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(org_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list groups")?;
        rows.iter().map(map_group).collect::<anyhow::Result<_>>().map_err(Into::into)
    }

    async fn delete_group(&self, org_id: Uuid, group_id: Uuid) -> Result<bool> {
        let query = r"DELETE FROM groups WHERE id = $1 AND org_id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(group_id)
            .bind(org_id)
            .execute(&self.pool)
            .instrument(span)
            .await;
        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(Error::conflict("group still has companies"))
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to delete group")
                .into()),
        }
    }
}

async fn insert_user(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, user: &User) -> Result<()> {
    let query = r"
        INSERT INTO users
            (id, org_id, name, email, password_hash, role, active, mfa_enabled, mfa_secret,
             last_login_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(user.id)
        .bind(user.org_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.mfa_enabled)
        .bind(&user.mfa_secret)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .execute(&mut **tx)
        .instrument(span)
        .await;
    match inserted {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => {
            Err(Error::conflict("a user with this email already exists"))
        }
        Err(err) => Err(anyhow::Error::new(err)
            .context("failed to insert user")
            .into()),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = r"
            SELECT id, org_id, name, email, password_hash, role, active, mfa_enabled, mfa_secret,
                   last_login_at, created_at
            FROM users
            WHERE email = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load user by email")?;
        row.as_ref().map(map_user).transpose().map_err(Into::into)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let query = r"
            SELECT id, org_id, name, email, password_hash, role, active, mfa_enabled, mfa_secret,
                   last_login_at, created_at
            FROM users
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load user")?;
        row.as_ref().map(map_user).transpose().map_err(Into::into)
    }

    async fn get_user(&self, org_id: Uuid, user_id: Uuid) -> Result<Option<User>> {
        let query = r"
            SELECT id, org_id, name, email, password_hash, role, active, mfa_enabled, mfa_secret,
                   last_login_at, created_at
            FROM users
            WHERE id = $1 AND org_id = $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(org_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load user")?;
        row.as_ref().map(map_user).transpose().map_err(Into::into)
    }

    async fn list_users(&self, org_id: Uuid) -> Result<Vec<User>> {
        let query = r"
            SELECT id, org_id, name, email, password_hash, role, active, mfa_enabled, mfa_secret,
                   last_login_at, created_at
            FROM users
            WHERE org_id = $1
            ORDER BY email ASC
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(org_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list users")?;
        rows.iter().map(map_user).collect::<anyhow::Result<_>>().map_err(Into::into)
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let query = r"UPDATE users SET last_login_at = $2 WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record login")?;
        Ok(())
    }

    async fn set_user_mfa(
        &self,
        user_id: Uuid,
        secret: Option<String>,
        enabled: bool,
    ) -> Result<()> {
        let query = r"UPDATE users SET mfa_secret = $2, mfa_enabled = $3 WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(secret)
            .bind(enabled)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update user mfa")?;
        Ok(())
    }

    async fn set_user_active(&self, org_id: Uuid, user_id: Uuid, active: bool) -> Result<bool> {
        let query = r"UPDATE users SET active = $3 WHERE id = $1 AND org_id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(org_id)
            .bind(active)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update user status")?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_invitation(&self, invitation: &Invitation) -> Result<()> {
        let query = r"
            INSERT INTO invitations
                (id, org_id, email, role, token_hash, created_by, expires_at, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let inserted = sqlx::query(query)
            .bind(invitation.id)
            .bind(invitation.org_id)
            .bind(&invitation.email)
            .bind(invitation.role.as_str())
            .bind(&invitation.token_hash)
            .bind(invitation.created_by)
            .bind(invitation.expires_at)
            .bind(invitation.used)
            .bind(invitation.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await;
        match inserted {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::conflict("invitation token already exists"))
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to insert invitation")
                .into()),
        }
    }

    async fn find_invitation_by_token_hash(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<Invitation>> {
        let query = r"
            SELECT id, org_id, email, role, token_hash, created_by, expires_at, used, created_at
            FROM invitations
            WHERE token_hash = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load invitation")?;
        row.as_ref().map(map_invitation).transpose().map_err(Into::into)
    }

    async fn accept_invitation(
        &self,
        token_hash: &[u8],
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start invite transaction")?;

        // Claim the invitation first; zero rows means it was consumed or
        // expired under us and nothing else may happen.
        let query = r"
            UPDATE invitations
            SET used = TRUE
            WHERE token_hash = $1 AND used = FALSE AND expires_at > $2
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let claimed = sqlx::query(query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to claim invitation")?;
        if claimed.is_none() {
            return Ok(false);
        }

        insert_user(&mut tx, user).await?;

        tx.commit()
            .await
            .context("failed to commit invite transaction")?;
        Ok(true)
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let query = r"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&session.token_hash)
            .bind(session.user_id)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn find_session(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        let query = r"
            SELECT token_hash, user_id, created_at, expires_at
            FROM sessions
            WHERE token_hash = $1 AND expires_at > $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load session")?;
        row.as_ref().map(map_session).transpose().map_err(Into::into)
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        let query = r"DELETE FROM sessions WHERE token_hash = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}

#[async_trait]
impl CertificateStore for PgStore {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<()> {
        let query = r"
            INSERT INTO certificates
                (id, org_id, company_id, kind, name, issued_on, expires_on, file_ref,
                 password_ciphertext, password_iv, uploaded_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(certificate.id)
            .bind(certificate.org_id)
            .bind(certificate.company_id)
            .bind(certificate.kind.as_str())
            .bind(&certificate.name)
            .bind(certificate.issued_on)
            .bind(certificate.expires_on)
            .bind(&certificate.file_ref)
            .bind(&certificate.password_ciphertext)
            .bind(&certificate.password_iv)
            .bind(certificate.uploaded_by)
            .bind(certificate.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert certificate")?;
        Ok(())
    }

    async fn get_certificate(
        &self,
        org_id: Uuid,
        certificate_id: Uuid,
    ) -> Result<Option<Certificate>> {
        let query = r"
            SELECT id, org_id, company_id, kind, name, issued_on, expires_on, file_ref,
                   password_ciphertext, password_iv, uploaded_by, created_at
            FROM certificates
            WHERE id = $1 AND org_id = $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(certificate_id)
            .bind(org_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load certificate")?;
        row.as_ref().map(map_certificate).transpose().map_err(Into::into)
    }

    async fn list_certificates(
        &self,
        org_id: Uuid,
        filter: &CertificateFilter,
    ) -> Result<Vec<Certificate>> {
        let query = r"
            SELECT id, org_id, company_id, kind, name, issued_on, expires_on, file_ref,
                   password_ciphertext, password_iv, uploaded_by, created_at
            FROM certificates
            WHERE org_id = $1
              AND ($2::uuid IS NULL OR company_id = $2)
              AND ($3::text IS NULL OR kind = $3)
            ORDER BY expires_on ASC
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(org_id)
            .bind(filter.company_id)
            .bind(filter.kind.map(CertificateKind::as_str))
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list certificates")?;
        rows.iter().map(map_certificate).collect::<anyhow::Result<_>>().map_err(Into::into)
    }

    async fn delete_certificate(&self, org_id: Uuid, certificate_id: Uuid) -> Result<bool> {
        let query = r"DELETE FROM certificates WHERE id = $1 AND org_id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(certificate_id)
            .bind(org_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete certificate")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_expiring_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Certificate>> {
        let query = r"
            SELECT id, org_id, company_id, kind, name, issued_on, expires_on, file_ref,
                   password_ciphertext, password_iv, uploaded_by, created_at
            FROM certificates
            WHERE expires_on BETWEEN $1 AND $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list expiring certificates")?;
        rows.iter().map(map_certificate).collect::<anyhow::Result<_>>().map_err(Into::into)
    }

    async fn insert_alert_if_absent(&self, alert: &ExpiryAlert) -> Result<bool> {
        let query = r"
            INSERT INTO expiry_alerts
                (id, org_id, certificate_id, threshold_days, notified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (certificate_id, threshold_days) DO NOTHING
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(alert.id)
            .bind(alert.org_id)
            .bind(alert.certificate_id)
            .bind(alert.threshold_days)
            .bind(alert.notified)
            .bind(alert.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert expiry alert")?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_alert_notified(&self, alert_id: Uuid) -> Result<()> {
        let query = r"UPDATE expiry_alerts SET notified = TRUE WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(alert_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark alert notified")?;
        Ok(())
    }

    async fn list_alerts(&self, org_id: Uuid) -> Result<Vec<ExpiryAlert>> {
        let query = r"
            SELECT id, org_id, certificate_id, threshold_days, notified, created_at
            FROM expiry_alerts
            WHERE org_id = $1
            ORDER BY created_at DESC
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(org_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list alerts")?;
        rows.iter().map(map_alert).collect::<anyhow::Result<_>>().map_err(Into::into)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let query = r"
            INSERT INTO audit_entries (id, org_id, user_id, action, detail, ip, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(entry.id)
            .bind(entry.org_id)
            .bind(entry.user_id)
            .bind(&entry.action)
            .bind(&entry.detail)
            .bind(&entry.ip)
            .bind(entry.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to append audit entry")?;
        Ok(())
    }

    async fn list(&self, org_id: Uuid, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let query = r"
            SELECT id, org_id, user_id, action, detail, ip, created_at
            FROM audit_entries
            WHERE org_id = $1
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::text IS NULL OR action ILIKE '%' || $3 || '%')
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at < $5)
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(org_id)
            .bind(filter.user_id)
            .bind(filter.action.as_deref())
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list audit entries")?;
        rows.iter().map(map_audit_entry).collect::<anyhow::Result<_>>().map_err(Into::into)
    }
}
