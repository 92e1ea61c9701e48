//! Account lifecycle and session state machine.
//!
//! A login attempt resolves to one of four outcomes: bad credentials, a
//! disabled account, a live session, or a staged MFA challenge that must be
//! completed with [`AuthService::complete_mfa`] before any session exists.
//! Raw session and invitation tokens are handed out exactly once; only their
//! hashes are persisted.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::audit::{action, AuditTrail};
use crate::domain::{Clock, Invitation, Organization, PlanTier, Role, Session, User};
use crate::mfa::MfaEngine;
use crate::store::{OrganizationStore, UserStore};
use crate::{Error, Result};

use super::pending::PendingMfa;
use super::utils;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 43_200;
const DEFAULT_CHALLENGE_TTL_SECONDS: i64 = 300;
const INVITE_TTL_DAYS: i64 = 7;

/// Registration payload for a new tenant and its first admin.
pub struct RegisterTenant {
    pub org_name: String,
    pub legal_id: String,
    pub contact_email: String,
    pub plan: Option<PlanTier>,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

/// A freshly issued session. The token is not recoverable later.
pub struct IssuedSession {
    pub token: String,
    pub user: User,
}

/// What a password check resolved to.
pub enum LoginOutcome {
    Authenticated(IssuedSession),
    MfaPending { challenge: Uuid },
}

/// Staged MFA enrollment material. Nothing is persisted until the caller
/// confirms with a code generated from this secret.
pub struct MfaEnrollment {
    pub secret: String,
    pub otpauth_url: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    orgs: Arc<dyn OrganizationStore>,
    mfa: MfaEngine,
    audit: AuditTrail,
    clock: Arc<dyn Clock>,
    pending: Arc<PendingMfa>,
    session_ttl: Duration,
    invite_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        orgs: Arc<dyn OrganizationStore>,
        mfa: MfaEngine,
        audit: AuditTrail,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            orgs,
            mfa,
            audit,
            clock,
            pending: Arc::new(PendingMfa::new(Duration::seconds(
                DEFAULT_CHALLENGE_TTL_SECONDS,
            ))),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECONDS),
            invite_ttl: Duration::days(INVITE_TTL_DAYS),
        }
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Replaces the challenge table; call before any logins are staged.
    #[must_use]
    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.pending = Arc::new(PendingMfa::new(ttl));
        self
    }

    /// Creates an organization and its first admin in one atomic write.
    pub async fn register_tenant(
        &self,
        req: RegisterTenant,
        ip: Option<String>,
    ) -> Result<(Organization, User)> {
        let now = self.clock.now();
        let org_name = req.org_name.trim().to_string();
        if org_name.is_empty() {
            return Err(Error::validation("organization name is required"));
        }
        let legal_id = req.legal_id.trim().to_string();
        if !utils::valid_cnpj(&legal_id) {
            return Err(Error::validation(
                "legal id must use the NN.NNN.NNN/NNNN-NN format",
            ));
        }
        let contact_email = utils::normalize_email(&req.contact_email);
        if !utils::valid_email(&contact_email) {
            return Err(Error::validation("a valid contact email is required"));
        }
        let admin_name = req.admin_name.trim().to_string();
        if admin_name.is_empty() {
            return Err(Error::validation("admin name is required"));
        }
        let admin_email = utils::normalize_email(&req.admin_email);
        if !utils::valid_email(&admin_email) {
            return Err(Error::validation("a valid admin email is required"));
        }
        if req.admin_password.len() < utils::MIN_PASSWORD_LEN {
            return Err(Error::validation("password must be at least 8 characters"));
        }

        let org = Organization {
            id: Uuid::new_v4(),
            name: org_name,
            legal_id,
            contact_email,
            plan: req.plan.unwrap_or_default(),
            active: true,
            created_at: now,
        };
        let admin = User {
            id: Uuid::new_v4(),
            org_id: org.id,
            name: admin_name,
            email: admin_email,
            password_hash: utils::hash_password(&req.admin_password)?,
            role: Role::Admin,
            active: true,
            mfa_enabled: false,
            mfa_secret: None,
            last_login_at: None,
            created_at: now,
        };
        self.orgs.register_organization(&org, &admin).await?;
        self.audit
            .record(
                org.id,
                admin.id,
                action::ORGANIZATION_REGISTERED,
                Some(org.name.clone()),
                ip,
                now,
            )
            .await?;
        Ok((org, admin))
    }

    /// Checks a password and either issues a session or stages an MFA
    /// challenge. Unknown emails and wrong passwords are indistinguishable.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
    ) -> Result<LoginOutcome> {
        let now = self.clock.now();
        let email = utils::normalize_email(email);
        let Some(user) = self.users.find_user_by_email(&email).await? else {
            return Err(Error::InvalidCredentials);
        };
        if !utils::verify_password(password, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }
        if !user.active {
            return Err(Error::AccountDisabled);
        }
        let org_active = self
            .orgs
            .get_organization(user.org_id)
            .await?
            .is_some_and(|org| org.active);
        if !org_active {
            return Err(Error::AccountDisabled);
        }
        if user.mfa_enabled && user.mfa_secret.is_some() {
            let challenge = self.pending.issue(user.id, now).await;
            return Ok(LoginOutcome::MfaPending { challenge });
        }
        let token = self.issue_session(&user, now).await?;
        self.users.record_login(user.id, now).await?;
        self.audit
            .record(user.org_id, user.id, action::LOGIN, None, ip, now)
            .await?;
        Ok(LoginOutcome::Authenticated(IssuedSession { token, user }))
    }

    /// Verifies a staged challenge. A wrong code leaves the challenge
    /// claimable for a retry; a stale or unknown reference reads the same as
    /// a wrong code.
    pub async fn complete_mfa(
        &self,
        challenge: Uuid,
        code: &str,
        ip: Option<String>,
    ) -> Result<IssuedSession> {
        let now = self.clock.now();
        let Some(user_id) = self.pending.peek(challenge, now).await else {
            return Err(Error::InvalidMfaCode);
        };
        let Some(user) = self.users.get_user_by_id(user_id).await? else {
            return Err(Error::InvalidMfaCode);
        };
        if !user.active {
            return Err(Error::AccountDisabled);
        }
        let Some(secret) = user.mfa_secret.as_deref() else {
            return Err(Error::InvalidMfaCode);
        };
        if !self.mfa.verify(secret, code, now) {
            return Err(Error::InvalidMfaCode);
        }
        self.pending.consume(challenge).await;
        let token = self.issue_session(&user, now).await?;
        self.users.record_login(user.id, now).await?;
        self.audit
            .record(user.org_id, user.id, action::LOGIN_MFA, None, ip, now)
            .await?;
        Ok(IssuedSession { token, user })
    }

    /// Drops the session behind a bearer token. Only reachable with a live
    /// session, so the actor is already resolved.
    pub async fn logout(&self, actor: &User, token: &str, ip: Option<String>) -> Result<()> {
        let now = self.clock.now();
        self.users
            .delete_session(&utils::hash_session_token(token))
            .await?;
        self.audit
            .record(actor.org_id, actor.id, action::LOGOUT, None, ip, now)
            .await
    }

    /// Resolves a bearer token to its user. Expired sessions and deactivated
    /// users read as absent.
    pub async fn resolve(&self, token: &str) -> Result<Option<User>> {
        let now = self.clock.now();
        let Some(session) = self
            .users
            .find_session(&utils::hash_session_token(token), now)
            .await?
        else {
            return Ok(None);
        };
        let Some(user) = self.users.get_user_by_id(session.user_id).await? else {
            return Ok(None);
        };
        if !user.active {
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Issues an invitation token for a new user. Admins cannot hand out a
    /// role above their own.
    pub async fn create_invitation(
        &self,
        actor: &User,
        email: &str,
        role: Role,
        ip: Option<String>,
    ) -> Result<(Invitation, String)> {
        let now = self.clock.now();
        if !actor.role.satisfies(Role::Admin) || !actor.role.satisfies(role) {
            return Err(Error::Forbidden);
        }
        let email = utils::normalize_email(email);
        if !utils::valid_email(&email) {
            return Err(Error::validation("a valid email is required"));
        }
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(Error::conflict("a user with this email already exists"));
        }
        let token = utils::generate_invite_token()?;
        let invitation = Invitation {
            id: Uuid::new_v4(),
            org_id: actor.org_id,
            email: email.clone(),
            role,
            token_hash: utils::hash_invite_token(&token),
            created_by: actor.id,
            expires_at: now + self.invite_ttl,
            used: false,
            created_at: now,
        };
        self.users.create_invitation(&invitation).await?;
        self.audit
            .record(actor.org_id, actor.id, action::INVITE_SENT, Some(email), ip, now)
            .await?;
        Ok((invitation, token))
    }

    /// Claims an invitation and creates the invited user atomically. A used
    /// or expired invitation fails the same way whether noticed up front or
    /// lost in a race with another acceptance.
    pub async fn accept_invite(&self, token: &str, name: &str, password: &str) -> Result<User> {
        let now = self.clock.now();
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("name is required"));
        }
        if password.len() < utils::MIN_PASSWORD_LEN {
            return Err(Error::validation("password must be at least 8 characters"));
        }
        let token_hash = utils::hash_invite_token(token);
        let Some(invitation) = self.users.find_invitation_by_token_hash(&token_hash).await? else {
            return Err(Error::InviteNotFound);
        };
        if invitation.used || invitation.expired(now) {
            return Err(Error::InviteExpired);
        }
        let user = User {
            id: Uuid::new_v4(),
            org_id: invitation.org_id,
            name,
            email: invitation.email.clone(),
            password_hash: utils::hash_password(password)?,
            role: invitation.role,
            active: true,
            mfa_enabled: false,
            mfa_secret: None,
            last_login_at: None,
            created_at: now,
        };
        if !self.users.accept_invitation(&token_hash, &user, now).await? {
            return Err(Error::InviteExpired);
        }
        self.audit
            .record(
                user.org_id,
                user.id,
                action::INVITE_ACCEPTED,
                Some(user.email.clone()),
                None,
                now,
            )
            .await?;
        Ok(user)
    }

    /// Generates enrollment material without touching the stored user.
    pub fn begin_mfa_enrollment(&self, actor: &User) -> Result<MfaEnrollment> {
        if actor.mfa_enabled {
            return Err(Error::conflict("mfa is already enabled"));
        }
        let secret = self.mfa.generate_secret();
        let otpauth_url = self.mfa.provisioning_uri(&actor.email, &secret)?;
        Ok(MfaEnrollment {
            secret,
            otpauth_url,
        })
    }

    /// Commits a staged enrollment once the caller proves they hold the
    /// secret by producing a current code.
    pub async fn confirm_mfa_enrollment(
        &self,
        actor: &User,
        secret: &str,
        code: &str,
        ip: Option<String>,
    ) -> Result<()> {
        let now = self.clock.now();
        if actor.mfa_enabled {
            return Err(Error::conflict("mfa is already enabled"));
        }
        if !self.mfa.verify(secret, code, now) {
            return Err(Error::InvalidMfaCode);
        }
        self.users
            .set_user_mfa(actor.id, Some(secret.to_string()), true)
            .await?;
        self.audit
            .record(actor.org_id, actor.id, action::MFA_ENABLED, None, ip, now)
            .await
    }

    pub async fn disable_mfa(&self, actor: &User, ip: Option<String>) -> Result<()> {
        let now = self.clock.now();
        if !actor.mfa_enabled {
            return Err(Error::conflict("mfa is not enabled"));
        }
        self.users.set_user_mfa(actor.id, None, false).await?;
        self.audit
            .record(actor.org_id, actor.id, action::MFA_DISABLED, None, ip, now)
            .await
    }

    /// Activates or deactivates a user in the actor's organization.
    pub async fn set_user_active(
        &self,
        actor: &User,
        user_id: Uuid,
        active: bool,
        ip: Option<String>,
    ) -> Result<User> {
        let now = self.clock.now();
        if !actor.role.satisfies(Role::Admin) {
            return Err(Error::Forbidden);
        }
        if actor.id == user_id && !active {
            return Err(Error::validation("you cannot deactivate your own account"));
        }
        let Some(target) = self.users.get_user(actor.org_id, user_id).await? else {
            return Err(Error::NotFound);
        };
        if !actor.role.satisfies(target.role) {
            return Err(Error::Forbidden);
        }
        if !self.users.set_user_active(actor.org_id, user_id, active).await? {
            return Err(Error::NotFound);
        }
        let action = if active {
            action::USER_ACTIVATED
        } else {
            action::USER_DEACTIVATED
        };
        self.audit
            .record(
                actor.org_id,
                actor.id,
                action,
                Some(target.email.clone()),
                ip,
                now,
            )
            .await?;
        Ok(User { active, ..target })
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>> {
        if !actor.role.satisfies(Role::Admin) {
            return Err(Error::Forbidden);
        }
        self.users.list_users(actor.org_id).await
    }

    async fn issue_session(&self, user: &User, now: DateTime<Utc>) -> Result<String> {
        let token = utils::generate_session_token()?;
        let session = Session {
            token_hash: utils::hash_session_token(&token),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.users.insert_session(&session).await?;
        Ok(token)
    }
}
