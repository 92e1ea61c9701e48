//! HTTP handlers and shared request plumbing.

pub(crate) mod audit;
pub(crate) mod auth;
pub(crate) mod certificates;
pub(crate) mod companies;
pub(crate) mod groups;
pub(crate) mod health;
pub(crate) mod users;

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::auth::AuthService;
use crate::certs::CertificateService;
use crate::domain::{Role, User};

/// Shared service handles, injected per request via `Extension<Arc<AppState>>`.
pub struct AppState {
    pub auth: AuthService,
    pub certs: CertificateService,
    pub audit: AuditTrail,
    /// Present only when running against PostgreSQL; health checks ping it.
    pub pool: Option<PgPool>,
}

/// Resolve the bearer token into its user, or fail with the status the
/// handler should return as-is.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<User, StatusCode> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    match state.auth.resolve(&token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub mfa_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            active: user.active,
            mfa_enabled: user.mfa_enabled,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}
