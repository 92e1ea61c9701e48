//! Registration, login, MFA completion, sessions, and invite acceptance.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{extract_bearer_token, require_auth, AppState, UserResponse};
use crate::auth::utils::extract_client_ip;
use crate::auth::{LoginOutcome, RegisterTenant};
use crate::domain::{Organization, PlanTier};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub org_name: String,
    pub legal_id: String,
    pub contact_email: String,
    pub plan: Option<PlanTier>,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub legal_id: String,
    pub contact_email: String,
    pub plan: PlanTier,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Organization> for OrganizationResponse {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id,
            name: org.name.clone(),
            legal_id: org.legal_id.clone(),
            contact_email: org.contact_email.clone(),
            plan: org.plan,
            active: org.active,
            created_at: org.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub organization: OrganizationResponse,
    pub user: UserResponse,
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Organization and first admin created", body = RegisterResponse),
        (status = 400, description = "Malformed input"),
        (status = 409, description = "Email or legal id already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    let request = RegisterTenant {
        org_name: payload.org_name,
        legal_id: payload.legal_id,
        contact_email: payload.contact_email,
        plan: payload.plan,
        admin_name: payload.admin_name,
        admin_email: payload.admin_email,
        admin_password: payload.admin_password,
    };
    match state.auth.register_tenant(request, ip).await {
        Ok((organization, user)) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                organization: OrganizationResponse::from(&organization),
                user: UserResponse::from(&user),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponse {
    /// Session issued directly; the account has no MFA.
    Authenticated { token: String, user: UserResponse },
    /// Password accepted; a TOTP code must complete the challenge.
    MfaRequired { challenge: Uuid },
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued or MFA challenge staged", body = LoginResponse),
        (status = 401, description = "Unknown email or wrong password"),
        (status = 403, description = "Account or organization disabled")
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    match state.auth.login(&payload.email, &payload.password, ip).await {
        Ok(LoginOutcome::Authenticated(session)) => Json(LoginResponse::Authenticated {
            token: session.token,
            user: UserResponse::from(&session.user),
        })
        .into_response(),
        Ok(LoginOutcome::MfaPending { challenge }) => {
            Json(LoginResponse::MfaRequired { challenge }).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaCompleteRequest {
    pub challenge: Uuid,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionTokenResponse {
    pub token: String,
    pub user: UserResponse,
}

#[utoipa::path(
    post,
    path = "/v1/auth/mfa",
    request_body = MfaCompleteRequest,
    responses(
        (status = 200, description = "Challenge completed, session issued", body = SessionTokenResponse),
        (status = 401, description = "Wrong code or unknown challenge")
    ),
    tag = "auth"
)]
pub async fn complete_mfa(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<MfaCompleteRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    match state
        .auth
        .complete_mfa(payload.challenge, &payload.code, ip)
        .await
    {
        Ok(session) => Json(SessionTokenResponse {
            token: session.token,
            user: UserResponse::from(&session.user),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = UserResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    // A missing or dead token reads as "no session" rather than an error.
    let Some(token) = extract_bearer_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match state.auth.resolve(&token).await {
        Ok(Some(user)) => Json(UserResponse::from(&user)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared"),
        (status = 401, description = "No live session to clear")
    ),
    tag = "auth"
)]
pub async fn logout(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    // require_auth succeeded, so the token is present
    let Some(token) = extract_bearer_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let ip = extract_client_ip(&headers);
    match state.auth.logout(&actor, &token, ip).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AcceptInviteRequest {
    pub token: String,
    pub name: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/v1/auth/invitations/accept",
    request_body = AcceptInviteRequest,
    responses(
        (status = 201, description = "Invitation claimed, user created", body = UserResponse),
        (status = 404, description = "Unknown invitation token"),
        (status = 410, description = "Invitation expired or already used")
    ),
    tag = "auth"
)]
pub async fn accept_invite(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<AcceptInviteRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    match state
        .auth
        .accept_invite(&payload.token, &payload.name, &payload.password)
        .await
    {
        Ok(user) => (StatusCode::CREATED, Json(UserResponse::from(&user))).into_response(),
        Err(err) => err.into_response(),
    }
}
