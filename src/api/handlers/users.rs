//! User administration, invitations, and MFA enrollment.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{require_auth, AppState, UserResponse};
use crate::auth::utils::extract_client_ip;
use crate::domain::Role;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct InviteRequest {
    pub email: String,
    pub role: Role,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    /// Single-use token, returned only at creation time.
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/v1/invitations",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Invitation issued", body = InvitationResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Actor cannot invite at that role"),
        (status = 409, description = "Email already belongs to a user")
    ),
    tag = "users"
)]
pub async fn create_invitation(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<InviteRequest>>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    match state
        .auth
        .create_invitation(&actor, &payload.email, payload.role, ip)
        .await
    {
        Ok((invitation, token)) => (
            StatusCode::CREATED,
            Json(InvitationResponse {
                id: invitation.id,
                email: invitation.email,
                role: invitation.role,
                expires_at: invitation.expires_at,
                token,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "Users in the caller's organization", body = [UserResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    ),
    tag = "users"
)]
pub async fn list_users(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    match state.auth.list_users(&actor).await {
        Ok(users) => Json(users.iter().map(UserResponse::from).collect::<Vec<_>>()).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/active",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Activation flag updated", body = UserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Actor outranked by the target"),
        (status = 404, description = "No such user in the organization")
    ),
    tag = "users"
)]
pub async fn set_user_active(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Option<Json<SetActiveRequest>>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    match state
        .auth
        .set_user_active(&actor, id, payload.active, ip)
        .await
    {
        Ok(user) => Json(UserResponse::from(&user)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaEnrollResponse {
    /// Base32 secret to load into an authenticator app.
    pub secret: String,
    pub otpauth_url: String,
}

#[utoipa::path(
    post,
    path = "/v1/mfa/enroll",
    responses(
        (status = 200, description = "Staged secret; confirm with a code to enable", body = MfaEnrollResponse),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "MFA already enabled")
    ),
    tag = "users"
)]
pub async fn begin_mfa_enrollment(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    match state.auth.begin_mfa_enrollment(&actor) {
        Ok(enrollment) => Json(MfaEnrollResponse {
            secret: enrollment.secret,
            otpauth_url: enrollment.otpauth_url,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaConfirmRequest {
    pub secret: String,
    pub code: String,
}

#[utoipa::path(
    post,
    path = "/v1/mfa/confirm",
    request_body = MfaConfirmRequest,
    responses(
        (status = 204, description = "MFA enabled"),
        (status = 401, description = "Code does not match the staged secret"),
        (status = 409, description = "MFA already enabled")
    ),
    tag = "users"
)]
pub async fn confirm_mfa_enrollment(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<MfaConfirmRequest>>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    match state
        .auth
        .confirm_mfa_enrollment(&actor, &payload.secret, &payload.code, ip)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/mfa",
    responses(
        (status = 204, description = "MFA disabled"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "MFA is not enabled")
    ),
    tag = "users"
)]
pub async fn disable_mfa(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let ip = extract_client_ip(&headers);
    match state.auth.disable_mfa(&actor, ip).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
