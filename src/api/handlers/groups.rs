//! Company group endpoints.

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

use super::{require_auth, AppState};
use crate::auth::utils::extract_client_ip;
use crate::domain::Group;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GroupRequest {
    pub name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GroupResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Group> for GroupResponse {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            created_at: group.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/groups",
    request_body = GroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Empty name"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Name already taken")
    ),
    tag = "groups"
)]
pub async fn create_group(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<GroupRequest>>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    match state.certs.create_group(&actor, &payload.name, ip).await {
        Ok(group) => (StatusCode::CREATED, Json(GroupResponse::from(&group))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/groups",
    responses(
        (status = 200, description = "Groups in the caller's organization", body = [GroupResponse]),
        (status = 401, description = "Not authenticated")
    ),
    tag = "groups"
)]
pub async fn list_groups(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    match state.certs.list_groups(&actor).await {
        Ok(groups) => Json(groups.iter().map(GroupResponse::from).collect::<Vec<_>>())
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/groups/{id}",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 204, description = "Group removed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such group in the organization"),
        (status = 409, description = "Companies still sit in the group")
    ),
    tag = "groups"
)]
pub async fn delete_group(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let ip = extract_client_ip(&headers);
    match state.certs.delete_group(&actor, id, ip).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
