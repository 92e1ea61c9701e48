//! Audit trail listing, admin and above.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{require_auth, AppState};
use crate::domain::AuditEntry;
use crate::store::AuditFilter;

#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct AuditListQuery {
    /// Restrict to one user's actions.
    pub user_id: Option<Uuid>,
    /// Substring match on the action name, e.g. `certificate`.
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Page size, 50 when omitted.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuditEntryResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub detail: Option<String>,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&AuditEntry> for AuditEntryResponse {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            action: entry.action.clone(),
            detail: entry.detail.clone(),
            ip: entry.ip.clone(),
            created_at: entry.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/audit",
    params(AuditListQuery),
    responses(
        (status = 200, description = "Audit entries, newest first", body = [AuditEntryResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    ),
    tag = "audit"
)]
pub async fn list_audit_entries(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AuditListQuery>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let defaults = AuditFilter::default();
    let filter = AuditFilter {
        user_id: query.user_id,
        action: query.action,
        from: query.from,
        to: query.to,
        limit: query.limit.unwrap_or(defaults.limit),
        offset: query.offset.unwrap_or(defaults.offset),
    };
    match state.audit.list(&actor, filter).await {
        Ok(entries) => Json(
            entries
                .iter()
                .map(AuditEntryResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => err.into_response(),
    }
}
