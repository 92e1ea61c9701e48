//! Certificate endpoints, the dashboard summary, and expiry alerts.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{require_auth, AppState};
use crate::auth::utils::extract_client_ip;
use crate::certs::{CertificateQuery, SummaryCounts, UploadCertificate};
use crate::domain::{Certificate, CertificateKind, ExpiryAlert, Severity};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UploadCertificateRequest {
    pub company_id: Uuid,
    pub kind: CertificateKind,
    pub name: String,
    pub issued_on: NaiveDate,
    pub expires_on: NaiveDate,
    /// Where the PFX/P12 file lives, an object-storage key or path.
    pub file_ref: String,
    /// Certificate password, encrypted at rest and never echoed back.
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CertificateResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub kind: CertificateKind,
    pub name: String,
    pub issued_on: NaiveDate,
    pub expires_on: NaiveDate,
    pub file_ref: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub days_until_expiry: i64,
    pub severity: Severity,
}

impl CertificateResponse {
    fn of(certificate: &Certificate, today: NaiveDate) -> Self {
        Self {
            id: certificate.id,
            company_id: certificate.company_id,
            kind: certificate.kind,
            name: certificate.name.clone(),
            issued_on: certificate.issued_on,
            expires_on: certificate.expires_on,
            file_ref: certificate.file_ref.clone(),
            uploaded_by: certificate.uploaded_by,
            created_at: certificate.created_at,
            days_until_expiry: certificate.days_until_expiry(today),
            severity: certificate.severity(today),
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/certificates",
    request_body = UploadCertificateRequest,
    responses(
        (status = 201, description = "Certificate stored with the password encrypted", body = CertificateResponse),
        (status = 400, description = "Missing name or inverted dates"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Company does not exist in the organization")
    ),
    tag = "certificates"
)]
pub async fn upload_certificate(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<UploadCertificateRequest>>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    let request = UploadCertificate {
        company_id: payload.company_id,
        kind: payload.kind,
        name: payload.name,
        issued_on: payload.issued_on,
        expires_on: payload.expires_on,
        file_ref: payload.file_ref,
        password: payload.password,
    };
    match state.certs.upload_certificate(&actor, request, ip).await {
        Ok(certificate) => (
            StatusCode::CREATED,
            Json(CertificateResponse::of(&certificate, state.certs.today())),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct CertificateListQuery {
    /// Restrict to one company.
    pub company_id: Option<Uuid>,
    pub kind: Option<CertificateKind>,
    /// Keep only certificates currently in this severity bucket.
    pub status: Option<Severity>,
}

#[utoipa::path(
    get,
    path = "/v1/certificates",
    params(CertificateListQuery),
    responses(
        (status = 200, description = "Certificates, soonest expiry first", body = [CertificateResponse]),
        (status = 401, description = "Not authenticated")
    ),
    tag = "certificates"
)]
pub async fn list_certificates(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CertificateListQuery>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let filter = CertificateQuery {
        company_id: query.company_id,
        kind: query.kind,
        status: query.status,
    };
    let today = state.certs.today();
    match state.certs.list_certificates(&actor, filter).await {
        Ok(certificates) => Json(
            certificates
                .iter()
                .map(|certificate| CertificateResponse::of(certificate, today))
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SummaryResponse {
    pub total: usize,
    pub expired: usize,
    pub critical: usize,
    pub warning: usize,
    pub attention: usize,
    pub valid: usize,
}

impl From<SummaryCounts> for SummaryResponse {
    fn from(counts: SummaryCounts) -> Self {
        Self {
            total: counts.total,
            expired: counts.expired,
            critical: counts.critical,
            warning: counts.warning,
            attention: counts.attention,
            valid: counts.valid,
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/certificates/summary",
    responses(
        (status = 200, description = "Counts per severity bucket", body = SummaryResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "certificates"
)]
pub async fn certificate_summary(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    match state.certs.certificate_summary(&actor).await {
        Ok(counts) => Json(SummaryResponse::from(counts)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/certificates/{id}",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Certificate detail", body = CertificateResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such certificate in the organization")
    ),
    tag = "certificates"
)]
pub async fn get_certificate(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    match state.certs.get_certificate(&actor, id).await {
        Ok(certificate) => {
            Json(CertificateResponse::of(&certificate, state.certs.today())).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/certificates/{id}",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 204, description = "Certificate removed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such certificate in the organization")
    ),
    tag = "certificates"
)]
pub async fn delete_certificate(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let ip = extract_client_ip(&headers);
    match state.certs.delete_certificate(&actor, id, ip).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordResponse {
    pub password: String,
}

#[utoipa::path(
    get,
    path = "/v1/certificates/{id}/password",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Decrypted password; the reveal is audited", body = PasswordResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such certificate in the organization"),
        (status = 500, description = "Stored envelope failed to decrypt")
    ),
    tag = "certificates"
)]
pub async fn certificate_password(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let ip = extract_client_ip(&headers);
    match state.certs.certificate_password(&actor, id, ip).await {
        Ok(password) => Json(PasswordResponse { password }).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AlertResponse {
    pub id: Uuid,
    pub certificate_id: Uuid,
    pub threshold_days: i32,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&ExpiryAlert> for AlertResponse {
    fn from(alert: &ExpiryAlert) -> Self {
        Self {
            id: alert.id,
            certificate_id: alert.certificate_id,
            threshold_days: alert.threshold_days,
            notified: alert.notified,
            created_at: alert.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/alerts",
    responses(
        (status = 200, description = "Alerts raised for the caller's organization", body = [AlertResponse]),
        (status = 401, description = "Not authenticated")
    ),
    tag = "certificates"
)]
pub async fn list_alerts(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    match state.certs.list_alerts(&actor).await {
        Ok(alerts) => {
            Json(alerts.iter().map(AlertResponse::from).collect::<Vec<_>>()).into_response()
        }
        Err(err) => err.into_response(),
    }
}
