//! Company registry endpoints.

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
use crate::certs::NewCompany;
use crate::domain::Company;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CompanyRequest {
    pub legal_name: String,
    pub trade_name: Option<String>,
    /// CNPJ in the 00.000.000/0000-00 form.
    pub legal_id: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub group_id: Option<Uuid>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CompanyResponse {
    pub id: Uuid,
    pub group_id: Option<Uuid>,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub legal_id: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Company> for CompanyResponse {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            group_id: company.group_id,
            legal_name: company.legal_name.clone(),
            trade_name: company.trade_name.clone(),
            legal_id: company.legal_id.clone(),
            contact_email: company.contact_email.clone(),
            phone: company.phone.clone(),
            created_at: company.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/companies",
    request_body = CompanyRequest,
    responses(
        (status = 201, description = "Company registered", body = CompanyResponse),
        (status = 400, description = "Malformed CNPJ or email"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Group does not exist in the organization"),
        (status = 409, description = "CNPJ already registered")
    ),
    tag = "companies"
)]
pub async fn create_company(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<CompanyRequest>>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let ip = extract_client_ip(&headers);
    let request = NewCompany {
        legal_name: payload.legal_name,
        trade_name: payload.trade_name,
        legal_id: payload.legal_id,
        contact_email: payload.contact_email,
        phone: payload.phone,
        group_id: payload.group_id,
    };
    match state.certs.create_company(&actor, request, ip).await {
        Ok(company) => {
            (StatusCode::CREATED, Json(CompanyResponse::from(&company))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/companies",
    responses(
        (status = 200, description = "Companies in the caller's organization", body = [CompanyResponse]),
        (status = 401, description = "Not authenticated")
    ),
    tag = "companies"
)]
pub async fn list_companies(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    match state.certs.list_companies(&actor).await {
        Ok(companies) => Json(
            companies
                .iter()
                .map(CompanyResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/companies/{id}",
    params(("id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company detail", body = CompanyResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such company in the organization")
    ),
    tag = "companies"
)]
pub async fn get_company(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    match state.certs.get_company(&actor, id).await {
        Ok(company) => Json(CompanyResponse::from(&company)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/companies/{id}",
    params(("id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 204, description = "Company removed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such company in the organization"),
        (status = 409, description = "Certificates still reference the company")
    ),
    tag = "companies"
)]
pub async fn delete_company(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_auth(&headers, &state).await {
        Ok(actor) => actor,
        Err(status) => return status.into_response(),
    };
    let ip = extract_client_ip(&headers);
    match state.certs.delete_company(&actor, id, ip).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
