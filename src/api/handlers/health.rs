use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::Connection;
use tracing::{debug, error, info_span, Instrument};
use utoipa::ToSchema;

use super::AppState;
use crate::GIT_COMMIT_HASH;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    store: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and its store are healthy", body = Health),
        (status = 503, description = "Store is unreachable", body = Health)
    ),
    tag = "health"
)]
pub async fn health(state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let store = match &state.pool {
        Some(pool) => {
            let acquire_span = info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            );
            match pool.acquire().instrument(acquire_span).await {
                Ok(mut conn) => {
                    let ping_span =
                        info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
                    match conn.ping().instrument(ping_span).await {
                        Ok(()) => Ok("ok"),
                        Err(error) => {
                            error!("Failed to ping database: {}", error);
                            Err("error")
                        }
                    }
                }
                Err(error) => {
                    error!("Failed to acquire database connection: {}", error);
                    Err("error")
                }
            }
        }
        None => Ok("memory"),
    };

    let healthy = store.is_ok();
    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.unwrap_or_else(|status| status).to_string(),
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };
    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>() {
        Ok(value) => {
            debug!("X-App header: {:?}", value);
            headers.insert("X-App", value);
        }
        Err(err) => {
            error!("Failed to parse X-App header: {}", err);
        }
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, headers, Json(health))
}
