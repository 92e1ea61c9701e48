//! HTTP surface: route wiring, middleware, and server startup.

use anyhow::{Context, Result};
use axum::{
    Extension,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

use crate::audit::AuditTrail;
use crate::auth::AuthService;
use crate::certs::CertificateService;
use crate::crypto::CredentialCipher;
use crate::domain::{Clock, SystemClock};
use crate::mfa::MfaEngine;
use crate::notify::LogNotifier;
use crate::scanner::{ExpiryScanner, spawn_scan_worker};
use crate::store::{
    AuditStore, CertificateStore, MemoryStore, OrganizationStore, PgStore, UserStore,
};

pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::AppState;
pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything the server needs, resolved by the CLI before startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres DSN; `None` runs on the in-memory store.
    pub dsn: Option<String>,
    pub master_secret: SecretString,
    pub mfa_issuer: String,
    pub session_ttl_seconds: i64,
    pub challenge_ttl_seconds: i64,
    pub scan_interval_seconds: u64,
    pub alert_recipients: Vec<String>,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn serve(config: ServerConfig) -> Result<()> {
    let (state, scanner) = match config.dsn.clone() {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;

            sqlx::migrate!()
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            build_state(Arc::new(PgStore::new(pool.clone())), Some(pool), &config)
        }
        None => {
            info!("No database configured; using the in-memory store");
            build_state(Arc::new(MemoryStore::new()), None, &config)
        }
    };

    spawn_scan_worker(scanner, Duration::from_secs(config.scan_interval_seconds));

    let (router, _openapi) = router().split_for_parts();
    let app = router.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state)),
    );

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wire every service onto one store. The same `Arc` backs all four store
/// traits so memory and Postgres deployments share this path.
fn build_state<S>(
    store: Arc<S>,
    pool: Option<PgPool>,
    config: &ServerConfig,
) -> (Arc<AppState>, ExpiryScanner)
where
    S: OrganizationStore + UserStore + CertificateStore + AuditStore + 'static,
{
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let audit = AuditTrail::new(store.clone());
    let cipher = CredentialCipher::new(config.master_secret.expose_secret());
    let mfa = MfaEngine::new(config.mfa_issuer.clone());

    let auth = AuthService::new(
        store.clone(),
        store.clone(),
        mfa,
        audit.clone(),
        clock.clone(),
    )
    .with_session_ttl(chrono::Duration::seconds(config.session_ttl_seconds))
    .with_challenge_ttl(chrono::Duration::seconds(config.challenge_ttl_seconds));

    let certs = CertificateService::new(
        store.clone(),
        store.clone(),
        cipher,
        audit.clone(),
        clock.clone(),
    );

    let scanner = ExpiryScanner::new(store.clone(), store, Arc::new(LogNotifier), clock)
        .with_recipients(config.alert_recipients.clone());

    let state = Arc::new(AppState {
        auth,
        certs,
        audit,
        pool,
    });
    (state, scanner)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Gracefully shutting down");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
