use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Config;
use crate::services::{AccountService, AuthService, DigestService, StatsService};
use crate::state::SharedState;

mod admin;
pub mod auth;
mod digests;
mod error;
mod observability;
mod types;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        self.shared.config()
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn account_service(&self) -> &Arc<dyn AccountService> {
        &self.shared.account_service
    }

    #[must_use]
    pub fn digest_service(&self) -> &Arc<dyn DigestService> {
        &self.shared.digest_service
    }

    #[must_use]
    pub fn stats_service(&self) -> &Arc<StatsService> {
        &self.shared.stats_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config)?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.config().server;
    let cors_origins = server.cors_allowed_origins.clone();
    let upload_limit = server.max_upload_mb.saturating_mul(1024 * 1024);

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_idle_minutes,
        )));

    let api_router = Router::new()
        .merge(create_protected_router(upload_limit))
        .merge(create_admin_router())
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .layer(session_layer)
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .route("/health", get(observability::health))
        .with_state(state)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
}

/// Routes for any logged-in user. Digest writes are checked by the service.
fn create_protected_router(upload_limit: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .route("/digests", get(digests::list_digests))
        .route(
            "/digests/{date}",
            get(digests::open_digest)
                .put(digests::upload_digest)
                .delete(digests::delete_digest)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/digests/{date}/rename", post(digests::rename_digest))
        .route_layer(middleware::from_fn(auth::auth_middleware))
}

fn create_admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/{username}", axum::routing::delete(admin::delete_user))
        .route("/admin/users/{username}/password", put(admin::reset_password))
        .route("/admin/users/{username}/email", put(admin::set_email))
        .route("/admin/bootstrap", post(admin::bootstrap))
        .route("/admin/activity", get(admin::recent_activity))
        .route("/admin/stats", get(admin::stats))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(auth::admin_middleware))
        .route_layer(middleware::from_fn(auth::auth_middleware))
}
