//! HTTP surface of the raffle.

mod handlers;
mod middleware;
mod pages;
mod types;

pub use handlers::*;
pub use middleware::{
    client_ip, forwarded_for, logging_middleware, rate_limit_middleware, ClientIp,
    RateLimitState,
};
pub use pages::{Flash, FLASH_COOKIE};
pub use types::*;

use crate::admin::AdminAuth;
use crate::registration::Registrar;
use axum::{
    http::{header, HeaderValue},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use participant_store::ParticipantStore;
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Participant file
    pub store: Arc<ParticipantStore>,
    /// Registration workflow
    pub registrar: Registrar,
    /// Admin password and session signing
    pub admin: Arc<AdminAuth>,
    /// Whether `X-Forwarded-For` names the client
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(
        store: Arc<ParticipantStore>,
        registrar: Registrar,
        admin: AdminAuth,
        trust_forwarded_for: bool,
    ) -> Self {
        Self {
            store,
            registrar,
            admin: Arc::new(admin),
            trust_forwarded_for,
        }
    }
}

/// Create the router with the default rate limit.
pub fn create_router(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::new(120))
}

/// Create the router with a custom per-client rate limit on the public endpoints.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    let rate_limit = rate_limit.trusting_forwarded_for(state.trust_forwarded_for);
    let public = Router::new()
        .route("/check-coordinates", get(handlers::check_coordinates))
        .route("/check-location", get(handlers::check_location))
        .route("/check-phone", get(handlers::check_phone))
        .route("/register", post(handlers::register))
        .route_layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    Router::new()
        .route("/", get(handlers::index))
        .route("/success", get(handlers::success))
        .route("/health", get(handlers::health))
        .route("/admin", get(handlers::admin_page).post(handlers::admin_login))
        .route("/admin/logout", post(handlers::admin_logout))
        .route("/delete-participants", post(handlers::delete_participants))
        .route("/delete-participant/:index", post(handlers::delete_participant))
        .route("/export-to-excel", get(handlers::export_to_excel))
        .merge(public)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
