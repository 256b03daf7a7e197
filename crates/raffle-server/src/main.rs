//! Raffle server - Entry point.

use geo_client::LocationResolver;
use participant_store::ParticipantStore;
use raffle_server::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    config::Config,
    AdminAuth, AllowList, Registrar,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ttl_cache::SystemClock;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting raffle server");

    let clock = Arc::new(SystemClock);

    let store = match ParticipantStore::open(
        config.store.path.clone(),
        config.store.cache_ttl,
        clock.clone(),
    )
    .await
    {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(path = %config.store.path.display(), "Failed to open participant store: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        path = %store.path().display(),
        participants = store.count().await,
        "Participant store ready"
    );

    let resolver = match LocationResolver::new(&config.geo.resolver_config(), clock) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create location resolver: {}", e);
            std::process::exit(1);
        }
    };

    if config.location.allow_all {
        warn!("Location gating disabled, accepting registrations from anywhere");
    }
    if config.server.trust_forwarded_for {
        warn!(
            "Trusting X-Forwarded-For for client addresses, only safe behind a reverse proxy \
             (set SERVER__TRUST_FORWARDED_FOR=false when exposed directly)"
        );
    }
    if config.session.secret_key.is_none() {
        warn!("No session secret configured, admin sessions end on restart");
    }

    let registrar = Registrar::new(
        store.clone(),
        Arc::new(resolver),
        Arc::new(AllowList::standard(config.location.allow_all)),
    );
    let admin = AdminAuth::new(config.admin.password.clone(), config.session.secret_key.clone());
    let state = AppState::new(store, registrar, admin, config.server.trust_forwarded_for);

    let rate_limit = RateLimitState::new(config.rate_limit.per_minute);
    let app = create_router_with_rate_limit(state, rate_limit);

    // Bind to address
    let addr = SocketAddr::new(
        config.server.listen_addr.parse().unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Run server
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
