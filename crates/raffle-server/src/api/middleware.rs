//! Rate limiting, request logging and client address extraction.

use super::AppState;
use crate::error::AppError;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{
    convert::Infallible,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};
use tracing::{debug, warn};

/// Per-client rate limiter, keyed by IP address.
pub type ClientLimiter = DefaultKeyedRateLimiter<IpAddr>;

/// Tracked clients above which idle buckets are dropped.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Rate limiter state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    pub per_client: Arc<ClientLimiter>,
    /// Whether `X-Forwarded-For` names the client
    pub trust_forwarded_for: bool,
}

impl RateLimitState {
    /// A zero quota falls back to 120 requests per minute.
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute)
            .or(NonZeroU32::new(120))
            .unwrap_or(NonZeroU32::MIN);

        Self {
            per_client: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            trust_forwarded_for: true,
        }
    }

    /// Create a permissive rate limiter for testing.
    pub fn permissive() -> Self {
        Self::new(10_000)
    }

    /// Resolve clients the same way the handlers do.
    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Take one request from the client's bucket.
    pub fn check(&self, client: Option<IpAddr>) -> bool {
        if self.per_client.len() > MAX_TRACKED_CLIENTS {
            self.per_client.retain_recent();
        }
        // Clients without a known address share one bucket.
        let key = client.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        self.per_client.check_key(&key).is_ok()
    }
}

/// Returns 429 once the calling client's quota is exhausted.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_ip(
        request.headers(),
        request.extensions(),
        rate_limit.trust_forwarded_for,
    );

    if !rate_limit.check(client) {
        warn!(uri = %request.uri(), client = ?client, "Client rate limit exceeded");
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

/// Logging middleware for requests.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        warn!(%method, %uri, %status, ?duration, "Request failed");
    } else {
        debug!(%method, %uri, %status, ?duration, "Request completed");
    }

    response
}

/// Last hop of `X-Forwarded-For`, the address seen by the trusted proxy.
pub fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    raw.rsplit(',').next()?.trim().parse().ok()
}

/// Client address from the forwarding header when trusted, else the peer.
pub fn client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_forwarded_for: bool,
) -> Option<IpAddr> {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_for(headers) {
            return Some(ip);
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Address of the requesting client, if it can be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(
            &parts.headers,
            &parts.extensions,
            state.trust_forwarded_for,
        )))
    }
}
