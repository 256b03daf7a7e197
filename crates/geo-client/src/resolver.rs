//! Cached location resolution.

use crate::client::{IpApiClient, NominatimClient};
use crate::error::GeoError;
use crate::types::ResolvedLocation;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use ttl_cache::{Clock, TtlCache};

/// Maps client addresses and coordinates to localities.
///
/// Failures of any kind resolve to `None`.
#[async_trait]
pub trait Geolocate: Send + Sync {
    async fn by_ip(&self, ip: IpAddr) -> Option<ResolvedLocation>;

    async fn by_coordinates(&self, latitude: f64, longitude: f64) -> Option<ResolvedLocation>;
}

/// Provider endpoints and cache limits.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub ip_api_url: String,
    pub nominatim_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ip_api_url: "http://ip-api.com/json".into(),
            nominatim_url: "https://nominatim.openstreetmap.org".into(),
            user_agent: "CarRaffle/1.0".into(),
            timeout: Duration::from_secs(3),
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 128,
        }
    }
}

/// Exact-match cache key for a coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CoordinateKey(u64, u64);

impl CoordinateKey {
    fn new(latitude: f64, longitude: f64) -> Self {
        // +0.0 so that -0.0 and 0.0 share a key
        Self((latitude + 0.0).to_bits(), (longitude + 0.0).to_bits())
    }
}

/// [`Geolocate`] backed by ip-api and Nominatim, one bounded TTL cache each.
///
/// Only successful lookups are cached.
pub struct LocationResolver {
    ip_api: IpApiClient,
    nominatim: NominatimClient,
    ip_cache: TtlCache<IpAddr, ResolvedLocation>,
    coordinate_cache: TtlCache<CoordinateKey, ResolvedLocation>,
}

impl LocationResolver {
    pub fn new(config: &ResolverConfig, clock: Arc<dyn Clock>) -> Result<Self, GeoError> {
        Ok(Self {
            ip_api: IpApiClient::new(&config.ip_api_url, config.timeout)?,
            nominatim: NominatimClient::new(
                &config.nominatim_url,
                &config.user_agent,
                config.timeout,
            )?,
            ip_cache: TtlCache::new(config.cache_capacity, config.cache_ttl, clock.clone()),
            coordinate_cache: TtlCache::new(config.cache_capacity, config.cache_ttl, clock),
        })
    }
}

#[async_trait]
impl Geolocate for LocationResolver {
    async fn by_ip(&self, ip: IpAddr) -> Option<ResolvedLocation> {
        if let Some(location) = self.ip_cache.get(&ip).await {
            debug!(%ip, city = %location.city, "IP location cache hit");
            return Some(location);
        }

        match self.ip_api.lookup(ip).await {
            Ok(location) => {
                self.ip_cache.insert(ip, location.clone()).await;
                Some(location)
            }
            Err(e) => {
                warn!(%ip, "IP geolocation failed: {}", e);
                None
            }
        }
    }

    async fn by_coordinates(&self, latitude: f64, longitude: f64) -> Option<ResolvedLocation> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }

        let key = CoordinateKey::new(latitude, longitude);
        if let Some(location) = self.coordinate_cache.get(&key).await {
            debug!(latitude, longitude, city = %location.city, "Coordinate cache hit");
            return Some(location);
        }

        match self.nominatim.reverse(latitude, longitude).await {
            Ok(location) => {
                self.coordinate_cache.insert(key, location.clone()).await;
                Some(location)
            }
            Err(e) => {
                warn!(latitude, longitude, "Reverse geocoding failed: {}", e);
                None
            }
        }
    }
}
