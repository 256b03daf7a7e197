//! Configuration for the raffle server.

use anyhow::{Context, Result};
use geo_client::ResolverConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Participant storage configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Geolocation provider configuration
    #[serde(default)]
    pub geo: GeoConfig,

    /// Location gating configuration
    #[serde(default)]
    pub location: LocationConfig,

    /// Admin panel configuration
    pub admin: AdminConfig,

    /// Session cookie configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Take the client address from the last X-Forwarded-For hop.
    ///
    /// Only safe behind a reverse proxy that sets the header. A directly
    /// exposed server lets clients name any address, including loopback,
    /// which skips location gating.
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the participants JSON file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How long reads may be served from memory
    #[serde(default = "default_store_cache_ttl", with = "humantime_serde")]
    pub cache_ttl: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// IP geolocation base URL
    #[serde(default = "default_ip_api_url")]
    pub ip_api_url: String,

    /// Reverse geocoding base URL
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,

    /// User-Agent sent to the reverse geocoder
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-lookup timeout
    #[serde(default = "default_geo_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Lookup cache TTL
    #[serde(default = "default_geo_cache_ttl", with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Maximum cached lookups per provider
    #[serde(default = "default_geo_cache_capacity")]
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationConfig {
    /// Accept registrations from anywhere (test deployments)
    #[serde(default)]
    pub allow_all: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Shared admin password
    pub password: SecretString,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Key for signing session cookies; random per process when unset
    #[serde(default)]
    pub secret_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute on public endpoints
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl GeoConfig {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            ip_api_url: self.ip_api_url.clone(),
            nominatim_url: self.nominatim_url.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
            cache_ttl: self.cache_ttl,
            cache_capacity: self.cache_capacity,
        }
    }
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            trust_forwarded_for: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            cache_ttl: default_store_cache_ttl(),
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            ip_api_url: default_ip_api_url(),
            nominatim_url: default_nominatim_url(),
            user_agent: default_user_agent(),
            timeout: default_geo_timeout(),
            cache_ttl: default_geo_cache_ttl(),
            cache_capacity: default_geo_cache_capacity(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_store_path() -> PathBuf {
    PathBuf::from("participants.json")
}

fn default_store_cache_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_ip_api_url() -> String {
    ResolverConfig::default().ip_api_url
}

fn default_nominatim_url() -> String {
    ResolverConfig::default().nominatim_url
}

fn default_user_agent() -> String {
    ResolverConfig::default().user_agent
}

fn default_geo_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_geo_cache_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_geo_cache_capacity() -> usize {
    128
}

fn default_per_minute() -> u32 {
    120
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    // Passwords stay strings even when they look numeric
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
