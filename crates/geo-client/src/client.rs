//! HTTP clients for the two lookup providers.

use crate::error::GeoError;
use crate::types::{IpApiResponse, NominatimResponse, ResolvedLocation};
use reqwest::Client;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, instrument};
use urlencoding::encode;

/// ip-api.com style IP geolocation client.
#[derive(Clone)]
pub struct IpApiClient {
    client: Client,
    base_url: String,
}

impl IpApiClient {
    /// Create a client for `base_url` (e.g. `http://ip-api.com/json`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeoError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Look up the location of `ip`.
    #[instrument(skip(self))]
    pub async fn lookup(&self, ip: IpAddr) -> Result<ResolvedLocation, GeoError> {
        let url = format!("{}/{}", self.base_url, encode(&ip.to_string()));
        debug!(url = %url, "Sending IP geolocation request");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let body: IpApiResponse = response.json().await?;
        if body.status != "success" {
            return Err(GeoError::Lookup(body.message.unwrap_or(body.status)));
        }

        Ok(ResolvedLocation::new(
            body.city.unwrap_or_default(),
            body.region_name.unwrap_or_default(),
            body.country.unwrap_or_default(),
        ))
    }
}

/// Nominatim reverse geocoding client.
#[derive(Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    /// Create a client for `base_url` (e.g. `https://nominatim.openstreetmap.org`).
    ///
    /// Nominatim rejects requests without an identifying User-Agent.
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, GeoError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Resolve coordinates to the nearest locality.
    #[instrument(skip(self))]
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> Result<ResolvedLocation, GeoError> {
        let url = format!("{}/reverse", self.base_url);
        let lat = latitude.to_string();
        let lon = longitude.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("zoom", "18"),
                ("addressdetails", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let body: NominatimResponse = response.json().await?;
        let address = body.address.ok_or_else(|| {
            GeoError::Lookup(body.error.unwrap_or_else(|| "no address in response".into()))
        })?;

        Ok(ResolvedLocation::new(
            address.locality(),
            address.state.clone().unwrap_or_default(),
            address.country.clone().unwrap_or_default(),
        ))
    }
}
