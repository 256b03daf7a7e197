//! Location result and provider response types.

use serde::{Deserialize, Serialize};

/// Result of a successful lookup.
///
/// `city` is always lowercased; region and country are kept as returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub city: String,
    pub region: String,
    pub country: String,
}

impl ResolvedLocation {
    pub fn new(
        city: impl AsRef<str>,
        region: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            city: city.as_ref().trim().to_lowercase(),
            region: region.into(),
            country: country.into(),
        }
    }
}

/// ip-api.com JSON response.
#[derive(Debug, Deserialize)]
pub(crate) struct IpApiResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(rename = "regionName", default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Nominatim reverse geocoding response.
#[derive(Debug, Deserialize)]
pub(crate) struct NominatimResponse {
    #[serde(default)]
    pub address: Option<NominatimAddress>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NominatimAddress {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl NominatimAddress {
    /// City, falling back to town, then village.
    pub fn locality(&self) -> &str {
        [&self.city, &self.town, &self.village]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}
