//! API request and response types.

use serde::{Deserialize, Serialize};

/// Query for `GET /check-coordinates`.
#[derive(Debug, Default, Deserialize)]
pub struct CoordinatesQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
}

/// Query for `GET /check-phone`.
#[derive(Debug, Default, Deserialize)]
pub struct PhoneQuery {
    pub phone: Option<String>,
}

/// Result of a location check.
///
/// Failed lookups still answer 200 with `status: "error"`.
#[derive(Debug, Serialize)]
pub struct LocationCheckResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LocationCheckResponse {
    pub fn success(allowed: bool, city: String) -> Self {
        Self {
            status: "success".into(),
            allowed: Some(allowed),
            city: Some(city),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            allowed: None,
            city: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhoneCheckResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// JSON answer to an AJAX registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_number: Option<usize>,
}

/// Acknowledgement for admin mutations.
#[derive(Debug, Serialize)]
pub struct AdminActionResponse {
    pub success: bool,
}

/// Login form for `POST /admin`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub participants: usize,
}
