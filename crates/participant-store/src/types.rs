//! Participant record types.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Format of `registration_time` in the JSON file.
pub const REGISTRATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One registrant's stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub full_name: String,

    /// Phone exactly as entered; uniqueness is checked on its digits.
    pub phone: String,

    #[serde(deserialize_with = "text_or_number")]
    pub age: String,

    pub gender: Gender,

    /// Client address captured from the request
    #[serde(default)]
    pub ip_address: String,

    /// Resolved location, if any lookup succeeded
    #[serde(default)]
    pub location: Option<Location>,

    /// Raw client geolocation, present only if the browser supplied it
    #[serde(default)]
    pub coordinates: Option<Coordinates>,

    #[serde(with = "registration_time")]
    pub registration_time: NaiveDateTime,
}

impl Participant {
    /// Digits of the phone number, the key for duplicate detection.
    pub fn normalized_phone(&self) -> String {
        normalize_phone(&self.phone)
    }
}

/// Registrant gender as stored in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Parse a submitted form value. Only the two stored values are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl Serialize for Gender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Any stored value other than "male" reads back as `Female`.
impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(if value == "male" {
            Gender::Male
        } else {
            Gender::Female
        })
    }
}

/// Location attached to a participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
}

/// Browser-supplied coordinates and the city they were attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(deserialize_with = "number_or_text")]
    pub latitude: f64,
    #[serde(deserialize_with = "number_or_text")]
    pub longitude: f64,
    #[serde(default)]
    pub city: Option<String>,
}

/// Keep only the ASCII digits of a phone number.
///
/// `"+7-900-123-45-67"` and `"79001234567"` normalize to the same key.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Current local time truncated to whole seconds.
pub fn registration_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

mod registration_time {
    use super::REGISTRATION_TIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(REGISTRATION_TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, REGISTRATION_TIME_FORMAT).map_err(de::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Number(serde_json::Number),
    Text(String),
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawScalar::deserialize(deserializer)? {
        RawScalar::Number(n) => n.to_string(),
        RawScalar::Text(s) => s,
    })
}

fn number_or_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match RawScalar::deserialize(deserializer)? {
        RawScalar::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("coordinate out of range")),
        RawScalar::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
