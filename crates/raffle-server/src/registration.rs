//! Registration workflow.

use crate::allow_list::AllowList;
use crate::error::AppError;
use geo_client::{Geolocate, ResolvedLocation};
use participant_store::{
    normalize_phone, registration_timestamp, Coordinates, Gender, Location, Participant,
    ParticipantStore,
};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// City reported for loopback clients.
pub const LOOPBACK_CITY: &str = "localhost (test mode)";

/// Raw registration form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub phone: String,
    pub age: String,
    pub gender: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub full_name: String,
    pub phone: String,
    pub age: String,
    pub gender: Gender,
    pub coordinates: Option<(f64, f64)>,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<Submission, AppError> {
        let full_name = self.full_name.trim();
        let phone = self.phone.trim();
        let age = self.age.trim();
        let gender = self.gender.trim();

        if full_name.is_empty() || phone.is_empty() || age.is_empty() || gender.is_empty() {
            return Err(AppError::Validation(
                "Please fill in all fields of the form.".into(),
            ));
        }

        if normalize_phone(phone).is_empty() {
            return Err(AppError::Validation(
                "Please enter a valid phone number.".into(),
            ));
        }

        let gender = Gender::parse(gender)
            .ok_or_else(|| AppError::Validation("Please select a gender.".into()))?;

        Ok(Submission {
            full_name: full_name.to_string(),
            phone: phone.to_string(),
            age: age.to_string(),
            gender,
            coordinates: parse_coordinates(self.latitude.as_deref(), self.longitude.as_deref()),
        })
    }
}

/// Both values must parse to finite numbers, otherwise the pair is ignored.
pub fn parse_coordinates(latitude: Option<&str>, longitude: Option<&str>) -> Option<(f64, f64)> {
    let parse = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };

    Some((parse(latitude)?, parse(longitude)?))
}

/// Loopback addresses, including IPv4-mapped ones, bypass location gating.
pub fn is_loopback(ip: IpAddr) -> bool {
    ip.to_canonical().is_loopback()
}

/// Outcome of a location check for a single input.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCheck {
    pub allowed: bool,
    pub city: String,
}

/// Result of the allowance decision for one registration.
#[derive(Debug, Clone, PartialEq)]
struct Allowance {
    allowed: bool,
    location: Option<ResolvedLocation>,
}

/// A stored registration and its 1-based ordinal.
#[derive(Debug, Clone)]
pub struct Registered {
    pub ordinal: usize,
    pub participant: Participant,
}

/// Validates, gates and persists registrations.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<ParticipantStore>,
    geo: Arc<dyn Geolocate>,
    allow_list: Arc<AllowList>,
}

impl Registrar {
    pub fn new(
        store: Arc<ParticipantStore>,
        geo: Arc<dyn Geolocate>,
        allow_list: Arc<AllowList>,
    ) -> Self {
        Self {
            store,
            geo,
            allow_list,
        }
    }

    pub async fn is_phone_registered(&self, phone: &str) -> bool {
        self.store.is_phone_registered(phone).await
    }

    /// Resolve coordinates and test the city against the allow-list.
    pub async fn check_coordinates(&self, latitude: f64, longitude: f64) -> Option<LocationCheck> {
        let location = self.geo.by_coordinates(latitude, longitude).await?;
        Some(LocationCheck {
            allowed: self.allow_list.is_allowed(&location.city),
            city: location.city,
        })
    }

    /// Resolve a client address and test the city against the allow-list.
    pub async fn check_ip(&self, ip: IpAddr) -> Option<LocationCheck> {
        if is_loopback(ip) {
            return Some(LocationCheck {
                allowed: true,
                city: LOOPBACK_CITY.to_string(),
            });
        }

        let location = self.geo.by_ip(ip).await?;
        Some(LocationCheck {
            allowed: self.allow_list.is_allowed(&location.city),
            city: location.city,
        })
    }

    /// Run one registration through validation, gating and persistence.
    ///
    /// Exactly one store append happens on success and none on failure.
    pub async fn register(
        &self,
        form: &RegistrationForm,
        client_ip: Option<IpAddr>,
    ) -> Result<Registered, AppError> {
        let submission = form.validate()?;

        if self.store.is_phone_registered(&submission.phone).await {
            warn!(phone = %submission.phone, "Duplicate registration rejected");
            return Err(AppError::DuplicatePhone);
        }

        let allowance = self.allowance(submission.coordinates, client_ip).await;
        if !allowance.allowed {
            warn!(
                ip = ?client_ip,
                city = allowance.location.as_ref().map(|l| l.city.as_str()),
                "Registration rejected by location"
            );
            return Err(AppError::LocationRejected);
        }

        let location = allowance.location.map(|l| Location {
            city: l.city,
            region: l.region,
            country: l.country,
        });
        let coordinates = submission
            .coordinates
            .map(|(latitude, longitude)| Coordinates {
                latitude,
                longitude,
                city: location.as_ref().map(|l| l.city.clone()),
            });

        let participant = Participant {
            full_name: submission.full_name,
            phone: submission.phone,
            age: submission.age,
            gender: submission.gender,
            ip_address: client_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            location,
            coordinates,
            registration_time: registration_timestamp(),
        };

        let ordinal = self.store.append(participant.clone()).await?;
        info!(ordinal, phone = %participant.phone, "Participant registered");

        Ok(Registered {
            ordinal,
            participant,
        })
    }

    async fn allowance(
        &self,
        coordinates: Option<(f64, f64)>,
        client_ip: Option<IpAddr>,
    ) -> Allowance {
        // No lookups at all when gating is off
        if self.allow_list.allow_all() {
            return Allowance {
                allowed: true,
                location: None,
            };
        }

        let mut location = None;
        if let Some((latitude, longitude)) = coordinates {
            location = self.geo.by_coordinates(latitude, longitude).await;
            if let Some(found) = &location {
                if self.allow_list.is_allowed(&found.city) {
                    return Allowance {
                        allowed: true,
                        location,
                    };
                }
            }
        }

        let Some(ip) = client_ip else {
            return Allowance {
                allowed: false,
                location,
            };
        };

        if is_loopback(ip) {
            return Allowance {
                allowed: true,
                location,
            };
        }

        match self.geo.by_ip(ip).await {
            Some(found) if self.allow_list.is_allowed(&found.city) => Allowance {
                allowed: true,
                location: Some(found),
            },
            _ => Allowance {
                allowed: false,
                location,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use ttl_cache::SystemClock;

    #[derive(Default)]
    struct StubGeo {
        by_ip: HashMap<IpAddr, ResolvedLocation>,
        by_coordinates: Option<ResolvedLocation>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Geolocate for StubGeo {
        async fn by_ip(&self, ip: IpAddr) -> Option<ResolvedLocation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.by_ip.get(&ip).cloned()
        }

        async fn by_coordinates(&self, _latitude: f64, _longitude: f64) -> Option<ResolvedLocation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.by_coordinates.clone()
        }
    }

    const ALLOWED_IP: &str = "203.0.113.7";
    const FOREIGN_IP: &str = "198.51.100.9";

    fn stub_geo() -> StubGeo {
        let mut by_ip = HashMap::new();
        by_ip.insert(
            ALLOWED_IP.parse().unwrap(),
            ResolvedLocation::new("Махачкала", "Dagestan", "Russia"),
        );
        by_ip.insert(
            FOREIGN_IP.parse().unwrap(),
            ResolvedLocation::new("Москва", "Moscow", "Russia"),
        );
        StubGeo {
            by_ip,
            ..StubGeo::default()
        }
    }

    async fn registrar(
        dir: &TempDir,
        geo: StubGeo,
        allow_all: bool,
    ) -> (Registrar, Arc<ParticipantStore>, Arc<StubGeo>) {
        let store = Arc::new(
            ParticipantStore::open(
                dir.path().join("participants.json"),
                Duration::from_secs(60),
                Arc::new(SystemClock),
            )
            .await
            .unwrap(),
        );
        let geo = Arc::new(geo);
        let registrar = Registrar::new(
            store.clone(),
            geo.clone(),
            Arc::new(AllowList::standard(allow_all)),
        );
        (registrar, store, geo)
    }

    fn form(phone: &str) -> RegistrationForm {
        RegistrationForm {
            full_name: "Ivan Petrov".into(),
            phone: phone.into(),
            age: "30".into(),
            gender: "male".into(),
            latitude: None,
            longitude: None,
        }
    }

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_validate_trims_and_requires_fields() {
        let mut f = form(" +7 900 123 45 67 ");
        f.full_name = "  Ivan  ".into();
        let submission = f.validate().unwrap();
        assert_eq!(submission.full_name, "Ivan");
        assert_eq!(submission.phone, "+7 900 123 45 67");

        f.age = "   ".into();
        assert!(matches!(f.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_phone_needs_digits() {
        assert!(matches!(form("---").validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_gender() {
        let mut f = form("79001234567");
        f.gender = "Female".into();
        assert_eq!(f.validate().unwrap().gender, Gender::Female);

        f.gender = "unknown".into();
        assert!(matches!(f.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_coordinates_requires_both() {
        assert_eq!(parse_coordinates(Some("42.98"), Some("47.5")), Some((42.98, 47.5)));
        assert_eq!(parse_coordinates(Some("42.98"), None), None);
        assert_eq!(parse_coordinates(Some("42.98"), Some("")), None);
        assert_eq!(parse_coordinates(Some("north"), Some("47.5")), None);
        assert_eq!(parse_coordinates(Some("NaN"), Some("47.5")), None);
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback("127.0.0.1".parse().unwrap()));
        assert!(is_loopback("127.8.0.1".parse().unwrap()));
        assert!(is_loopback("::1".parse().unwrap()));
        assert!(is_loopback("::ffff:127.0.0.1".parse().unwrap()));
        assert!(!is_loopback(ALLOWED_IP.parse().unwrap()));
    }

    #[tokio::test]
    async fn test_register_from_allowed_ip() {
        let dir = TempDir::new().unwrap();
        let (registrar, store, _) = registrar(&dir, stub_geo(), false).await;

        let registered = registrar.register(&form("79001234567"), ip(ALLOWED_IP)).await.unwrap();

        assert_eq!(registered.ordinal, 1);
        assert_eq!(registered.participant.ip_address, ALLOWED_IP);
        assert_eq!(registered.participant.location.unwrap().city, "махачкала");
        assert!(registered.participant.coordinates.is_none());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_ordinal_is_prior_length_plus_one() {
        let dir = TempDir::new().unwrap();
        let (registrar, _, _) = registrar(&dir, stub_geo(), false).await;

        registrar.register(&form("79001234567"), ip(ALLOWED_IP)).await.unwrap();
        let second = registrar.register(&form("79001234568"), ip(ALLOWED_IP)).await.unwrap();
        assert_eq!(second.ordinal, 2);
    }

    #[tokio::test]
    async fn test_duplicate_phone_any_format() {
        let dir = TempDir::new().unwrap();
        let (registrar, store, _) = registrar(&dir, stub_geo(), false).await;

        registrar.register(&form("+7-900-123-45-67"), ip(ALLOWED_IP)).await.unwrap();
        let result = registrar.register(&form("79001234567"), ip(ALLOWED_IP)).await;

        assert!(matches!(result, Err(AppError::DuplicatePhone)));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_foreign_city_rejected() {
        let dir = TempDir::new().unwrap();
        let (registrar, store, _) = registrar(&dir, stub_geo(), false).await;

        let result = registrar.register(&form("79001234567"), ip(FOREIGN_IP)).await;

        assert!(matches!(result, Err(AppError::LocationRejected)));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_unresolvable_ip_rejected() {
        let dir = TempDir::new().unwrap();
        let (registrar, store, _) = registrar(&dir, stub_geo(), false).await;

        let result = registrar.register(&form("79001234567"), ip("192.0.2.1")).await;

        assert!(matches!(result, Err(AppError::LocationRejected)));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_override_skips_lookups() {
        let dir = TempDir::new().unwrap();
        let (registrar, _, geo) = registrar(&dir, stub_geo(), true).await;

        let mut f = form("79001234567");
        f.latitude = Some("55.75".into());
        f.longitude = Some("37.61".into());
        let registered = registrar.register(&f, ip(FOREIGN_IP)).await.unwrap();

        assert!(registered.participant.location.is_none());
        let coordinates = registered.participant.coordinates.unwrap();
        assert_eq!(coordinates.latitude, 55.75);
        assert!(coordinates.city.is_none());
        assert_eq!(geo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_coordinates_win() {
        let dir = TempDir::new().unwrap();
        let geo = StubGeo {
            by_coordinates: Some(ResolvedLocation::new("Каспийск", "Dagestan", "Russia")),
            ..stub_geo()
        };
        let (registrar, _, geo) = registrar(&dir, geo, false).await;

        let mut f = form("79001234567");
        f.latitude = Some("42.88".into());
        f.longitude = Some("47.64".into());
        let registered = registrar.register(&f, ip(FOREIGN_IP)).await.unwrap();

        assert_eq!(registered.participant.location.unwrap().city, "каспийск");
        assert_eq!(
            registered.participant.coordinates.unwrap().city.as_deref(),
            Some("каспийск")
        );
        // IP lookup never ran
        assert_eq!(geo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disallowed_coordinates_fall_back_to_ip() {
        let dir = TempDir::new().unwrap();
        let geo = StubGeo {
            by_coordinates: Some(ResolvedLocation::new("Москва", "Moscow", "Russia")),
            ..stub_geo()
        };
        let (registrar, _, _) = registrar(&dir, geo, false).await;

        let mut f = form("79001234567");
        f.latitude = Some("55.75".into());
        f.longitude = Some("37.61".into());
        let registered = registrar.register(&f, ip(ALLOWED_IP)).await.unwrap();

        assert_eq!(registered.participant.location.unwrap().city, "махачкала");
        assert_eq!(
            registered.participant.coordinates.unwrap().city.as_deref(),
            Some("махачкала")
        );
    }

    #[tokio::test]
    async fn test_unresolvable_coordinates_fall_back_to_ip() {
        let dir = TempDir::new().unwrap();
        let (registrar, store, geo) = registrar(&dir, stub_geo(), false).await;

        let mut f = form("79001234567");
        f.latitude = Some("0.0".into());
        f.longitude = Some("0.0".into());
        let registered = registrar.register(&f, ip(ALLOWED_IP)).await.unwrap();

        assert_eq!(registered.participant.location.unwrap().city, "махачкала");
        let coordinates = registered.participant.coordinates.unwrap();
        assert_eq!(coordinates.latitude, 0.0);
        assert_eq!(coordinates.city.as_deref(), Some("махачкала"));
        // Coordinate lookup, then IP lookup
        assert_eq!(geo.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.count().await, 1);

        let result = registrar.register(&form("79001234568"), ip(FOREIGN_IP)).await;
        assert!(matches!(result, Err(AppError::LocationRejected)));
    }

    #[tokio::test]
    async fn test_loopback_always_allowed() {
        let dir = TempDir::new().unwrap();
        let geo = StubGeo {
            by_coordinates: Some(ResolvedLocation::new("Москва", "Moscow", "Russia")),
            ..stub_geo()
        };
        let (registrar, _, _) = registrar(&dir, geo, false).await;

        let mut f = form("79001234567");
        f.latitude = Some("55.75".into());
        f.longitude = Some("37.61".into());
        let registered = registrar.register(&f, ip("127.0.0.1")).await.unwrap();

        // Coordinate location is kept even though it was not allowed
        assert_eq!(registered.participant.location.unwrap().city, "москва");
    }

    #[tokio::test]
    async fn test_invalid_form_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let (registrar, store, geo) = registrar(&dir, stub_geo(), false).await;

        let result = registrar.register(&RegistrationForm::default(), ip(ALLOWED_IP)).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.count().await, 0);
        assert_eq!(geo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_ip() {
        let dir = TempDir::new().unwrap();
        let (registrar, _, _) = registrar(&dir, stub_geo(), false).await;

        let local = registrar.check_ip("::1".parse().unwrap()).await.unwrap();
        assert!(local.allowed);
        assert_eq!(local.city, LOOPBACK_CITY);

        let foreign = registrar.check_ip(FOREIGN_IP.parse().unwrap()).await.unwrap();
        assert!(!foreign.allowed);
        assert_eq!(foreign.city, "москва");

        assert!(registrar.check_ip("192.0.2.1".parse().unwrap()).await.is_none());
    }
}
