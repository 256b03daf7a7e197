//! Location lookups for client addresses and browser coordinates.

mod client;
mod error;
mod resolver;
mod types;

pub use client::{IpApiClient, NominatimClient};
pub use error::GeoError;
pub use resolver::{Geolocate, LocationResolver, ResolverConfig};
pub use types::ResolvedLocation;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use ttl_cache::{ManualClock, SystemClock};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(mock_server: &MockServer) -> ResolverConfig {
        ResolverConfig {
            ip_api_url: format!("{}/json", mock_server.uri()),
            nominatim_url: mock_server.uri(),
            timeout: Duration::from_millis(500),
            ..ResolverConfig::default()
        }
    }

    fn create_resolver(mock_server: &MockServer) -> LocationResolver {
        LocationResolver::new(&test_config(mock_server), Arc::new(SystemClock)).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_resolved_location_lowercases_city() {
        let location = ResolvedLocation::new(" Махачкала ", "Dagestan", "Russia");
        assert_eq!(location.city, "махачкала");
        assert_eq!(location.region, "Dagestan");
    }

    #[tokio::test]
    async fn test_ip_lookup_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/203.0.113.7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "city": "Makhachkala",
                "regionName": "Dagestan",
                "country": "Russia"
            })))
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        let location = resolver.by_ip(ip("203.0.113.7")).await.unwrap();

        assert_eq!(location.city, "makhachkala");
        assert_eq!(location.region, "Dagestan");
        assert_eq!(location.country, "Russia");
    }

    #[tokio::test]
    async fn test_ip_lookup_fail_status_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail",
                "message": "private range"
            })))
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        assert!(resolver.by_ip(ip("10.0.0.1")).await.is_none());
    }

    #[tokio::test]
    async fn test_ip_lookup_http_error_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        assert!(resolver.by_ip(ip("203.0.113.7")).await.is_none());
    }

    #[tokio::test]
    async fn test_ip_lookup_timeout_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "city": "Kaspiysk"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        assert!(resolver.by_ip(ip("203.0.113.7")).await.is_none());
    }

    #[tokio::test]
    async fn test_ip_lookup_is_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/203.0.113.7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "city": "Kaspiysk"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        assert_eq!(resolver.by_ip(ip("203.0.113.7")).await.unwrap().city, "kaspiysk");
        assert_eq!(resolver.by_ip(ip("203.0.113.7")).await.unwrap().city, "kaspiysk");
    }

    #[tokio::test]
    async fn test_ip_failures_are_not_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        assert!(resolver.by_ip(ip("203.0.113.7")).await.is_none());
        assert!(resolver.by_ip(ip("203.0.113.7")).await.is_none());
    }

    #[tokio::test]
    async fn test_ip_cache_expires() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "city": "Kaspiysk"
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let resolver = LocationResolver::new(&test_config(&mock_server), clock.clone()).unwrap();

        resolver.by_ip(ip("203.0.113.7")).await.unwrap();
        clock.advance(Duration::from_secs(3599));
        resolver.by_ip(ip("203.0.113.7")).await.unwrap();
        clock.advance(Duration::from_secs(1));
        resolver.by_ip(ip("203.0.113.7")).await.unwrap();
    }

    #[tokio::test]
    async fn test_reverse_lookup_city() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "42.98"))
            .and(query_param("lon", "47.5"))
            .and(query_param("format", "json"))
            .and(header("user-agent", "CarRaffle/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {
                    "city": "Махачкала",
                    "state": "Республика Дагестан",
                    "country": "Россия"
                }
            })))
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        let location = resolver.by_coordinates(42.98, 47.5).await.unwrap();

        assert_eq!(location.city, "махачкала");
        assert_eq!(location.region, "Республика Дагестан");
        assert_eq!(location.country, "Россия");
    }

    #[tokio::test]
    async fn test_reverse_lookup_falls_back_to_town_then_village() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {"town": "Каспийск"}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {"city": "", "village": "Талги"}
            })))
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        assert_eq!(resolver.by_coordinates(1.0, 0.0).await.unwrap().city, "каспийск");
        assert_eq!(resolver.by_coordinates(2.0, 0.0).await.unwrap().city, "талги");
    }

    #[tokio::test]
    async fn test_reverse_lookup_without_address_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "Unable to geocode"
            })))
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        assert!(resolver.by_coordinates(0.0, 0.0).await.is_none());
    }

    #[tokio::test]
    async fn test_reverse_lookup_is_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {"city": "Махачкала"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        resolver.by_coordinates(42.98, 47.5).await.unwrap();
        resolver.by_coordinates(42.98, 47.5).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_finite_coordinates_skip_lookup() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let resolver = create_resolver(&mock_server);
        assert!(resolver.by_coordinates(f64::NAN, 47.5).await.is_none());
    }
}
