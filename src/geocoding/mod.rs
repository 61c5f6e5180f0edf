pub mod error;
pub mod types;

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{GEOCODING_API_KEY_VAR, GeocodingConfig, mask_secret};
use crate::error::{McpError, McpResult};

pub use error::GeocodeError;
pub use types::{GeocodeResponse, GeocodeResult, LatLng};

/// Client for the upstream geocoding HTTP API.
///
/// Every lookup is a single GET with no retries and no caching.
pub struct GeocodingClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout_seconds: u64,
}

impl GeocodingClient {
    /// Build the client. A missing API key is a configuration error.
    pub fn new(config: &GeocodingConfig) -> McpResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                McpError::Configuration(format!(
                    "{} environment variable not set",
                    GEOCODING_API_KEY_VAR
                ))
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn api_key_hint(&self) -> String {
        mask_secret(&self.api_key)
    }

    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        debug!(
            "Geocoding {:?} via {} (key {})",
            address,
            self.base_url,
            self.api_key_hint()
        );

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            // Error bodies are decoded opportunistically for the provider status
            let parsed = serde_json::from_str::<GeocodeResponse>(&body).ok();
            let err = GeocodeError::HttpStatus {
                code: status.as_u16(),
                status: parsed
                    .as_ref()
                    .map(|p| p.status.clone())
                    .filter(|s| !s.is_empty()),
                message: parsed.and_then(|p| p.error_message),
            };
            warn!("{}", err);
            return Err(err);
        }

        let parsed: GeocodeResponse = serde_json::from_str(&body)
            .map_err(|e| GeocodeError::Malformed(e.to_string()))?;

        debug!(
            "Provider status {:?} with {} candidate(s)",
            parsed.status,
            parsed.results.len()
        );

        parsed.into_result(address)
    }

    fn transport_error(&self, err: reqwest::Error) -> GeocodeError {
        if err.is_timeout() {
            return GeocodeError::Timeout {
                seconds: self.timeout_seconds,
            };
        }
        // The request URL carries the API key
        GeocodeError::Transport(err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;
    use fake::faker::address::en::{CityName, StateAbbr, StreetName};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = "test-maps-key-0001";

    fn test_config(base_url: String, timeout_seconds: u64) -> GeocodingConfig {
        GeocodingConfig {
            api_key: Some(TEST_KEY.to_string()),
            base_url,
            timeout_seconds,
        }
    }

    async fn setup_client(server: &MockServer) -> GeocodingClient {
        GeocodingClient::new(&test_config(format!("{}/geocode/json", server.uri()), 5))
            .expect("client with key")
    }

    fn one_candidate(lat: f64, lng: f64) -> serde_json::Value {
        json!({
            "status": "OK",
            "results": [{
                "formatted_address": "normalized by provider",
                "geometry": {"location": {"lat": lat, "lng": lng}, "location_type": "ROOFTOP"}
            }]
        })
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let config = GeocodingConfig {
            api_key: None,
            base_url: "http://localhost".to_string(),
            timeout_seconds: 10,
        };
        let err = GeocodingClient::new(&config).err().unwrap();
        assert!(matches!(err, McpError::Configuration(_)));
        assert!(err.to_string().contains(GEOCODING_API_KEY_VAR));
    }

    #[test]
    fn test_blank_key_is_configuration_error() {
        let config = GeocodingConfig {
            api_key: Some("  ".to_string()),
            base_url: "http://localhost".to_string(),
            timeout_seconds: 10,
        };
        assert!(GeocodingClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_geocode_success_sends_address_and_key() {
        let server = MockServer::start().await;
        let address = "1600 Amphitheatre Parkway, Mountain View, CA";

        Mock::given(method("GET"))
            .and(path("/geocode/json"))
            .and(query_param("address", address))
            .and(query_param("key", TEST_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_candidate(37.4224, -122.0842)))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_client(&server).await;
        let result = client.geocode(address).await.unwrap();

        assert_eq!(
            result,
            GeocodeResult {
                address: address.to_string(),
                latitude: 37.4224,
                longitude: -122.0842,
            }
        );
    }

    #[tokio::test]
    async fn test_geocode_preserves_generated_addresses_verbatim() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geocode/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_candidate(40.0, -75.0)))
            .mount(&server)
            .await;

        let client = setup_client(&server).await;

        for _ in 0..10 {
            let street: String = StreetName().fake();
            let city: String = CityName().fake();
            let state: String = StateAbbr().fake();
            let address = format!("  {} {}, {}, {} ", (1u32..9999).fake::<u32>(), street, city, state);

            let result = client.geocode(&address).await.unwrap();
            assert_eq!(result.address, address);
            assert_eq!(result.latitude, 40.0);
            assert_eq!(result.longitude, -75.0);
        }
    }

    #[tokio::test]
    async fn test_geocode_zero_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "ZERO_RESULTS", "results": []})),
            )
            .mount(&server)
            .await;

        let client = setup_client(&server).await;
        let err = client.geocode("Nowhere Lane, Atlantis").await.unwrap_err();

        assert!(err.to_string().to_lowercase().contains("no results"));
    }

    #[tokio::test]
    async fn test_geocode_http_403_reports_provider_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"status": "REQUEST_DENIED"})),
            )
            .mount(&server)
            .await;

        let client = setup_client(&server).await;
        let err = client.geocode("anywhere").await.unwrap_err();

        assert_eq!(
            err,
            GeocodeError::HttpStatus {
                code: 403,
                status: Some("REQUEST_DENIED".to_string()),
                message: None,
            }
        );
        assert!(err.to_string().contains("REQUEST_DENIED"));
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_geocode_http_500_with_non_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let client = setup_client(&server).await;
        let err = client.geocode("anywhere").await.unwrap_err();

        assert_eq!(err.to_string(), "Geocoding request failed with HTTP 500");
    }

    #[tokio::test]
    async fn test_geocode_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let client = setup_client(&server).await;
        let err = client.geocode("anywhere").await.unwrap_err();

        assert!(matches!(err, GeocodeError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_geocode_transport_failure_does_not_leak_key() {
        // Nothing listens on port 1
        let client =
            GeocodingClient::new(&test_config("http://127.0.0.1:1/geocode/json".to_string(), 2))
                .unwrap();

        let err = client.geocode("anywhere").await.unwrap_err();

        assert!(matches!(
            err,
            GeocodeError::Transport(_) | GeocodeError::Timeout { .. }
        ));
        assert!(!err.to_string().contains(TEST_KEY));
    }

    #[tokio::test]
    async fn test_geocode_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(one_candidate(1.0, 2.0))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client =
            GeocodingClient::new(&test_config(format!("{}/geocode/json", server.uri()), 1))
                .unwrap();
        let err = client.geocode("slow street").await.unwrap_err();

        assert_eq!(err, GeocodeError::Timeout { seconds: 1 });
    }

    #[test]
    fn test_api_key_hint_is_masked() {
        let client = GeocodingClient::new(&test_config("http://localhost".to_string(), 10)).unwrap();
        assert_eq!(client.api_key_hint(), "test...0001");
    }
}
