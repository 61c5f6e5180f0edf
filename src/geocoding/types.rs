use serde::{Deserialize, Serialize};

use super::error::GeocodeError;

/// Provider status values
pub const STATUS_OK: &str = "OK";
pub const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

/// Upstream geocoding response body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocodeCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Geometry {
    pub location: LatLng,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Coordinates for an address, carrying the caller's address text verbatim
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeocodeResult {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeocodeResult {
    pub fn new(address: &str, location: LatLng) -> Self {
        Self {
            address: address.to_string(),
            latitude: location.lat,
            longitude: location.lng,
        }
    }
}

impl GeocodeResponse {
    /// Reduce a decoded 2xx body to a single result.
    ///
    /// Only the first candidate is used. Precision hints such as
    /// `location_type` are not consulted.
    pub fn into_result(self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        match self.status.as_str() {
            STATUS_OK | "" => {}
            STATUS_ZERO_RESULTS => {
                return Err(GeocodeError::NoResults {
                    address: address.to_string(),
                });
            }
            other => {
                return Err(GeocodeError::Status {
                    status: other.to_string(),
                    message: self.error_message,
                });
            }
        }

        let candidate = self
            .results
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoResults {
                address: address.to_string(),
            })?;

        Ok(GeocodeResult::new(address, candidate.geometry.location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> GeocodeResponse {
        serde_json::from_value(value).expect("valid geocode response")
    }

    #[test]
    fn test_first_candidate_wins() {
        let response = decode(json!({
            "status": "OK",
            "results": [
                {
                    "formatted_address": "Springfield, IL, USA",
                    "geometry": {"location": {"lat": 39.78, "lng": -89.65}, "location_type": "APPROXIMATE"}
                },
                {
                    "formatted_address": "Springfield, MA, USA",
                    "geometry": {"location": {"lat": 42.10, "lng": -72.59}, "location_type": "ROOFTOP"}
                }
            ]
        }));

        let result = response.into_result("Springfield").unwrap();
        assert_eq!(
            result,
            GeocodeResult {
                address: "Springfield".to_string(),
                latitude: 39.78,
                longitude: -89.65,
            }
        );
    }

    #[test]
    fn test_address_is_not_replaced_by_formatted_address() {
        let response = decode(json!({
            "status": "OK",
            "results": [{
                "formatted_address": "1600 Amphitheatre Pkwy, Mountain View, CA 94043, USA",
                "geometry": {"location": {"lat": 37.4224, "lng": -122.0842}}
            }]
        }));

        let result = response.into_result("1600 amphitheatre pkwy").unwrap();
        assert_eq!(result.address, "1600 amphitheatre pkwy");
    }

    #[test]
    fn test_zero_results_status() {
        let response = decode(json!({"status": "ZERO_RESULTS", "results": []}));
        let err = response.into_result("Atlantis").unwrap_err();
        assert!(err.to_string().to_lowercase().contains("no results"));
    }

    #[test]
    fn test_ok_status_with_empty_results() {
        let response = decode(json!({"status": "OK", "results": []}));
        let err = response.into_result("Atlantis").unwrap_err();
        assert!(matches!(err, GeocodeError::NoResults { .. }));
    }

    #[test]
    fn test_denied_status_with_message() {
        let response = decode(json!({
            "status": "REQUEST_DENIED",
            "results": [],
            "error_message": "The provided API key is invalid."
        }));

        let err = response.into_result("anywhere").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Geocoding failed with status REQUEST_DENIED: The provided API key is invalid."
        );
    }

    #[test]
    fn test_candidate_without_geometry_fails_to_decode() {
        let result = serde_json::from_value::<GeocodeResponse>(json!({
            "status": "OK",
            "results": [{"formatted_address": "somewhere"}]
        }));
        assert!(result.is_err());
    }
}
