use thiserror::Error;

/// Reasons a geocode lookup produced no coordinates
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("Geocoding failed: {0}")]
    Transport(String),

    #[error("Geocoding failed: request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Geocoding request failed with HTTP {code}{}", detail(.status, .message))]
    HttpStatus {
        code: u16,
        status: Option<String>,
        message: Option<String>,
    },

    #[error("No results found for address: {address}")]
    NoResults { address: String },

    #[error("Geocoding failed with status {status}{}", message_suffix(.message))]
    Status {
        status: String,
        message: Option<String>,
    },

    #[error("Malformed geocoding response: {0}")]
    Malformed(String),
}

fn detail(status: &Option<String>, message: &Option<String>) -> String {
    match (status, message) {
        (Some(status), Some(message)) => format!(": {} - {}", status, message),
        (Some(status), None) => format!(": {}", status),
        (None, Some(message)) => format!(": {}", message),
        (None, None) => String::new(),
    }
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_ref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Some("REQUEST_DENIED"), None, "Geocoding request failed with HTTP 403: REQUEST_DENIED")]
    #[case(
        Some("REQUEST_DENIED"),
        Some("API key invalid"),
        "Geocoding request failed with HTTP 403: REQUEST_DENIED - API key invalid"
    )]
    #[case(None, None, "Geocoding request failed with HTTP 403")]
    fn test_http_status_message(
        #[case] status: Option<&str>,
        #[case] message: Option<&str>,
        #[case] expected: &str,
    ) {
        let err = GeocodeError::HttpStatus {
            code: 403,
            status: status.map(str::to_string),
            message: message.map(str::to_string),
        };
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_status_without_message() {
        let err = GeocodeError::Status {
            status: "OVER_QUERY_LIMIT".to_string(),
            message: None,
        };
        assert_eq!(err.to_string(), "Geocoding failed with status OVER_QUERY_LIMIT");
    }
}
