use crate::error::{McpError, McpResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse JSON value into a typed parameter struct
pub fn parse_params<T: DeserializeOwned>(params: Value) -> McpResult<T> {
    // Tools without parameters may be called with no arguments at all
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| McpError::InvalidParameter(format!("Invalid parameters: {}", e)))
}

/// Validate that a string field contains something other than whitespace
pub fn validate_non_empty(value: &str, field_name: &str) -> McpResult<()> {
    if value.trim().is_empty() {
        return Err(McpError::InvalidParameter(format!(
            "{} must not be empty",
            field_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct AddressParams {
        address: String,
    }

    #[derive(Debug, Deserialize)]
    struct NoParams {}

    #[test]
    fn test_parse_params_ok() {
        let params: AddressParams = parse_params(json!({"address": "1 Main St"})).unwrap();
        assert_eq!(params.address, "1 Main St");
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({"address": 42}))]
    #[case(json!({"address": null}))]
    #[case(json!("1 Main St"))]
    fn test_parse_params_rejects_bad_shapes(#[case] params: Value) {
        let err = parse_params::<AddressParams>(params).unwrap_err();
        assert!(matches!(err, McpError::InvalidParameter(_)));
    }

    #[test]
    fn test_parse_params_null_means_no_arguments() {
        assert!(parse_params::<NoParams>(Value::Null).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn test_validate_non_empty_rejects_blank(#[case] value: &str) {
        let err = validate_non_empty(value, "address").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid parameter: address must not be empty"
        );
    }

    #[test]
    fn test_validate_non_empty_accepts_padded_text() {
        assert!(validate_non_empty("  Paris ", "address").is_ok());
    }
}
