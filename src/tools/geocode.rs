use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::Tool;
use crate::error::McpResult;
use crate::geocoding::GeocodingClient;
use crate::utils::{parse_params, validate_non_empty};

pub struct GeocodeTool {
    client: Arc<GeocodingClient>,
}

impl GeocodeTool {
    pub fn new(client: Arc<GeocodingClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeParams {
    address: String,
}

#[async_trait]
impl Tool for GeocodeTool {
    fn description(&self) -> &str {
        "Geocode a mailing address: look up its latitude and longitude and return \
         {address, latitude, longitude}, or an error message such as 'No results found'"
    }

    async fn execute(&self, params: Value) -> McpResult<Value> {
        let params: GeocodeParams = parse_params(params)?;
        validate_non_empty(&params.address, "address")?;

        let result = self.client.geocode(&params.address).await?;
        info!(
            "Geocoded {:?} to ({}, {})",
            result.address, result.latitude, result.longitude
        );

        Ok(serde_json::to_value(result)?)
    }
}
