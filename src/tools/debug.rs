use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::Tool;
use crate::error::McpResult;
use crate::geocoding::GeocodingClient;
use crate::mcp::server::SERVER_NAME;
use crate::utils::parse_params;

/// Reports configuration status without contacting the provider
pub struct DebugInfoTool {
    client: Arc<GeocodingClient>,
}

impl DebugInfoTool {
    pub fn new(client: Arc<GeocodingClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct DebugInfoParams {}

#[async_trait]
impl Tool for DebugInfoTool {
    fn description(&self) -> &str {
        "Return debug information about the geocoding server for connectivity testing"
    }

    async fn execute(&self, params: Value) -> McpResult<Value> {
        let _: DebugInfoParams = parse_params(params)?;

        let working_directory = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(json!({
            "server_name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "working_directory": working_directory,
            "api_key_configured": true,
            "api_key_hint": self.client.api_key_hint(),
            "geocoding_endpoint": self.client.endpoint(),
            "timeout_seconds": self.client.timeout_seconds(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }
}
