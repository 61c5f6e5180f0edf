use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::McpError;
use crate::geocoding::GeocodingClient;
use crate::tools::{DebugInfoTool, GeocodeTool, Tool};

use super::types::{CallToolResult, Property, Tool as McpTool, ToolInputSchema};

pub struct RequestHandler {
    // Registration order is the catalog order
    tools: Vec<(String, Box<dyn Tool + Send + Sync>)>,
}

macro_rules! register_tool {
    ($tools:expr, $name:expr, $tool:expr) => {
        $tools.push(($name.to_string(), Box::new($tool)));
    };
}

impl RequestHandler {
    pub fn new(geocoder: Arc<GeocodingClient>) -> Self {
        let mut tools: Vec<(String, Box<dyn Tool + Send + Sync>)> = Vec::new();

        register_tool!(tools, "geocode", GeocodeTool::new(geocoder.clone()));
        register_tool!(tools, "debug_info", DebugInfoTool::new(geocoder.clone()));

        Self { tools }
    }

    #[cfg(test)]
    pub(crate) fn with_tools(tools: Vec<(String, Box<dyn Tool + Send + Sync>)>) -> Self {
        Self { tools }
    }

    pub fn list_tools(&self) -> Vec<McpTool> {
        self.tools
            .iter()
            .map(|(name, tool)| self.tool_to_mcp_tool(name, tool.as_ref()))
            .collect()
    }

    /// Run a tool. Every failure is folded into an error result.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        let Some((_, tool)) = self.tools.iter().find(|(n, _)| n == name) else {
            warn!("Call for unknown tool: {}", name);
            return CallToolResult::error(McpError::UnknownTool(name.to_string()).to_string());
        };

        debug!("Executing tool {}", name);
        match tool.execute(arguments).await {
            Ok(result) => {
                // Convert result to tool content
                if let Some(text) = result.as_str() {
                    CallToolResult::text(text)
                } else {
                    match serde_json::to_string_pretty(&result) {
                        Ok(text) => CallToolResult::text(text),
                        Err(e) => CallToolResult::error(McpError::from(e).to_string()),
                    }
                }
            }
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                CallToolResult::error(e.to_string())
            }
        }
    }

    // Helper functions for creating tool schemas
    fn create_string_prop(description: &str) -> Property {
        Property {
            property_type: "string".to_string(),
            description: Some(description.to_string()),
        }
    }

    fn tool_to_mcp_tool(&self, name: &str, tool: &(dyn Tool + Send + Sync)) -> McpTool {
        // Create input schema based on tool name
        let (properties, required) = match name {
            "geocode" => {
                let mut props = BTreeMap::new();
                props.insert(
                    "address".to_string(),
                    Self::create_string_prop("Mailing address to geocode"),
                );
                (props, vec!["address".to_string()])
            }
            _ => (BTreeMap::new(), vec![]),
        };

        McpTool {
            name: name.to_string(),
            description: tool.description().to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeocodingConfig;
    use crate::mcp::types::ToolContent;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup_handler(base_url: String) -> RequestHandler {
        let client = GeocodingClient::new(&GeocodingConfig {
            api_key: Some("handler-test-key".to_string()),
            base_url,
            timeout_seconds: 5,
        })
        .unwrap();
        RequestHandler::new(Arc::new(client))
    }

    #[test]
    fn test_catalog_order_and_schema() {
        let handler = setup_handler("http://127.0.0.1:1".to_string());
        let tools = handler.list_tools();

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["geocode", "debug_info"]);

        let geocode = &tools[0];
        assert_eq!(geocode.input_schema.schema_type, "object");
        assert_eq!(geocode.input_schema.required, vec!["address".to_string()]);
        assert_eq!(
            geocode.input_schema.properties["address"].property_type,
            "string"
        );

        let debug = &tools[1];
        assert!(debug.input_schema.properties.is_empty());
        assert!(debug.input_schema.required.is_empty());
    }

    #[test]
    fn test_catalog_is_identical_across_calls() {
        let handler = setup_handler("http://127.0.0.1:1".to_string());
        let first = serde_json::to_string(&handler.list_tools()).unwrap();
        let second = serde_json::to_string(&handler.list_tools()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_tool_never_contacts_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let handler = setup_handler(server.uri());
        let result = handler
            .call_tool("reverse_geocode", json!({"lat": 1.0}))
            .await;

        assert_eq!(result, CallToolResult::error("unknown tool: reverse_geocode"));
    }

    #[tokio::test]
    async fn test_success_is_single_text_block_with_result_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [{"geometry": {"location": {"lat": 37.4224, "lng": -122.0842}}}]
            })))
            .mount(&server)
            .await;

        let handler = setup_handler(server.uri());
        let result = handler
            .call_tool(
                "geocode",
                json!({"address": "1600 Amphitheatre Parkway, Mountain View, CA"}),
            )
            .await;

        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);
        let ToolContent::Text { text } = &result.content[0];
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(
            parsed,
            json!({
                "address": "1600 Amphitheatre Parkway, Mountain View, CA",
                "latitude": 37.4224,
                "longitude": -122.0842
            })
        );
    }

    #[tokio::test]
    async fn test_validation_failure_is_error_result() {
        let handler = setup_handler("http://127.0.0.1:1".to_string());
        let result = handler.call_tool("geocode", json!({"address": "   "})).await;

        assert!(result.is_error);
        assert_eq!(
            result.joined_text(),
            "Invalid parameter: address must not be empty"
        );
    }
}
