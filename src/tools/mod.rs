pub mod debug;
pub mod geocode;

use crate::error::McpResult;
use async_trait::async_trait;
use serde_json::Value;

pub use debug::DebugInfoTool;
pub use geocode::GeocodeTool;

#[async_trait]
pub trait Tool {
    fn description(&self) -> &str;
    async fn execute(&self, params: Value) -> McpResult<Value>;
}
