pub mod client;
pub mod config;
pub mod error;
pub mod geocoding;
pub mod mcp;
pub mod tools;
pub mod utils;

pub use config::Config;
pub use error::{McpError, McpResult};
