use thiserror::Error;

use crate::geocoding::GeocodeError;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {seconds}s waiting for {operation}")]
    Timeout { operation: String, seconds: u64 },
}

pub type McpResult<T> = std::result::Result<T, McpError>;
