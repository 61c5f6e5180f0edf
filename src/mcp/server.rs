use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::geocoding::GeocodingClient;

use super::handlers::RequestHandler;
use super::types::*;

pub const SERVER_NAME: &str = "GeocoderREST";

pub struct McpServer {
    handler: Arc<RequestHandler>,
    initialized: Arc<RwLock<bool>>,
}

impl McpServer {
    pub fn new(geocoder: Arc<GeocodingClient>) -> Self {
        Self {
            handler: Arc::new(RequestHandler::new(geocoder)),
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_handler(handler: RequestHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    /// Serve on the process's stdin/stdout
    pub async fn run(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC until the reader reaches EOF.
    ///
    /// Requests are handled one at a time; a response is fully flushed before
    /// the next line is read.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();

        loop {
            buffer.clear();

            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => {
                    info!("Input closed, shutting down");
                    break;
                }
                Ok(_) => {
                    let line = match std::str::from_utf8(&buffer) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Request line is not valid UTF-8: {}", e);
                            let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                            Self::write_response(&mut writer, &response).await?;
                            continue;
                        }
                    };

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match self.process_request(trimmed).await {
                        Ok(Some(response)) => {
                            Self::write_response(&mut writer, &response).await?;
                        }
                        Ok(None) => {
                            // This was a notification, no response needed
                        }
                        Err(e) => {
                            error!("Error processing request: {}", e);

                            let error_response = JsonRpcResponse::error(
                                None,
                                JsonRpcError::internal_error(e.to_string()),
                            );
                            Self::write_response(&mut writer, &error_response).await?;
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading from stdin: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let response_str = serde_json::to_string(response)?;
        writer.write_all(response_str.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn process_request(&self, input: &str) -> Result<Option<JsonRpcResponse>> {
        // Parse JSON-RPC request
        let request: JsonRpcRequest = match serde_json::from_str(input) {
            Ok(req) => req,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                return Ok(Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(),
                )));
            }
        };

        // Validate JSON-RPC version
        if request.jsonrpc != JSONRPC_VERSION {
            return Ok(Some(JsonRpcResponse::error(
                request.id.clone(),
                JsonRpcError::invalid_request(),
            )));
        }

        debug!("Received {}", request.method);

        if request.id.is_none() {
            if matches!(request.method.as_str(), "initialized" | "notifications/initialized") {
                return self.handle_initialized(request).await;
            }
            // Notifications never get a reply, whatever the method
            debug!("Ignoring notification: {}", request.method);
            return Ok(None);
        }

        // Route to appropriate handler
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request).await.map(Some),
            "initialized" | "notifications/initialized" => self.handle_initialized(request).await,
            "tools/list" => self.handle_list_tools(request).await.map(Some),
            "tools/call" => self.handle_call_tool(request).await.map(Some),
            "prompts/list" => self.handle_list_prompts(request).await.map(Some),
            "resources/list" => self.handle_list_resources(request).await.map(Some),
            _ => {
                warn!("Unknown method: {}", request.method);
                Ok(Some(JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::method_not_found(&request.method),
                )))
            }
        }
    }

    async fn handle_initialize(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        // Parse initialize params
        let params: InitializeRequest = match request.params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return Ok(JsonRpcResponse::error(
                        request.id,
                        JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                    ));
                }
            },
            None => {
                return Ok(JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::invalid_params("Missing params".to_string()),
                ));
            }
        };

        info!(
            "Initializing session for {} {}",
            params.client_info.name, params.client_info.version
        );

        // Support both protocol versions
        let protocol_version = if params.protocol_version.starts_with("2025") {
            PROTOCOL_VERSION_2025.to_string()
        } else {
            PROTOCOL_VERSION.to_string()
        };

        let result = InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: HashMap::new(),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Ok(JsonRpcResponse::success(
            request.id,
            serde_json::to_value(result)?,
        ))
    }

    async fn handle_initialized(&self, request: JsonRpcRequest) -> Result<Option<JsonRpcResponse>> {
        let mut initialized = self.initialized.write().await;
        *initialized = true;

        // Notifications don't get responses
        if request.id.is_none() {
            Ok(None)
        } else {
            Ok(Some(JsonRpcResponse::success(request.id, Value::Null)))
        }
    }

    async fn handle_list_tools(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        if !*self.initialized.read().await {
            return Ok(Self::not_initialized(request.id));
        }

        let tools = self.handler.list_tools();
        let result = ListToolsResult { tools };

        Ok(JsonRpcResponse::success(
            request.id,
            serde_json::to_value(result)?,
        ))
    }

    async fn handle_call_tool(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        if !*self.initialized.read().await {
            return Ok(Self::not_initialized(request.id));
        }

        // Parse call tool params
        let params: CallToolRequest = match request.params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return Ok(JsonRpcResponse::error(
                        request.id,
                        JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                    ));
                }
            },
            None => {
                return Ok(JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::invalid_params("Missing params".to_string()),
                ));
            }
        };

        // A panicking tool surfaces as a JoinError instead of unwinding through the loop
        let handler = self.handler.clone();
        let name = params.name.clone();
        let task =
            tokio::spawn(async move { handler.call_tool(&params.name, params.arguments).await });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Tool {} aborted: {}", name, e);
                CallToolResult::error(format!("internal error: tool '{}' failed: {}", name, e))
            }
        };

        Ok(JsonRpcResponse::success(
            request.id,
            serde_json::to_value(result)?,
        ))
    }

    async fn handle_list_prompts(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        // We don't have prompts, return empty list
        let result = serde_json::json!({
            "prompts": []
        });

        Ok(JsonRpcResponse::success(request.id, result))
    }

    async fn handle_list_resources(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        // We don't have resources, return empty list
        let result = serde_json::json!({
            "resources": []
        });

        Ok(JsonRpcResponse::success(request.id, result))
    }

    fn not_initialized(id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::error(
            id,
            JsonRpcError::internal_error("Server not initialized".to_string()),
        )
    }
}
