use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tracing::{debug, info, warn};

use crate::error::{McpError, McpResult};
use crate::mcp::types::{
    CallToolResult, ClientCapabilities, ClientInfo, InitializeRequest, InitializeResult,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, Tool,
};

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Client half of an MCP session over a newline-delimited JSON-RPC stream.
///
/// At most one request is outstanding at a time.
pub struct McpClientSession {
    lines: Lines<BufReader<BoxedReader>>,
    writer: BoxedWriter,
    next_id: u64,
    request_timeout: Duration,
    server_info: Option<InitializeResult>,
}

impl McpClientSession {
    pub fn new<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        Self {
            lines: BufReader::new(reader).lines(),
            writer: Box::new(writer),
            next_id: 1,
            request_timeout,
            server_info: None,
        }
    }

    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// `initialize`, `notifications/initialized` and `tools/list`, bounded as a whole
    pub async fn initialize(&mut self, handshake_timeout: Duration) -> McpResult<Vec<Tool>> {
        tokio::time::timeout(handshake_timeout, self.handshake())
            .await
            .map_err(|_| McpError::Timeout {
                operation: "server handshake".to_string(),
                seconds: handshake_timeout.as_secs(),
            })?
    }

    async fn handshake(&mut self) -> McpResult<Vec<Tool>> {
        let params = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: "mcp-geocoder-client".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;
        let init: InitializeResult = serde_json::from_value(result)?;
        info!(
            "Connected to {} {} (protocol {})",
            init.server_info.name, init.server_info.version, init.protocol_version
        );
        self.server_info = Some(init);

        self.notify("notifications/initialized").await?;
        self.fetch_tools().await
    }

    pub async fn list_tools(&mut self) -> McpResult<Vec<Tool>> {
        let timeout = self.request_timeout;
        tokio::time::timeout(timeout, self.fetch_tools())
            .await
            .map_err(|_| McpError::Timeout {
                operation: "tools/list".to_string(),
                seconds: timeout.as_secs(),
            })?
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        let timeout = self.request_timeout;
        let params = json!({"name": name, "arguments": arguments});

        let result = tokio::time::timeout(timeout, self.request("tools/call", Some(params)))
            .await
            .map_err(|_| McpError::Timeout {
                operation: format!("tool '{}'", name),
                seconds: timeout.as_secs(),
            })??;

        Ok(serde_json::from_value(result)?)
    }

    async fn fetch_tools(&mut self) -> McpResult<Vec<Tool>> {
        let result = self.request("tools/list", None).await?;
        let list: ListToolsResult = serde_json::from_value(result)?;
        debug!(
            "Server tools: {:?}",
            list.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );
        Ok(list.tools)
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&JsonRpcRequest::new(id, method, params)).await?;
        self.read_response(id, method).await
    }

    async fn notify(&mut self, method: &str) -> McpResult<()> {
        self.send(&JsonRpcRequest::notification(method)).await
    }

    async fn send(&mut self, request: &JsonRpcRequest) -> McpResult<()> {
        let line = serde_json::to_string(request)?;
        debug!("-> {}", line);

        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(Self::broken_pipe)?;
        self.writer.write_all(b"\n").await.map_err(Self::broken_pipe)?;
        self.writer.flush().await.map_err(Self::broken_pipe)?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64, method: &str) -> McpResult<Value> {
        let expected = Value::from(id);

        loop {
            let line = self
                .lines
                .next_line()
                .await?
                .ok_or_else(|| McpError::Transport("server closed the connection".to_string()))?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!("<- {}", trimmed);

            let response: JsonRpcResponse = match serde_json::from_str(trimmed) {
                Ok(response) => response,
                Err(e) => {
                    warn!("Skipping unparseable line from server: {}", e);
                    continue;
                }
            };

            // Notifications and stale responses carry no matching id
            if response.id.as_ref() != Some(&expected) {
                continue;
            }

            if let Some(error) = response.error {
                return Err(McpError::Transport(format!(
                    "{} failed with code {}: {}",
                    method, error.code, error.message
                )));
            }

            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    fn broken_pipe(err: std::io::Error) -> McpError {
        McpError::Transport(format!("failed to write to server: {}", err))
    }
}
