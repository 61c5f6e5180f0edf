use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use super::model::{ChatMessage, LanguageModel};
use super::session::McpClientSession;
use crate::error::{McpError, McpResult};
use crate::mcp::types::{CallToolResult, Tool};

const EMPTY_ANSWER: &str = "(no response from model)";

/// Mediates between a user, a hosted model and one tool server session.
///
/// Each user turn makes at most one tool call.
pub struct Orchestrator {
    session: McpClientSession,
    model: Box<dyn LanguageModel + Send + Sync>,
    catalog: Vec<Tool>,
}

impl Orchestrator {
    pub async fn connect(
        mut session: McpClientSession,
        model: Box<dyn LanguageModel + Send + Sync>,
        handshake_timeout: Duration,
    ) -> McpResult<Self> {
        let catalog = session.initialize(handshake_timeout).await?;
        info!(
            "Connected to server with tools: {:?}",
            catalog.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        Ok(Self {
            session,
            model,
            catalog,
        })
    }

    pub async fn process_query(&mut self, query: &str) -> McpResult<String> {
        let mut messages = vec![ChatMessage::user_text(query)];

        let first = self.model.complete(&messages, &self.catalog).await?;
        let mut final_text = first.texts();

        if let Some(request) = first.first_tool_use() {
            info!("Calling tool {} with args {}", request.name, request.input);
            let result = self.invoke_tool(&request.name, request.input.clone()).await;

            messages.push(ChatMessage::assistant(first.replay_content()));
            messages.push(ChatMessage::tool_result(
                &request.id,
                result.joined_text(),
                result.is_error,
            ));

            let second = self.model.complete(&messages, &self.catalog).await?;
            if second.first_tool_use().is_some() {
                warn!("Model asked for a further tool call; only one is made per turn");
            }
            final_text.extend(second.texts());
        }

        final_text.retain(|text| !text.trim().is_empty());
        if final_text.is_empty() {
            return Ok(EMPTY_ANSWER.to_string());
        }
        Ok(final_text.join("\n"))
    }

    async fn invoke_tool(&mut self, name: &str, arguments: Value) -> CallToolResult {
        if !self.catalog.iter().any(|tool| tool.name == name) {
            warn!("Model requested unknown tool {}", name);
            return CallToolResult::error(McpError::UnknownTool(name.to_string()).to_string());
        }

        match self.session.call_tool(name, arguments).await {
            Ok(result) => {
                if result.content.is_empty() {
                    return CallToolResult::error(format!("tool '{}' returned no content", name));
                }
                result
            }
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                CallToolResult::error(format!("Error: {}", e))
            }
        }
    }

    /// Interactive loop: one query per line until `quit` or end of input
    pub async fn chat_loop<R, W>(&mut self, input: R, mut output: W) -> McpResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        output
            .write_all(b"\nMCP Client Started!\nType your queries or 'quit' to exit.\n")
            .await?;

        loop {
            output.write_all(b"\nQuery: ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let query = line.trim();
            if query.eq_ignore_ascii_case("quit") {
                break;
            }
            if query.is_empty() {
                continue;
            }

            let reply = match self.process_query(query).await {
                Ok(answer) => format!("\n{}\n", answer),
                Err(e) => format!("\nError: {}\n", e),
            };
            output.write_all(reply.as_bytes()).await?;
        }

        output.flush().await?;
        Ok(())
    }
}
