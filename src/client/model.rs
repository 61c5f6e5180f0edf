use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpResult;
use crate::mcp::types::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A block of message content, in the Anthropic Messages shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block kinds this client does not act on
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_result(tool_use_id: &str, content: String, is_error: bool) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.to_string(),
                content,
                is_error,
            }],
        }
    }
}

/// An invocation the model asked for
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ModelReply {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl ModelReply {
    pub fn texts(&self) -> Vec<String> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn first_tool_use(&self) -> Option<ToolRequest> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(ToolRequest {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        })
    }

    /// Content to replay as the assistant turn: text plus the first tool use only
    pub fn replay_content(&self) -> Vec<ContentBlock> {
        let mut seen_tool_use = false;
        self.content
            .iter()
            .filter(|block| match block {
                ContentBlock::Text { .. } => true,
                ContentBlock::ToolUse { .. } if !seen_tool_use => {
                    seen_tool_use = true;
                    true
                }
                _ => false,
            })
            .cloned()
            .collect()
    }
}

/// A hosted model that may answer directly or ask for a tool call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel {
    async fn complete(&self, messages: &[ChatMessage], tools: &[Tool]) -> McpResult<ModelReply>;
}
