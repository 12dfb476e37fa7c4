use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Message Types ──────────────────────────────────────────────────────────

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A content block within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    Thinking {
        text: String,
    },
    Image {
        media_type: String,
        data: String,
    },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args: serde_json::Value) -> Self {
        ContentBlock::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        ContentBlock::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// True for ToolCall and ToolResult blocks
    pub fn is_tool_content(&self) -> bool {
        matches!(
            self,
            ContentBlock::ToolCall { .. } | ContentBlock::ToolResult { .. }
        )
    }
}

/// Metadata key marking a message as a compaction artifact rather than
/// original dialog.
pub const SUMMARY_METADATA_KEY: &str = "is_summary";

/// Metadata key recording which compaction generation produced a summary
/// (0 = original message or renewal meta-summary).
pub const GENERATION_METADATA_KEY: &str = "generation";

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    pub timestamp: DateTime<Utc>,
    /// Open key-value metadata. The reducer reserves
    /// [`SUMMARY_METADATA_KEY`] and [`GENERATION_METADATA_KEY`]; everything
    /// else passes through untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::new(
            Role::Tool,
            vec![ContentBlock::tool_result(tool_call_id, content, is_error)],
        )
    }

    /// Tag this message as a compaction summary of the given generation.
    /// Generation 0 is reserved for renewal meta-summaries.
    pub fn into_summary(mut self, generation: u64) -> Self {
        self.metadata
            .insert(SUMMARY_METADATA_KEY.into(), serde_json::Value::Bool(true));
        self.metadata.insert(
            GENERATION_METADATA_KEY.into(),
            serde_json::Value::from(generation),
        );
        self
    }

    /// Whether this message is a compaction artifact
    pub fn is_summary(&self) -> bool {
        self.metadata
            .get(SUMMARY_METADATA_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Compaction generation that produced this message (0 for originals)
    pub fn generation(&self) -> u64 {
        self.metadata
            .get(GENERATION_METADATA_KEY)
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    /// Check if this message contains tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, ContentBlock::ToolCall { .. }))
    }

    /// IDs of tool calls issued by this message
    pub fn tool_call_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|c| match c {
            ContentBlock::ToolCall { id, .. } => Some(id.as_str()),
            _ => None,
        })
    }

    /// IDs of tool calls answered by this message
    pub fn tool_result_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|c| match c {
            ContentBlock::ToolResult { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
    }

    /// Get text content concatenated
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
