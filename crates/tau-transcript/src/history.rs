use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{new_turn_id, Segment, ToolLifecycle, Transcript, Turn, TurnRole};

const TOOL_PART_TYPE_PREFIX: &str = "tool-";

/// A message as returned by the chat-record service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: TurnRole,
    #[serde(default)]
    pub parts: Vec<Value>,
    #[serde(default, alias = "created_at", alias = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Rebuilds a finished turn from a persisted message.
///
/// Every segment is terminal. Unrecognized parts are dropped, and a message without usable
/// parts gets one empty text segment so it still occupies its slot in the transcript.
pub fn turn_from_persisted(message: PersistedMessage) -> Turn {
    let mut segments: Vec<Segment> = message
        .parts
        .iter()
        .filter_map(segment_from_persisted_part)
        .collect();
    if segments.is_empty() {
        segments.push(Segment::text(""));
    }

    Turn {
        id: message
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| new_turn_id(message.role)),
        role: message.role,
        segments,
        created_at: message.created_at.unwrap_or_else(Utc::now),
    }
}

pub fn transcript_from_history(messages: Vec<PersistedMessage>) -> Transcript {
    Transcript::from_turns(messages.into_iter().map(turn_from_persisted).collect())
}

fn segment_from_persisted_part(part: &Value) -> Option<Segment> {
    let part_type = part.get("type").and_then(Value::as_str)?;
    let text_field = |name: &str| part.get(name).and_then(Value::as_str).map(str::to_string);

    match part_type {
        "text" => Some(Segment::text(text_field("text").unwrap_or_default())),
        "reasoning" => Some(Segment::reasoning(text_field("text").unwrap_or_default())),
        "file" => {
            let url = text_field("url").filter(|url| !url.trim().is_empty())?;
            Some(Segment::File {
                url,
                media_type: text_field("mediaType"),
                filename: text_field("filename"),
            })
        }
        tool_type if tool_type == "tool" || tool_type.starts_with(TOOL_PART_TYPE_PREFIX) => {
            let tool_call_id = text_field("toolCallId")?;
            let tool_name = text_field("toolName")
                .or_else(|| {
                    tool_type
                        .strip_prefix(TOOL_PART_TYPE_PREFIX)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            let input = part.get("input").filter(|value| !value.is_null()).cloned();
            let output = part.get("output").filter(|value| !value.is_null()).cloned();
            let lifecycle = if output.is_some() {
                ToolLifecycle::OutputReady
            } else if input.is_some() {
                ToolLifecycle::InputReady
            } else {
                ToolLifecycle::InputStarting
            };
            Some(Segment::Tool {
                tool_call_id,
                tool_name,
                input,
                output,
                lifecycle,
            })
        }
        other => {
            tracing::debug!(part_type = other, "dropping unrecognized persisted part");
            None
        }
    }
}
