use std::{fmt::Display, sync::Arc};

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{frame_stream, UiStreamError};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Typed payload of one `data:` frame, discriminated by its `type` field.
///
/// Unrecognized `type` values deserialize to [`UiStreamEvent::Unknown`] so newer servers
/// never break older clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiStreamEvent {
    Start,
    StartStep,
    FinishStep,
    Finish,
    TextDelta {
        delta: String,
    },
    ReasoningStart,
    ReasoningDelta {
        delta: String,
    },
    ReasoningEnd,
    #[serde(rename_all = "camelCase")]
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputDelta {
        tool_call_id: String,
        #[serde(alias = "inputTextDelta")]
        delta: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        output: Value,
    },
    #[serde(other)]
    Unknown,
}

impl UiStreamEvent {
    /// Wire name of the event type, used for structured logs.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StartStep => "start-step",
            Self::FinishStep => "finish-step",
            Self::Finish => "finish",
            Self::TextDelta { .. } => "text-delta",
            Self::ReasoningStart => "reasoning-start",
            Self::ReasoningDelta { .. } => "reasoning-delta",
            Self::ReasoningEnd => "reasoning-end",
            Self::ToolInputStart { .. } => "tool-input-start",
            Self::ToolInputDelta { .. } => "tool-input-delta",
            Self::ToolInputAvailable { .. } => "tool-input-available",
            Self::ToolOutputAvailable { .. } => "tool-output-available",
            Self::Unknown => "unknown",
        }
    }

    /// Tool call id referenced by tool lifecycle events.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::ToolInputStart { tool_call_id, .. }
            | Self::ToolInputDelta { tool_call_id, .. }
            | Self::ToolInputAvailable { tool_call_id, .. }
            | Self::ToolOutputAvailable { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        }
    }
}

pub type TextDeltaHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Returns the trimmed payload of a `data:` frame, or `None` for any other frame.
pub fn data_payload(frame: &str) -> Option<&str> {
    let payload = frame.trim().strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    Some(payload)
}

pub fn parse_event(payload: &str) -> Result<UiStreamEvent, UiStreamError> {
    Ok(serde_json::from_str(payload)?)
}

/// Extracts the event carried by one frame.
///
/// Non-data frames, the `[DONE]` sentinel and malformed payloads yield `None`; a bad frame
/// never aborts the surrounding stream.
pub fn extract_event(frame: &str) -> Option<UiStreamEvent> {
    let payload = data_payload(frame)?;
    if payload == DONE_SENTINEL {
        return None;
    }

    match parse_event(payload) {
        Ok(UiStreamEvent::Unknown) => {
            tracing::debug!(
                frame_len = frame.len(),
                "ignoring ui stream event with unrecognized type"
            );
            Some(UiStreamEvent::Unknown)
        }
        Ok(event) => Some(event),
        Err(error) => {
            tracing::debug!(
                frame_len = frame.len(),
                error = %error,
                "dropping malformed ui stream frame"
            );
            None
        }
    }
}

/// Filters a frame sequence down to typed events, preserving arrival order.
pub fn event_stream<S>(frames: S) -> impl Stream<Item = Result<UiStreamEvent, UiStreamError>>
where
    S: Stream<Item = Result<String, UiStreamError>>,
{
    frames.filter_map(|frame| async move {
        match frame {
            Ok(frame) => extract_event(&frame).map(Ok),
            Err(error) => Some(Err(error)),
        }
    })
}

/// Decodes a raw response body straight into typed events.
pub fn decode_events<S, B, E>(body: S) -> impl Stream<Item = Result<UiStreamEvent, UiStreamError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    event_stream(frame_stream(body))
}

/// Drains an event stream and returns the concatenated `text-delta` payloads.
///
/// Every non-empty delta is forwarded to `on_delta` as it arrives; other event types are
/// skipped. The first stream error is returned.
pub async fn collect_text<S>(
    events: S,
    on_delta: Option<TextDeltaHandler>,
) -> Result<String, UiStreamError>
where
    S: Stream<Item = Result<UiStreamEvent, UiStreamError>>,
{
    let mut events = Box::pin(events);
    let mut text = String::new();
    while let Some(event) = events.next().await {
        let UiStreamEvent::TextDelta { delta } = event? else {
            continue;
        };
        if delta.is_empty() {
            continue;
        }
        text.push_str(&delta);
        if let Some(handler) = on_delta.as_ref() {
            handler(delta);
        }
    }
    Ok(text)
}
