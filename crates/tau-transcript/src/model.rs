use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

static TURN_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `TurnRole` values.
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Completion state of a text or reasoning segment. Only ever advances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum StreamLifecycle {
    Streaming,
    Complete,
}

/// Tool call sub-states, ordered so the derived `Ord` matches the allowed direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ToolLifecycle {
    InputStarting,
    InputStreaming,
    InputReady,
    OutputReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `SegmentKind` values.
pub enum SegmentKind {
    Text,
    Reasoning,
    Tool,
    File,
}

/// One typed content unit of a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text {
        text: String,
        lifecycle: StreamLifecycle,
    },
    Reasoning {
        text: String,
        lifecycle: StreamLifecycle,
    },
    #[serde(rename_all = "camelCase")]
    Tool {
        tool_call_id: String,
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        lifecycle: ToolLifecycle,
    },
    #[serde(rename_all = "camelCase")]
    File {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            lifecycle: StreamLifecycle::Complete,
        }
    }

    pub fn streaming_text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            lifecycle: StreamLifecycle::Streaming,
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning {
            text: text.into(),
            lifecycle: StreamLifecycle::Complete,
        }
    }

    pub fn streaming_reasoning() -> Self {
        Self::Reasoning {
            text: String::new(),
            lifecycle: StreamLifecycle::Streaming,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            input: None,
            output: None,
            lifecycle: ToolLifecycle::InputStarting,
        }
    }

    pub fn file(url: impl Into<String>) -> Self {
        Self::File {
            url: url.into(),
            media_type: None,
            filename: None,
        }
    }

    pub fn kind(&self) -> SegmentKind {
        match self {
            Self::Text { .. } => SegmentKind::Text,
            Self::Reasoning { .. } => SegmentKind::Reasoning,
            Self::Tool { .. } => SegmentKind::Tool,
            Self::File { .. } => SegmentKind::File,
        }
    }

    /// True for a text or reasoning segment still receiving deltas.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            Self::Text {
                lifecycle: StreamLifecycle::Streaming,
                ..
            } | Self::Reasoning {
                lifecycle: StreamLifecycle::Streaming,
                ..
            }
        )
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        }
    }

    /// Forces a streaming text or reasoning segment to complete. Other segments are untouched.
    pub fn complete(&mut self) {
        if let Self::Text { lifecycle, .. } | Self::Reasoning { lifecycle, .. } = self {
            *lifecycle = StreamLifecycle::Complete;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Public struct `Turn` used across Tau components.
pub struct Turn {
    pub id: String,
    pub role: TurnRole,
    pub segments: Vec<Segment>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole) -> Self {
        Self::with_segments(role, Vec::new())
    }

    pub fn with_segments(role: TurnRole, segments: Vec<Segment>) -> Self {
        Self {
            id: new_turn_id(role),
            role,
            segments,
            created_at: Utc::now(),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::with_segments(TurnRole::User, vec![Segment::text(text)])
    }

    /// Concatenated text of all text segments, in order.
    pub fn text_content(&self) -> String {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_segment(&self, tool_call_id: &str) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|segment| segment.tool_call_id() == Some(tool_call_id))
    }

    pub fn has_streaming_segments(&self) -> bool {
        self.segments.iter().any(Segment::is_streaming)
    }
}

/// Ordered turns of one conversation.
///
/// Turns are shared behind `Arc`, so cloning a transcript copies pointers only and replacing
/// one turn leaves every other turn shared with earlier clones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<Arc<Turn>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns: turns.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn turns(&self) -> &[Arc<Turn>] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last().map(Arc::as_ref)
    }

    pub fn turn(&self, id: &str) -> Option<&Turn> {
        self.shared_turn(id).map(Arc::as_ref)
    }

    pub fn shared_turn(&self, id: &str) -> Option<&Arc<Turn>> {
        self.turns.iter().rev().find(|turn| turn.id == id)
    }

    pub fn push_turn(&mut self, turn: impl Into<Arc<Turn>>) {
        self.turns.push(turn.into());
    }

    /// Replaces the turn carrying the same id. Returns false when no such turn exists.
    pub fn replace_turn(&mut self, turn: impl Into<Arc<Turn>>) -> bool {
        let turn = turn.into();
        match self.turns.iter_mut().rev().find(|slot| slot.id == turn.id) {
            Some(slot) => {
                *slot = turn;
                true
            }
            None => false,
        }
    }
}

impl Serialize for Transcript {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.turns.iter().map(Arc::as_ref))
    }
}

impl<'de> Deserialize<'de> for Transcript {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Turn>::deserialize(deserializer).map(Self::from_turns)
    }
}

/// Allocates a turn id unique within the process: `msg-<unix-millis>-<role>-<counter>`.
pub fn new_turn_id(role: TurnRole) -> String {
    let millis = Utc::now().timestamp_millis();
    let count = TURN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("msg-{millis}-{}-{count}", role.as_str())
}
