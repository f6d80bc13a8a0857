use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Segment, ToolLifecycle, Transcript, TurnRole};

const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";
const DEFAULT_FILENAME: &str = "image.jpg";

/// Request body sent to the chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatStreamRequest {
    pub messages: Vec<WireMessage>,
}

impl ChatStreamRequest {
    pub fn from_transcript(transcript: &Transcript) -> Self {
        Self {
            messages: to_wire_messages(transcript),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `WireMessage` used across Tau components.
pub struct WireMessage {
    pub role: TurnRole,
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Enumerates supported `WirePart` values.
pub enum WirePart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    File {
        media_type: String,
        filename: String,
        url: String,
    },
    Reasoning {
        text: String,
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
}

impl From<&Segment> for WirePart {
    fn from(segment: &Segment) -> Self {
        match segment {
            Segment::Text { text, .. } => Self::Text { text: text.clone() },
            Segment::Reasoning { text, .. } => Self::Reasoning { text: text.clone() },
            Segment::Tool {
                tool_call_id,
                tool_name,
                input,
                output,
                lifecycle,
            } => Self::Tool {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                input: input.clone(),
                output: output.clone(),
                lifecycle: *lifecycle,
            },
            Segment::File {
                url,
                media_type,
                filename,
            } => Self::File {
                media_type: media_type
                    .clone()
                    .unwrap_or_else(|| infer_media_type(url).to_string()),
                filename: filename.clone().unwrap_or_else(|| filename_from_url(url)),
                url: url.clone(),
            },
        }
    }
}

/// Converts the full transcript into the outbound `{ role, parts }` history.
pub fn to_wire_messages(transcript: &Transcript) -> Vec<WireMessage> {
    transcript
        .turns()
        .iter()
        .map(|turn| WireMessage {
            role: turn.role,
            parts: turn.segments.iter().map(WirePart::from).collect(),
        })
        .collect()
}

/// Infers an image media type from the extension of a URL or filename.
pub fn infer_media_type(url_or_filename: &str) -> &'static str {
    let filename = filename_from_url(url_or_filename);
    let extension = filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "tiff" => "image/tiff",
        _ => DEFAULT_MEDIA_TYPE,
    }
}

/// Last path segment of a URL, ignoring any query string or fragment.
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_FILENAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{filename_from_url, infer_media_type, to_wire_messages, ChatStreamRequest};
    use crate::{ContentPart, Segment, ToolLifecycle, Transcript, Turn, TurnRole};

    #[test]
    fn unit_infer_media_type_maps_known_extensions_and_defaults_to_jpeg() {
        assert_eq!(infer_media_type("a/b/photo.JPG"), "image/jpeg");
        assert_eq!(infer_media_type("photo.png"), "image/png");
        assert_eq!(infer_media_type("https://x.test/a.svg?v=2"), "image/svg+xml");
        assert_eq!(infer_media_type("https://x.test/anim.gif#frag"), "image/gif");
        assert_eq!(infer_media_type("scan.tiff"), "image/tiff");
        assert_eq!(infer_media_type("https://x.test/blob"), "image/jpeg");
    }

    #[test]
    fn unit_filename_from_url_uses_last_path_segment() {
        assert_eq!(filename_from_url("https://x.test/a/b/cat.png?sig=1"), "cat.png");
        assert_eq!(filename_from_url("https://x.test/dir/"), "image.jpg");
        assert_eq!(filename_from_url("cat.png"), "cat.png");
    }

    #[test]
    fn functional_request_body_carries_full_history_in_wire_shape() {
        let user = Turn::from_content_parts(
            TurnRole::User,
            vec![
                ContentPart::text("what is this?"),
                ContentPart::file("https://cdn.example.com/u/dog.webp"),
            ],
        );
        let assistant = Turn::with_segments(
            TurnRole::Assistant,
            vec![
                Segment::reasoning("look closely"),
                Segment::Tool {
                    tool_call_id: "t1".to_string(),
                    tool_name: "describe".to_string(),
                    input: Some(json!({"url": "dog.webp"})),
                    output: Some(json!("a dog")),
                    lifecycle: ToolLifecycle::OutputReady,
                },
                Segment::text("A dog."),
            ],
        );
        let followup = Turn::user_text("thanks");
        let transcript = Transcript::from_turns(vec![user, assistant, followup]);

        let body = serde_json::to_value(ChatStreamRequest::from_transcript(&transcript))
            .expect("serialize request");

        assert_eq!(
            body,
            json!({
                "messages": [
                    {
                        "role": "user",
                        "parts": [
                            {"type": "text", "text": "what is this?"},
                            {
                                "type": "file",
                                "mediaType": "image/webp",
                                "filename": "dog.webp",
                                "url": "https://cdn.example.com/u/dog.webp"
                            }
                        ]
                    },
                    {
                        "role": "assistant",
                        "parts": [
                            {"type": "reasoning", "text": "look closely"},
                            {
                                "type": "tool",
                                "toolCallId": "t1",
                                "toolName": "describe",
                                "input": {"url": "dog.webp"},
                                "output": "a dog",
                                "lifecycle": "output-ready"
                            },
                            {"type": "text", "text": "A dog."}
                        ]
                    },
                    {"role": "user", "parts": [{"type": "text", "text": "thanks"}]}
                ]
            })
        );
    }

    #[test]
    fn regression_file_segment_without_metadata_gets_inferred_values() {
        let transcript = Transcript::from_turns(vec![Turn::with_segments(
            TurnRole::User,
            vec![Segment::file("https://cdn.example.com/raw")],
        )]);
        let messages = to_wire_messages(&transcript);
        let part = serde_json::to_value(&messages[0].parts[0]).expect("serialize part");
        assert_eq!(part["mediaType"], "image/jpeg");
        assert_eq!(part["filename"], "raw");
    }
}
