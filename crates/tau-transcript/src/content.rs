use serde::{Deserialize, Serialize};

use crate::{filename_from_url, infer_media_type, Segment, Turn, TurnRole};

const DEFAULT_IMAGE_PROMPT: &str = "Please analyze this image";

/// Caller-supplied content for a new turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Reference to content already uploaded to asset storage.
    #[serde(rename_all = "camelCase")]
    File {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn file(url: impl Into<String>) -> Self {
        Self::File {
            url: url.into(),
            media_type: None,
            filename: None,
        }
    }

    fn is_submittable(&self) -> bool {
        match self {
            Self::Text { text } => !text.trim().is_empty(),
            Self::File { url, .. } => !url.trim().is_empty(),
        }
    }

    fn into_segment(self) -> Segment {
        match self {
            Self::Text { text } => Segment::text(text),
            Self::File {
                url,
                media_type,
                filename,
            } => {
                let media_type = media_type.unwrap_or_else(|| infer_media_type(&url).to_string());
                let filename = filename.unwrap_or_else(|| filename_from_url(&url));
                Segment::File {
                    url,
                    media_type: Some(media_type),
                    filename: Some(filename),
                }
            }
        }
    }
}

/// True when at least one part is non-blank text or references uploaded content.
pub fn has_submittable_content(parts: &[ContentPart]) -> bool {
    parts.iter().any(ContentPart::is_submittable)
}

/// Builds the parts of a user submission.
///
/// Each image is sent twice: as a markdown image reference inside a text part, and as a file
/// part. A blank prompt alongside at least one image becomes a default analysis request.
pub fn compose_prompt_parts(prompt: &str, image_urls: &[String]) -> Vec<ContentPart> {
    let image_urls: Vec<&str> = image_urls
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .collect();

    let mut parts = Vec::with_capacity(image_urls.len() * 2 + 1);
    for url in &image_urls {
        parts.push(ContentPart::text(format!("![Image]({url})")));
        parts.push(ContentPart::file(*url));
    }

    if prompt.trim().is_empty() && !image_urls.is_empty() {
        parts.push(ContentPart::text(DEFAULT_IMAGE_PROMPT));
    } else {
        parts.push(ContentPart::text(prompt));
    }
    parts
}

impl Turn {
    /// Builds a completed turn from submitted content parts.
    pub fn from_content_parts(role: TurnRole, parts: Vec<ContentPart>) -> Self {
        let segments = parts.into_iter().map(ContentPart::into_segment).collect();
        Self::with_segments(role, segments)
    }
}
