//! Contracts for the services a chat client talks to besides the chat endpoint.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tau_transcript::{infer_media_type, ContentPart, PersistedMessage};

use crate::ChatRuntimeError;

const NOT_AN_IMAGE_MESSAGE: &str = "Please upload an image file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `ChatRecord` used across Tau components.
pub struct ChatRecord {
    pub id: String,
}

#[async_trait]
/// Persists chats and returns their stored messages.
pub trait ChatRecordService: Send + Sync {
    async fn create_chat(&self) -> Result<ChatRecord, ChatRuntimeError>;

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<PersistedMessage>, ChatRuntimeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `UploadRequest` used across Tau components.
pub struct UploadRequest {
    pub filename: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    /// Builds a request whose media type is inferred from the filename extension.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let media_type = infer_media_type(&filename).to_string();
        Self {
            filename,
            media_type,
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `UploadedAsset` used across Tau components.
pub struct UploadedAsset {
    pub url: String,
}

impl UploadedAsset {
    /// File content part referencing this asset, carrying the uploaded file's metadata.
    pub fn content_part(&self, request: &UploadRequest) -> ContentPart {
        ContentPart::File {
            url: self.url.clone(),
            media_type: Some(request.media_type.clone()),
            filename: Some(request.filename.clone()),
        }
    }
}

#[async_trait]
/// Stores user-supplied files and returns a URL the chat endpoint can fetch.
pub trait AssetStorage: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<UploadedAsset, ChatRuntimeError>;
}

/// Uploads an image, rejecting any other media type before storage is contacted.
pub async fn upload_image(
    storage: &dyn AssetStorage,
    request: UploadRequest,
) -> Result<UploadedAsset, ChatRuntimeError> {
    if !request.is_image() {
        return Err(ChatRuntimeError::Validation(
            NOT_AN_IMAGE_MESSAGE.to_string(),
        ));
    }
    let filename = request.filename.clone();
    let asset = storage.upload(request).await?;
    tracing::debug!(filename = %filename, url = %asset.url, "uploaded image asset");
    Ok(asset)
}
