use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use tau_transcript::ChatStreamRequest;

use crate::{ChatRuntimeConfig, ChatRuntimeError};

/// Response body of a chat turn, delivered chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ChatRuntimeError>> + Send>>;

#[async_trait]
/// Trait contract for `ChatTransport` behavior.
pub trait ChatTransport: Send + Sync {
    /// Issues the request and resolves once the response headers arrive.
    ///
    /// Non-success statuses are reported here; the returned body is read lazily.
    async fn open_stream(&self, request: &ChatStreamRequest)
        -> Result<ByteStream, ChatRuntimeError>;
}

#[derive(Debug, Clone)]
/// Public struct `HttpChatTransport` used across Tau components.
pub struct HttpChatTransport {
    client: reqwest::Client,
    api_url: String,
}

impl HttpChatTransport {
    pub fn new(config: &ChatRuntimeConfig) -> Result<Self, ChatRuntimeError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        for (name, value) in config.header_map()? {
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim().to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open_stream(
        &self,
        request: &ChatStreamRequest,
    ) -> Result<ByteStream, ChatRuntimeError> {
        tracing::debug!(
            api_url = %self.api_url,
            messages = request.messages.len(),
            "opening chat stream"
        );
        let response = self.client.post(&self.api_url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatRuntimeError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ChatRuntimeError::from));
        Ok(Box::pin(body))
    }
}
