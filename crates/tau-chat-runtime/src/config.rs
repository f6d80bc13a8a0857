use reqwest::header::{HeaderName, HeaderValue};

use crate::ChatRuntimeError;

pub const DEFAULT_CHAT_API_URL: &str = "http://127.0.0.1:8787/api/v1/chat";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Header scoping a turn to a persisted chat record.
pub const CHAT_ID_HEADER: &str = "X-Chat-Id";

/// Endpoint and transport settings for a chat session.
///
/// Only connection establishment is bounded by a timeout; an open stream is read until the
/// server closes it or the turn is cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRuntimeConfig {
    pub api_url: String,
    pub headers: Vec<(String, String)>,
    pub connect_timeout_ms: u64,
    pub chat_id: Option<String>,
}

impl Default for ChatRuntimeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_CHAT_API_URL.to_string(),
            headers: Vec::new(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            chat_id: None,
        }
    }
}

impl ChatRuntimeConfig {
    pub fn validate(&self) -> Result<(), ChatRuntimeError> {
        if self.api_url.trim().is_empty() {
            return Err(ChatRuntimeError::InvalidConfig(
                "api_url must not be empty".to_string(),
            ));
        }
        for (name, value) in &self.headers {
            header_name(name)?;
            header_value(name, value)?;
        }
        if let Some(chat_id) = self.chat_id.as_deref() {
            header_value(CHAT_ID_HEADER, chat_id)?;
        }
        Ok(())
    }

    pub(crate) fn header_map(&self) -> Result<Vec<(HeaderName, HeaderValue)>, ChatRuntimeError> {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        for (name, value) in &self.headers {
            headers.push((header_name(name)?, header_value(name, value)?));
        }
        if let Some(chat_id) = self
            .chat_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            headers.push((
                HeaderName::from_static("x-chat-id"),
                header_value(CHAT_ID_HEADER, chat_id)?,
            ));
        }
        Ok(headers)
    }
}

/// Parses a `name:value` header argument.
pub fn parse_header_pair(raw: &str) -> Result<(String, String), ChatRuntimeError> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(ChatRuntimeError::InvalidConfig(format!(
            "header '{raw}' must use name:value form"
        )));
    };
    let name = name.trim();
    header_name(name)?;
    Ok((name.to_string(), value.trim().to_string()))
}

fn header_name(name: &str) -> Result<HeaderName, ChatRuntimeError> {
    HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| ChatRuntimeError::InvalidConfig(format!("invalid header name '{name}': {e}")))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ChatRuntimeError> {
    HeaderValue::from_str(value.trim()).map_err(|e| {
        ChatRuntimeError::InvalidConfig(format!("invalid value for header '{name}': {e}"))
    })
}
