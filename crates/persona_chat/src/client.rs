//! Completion endpoint client.

use crate::error::ChatError;
use crate::store::Role;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

/// Where the reply text may sit in a completion object, in probe order.
pub const REPLY_PATHS: &[&str] = &[
    "/choices/0/message/content",
    "/content/0/text",
    "/message/content",
    "/reply",
    "/text",
];

const ERROR_PATHS: &[&str] = &["/error/message", "/error", "/message"];

#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Returns the assistant's reply text.
    async fn complete(
        &self,
        bearer: Option<&str>,
        request: &CompletionRequest,
    ) -> Result<String, ChatError>;
}

pub struct ChatClient {
    client: reqwest::Client,
    url: String,
}

impl ChatClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CompletionApi for ChatClient {
    async fn complete(
        &self,
        bearer: Option<&str>,
        request: &CompletionRequest,
    ) -> Result<String, ChatError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ChatError::AuthRequired);
        }
        if !status.is_success() {
            let message = first_str(&body, ERROR_PATHS)
                .map(str::to_string)
                .unwrap_or_else(|| format!("chat request failed (HTTP {})", status.as_u16()));
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        reply_text(&body).ok_or(ChatError::EmptyReply)
    }
}

/// Pulls the reply out of an upstream-shaped completion object.
pub fn reply_text(body: &Value) -> Option<String> {
    first_str(body, REPLY_PATHS).map(str::to_string)
}

fn first_str<'a>(body: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| body.pointer(path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}
