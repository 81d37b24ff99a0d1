//! Transport to the external render service.

use crate::config::RenderParams;
use crate::error::RenderError;
use crate::extract;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Body of a render submission: `{ "input": { image, prompt, ...params } }`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub input: RenderInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderInput {
    pub image: String,
    pub prompt: String,
    #[serde(flatten)]
    pub params: RenderParams,
}

impl SubmitRequest {
    pub fn new(image: &str, prompt: &str, params: &RenderParams) -> Self {
        Self {
            input: RenderInput {
                image: image.to_string(),
                prompt: prompt.to_string(),
                params: params.clone(),
            },
        }
    }
}

/// The two calls the orchestrator makes against a render backend.
///
/// Implementations return the decoded JSON body of a successful response and
/// map anything else to a [`RenderError`]. Interpreting the body is left to
/// the submitter and poller.
#[async_trait]
pub trait RenderApi: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<Value, RenderError>;

    async fn status(&self, job_id: &str) -> Result<Value, RenderError>;
}

/// Endpoints of a hosted render proxy.
#[derive(Debug, Clone)]
pub struct RenderEndpoints {
    pub submit_url: String,
    pub status_url: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// [`RenderApi`] over HTTP/JSON.
pub struct HttpRenderApi {
    client: reqwest::Client,
    endpoints: RenderEndpoints,
}

impl HttpRenderApi {
    pub fn new(endpoints: RenderEndpoints) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .timeout(endpoints.timeout)
            .build()?;
        Ok(Self { client, endpoints })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.endpoints.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl RenderApi for HttpRenderApi {
    async fn submit(&self, request: &SubmitRequest) -> Result<Value, RenderError> {
        let resp = self
            .authorize(self.client.post(&self.endpoints.submit_url))
            .json(request)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn status(&self, job_id: &str) -> Result<Value, RenderError> {
        let resp = self
            .authorize(self.client.get(&self.endpoints.status_url))
            .query(&[("id", job_id)])
            .send()
            .await?;
        read_json(resp).await
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, RenderError> {
    let status = resp.status();
    let text = resp.text().await?;
    let body: Option<Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        let message = body
            .as_ref()
            .and_then(extract::error_message)
            .unwrap_or_else(|| format!("render request failed (HTTP {})", status.as_u16()));
        return Err(RenderError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    body.ok_or_else(|| RenderError::Transport("render service returned a non-JSON body".into()))
}
