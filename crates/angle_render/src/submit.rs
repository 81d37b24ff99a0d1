use crate::api::{RenderApi, SubmitRequest};
use crate::config::RenderParams;
use crate::error::RenderError;
use crate::extract;
use serde_json::Value;

/// Images produced for one view. Always holds at least one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    images: Vec<String>,
    seed: Option<i64>,
}

impl Rendered {
    /// `None` when `images` is empty.
    pub fn new(images: Vec<String>, seed: Option<i64>) -> Option<Self> {
        (!images.is_empty()).then_some(Self { images, seed })
    }

    /// Pulls images out of a response body, or `None` if it has none yet.
    pub fn from_body(body: &Value) -> Option<Self> {
        Self::new(extract::images(body), extract::seed(body))
    }

    pub fn first(&self) -> &str {
        &self.images[0]
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn seed(&self) -> Option<i64> {
        self.seed
    }
}

/// What a submission came back with.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The backend rendered synchronously.
    Inline(Rendered),
    /// The backend queued the work; poll this id.
    Job(String),
}

/// Submits one view for rendering.
///
/// An empty `image` is rejected before any request is made.
pub async fn submit_view(
    api: &dyn RenderApi,
    prompt: &str,
    image: &str,
    params: &RenderParams,
) -> Result<Submission, RenderError> {
    if image.trim().is_empty() {
        return Err(RenderError::EmptyImage);
    }

    let body = api.submit(&SubmitRequest::new(image, prompt, params)).await?;

    if let Some(rendered) = Rendered::from_body(&body) {
        return Ok(Submission::Inline(rendered));
    }
    extract::job_id(&body)
        .map(Submission::Job)
        .ok_or(RenderError::MissingJobId)
}
