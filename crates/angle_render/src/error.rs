use thiserror::Error;

/// Everything that can go wrong while rendering a single view.
///
/// None of these are fatal to the process. A failed view keeps its error
/// message and the rest of the run carries on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The source image payload was empty. Rejected before any network call.
    #[error("no source image provided")]
    EmptyImage,

    /// The render service answered with a non-success HTTP status.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// The request never produced a usable HTTP response.
    #[error("render request failed: {0}")]
    Transport(String),

    /// The submission response carried neither images nor a job id.
    #[error("missing job id")]
    MissingJobId,

    /// The job reported a terminal failure status.
    #[error("{0}")]
    JobFailed(String),

    /// The poll budget was exhausted before the job resolved.
    #[error("render timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// The run this work belonged to has been superseded.
    #[error("cancelled")]
    Cancelled,
}

impl RenderError {
    /// Cancellation is not a failure; callers drop it silently.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderError::Cancelled)
    }
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        RenderError::Transport(err.to_string())
    }
}
