use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Anonymous free turn already spent, or the upstream rejected the token.
    #[error("authentication required")]
    AuthRequired,

    #[error("unknown character '{0}'")]
    UnknownCharacter(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("chat request failed: {0}")]
    Transport(String),

    #[error("completion contained no reply text")]
    EmptyReply,
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}
