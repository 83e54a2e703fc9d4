use crate::shared::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store unreachable: {0}")]
    Transport(String),

    #[error("Remote store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to decode remote response: {0}")]
    Decode(String),

    #[error("Unexpected remote response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        if err.is_transport() {
            AppError::Network(err.to_string())
        } else {
            AppError::Remote(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
