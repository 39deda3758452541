use thiserror::Error;

/// Why a breakdown fetch failed. Every variant ends the fetch cycle in the
/// `Failed` state; none is retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("stats API responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid API url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
