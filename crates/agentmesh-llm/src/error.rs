use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model endpoint request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model endpoint returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("unexpected response shape from model endpoint: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type LlmResult<T> = Result<T, LlmError>;
