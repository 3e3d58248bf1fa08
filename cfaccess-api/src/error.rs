use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote service responded with status {status}: {}", .messages.join("; "))]
    Status { status: u16, messages: Vec<String> },

    /// The response was well-formed, but `success` was false.
    #[error("remote service rejected the request: {}", .0.join("; "))]
    Rejected(Vec<String>),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response did not contain a result")]
    MissingResult,

    #[error("zone {0} not found")]
    ZoneNotFound(String),
}
