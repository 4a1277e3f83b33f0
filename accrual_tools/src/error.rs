use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccrualApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the accrual service: {0}")]
    Transport(String),
    #[error("The accrual service did not answer in time: {0}")]
    Timeout(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Malformed response from the accrual service: {0}")]
    MalformedResponse(String),
    #[error("Invalid Retry-After value: {0}")]
    InvalidRetryAfter(String),
    #[error("Unexpected response. Error {status}. {message}")]
    UnexpectedStatus { status: u16, message: String },
}

impl AccrualApiError {
    /// True when the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}
