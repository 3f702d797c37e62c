use vestra_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Bad local input, raised before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server rejected the request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Case not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
