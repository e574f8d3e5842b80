use thiserror::Error;

/// Failures talking to Microsoft Graph, plus the name-resolution misses
/// layered on top of its listings.
///
/// The not-found variants carry the names that WERE available at that
/// scope so a denied caller can correct itself without a second listing
/// round-trip.
#[derive(Debug, Error, Clone)]
pub enum GraphError {
    #[error("Token acquisition failed: {0}")]
    Token(String),

    #[error("Graph request failed: {0}")]
    Http(String),

    #[error("Graph API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Unexpected Graph response shape: {0}")]
    Decode(String),

    #[error("Drive not found: {name}")]
    DriveNotFound { name: String, available: Vec<String> },

    #[error("Item not found: {name}")]
    ItemNotFound { name: String, available: Vec<String> },

    #[error("Worksheet not found: {name}")]
    WorksheetNotFound { name: String, available: Vec<String> },
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        GraphError::Http(err.to_string())
    }
}
