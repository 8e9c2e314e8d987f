//! Error types for image generation.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur during image generation.
#[derive(Debug, thiserror::Error)]
pub enum GemImgError {
    /// No secret is stored for the provider.
    #[error("no API key stored for provider '{provider}'")]
    CredentialNotFound { provider: String },

    /// The secret store itself failed.
    #[error("credential store error: {0}")]
    Credential(String),

    /// Stored provider configuration could not be parsed.
    #[error("invalid configuration in {}: {message}", path.display())]
    ConfigInvalid { path: PathBuf, message: String },

    /// Transport failed after exhausting retries.
    #[error("network error after {attempts} attempt(s): {source}")]
    Network {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// API key rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The response carried no image.
    #[error("no results found: {0}")]
    NoResultsFound(String),

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Inline image payload could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecodeFailed(String),

    /// Input file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file has an extension we cannot send.
    #[error("unsupported image format '{extension}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connectivity-class failures seen by the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or body read failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// No response headers within the per-request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl GemImgError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Returns the HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for image generation operations.
pub type Result<T> = std::result::Result<T, GemImgError>;

/// Maximum length of an API error message kept in [`GemImgError::Api`].
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Reduces an API error body to something fit for an error message.
///
/// Google APIs wrap failures as `{"error": {"message": ...}}`; when that shape
/// is present only the message is kept. Anything else is trimmed and cut.
pub(crate) fn sanitize_error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(serde::Deserialize)]
    struct Inner {
        message: String,
    }

    if let Ok(envelope) = serde_json::from_str::<Envelope>(body) {
        return envelope.error.message;
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let cut: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
