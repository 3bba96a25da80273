//! Error types for image generation and history persistence.

use std::fmt;
use std::time::Duration;

/// Maximum length of a remote error message carried into an error value.
const MAX_REMOTE_MESSAGE_LEN: usize = 2000;

/// Which kind of generation operation an error or guard refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Text-to-image generation.
    Generate,
    /// High-resolution regeneration of an existing record.
    Upscale,
}

impl Operation {
    /// Returns the operation name used in messages and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Upscale => "upscale",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reported by the remote image API or the transport to it.
///
/// These are passed through to the user verbatim; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit or quota exceeded. `message` is the API's own text.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The response could not be interpreted.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Errors that can occur while generating, upscaling or persisting images.
#[derive(Debug, thiserror::Error)]
pub enum PixelGenError {
    /// No API credential could be resolved from the environment.
    #[error("API key is missing. Set {0} in the environment.")]
    CredentialMissing(String),

    /// The remote reply contained no inline image part.
    #[error("No image data found in the {0} response.")]
    NoImageInResponse(Operation),

    /// A stored image could not be split into a mime type and payload.
    #[error("invalid source image: {0}")]
    InvalidSourceImage(String),

    /// The remote request failed.
    #[error(transparent)]
    RemoteRequestFailed(#[from] RemoteError),

    /// Persisted history could not be parsed.
    #[error("history storage is corrupt: {0}")]
    PersistenceReadCorrupt(String),

    /// The user dismissed the interactive credential picker.
    #[error("credential selection cancelled")]
    CredentialSelectionCancelled,

    /// An operation of the same kind is already running.
    #[error("a {0} operation is already in progress")]
    Busy(Operation),

    /// A record with this id is already in the history.
    #[error("duplicate record id {0}")]
    DuplicateRecord(String),

    /// The history slot exists but could not be read; it is left untouched.
    #[error("history storage is unavailable: {0}")]
    PersistenceUnavailable(String),

    /// The prompt was empty or too long.
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    /// No record with the given id exists in the history.
    #[error("no image with id {0}")]
    RecordNotFound(String),

    /// I/O error (history slot, export).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PixelGenError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteRequestFailed(RemoteError::Network(err))
    }
}

impl PixelGenError {
    /// Returns true if this error should not be shown as an error banner.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::CredentialSelectionCancelled)
    }
}

/// Result type alias for pixelgen operations.
pub type Result<T> = std::result::Result<T, PixelGenError>;

/// Trims a remote error body and caps its length at a char boundary.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let text = text.trim();
    if text.len() <= MAX_REMOTE_MESSAGE_LEN {
        return text.to_string();
    }
    let mut end = MAX_REMOTE_MESSAGE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PixelGenError::from(RemoteError::Api {
            status: 403,
            message: "Quota exceeded for this project".into(),
        });
        assert_eq!(
            err.to_string(),
            "API error: 403 - Quota exceeded for this project"
        );

        let err = PixelGenError::from(RemoteError::RateLimited {
            message: "You exceeded your current quota".into(),
            retry_after: None,
        });
        assert_eq!(err.to_string(), "rate limited: You exceeded your current quota");

        let err = PixelGenError::NoImageInResponse(Operation::Upscale);
        assert_eq!(err.to_string(), "No image data found in the upscale response.");

        let err = PixelGenError::CredentialMissing("API_KEY".into());
        assert_eq!(
            err.to_string(),
            "API key is missing. Set API_KEY in the environment."
        );
    }

    #[test]
    fn test_only_cancellation_is_silent() {
        assert!(PixelGenError::CredentialSelectionCancelled.is_silent());
        assert!(!PixelGenError::Busy(Operation::Upscale).is_silent());
        assert!(!PixelGenError::InvalidSourceImage("bad".into()).is_silent());
    }

    #[test]
    fn test_sanitize_error_message() {
        assert_eq!(sanitize_error_message("  oops \n"), "oops");

        let long = "é".repeat(MAX_REMOTE_MESSAGE_LEN);
        let sanitized = sanitize_error_message(&long);
        assert!(sanitized.ends_with("..."));
        assert!(sanitized.len() <= MAX_REMOTE_MESSAGE_LEN + 3);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(30));

        headers.insert(reqwest::header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }
}
