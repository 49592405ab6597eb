//! Error types shared by every provider and the execution coordinator.

use std::time::Duration;

/// Longest error-body excerpt carried inside an error message.
const MAX_BODY_EXCERPT: usize = 500;

/// Errors that can occur while generating or editing an image.
#[derive(Debug, thiserror::Error)]
pub enum NanoRenderError {
    /// Missing API key, unknown provider type, or otherwise unusable config.
    #[error("configuration error: {0}")]
    Config(String),

    /// API key rejected or quota exhausted.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded (HTTP 429).
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// 2xx response whose body held no recognizable image in any known shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Well-formed response in which the model returned only text.
    #[error("no image produced: {0}")]
    NoImageProduced(String),

    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 or raster payload data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (config files, saving results).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request was cancelled before dispatch.
    #[error("cancelled")]
    Cancelled,
}

impl NanoRenderError {
    /// Returns true if this error is likely transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }

    /// Message suitable for direct display in a host status field.
    ///
    /// Auth and rate-limit failures get actionable phrasing instead of the
    /// bare HTTP vocabulary.
    pub fn status_message(&self) -> String {
        match self {
            Self::Auth(msg) => {
                format!("API key rejected ({msg}). Check your key and account quota.")
            }
            Self::RateLimited {
                retry_after: Some(delay),
            } => format!("Rate limit exceeded. Retry after {} seconds.", delay.as_secs()),
            Self::RateLimited { retry_after: None } => {
                "Rate limit exceeded. Wait a moment and retry.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, NanoRenderError>;

/// Extracts a `Retry-After` delay in seconds from response headers.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Truncates an error body to a displayable excerpt, collapsing whitespace.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() <= MAX_BODY_EXCERPT {
        collapsed
    } else {
        let mut end = MAX_BODY_EXCERPT;
        while !collapsed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &collapsed[..end])
    }
}

/// Maps a non-success HTTP status + body to the shared taxonomy.
///
/// Providers call this after their own provider-specific checks so that no
/// transport detail escapes the dispatch layer unclassified.
pub(crate) fn classify_http_error(
    status: u16,
    body: &str,
    headers: &reqwest::header::HeaderMap,
) -> NanoRenderError {
    let text = sanitize_error_message(body);
    match status {
        429 => NanoRenderError::RateLimited {
            retry_after: parse_retry_after(headers).map(Duration::from_secs),
        },
        401 | 403 => NanoRenderError::Auth(text),
        _ => NanoRenderError::Api {
            status,
            message: text,
        },
    }
}
