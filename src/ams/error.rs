//! Transport-level errors of the Media Services client.

use thiserror::Error;

/// Longest slice of a response body kept in [`AmsError::Status`].
const MAX_BODY_CHARS: usize = 512;

/// Errors raised while talking to Azure AD, the Media Services REST API or
/// blob storage.
#[derive(Debug, Error)]
pub enum AmsError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not what the API documents.
    #[error("failed to parse service response: {0}")]
    Parse(String),

    /// The caller asked for something this client does not implement.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Reading or writing the local side of a transfer failed.
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AmsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AmsError::Timeout
        } else if e.is_decode() {
            AmsError::Parse(e.to_string())
        } else {
            AmsError::Request(e.to_string())
        }
    }
}

impl AmsError {
    /// Build a [`AmsError::Status`] from a failed response body, preferring
    /// the OData / Azure AD / blob error message when one can be found.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.chars().count() > MAX_BODY_CHARS {
                trimmed.chars().take(MAX_BODY_CHARS).collect::<String>() + "…"
            } else {
                trimmed.to_string()
            }
        });
        AmsError::Status { status, message }
    }
}

/// Pass successful responses through; turn everything else into
/// [`AmsError::Status`].
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AmsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AmsError::from_status(status.as_u16(), &body))
}

fn extract_message(body: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        // OData v3: {"odata.error": {"code", "message": {"lang", "value"}}}
        // OData verbose: {"error": {"code", "message": {"lang", "value"}}}
        for key in ["odata.error", "error"] {
            let err = &json[key];
            if let Some(value) = err["message"]["value"].as_str() {
                return Some(value.to_string());
            }
            if let Some(value) = err["message"].as_str() {
                return Some(value.to_string());
            }
        }
        // Azure AD: {"error": "invalid_client", "error_description": "..."}
        if let Some(desc) = json["error_description"].as_str() {
            return Some(desc.lines().next().unwrap_or(desc).to_string());
        }
        return None;
    }

    // Blob storage: <Error><Code>..</Code><Message>..</Message></Error>
    let start = body.find("<Message>")? + "<Message>".len();
    let end = body[start..].find("</Message>")? + start;
    Some(body[start..end].trim().to_string())
}
