//! Total mapping from raw HTTP outcomes to the typed error taxonomy.

use std::time::Duration;

use crate::error::CelestoError;

/// Fallback delay when a 429 response carries no usable Retry-After value.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Classify an HTTP response into a success body or a typed error.
///
/// The mapping is total: every status lands in exactly one arm, and any
/// status outside the classified set is reported as a server error carrying
/// the raw status rather than being dropped.
pub fn classify(
    status: u16,
    retry_after: Option<&str>,
    body: &str,
) -> Result<serde_json::Value, CelestoError> {
    match status {
        200 | 201 | 204 => Ok(parse_body(body)),
        401 | 403 => Err(CelestoError::Authentication {
            status,
            message: extract_message(body),
        }),
        404 => Err(CelestoError::NotFound {
            status: Some(status),
            message: extract_message(body),
        }),
        400 | 422 => Err(CelestoError::Validation {
            status,
            message: extract_message(body),
        }),
        429 => Err(CelestoError::RateLimit {
            status,
            message: extract_message(body),
            retry_after: parse_retry_after(retry_after),
        }),
        // 5xx and anything unclassified.
        _ => Err(CelestoError::Server {
            status,
            message: extract_message(body),
        }),
    }
}

fn parse_body(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or(serde_json::Value::Null)
}

/// Best-effort human message from an error body: well-known JSON fields
/// first, then the raw text, then a generic placeholder.
fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no detail provided by the server".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
