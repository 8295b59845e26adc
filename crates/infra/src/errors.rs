//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use syncline_domain::SynclineError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SynclineError);

impl From<InfraError> for SynclineError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SynclineError> for InfraError {
    fn from(value: SynclineError) -> Self {
        InfraError(value)
    }
}

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        if err.is_timeout() {
            return InfraError(SynclineError::Network("HTTP request timed out".into()));
        }

        if err.is_connect() {
            return InfraError(SynclineError::Network("HTTP connection failure".into()));
        }

        if err.is_decode() {
            return InfraError(SynclineError::MalformedResponse(format!(
                "response body could not be decoded: {err}"
            )));
        }

        if let Some(status) = err.status() {
            return InfraError(status_to_error(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status"),
            ));
        }

        InfraError(SynclineError::Network(err.to_string()))
    }
}

/// Map an HTTP status to the domain error taxonomy.
pub fn status_to_error(code: u16, message: &str) -> SynclineError {
    let message = format!("HTTP {code} {message}");
    match code {
        401 | 403 => SynclineError::Auth(message),
        404 => SynclineError::NotFound(message),
        429 => SynclineError::RateLimited(message),
        _ => SynclineError::Provider { status: code, message },
    }
}
