use thiserror::Error;

use crate::http::parser::ParseError;
use crate::http::response::StatusCode;

/// Errors a handler can raise to pick a specific error status.
///
/// Anything a handler returns that is not an `HttpError` is rendered as a
/// 500 by the connection loop.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request could not be parsed or violated a limit.
    #[error("bad request: {0}")]
    BadRequest(#[from] ParseError),

    /// The referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Access to the resource is denied.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The resource exists but does not accept this method.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BadRequest,
            HttpError::NotFound(_) => StatusCode::NotFound,
            HttpError::Forbidden(_) => StatusCode::Forbidden,
            HttpError::MethodNotAllowed(_) => StatusCode::MethodNotAllowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(HttpError::NotFound("/x".into()).status(), StatusCode::NotFound);
        assert_eq!(HttpError::Forbidden("/x".into()).status(), StatusCode::Forbidden);
        assert_eq!(
            HttpError::BadRequest(ParseError::PrematureBoundary).status(),
            StatusCode::BadRequest
        );
    }

    #[test]
    fn test_display() {
        let err = HttpError::NotFound("/missing.txt".into());
        assert_eq!(err.to_string(), "not found: /missing.txt");
    }
}
