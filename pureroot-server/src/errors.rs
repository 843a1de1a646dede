//! Request and host errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pureroot::PureRootError;
use thiserror::Error;
use tracing::error;

/// Failure while serving one request. Always answered with a 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Composition(#[from] PureRootError),

    #[error("Failed to buffer response body: {0}")]
    Body(#[source] axum::Error),

    #[error("No request scope on this request; the scope layer must wrap every handler")]
    MissingScope,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(status = %status, error = %self, "Request failed");
        (status, self.to_string()).into_response()
    }
}

/// Failure of the host as a whole.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Composition(#[from] PureRootError),
}
