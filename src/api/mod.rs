//! Axum HTTP handlers.

pub mod search;
pub mod update;

use axum::http::StatusCode;

use crate::error::Error;

pub type ApiError = (StatusCode, String);

/// Status code for a core error. Client input problems are 400, never 500.
pub fn status_of(error: &Error) -> StatusCode {
    match error {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::SyncConflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn api_error(error: Error) -> ApiError {
    let status = status_of(&error);
    if status.is_server_error() {
        tracing::error!("Request failed: {error}");
    }
    (status, error.to_string())
}

/// Run a blocking core call off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Task failed: {e}"),
            )
        })?
        .map_err(api_error)
}
