//! Error types for the server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drawmirror_core::CoreError;
use drawmirror_sync_engine::PullError;
use drawmirror_sync_protocol::ErrorBody;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Local storage or registry failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A pull triggered through the API failed.
    #[error(transparent)]
    Pull(#[from] PullError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Core(err) => core_status(err),
            ServerError::Pull(err) => match err {
                PullError::UnknownNode { .. } => StatusCode::NOT_FOUND,
                PullError::PullInProgress | PullError::Cancelled => StatusCode::CONFLICT,
                PullError::Network { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
                PullError::Network { .. }
                | PullError::Remote { .. }
                | PullError::CorruptArchive { .. }
                | PullError::UnsupportedVersion { .. } => StatusCode::BAD_GATEWAY,
                PullError::ReplaceFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                PullError::Local(err) => core_status(err),
            },
            ServerError::Internal(_) | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// Machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Core(err) => match err {
                CoreError::DuplicateName { .. } => "duplicate_name",
                CoreError::DuplicateEndpoint { .. } => "duplicate_endpoint",
                CoreError::NotFound { .. } => "not_found",
                CoreError::InvalidInput { .. } => "invalid_input",
                CoreError::ReplaceFailed { .. } => "replace_failed",
                _ => "local",
            },
            ServerError::Pull(err) => err.kind(),
            ServerError::Internal(_) | ServerError::Io(_) => "internal",
        }
    }

    /// Whether local state is known to be unchanged.
    pub fn is_safe_to_retry(&self) -> bool {
        match self {
            ServerError::Pull(err) => err.is_safe_to_retry(),
            ServerError::Core(CoreError::ReplaceFailed { rolled_back, .. }) => *rolled_back,
            _ => true,
        }
    }

    /// The JSON body sent to the operator.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind().to_string(),
            error: self.to_string(),
            safe_to_retry: self.is_safe_to_retry(),
        }
    }
}

fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::DuplicateName { .. } | CoreError::DuplicateEndpoint { .. } => {
            StatusCode::CONFLICT
        }
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
    }

    #[test]
    fn pull_errors_map_to_statuses() {
        let err = ServerError::from(PullError::PullInProgress);
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = ServerError::from(PullError::timeout("slow"));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);

        let err = ServerError::from(PullError::corrupt("bad checksum"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), "corrupt_archive");
    }

    #[test]
    fn registry_errors_map_to_statuses() {
        let err = ServerError::from(CoreError::DuplicateName {
            name: "mirror".into(),
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), "duplicate_name");

        let err = ServerError::from(CoreError::node_not_found("ghost"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unrolled_replace_is_flagged() {
        let err = ServerError::from(PullError::ReplaceFailed {
            message: "disk".into(),
            rolled_back: false,
        });
        let body = err.to_body();
        assert!(!body.safe_to_retry);
        assert_eq!(body.kind, "replace_failed");
        assert!(body.error.contains("rolled back: false"));
    }
}
