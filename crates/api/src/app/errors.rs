use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use reqflow_auth::AuthzError;
use reqflow_core::{DomainError, ErrorKind};
use reqflow_infra::projections::BoardError;
use reqflow_infra::workflow::WorkflowError;
use reqflow_inventory::LedgerError;

/// Every failure a handler can return. Rendered as `{kind, message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Workflow(e) => e.kind(),
            ApiError::Domain(e) => e.kind(),
            ApiError::Forbidden(e) => e.kind(),
            ApiError::Board(e) => e.kind(),
            ApiError::Ledger(e) => e.kind(),
            ApiError::BadRequest(_) => ErrorKind::ValidationFailed,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Internal(_) => ErrorKind::StorageUnavailable,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if status_for(kind).is_server_error() {
            tracing::warn!(%kind, error = %self, "request failed");
        }
        json_error(kind, self.to_string())
    }
}

/// HTTP status for an error kind: 404/403/409/400, everything else 500.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidTransition
        | ErrorKind::Shortage
        | ErrorKind::VendorUnavailable
        | ErrorKind::StorageUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn json_error(kind: ErrorKind, message: impl Into<String>) -> Response {
    (
        status_for(kind),
        axum::Json(json!({
            "kind": kind,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_core::{ExpectedVersion, RequisitionId};
    use reqflow_infra::audit_log::AuditLogError;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::ValidationFailed), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::InvalidTransition),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(ErrorKind::StorageUnavailable),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn workflow_errors_keep_their_kind() {
        let missing = ApiError::from(WorkflowError::NotFound(
            RequisitionId::from_sequence(3).unwrap(),
        ));
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let stale = ApiError::from(WorkflowError::from(AuditLogError::Concurrency {
            expected: ExpectedVersion::Exact(1),
            actual: 2,
        }));
        assert_eq!(stale.into_response().status(), StatusCode::CONFLICT);
    }
}
