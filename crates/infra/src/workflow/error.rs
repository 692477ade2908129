use thiserror::Error;

use reqflow_auth::AuthzError;
use reqflow_core::{DomainError, ErrorKind, RequisitionId};
use reqflow_core::ReservationId;
use reqflow_inventory::LedgerError;
use reqflow_requisitions::RequisitionStatus;

use crate::audit_log::AuditLogError;

/// Everything a workflow operation can fail with.
///
/// Each variant keeps its source error; `kind()` is the stable taxonomy
/// callers branch on.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("requisition {0} not found")]
    NotFound(RequisitionId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Storage(#[from] AuditLogError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("idempotency key '{0}' was already used for a different request")]
    IdempotencyMismatch(String),

    #[error("workflow engine unavailable: {0}")]
    Unavailable(String),

    /// The transition is recorded but its reservation was neither released
    /// nor debited; the next call on the requisition retries it.
    #[error("{id} is {status} but reservation {reservation} is not settled: {source}")]
    Unsettled {
        id: RequisitionId,
        status: RequisitionStatus,
        reservation: ReservationId,
        #[source]
        source: LedgerError,
    },
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::Domain(e) => e.kind(),
            WorkflowError::Forbidden(e) => e.kind(),
            WorkflowError::Storage(e) => e.kind(),
            WorkflowError::Ledger(e) => e.kind(),
            WorkflowError::IdempotencyMismatch(_) => ErrorKind::Conflict,
            WorkflowError::Unavailable(_) | WorkflowError::Unsettled { .. } => {
                ErrorKind::StorageUnavailable
            }
        }
    }
}
