use std::sync::Arc;

use thiserror::Error;

use reqflow_core::{ErrorKind, ExpectedVersion, RequisitionId};
use reqflow_events::EventEnvelope;
use reqflow_requisitions::AuditRecord;

/// A committed audit entry: stream position, storage time and the record.
///
/// `sequence_number()` is the requisition version reached by this entry.
pub type AuditEntry = EventEnvelope<AuditRecord>;

/// Audit log operation error.
///
/// These are storage failures, never business rejections: validation happens
/// in the workflow engine before `append` is called.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditLogError {
    #[error("optimistic concurrency check failed (expected {expected:?}, found {actual})")]
    Concurrency {
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("audit stream for {id} is corrupt: {reason}")]
    Corrupted { id: RequisitionId, reason: String },

    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}

impl AuditLogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditLogError::Concurrency { .. } => ErrorKind::Conflict,
            AuditLogError::Corrupted { .. } | AuditLogError::Unavailable(_) => {
                ErrorKind::StorageUnavailable
            }
        }
    }
}

/// Append-only, per-requisition audit log.
///
/// Each requisition owns one stream. Within a stream entries carry
/// gap-free sequence numbers starting at 1, and a batch is appended
/// atomically (all entries or none).
///
/// ## Implementation requirements
///
/// - `append` checks `expected` against the current stream version before
///   writing anything, and never rejects on business grounds.
/// - `read_page` returns entries with `sequence_number > after`, ascending,
///   at most `limit` of them.
/// - entries are never mutated or deleted.
pub trait AuditLog: Send + Sync {
    fn append(
        &self,
        id: RequisitionId,
        records: Vec<AuditRecord>,
        expected: ExpectedVersion,
    ) -> Result<Vec<AuditEntry>, AuditLogError>;

    fn read_page(
        &self,
        id: RequisitionId,
        after: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, AuditLogError>;

    /// Last sequence number of the stream (0 when it does not exist).
    fn current_version(&self, id: RequisitionId) -> Result<u64, AuditLogError>;

    /// Every requisition with at least one entry, ascending.
    fn stream_ids(&self) -> Result<Vec<RequisitionId>, AuditLogError>;
}

impl<L> AuditLog for Arc<L>
where
    L: AuditLog + ?Sized,
{
    fn append(
        &self,
        id: RequisitionId,
        records: Vec<AuditRecord>,
        expected: ExpectedVersion,
    ) -> Result<Vec<AuditEntry>, AuditLogError> {
        (**self).append(id, records, expected)
    }

    fn read_page(
        &self,
        id: RequisitionId,
        after: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, AuditLogError> {
        (**self).read_page(id, after, limit)
    }

    fn current_version(&self, id: RequisitionId) -> Result<u64, AuditLogError> {
        (**self).current_version(id)
    }

    fn stream_ids(&self) -> Result<Vec<RequisitionId>, AuditLogError> {
        (**self).stream_ids()
    }
}
