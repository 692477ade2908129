use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use reqflow_core::{ExpectedVersion, RequisitionId};
use reqflow_requisitions::AuditRecord;

use super::r#trait::{AuditEntry, AuditLog, AuditLogError};

/// In-memory audit log.
///
/// Intended for tests/dev. One `RwLock` guards every stream, so appends are
/// serialized globally; the workflow engine's per-requisition locks keep
/// contention on it short.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    streams: RwLock<BTreeMap<RequisitionId, Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(stream: Option<&Vec<AuditEntry>>) -> u64 {
        stream
            .and_then(|s| s.last())
            .map(|e| e.sequence_number())
            .unwrap_or(0)
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(
        &self,
        id: RequisitionId,
        records: Vec<AuditRecord>,
        expected: ExpectedVersion,
    ) -> Result<Vec<AuditEntry>, AuditLogError> {
        let mut streams = self
            .streams
            .write()
            .map_err(|_| AuditLogError::Unavailable("lock poisoned".to_string()))?;

        let current = Self::current(streams.get(&id));
        if !expected.matches(current) {
            return Err(AuditLogError::Concurrency {
                expected,
                actual: current,
            });
        }

        if records.is_empty() {
            return Ok(vec![]);
        }

        let recorded_at = Utc::now();
        let committed: Vec<AuditEntry> = records
            .into_iter()
            .zip(current + 1..)
            .map(|(record, seq)| AuditEntry::new(Uuid::now_v7(), id, seq, recorded_at, record))
            .collect();

        streams
            .entry(id)
            .or_default()
            .extend(committed.iter().cloned());

        Ok(committed)
    }

    fn read_page(
        &self,
        id: RequisitionId,
        after: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, AuditLogError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| AuditLogError::Unavailable("lock poisoned".to_string()))?;

        // Sequence numbers are 1-based and gap-free, so `after` is also an index.
        let Some(stream) = streams.get(&id) else {
            return Ok(vec![]);
        };
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(stream.len());
        Ok(stream[start..].iter().take(limit).cloned().collect())
    }

    fn current_version(&self, id: RequisitionId) -> Result<u64, AuditLogError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| AuditLogError::Unavailable("lock poisoned".to_string()))?;
        Ok(Self::current(streams.get(&id)))
    }

    fn stream_ids(&self) -> Result<Vec<RequisitionId>, AuditLogError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| AuditLogError::Unavailable("lock poisoned".to_string()))?;
        Ok(streams.keys().copied().collect())
    }
}
