//! Requisition store: id allocation and rehydration from the audit log.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqflow_core::{AggregateRoot, DomainError, RequisitionId};
use reqflow_requisitions::Requisition;

use crate::audit_log::{AuditEntry, AuditLog, AuditLogError, history};

/// Owns requisition identity and lifecycle state.
///
/// State is never stored separately from the log: `load` replays the
/// requisition's audit stream, so the aggregate and its audit trail cannot
/// diverge.
pub struct RequisitionStore {
    log: Arc<dyn AuditLog>,
    next_sequence: AtomicU64,
}

impl core::fmt::Debug for RequisitionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequisitionStore")
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

impl RequisitionStore {
    /// Id allocation resumes after the highest id already in the log.
    pub fn new(log: Arc<dyn AuditLog>) -> Result<Self, AuditLogError> {
        let last = log
            .stream_ids()?
            .into_iter()
            .map(|id| id.sequence())
            .max()
            .unwrap_or(0);

        Ok(Self {
            log,
            next_sequence: AtomicU64::new(last + 1),
        })
    }

    pub fn log(&self) -> &Arc<dyn AuditLog> {
        &self.log
    }

    /// Reserve the next `REQ-NNNN` id. Ids are never reused, even when the
    /// creation that claimed one is rejected.
    pub fn allocate_id(&self) -> Result<RequisitionId, DomainError> {
        RequisitionId::from_sequence(self.next_sequence.fetch_add(1, Ordering::SeqCst))
    }

    /// Rehydrate a requisition; `None` when no entry exists for `id`.
    pub fn load(&self, id: RequisitionId) -> Result<Option<Requisition>, AuditLogError> {
        Ok(self.load_with_history(id)?.map(|(req, _)| req))
    }

    /// Rehydrate a requisition and return the entries it was built from.
    pub fn load_with_history(
        &self,
        id: RequisitionId,
    ) -> Result<Option<(Requisition, Vec<AuditEntry>)>, AuditLogError> {
        let entries = history(&*self.log, id).to_vec()?;
        if entries.is_empty() {
            return Ok(None);
        }
        validate_stream(id, &entries)?;

        let req = Requisition::replay(id, entries.iter().map(|e| e.payload()));
        if req.version() != entries.len() as u64 || !req.exists() {
            return Err(AuditLogError::Corrupted {
                id,
                reason: "stream does not start with a creation entry".to_string(),
            });
        }
        Ok(Some((req, entries)))
    }

    pub fn ids(&self) -> Result<Vec<RequisitionId>, AuditLogError> {
        self.log.stream_ids()
    }
}

fn validate_stream(id: RequisitionId, stream: &[AuditEntry]) -> Result<(), AuditLogError> {
    // Guard against a backend returning foreign or reordered entries.
    for (idx, e) in stream.iter().enumerate() {
        if e.stream_id() != id {
            return Err(AuditLogError::Corrupted {
                id,
                reason: format!("entry at index {idx} belongs to {}", e.stream_id()),
            });
        }
        let expected = idx as u64 + 1;
        if e.sequence_number() != expected {
            return Err(AuditLogError::Corrupted {
                id,
                reason: format!(
                    "expected sequence {expected}, found {}",
                    e.sequence_number()
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reqflow_core::{DepartmentCode, ExpectedVersion, UserId};
    use reqflow_requisitions::{
        ActorRef, AuditRecord, LineItem, Priority, RequisitionEvent, RequisitionStatus,
    };

    use crate::audit_log::InMemoryAuditLog;

    fn created(actor: &ActorRef) -> AuditRecord {
        AuditRecord {
            actor: actor.clone(),
            occurred_at: Utc::now(),
            from_status: None,
            to_status: RequisitionStatus::Draft,
            note: None,
            action: RequisitionEvent::Created {
                requester: actor.user_id().unwrap(),
                department: DepartmentCode::new("ICU").unwrap(),
                items: vec![LineItem::new("Gauze", 2).unwrap()],
                priority: Priority::Standard,
            },
        }
    }

    #[test]
    fn allocation_resumes_after_existing_streams() {
        let log: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new());
        let actor = ActorRef::user(UserId::new(), DepartmentCode::new("ICU").unwrap());
        let seven = RequisitionId::from_sequence(7).unwrap();
        log.append(seven, vec![created(&actor)], ExpectedVersion::Exact(0))
            .unwrap();

        let store = RequisitionStore::new(log).unwrap();
        assert_eq!(store.allocate_id().unwrap().to_string(), "REQ-0008");
        assert_eq!(store.allocate_id().unwrap().to_string(), "REQ-0009");
    }

    #[test]
    fn load_replays_the_stream() {
        let log: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new());
        let store = RequisitionStore::new(log.clone()).unwrap();
        let id = store.allocate_id().unwrap();
        assert!(store.load(id).unwrap().is_none());

        let actor = ActorRef::user(UserId::new(), DepartmentCode::new("ICU").unwrap());
        log.append(id, vec![created(&actor)], ExpectedVersion::Exact(0))
            .unwrap();

        let req = store.load(id).unwrap().unwrap();
        assert_eq!(req.status(), RequisitionStatus::Draft);
        assert_eq!(req.version(), 1);
        assert_eq!(store.ids().unwrap(), vec![id]);
    }

    #[test]
    fn stream_without_creation_is_corrupt() {
        let log: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new());
        let store = RequisitionStore::new(log.clone()).unwrap();
        let id = store.allocate_id().unwrap();
        let actor = ActorRef::System;
        log.append(
            id,
            vec![AuditRecord {
                actor,
                occurred_at: Utc::now(),
                from_status: Some(RequisitionStatus::Draft),
                to_status: RequisitionStatus::Submitted,
                note: None,
                action: RequisitionEvent::Submitted,
            }],
            ExpectedVersion::Any,
        )
        .unwrap();

        assert!(matches!(
            store.load(id),
            Err(AuditLogError::Corrupted { .. })
        ));
    }
}
