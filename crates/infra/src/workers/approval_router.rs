use std::sync::Arc;

use tracing::{debug, info};

use reqflow_core::{ErrorKind, ExpectedVersion};
use reqflow_events::EventBus;
use reqflow_requisitions::RequisitionEvent;

use super::projection_worker::{ProjectionWorker, WorkerHandle};
use crate::audit_log::AuditEntry;
use crate::workflow::{WorkflowEngine, WorkflowError};

/// Moves submitted requisitions into the approval queue.
///
/// Consumes `submitted` entries and applies `RouteForApproval` as the system
/// actor, pinned to the version the entry produced. A redelivered entry, or
/// one that raced a cancellation, fails the version check and is ignored.
#[derive(Debug)]
pub struct ApprovalRouter;

impl ApprovalRouter {
    pub fn spawn<B>(engine: Arc<WorkflowEngine<B>>, bus: &B) -> WorkerHandle
    where
        B: EventBus<AuditEntry> + 'static,
    {
        ProjectionWorker::spawn("approval-router", bus, move |entry: AuditEntry| {
            route(&engine, &entry)
        })
    }
}

/// Route one entry; anything other than `submitted` is skipped.
pub fn route<B>(engine: &WorkflowEngine<B>, entry: &AuditEntry) -> Result<(), WorkflowError>
where
    B: EventBus<AuditEntry>,
{
    if !matches!(entry.payload().action, RequisitionEvent::Submitted) {
        return Ok(());
    }

    let id = entry.stream_id();
    match engine.route_for_approval(id, ExpectedVersion::Exact(entry.sequence_number())) {
        Ok(outcome) => {
            info!(requisition_id = %id, version = outcome.version, "routed for approval");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::Conflict => {
            debug!(requisition_id = %id, "requisition moved on before routing; skipping");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
