use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use reqflow_auth::{Actor, Permission, authorize};
use reqflow_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, RequisitionId, ReservationId};
use reqflow_events::{Event, EventBus, execute};
use reqflow_inventory::{LedgerError, Shortfall, StockLine};
use reqflow_requisitions::{
    ActorRef, AuditRecord, LineItem, NewRequisition, Requisition, RequisitionAction,
    RequisitionCommand, RequisitionStatus,
};

use super::idempotency::{Fingerprint, IdempotencyStore};
use super::policy::{actor_ref, authorize_action};
use super::{Action, RequisitionDraft, TransitionOutcome, VendorAnnotation, WorkflowError};
use crate::audit_log::{AuditEntry, AuditLog, history};
use crate::inventory_ledger::InventoryLedger;
use crate::store::RequisitionStore;

/// Records decided for one transition, applied to a working copy as they
/// are added so each step is validated against the state the previous one
/// produced.
struct Batch {
    base_version: u64,
    working: Requisition,
    records: Vec<AuditRecord>,
    now: DateTime<Utc>,
}

impl Batch {
    fn new(req: &Requisition) -> Self {
        Self {
            base_version: req.version(),
            working: req.clone(),
            records: Vec::new(),
            now: Utc::now(),
        }
    }

    fn push(&mut self, actor: ActorRef, action: RequisitionAction) -> Result<(), DomainError> {
        let cmd = RequisitionCommand::new(actor, self.now, action);
        let records = execute(&mut self.working, &cmd)?;
        self.records.extend(records);
        Ok(())
    }

    /// Validate `action` without recording it.
    fn check(&self, actor: ActorRef, action: RequisitionAction) -> Result<(), DomainError> {
        let cmd = RequisitionCommand::new(actor, self.now, action);
        self.working.handle(&cmd).map(|_| ())
    }
}

/// Ledger follow-up owed by a recorded cancellation or delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Release(ReservationId),
    Debit(ReservationId),
}

impl Settlement {
    fn reservation(self) -> ReservationId {
        match self {
            Settlement::Release(r) | Settlement::Debit(r) => r,
        }
    }
}

/// The requisition state machine with its side effects.
///
/// ## Pipeline (per transition)
///
/// ```text
/// existence check                  (NotFound)
///   → per-requisition lock
///   → settle ledger work still owed  (StorageUnavailable)
///   → idempotency lookup
///   → load (rehydrate from the audit log)
///   → expected version check         (Conflict)
///   → authorization                  (Forbidden)
///   → late approver decision         (Conflict)
///   → decide + ledger side effects   (InvalidTransition / ValidationFailed)
///   → append, Exact(version)         (atomic: all records or none)
///   → publish (best effort)
///   → remember idempotency outcome
///   → release or debit               (StorageUnavailable, owed until settled)
/// ```
///
/// Transitions on one requisition are serialized by its lock; different
/// requisitions proceed concurrently. The lock is never held across a vendor
/// call: vendor traffic happens in the coordinator, which comes back through
/// `apply` or `annotate_vendor_order`.
pub struct WorkflowEngine<B> {
    store: Arc<RequisitionStore>,
    ledger: Arc<dyn InventoryLedger>,
    bus: B,
    locks: Mutex<HashMap<RequisitionId, Arc<Mutex<()>>>>,
    keyed_creations: Mutex<()>,
    idempotency: IdempotencyStore,
    owed: Mutex<HashMap<RequisitionId, (Settlement, RequisitionStatus)>>,
}

impl<B> core::fmt::Debug for WorkflowEngine<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<B> WorkflowEngine<B>
where
    B: EventBus<AuditEntry>,
{
    pub fn new(store: Arc<RequisitionStore>, ledger: Arc<dyn InventoryLedger>, bus: B) -> Self {
        Self {
            store,
            ledger,
            bus,
            locks: Mutex::new(HashMap::new()),
            keyed_creations: Mutex::new(()),
            idempotency: IdempotencyStore::new(),
            owed: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<RequisitionStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<dyn InventoryLedger> {
        &self.ledger
    }

    pub fn log(&self) -> &Arc<dyn AuditLog> {
        self.store.log()
    }

    /// Current state of a requisition.
    pub fn requisition(&self, id: RequisitionId) -> Result<Requisition, WorkflowError> {
        self.store.load(id)?.ok_or(WorkflowError::NotFound(id))
    }

    /// Current state plus the audit entries it was rebuilt from.
    pub fn requisition_with_history(
        &self,
        id: RequisitionId,
    ) -> Result<(Requisition, Vec<AuditEntry>), WorkflowError> {
        self.store
            .load_with_history(id)?
            .ok_or(WorkflowError::NotFound(id))
    }

    /// Audit history of one requisition, oldest first.
    pub fn history(&self, id: RequisitionId) -> Result<Vec<AuditEntry>, WorkflowError> {
        let entries = history(&**self.log(), id).to_vec()?;
        if entries.is_empty() {
            return Err(WorkflowError::NotFound(id));
        }
        Ok(entries)
    }

    /// Raise a new requisition in `Draft`. The caller becomes the requester.
    pub fn create(
        &self,
        actor: &Actor,
        draft: RequisitionDraft,
        idempotency_key: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let result = self.create_inner(actor, draft, idempotency_key);
        if let Err(err) = &result {
            debug!(action = "create", kind = %err.kind(), error = %err, "requisition creation rejected");
        }
        result
    }

    fn create_inner(
        &self,
        actor: &Actor,
        draft: RequisitionDraft,
        idempotency_key: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let principal = actor.principal().ok_or_else(|| {
            WorkflowError::Forbidden(reqflow_auth::AuthzError::denied(
                "requisitions are raised by people",
            ))
        })?;
        authorize(principal, &Permission::REQUISITIONS_CREATE)?;

        let department = match draft.department {
            Some(dept) if dept != principal.department && !principal.is_admin() => {
                return Err(WorkflowError::Forbidden(reqflow_auth::AuthzError::denied(
                    format!("cannot raise a requisition for {dept}"),
                )));
            }
            Some(dept) => dept,
            None => principal.department.clone(),
        };

        let fingerprint = Fingerprint {
            requisition: None,
            actor: actor_ref(actor),
            action: "create",
        };
        // Keyed creations have no requisition lock to meet on; serialize them
        // so a concurrent duplicate sees the first outcome.
        let _creation = match &idempotency_key {
            Some(key) => {
                let guard = self
                    .keyed_creations
                    .lock()
                    .map_err(|_| WorkflowError::Unavailable("creation lock poisoned".into()))?;
                if let Some(prior) = self.idempotency.lookup(key, &fingerprint)? {
                    return Ok(prior);
                }
                Some(guard)
            }
            None => None,
        };

        let id = self.store.allocate_id()?;
        let lock = self.lock_for(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| WorkflowError::Unavailable(format!("lock for {id} poisoned")))?;

        let mut batch = Batch::new(&Requisition::empty(id));
        batch.push(
            actor_ref(actor),
            RequisitionAction::Create(NewRequisition {
                id,
                department,
                items: draft.items,
                priority: draft.priority,
            }),
        )?;

        let outcome = self.commit(id, batch)?;
        if let Some(key) = idempotency_key {
            self.idempotency.remember(
                key,
                Fingerprint {
                    requisition: Some(id),
                    ..fingerprint
                },
                outcome,
            )?;
        }
        Ok(outcome)
    }

    /// Apply one transition on behalf of `actor`.
    pub fn apply(
        &self,
        id: RequisitionId,
        actor: &Actor,
        action: Action,
        expected: ExpectedVersion,
        idempotency_key: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let name = action.name();
        let result = self.apply_inner(id, actor, action, expected, idempotency_key);
        if let Err(err) = &result {
            debug!(
                requisition_id = %id,
                action = name,
                kind = %err.kind(),
                error = %err,
                "transition rejected"
            );
        }
        result
    }

    /// Move a submitted requisition into the approval queue.
    pub fn route_for_approval(
        &self,
        id: RequisitionId,
        expected: ExpectedVersion,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.apply(id, &Actor::System, Action::RouteForApproval, expected, None)
    }

    /// Record the vendor coordinator's view of a parked order.
    ///
    /// Fails with `Conflict` once the requisition has left `VendorOrdered`.
    pub fn annotate_vendor_order(
        &self,
        id: RequisitionId,
        annotation: VendorAnnotation,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.ensure_exists(id)?;
        let lock = self.lock_for(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| WorkflowError::Unavailable(format!("lock for {id} poisoned")))?;

        let req = self.requisition(id)?;
        if req.status() != RequisitionStatus::VendorOrdered {
            return Err(DomainError::conflict(format!(
                "{id} is {} and no longer waiting on its vendor",
                req.status()
            ))
            .into());
        }

        let action = match annotation {
            VendorAnnotation::Acknowledged { vendor_reference } => {
                RequisitionAction::AcknowledgeVendorOrder { vendor_reference }
            }
            VendorAnnotation::Delayed {
                attempts,
                last_error,
            } => RequisitionAction::RecordVendorDelay {
                attempts,
                last_error,
            },
        };

        let mut batch = Batch::new(&req);
        batch.push(ActorRef::System, action)?;
        self.commit(id, batch)
    }

    fn apply_inner(
        &self,
        id: RequisitionId,
        actor: &Actor,
        action: Action,
        expected: ExpectedVersion,
        idempotency_key: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let fingerprint = Fingerprint {
            requisition: Some(id),
            actor: actor_ref(actor),
            action: action.name(),
        };
        self.ensure_exists(id)?;
        let lock = self.lock_for(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| WorkflowError::Unavailable(format!("lock for {id} poisoned")))?;

        self.settle_owed(id)?;

        // Looked up under the lock so a concurrent duplicate sees the first outcome.
        if let Some(key) = &idempotency_key {
            if let Some(prior) = self.idempotency.lookup(key, &fingerprint)? {
                return Ok(prior);
            }
        }

        let req = self.requisition(id)?;
        expected.check(req.version())?;
        authorize_action(actor, &req, &action)?;
        if action.is_decision() && req.status().is_past_approval() {
            return Err(DomainError::conflict(format!(
                "{id} was already decided and is now {}",
                req.status()
            ))
            .into());
        }

        let (outcome, settlement) = self.execute_action(&req, actor, action)?;

        if let Some(key) = idempotency_key {
            self.idempotency.remember(key, fingerprint, outcome)?;
        }
        if let Some(settlement) = settlement {
            self.settle(id, settlement, outcome.status)?;
        }
        Ok(outcome)
    }

    fn execute_action(
        &self,
        req: &Requisition,
        actor: &Actor,
        action: Action,
    ) -> Result<(TransitionOutcome, Option<Settlement>), WorkflowError> {
        let id = *req.id();
        let who = actor_ref(actor);
        let mut batch = Batch::new(req);

        let outcome = match action {
            Action::Approve => {
                batch.push(who, RequisitionAction::Approve)?;
                batch.push(ActorRef::System, RequisitionAction::BeginInventoryCheck)?;
                let held = self.check_inventory(&mut batch)?;
                self.commit_or_release(id, batch, held)
            }
            Action::BeginInventoryCheck => {
                batch.push(who, RequisitionAction::BeginInventoryCheck)?;
                let held = self.check_inventory(&mut batch)?;
                self.commit_or_release(id, batch, held)
            }
            Action::ConfirmVendorFulfillment {
                vendor_reference,
                supplied,
            } => self.confirm_vendor_fulfillment(req, batch, who, vendor_reference, supplied),
            Action::Cancel { reason } => {
                let held = req.held_reservation();
                batch.push(
                    who,
                    RequisitionAction::Cancel {
                        reason,
                        released_reservation: held,
                    },
                )?;
                // Released after the append, still under the requisition lock.
                return Ok((self.commit(id, batch)?, held.map(Settlement::Release)));
            }
            Action::RecordDelivery {
                signature,
                received_at,
            } => {
                let held = req.held_reservation();
                batch.push(
                    who,
                    RequisitionAction::RecordDelivery {
                        signature,
                        received_at,
                    },
                )?;
                let outcome = self.commit(id, batch)?;
                if held.is_none() {
                    warn!(requisition_id = %id, "delivered without a held reservation");
                }
                return Ok((outcome, held.map(Settlement::Debit)));
            }
            Action::Submit => {
                batch.push(who, RequisitionAction::Submit)?;
                self.commit(id, batch)
            }
            Action::RouteForApproval => {
                batch.push(who, RequisitionAction::RouteForApproval)?;
                self.commit(id, batch)
            }
            Action::Reject { reason } => {
                batch.push(who, RequisitionAction::Reject { reason })?;
                self.commit(id, batch)
            }
            Action::PlaceVendorOrder { vendor } => {
                batch.push(who, RequisitionAction::PlaceVendorOrder { vendor })?;
                self.commit(id, batch)
            }
            Action::RequestFulfillment => {
                batch.push(who, RequisitionAction::RequestFulfillment)?;
                self.commit(id, batch)
            }
            Action::Ship {
                carrier,
                tracking_reference,
            } => {
                batch.push(
                    who,
                    RequisitionAction::Ship {
                        carrier,
                        tracking_reference,
                    },
                )?;
                self.commit(id, batch)
            }
            Action::ChangePriority { priority } => {
                batch.push(who, RequisitionAction::ChangePriority { priority })?;
                self.commit(id, batch)
            }
            Action::AddComment { text } => {
                batch.push(who, RequisitionAction::AddComment { text })?;
                self.commit(id, batch)
            }
        }?;
        Ok((outcome, None))
    }

    /// Reserve every line or flag the shortage; a shortage is an outcome,
    /// not an error.
    fn check_inventory(&self, batch: &mut Batch) -> Result<Option<ReservationId>, WorkflowError> {
        let id = *batch.working.id();
        let lines: Vec<StockLine> = batch.working.items().iter().map(LineItem::to_stock_line).collect();

        match self.ledger.reserve(Some(id), &lines) {
            Ok(reservation) => {
                batch.push(
                    ActorRef::System,
                    RequisitionAction::ReserveStock {
                        reservation_id: reservation.id,
                    },
                )?;
                Ok(Some(reservation.id))
            }
            Err(LedgerError::Shortage(shortfalls)) => {
                info!(requisition_id = %id, lines = shortfalls.len(), "inventory shortage flagged");
                batch.push(ActorRef::System, RequisitionAction::FlagShortage { shortfalls })?;
                Ok(None)
            }
            Err(other) => Err(other.into()),
        }
    }

    fn confirm_vendor_fulfillment(
        &self,
        req: &Requisition,
        mut batch: Batch,
        who: ActorRef,
        vendor_reference: String,
        supplied: Vec<LineItem>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let id = *req.id();

        // Dry run first: no stock moves for a confirmation that cannot apply.
        batch.check(
            who.clone(),
            RequisitionAction::ConfirmVendorFulfillment {
                vendor_reference: vendor_reference.clone(),
                supplied: supplied.clone(),
                reservation_id: ReservationId::new(),
            },
        )?;

        let supplied = if supplied.is_empty() {
            self.outstanding_shortfall(req)?
        } else {
            supplied
        };

        self.check_delivery_covers(req, &supplied)?;

        let source = format!("vendor {}", req.vendor().unwrap_or("unknown"));
        let department = req
            .department()
            .cloned()
            .ok_or_else(|| DomainError::validation("requisition has no department"))?;
        for line in &supplied {
            if self.ledger.record(&line.item_name)?.is_none() {
                match self.ledger.register_item(&line.item_name, department.clone(), 0, None) {
                    Ok(_) | Err(LedgerError::DuplicateItem(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        // Keyed by order so a retried or re-polled confirmation adds no stock.
        let delivery = format!("{id}/{vendor_reference}");
        let delivered: Vec<StockLine> = supplied.iter().map(LineItem::to_stock_line).collect();
        if !self
            .ledger
            .receive_delivery(&delivery, &delivered, Some(source), Some(id))?
        {
            debug!(requisition_id = %id, %delivery, "delivery already received");
        }

        let lines: Vec<StockLine> = req.items().iter().map(LineItem::to_stock_line).collect();
        let reservation = self.ledger.reserve(Some(id), &lines)?;

        batch.push(
            who,
            RequisitionAction::ConfirmVendorFulfillment {
                vendor_reference,
                supplied,
                reservation_id: reservation.id,
            },
        )?;
        self.commit_or_release(id, batch, Some(reservation.id))
    }

    /// Refuse a delivery that would still leave the requisition short, before
    /// any of it is received.
    fn check_delivery_covers(
        &self,
        req: &Requisition,
        supplied: &[LineItem],
    ) -> Result<(), WorkflowError> {
        let mut shortfalls = Vec::new();
        for item in req.items() {
            let available = self
                .ledger
                .record(&item.item_name)?
                .map(|r| r.quantity_available)
                .unwrap_or(0);
            let delivered: u64 = supplied
                .iter()
                .filter(|line| line.item_name == item.item_name)
                .map(|line| line.quantity)
                .fold(0, u64::saturating_add);
            let covered = available.saturating_add(delivered);
            if covered < item.quantity {
                shortfalls.push(Shortfall {
                    item_name: item.item_name.clone(),
                    requested: item.quantity,
                    available: covered,
                });
            }
        }
        if shortfalls.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Shortage(shortfalls).into())
        }
    }

    /// What the vendor must deliver when the confirmation does not say.
    fn outstanding_shortfall(&self, req: &Requisition) -> Result<Vec<LineItem>, WorkflowError> {
        let mut lines = Vec::new();
        for item in req.items() {
            let available = self
                .ledger
                .record(&item.item_name)?
                .map(|r| r.quantity_available)
                .unwrap_or(0);
            let missing = item.quantity.saturating_sub(available);
            if missing > 0 {
                lines.push(LineItem::new(item.item_name.clone(), missing)?);
            }
        }
        Ok(lines)
    }

    /// Commit; if the append fails, hand back the hold placed for it.
    fn commit_or_release(
        &self,
        id: RequisitionId,
        batch: Batch,
        held: Option<ReservationId>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let result = self.commit(id, batch);
        if result.is_err() {
            if let Some(reservation) = held {
                if let Err(err) = self.ledger.release(reservation) {
                    error!(requisition_id = %id, %reservation, error = %err, "failed to release reservation after rejected append");
                }
            }
        }
        result
    }

    fn commit(&self, id: RequisitionId, batch: Batch) -> Result<TransitionOutcome, WorkflowError> {
        let entries = self.log().append(
            id,
            batch.records,
            ExpectedVersion::Exact(batch.base_version),
        )?;

        let last = entries
            .last()
            .ok_or_else(|| DomainError::validation("transition produced no audit entries"))?;
        let outcome = TransitionOutcome {
            id,
            status: last.payload().to_status,
            version: last.sequence_number(),
        };

        for entry in &entries {
            info!(
                requisition_id = %id,
                action = entry.payload().action.action(),
                event = entry.payload().event_type(),
                actor = %entry.payload().actor,
                version = entry.sequence_number(),
                from = ?entry.payload().from_status,
                to = %entry.payload().to_status,
                "transition recorded"
            );
        }

        // Published after the durable append; consumers catch up from the log
        // if a message is lost.
        for entry in entries {
            if let Err(err) = self.bus.publish(entry) {
                warn!(requisition_id = %id, error = ?err, "failed to publish audit entry");
            }
        }

        Ok(outcome)
    }

    /// Release or debit the hold behind a recorded cancellation or delivery.
    /// A failure stays owed and is retried before the next transition.
    fn settle(
        &self,
        id: RequisitionId,
        settlement: Settlement,
        status: RequisitionStatus,
    ) -> Result<(), WorkflowError> {
        let result = match settlement {
            Settlement::Release(reservation) => self.ledger.release(reservation).map(|_| ()),
            Settlement::Debit(reservation) => self.ledger.debit(reservation),
        };
        let mut owed = self
            .owed
            .lock()
            .map_err(|_| WorkflowError::Unavailable("settlement table poisoned".into()))?;
        match result {
            Ok(()) => {
                owed.remove(&id);
                Ok(())
            }
            Err(source) => {
                let reservation = settlement.reservation();
                error!(requisition_id = %id, %reservation, %status, error = %source, "reservation left unsettled");
                owed.insert(id, (settlement, status));
                Err(WorkflowError::Unsettled {
                    id,
                    status,
                    reservation,
                    source,
                })
            }
        }
    }

    fn settle_owed(&self, id: RequisitionId) -> Result<(), WorkflowError> {
        let pending = self
            .owed
            .lock()
            .map_err(|_| WorkflowError::Unavailable("settlement table poisoned".into()))?
            .get(&id)
            .copied();
        match pending {
            Some((settlement, status)) => self.settle(id, settlement, status),
            None => Ok(()),
        }
    }

    /// Unknown ids fail before a lock entry is made for them.
    fn ensure_exists(&self, id: RequisitionId) -> Result<(), WorkflowError> {
        if self.log().current_version(id)? == 0 {
            return Err(WorkflowError::NotFound(id));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn lock_for(&self, id: RequisitionId) -> Result<Arc<Mutex<()>>, WorkflowError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| WorkflowError::Unavailable("lock table poisoned".into()))?;
        Ok(locks.entry(id).or_default().clone())
    }
}
