//! Shared fixture for infra tests: an engine over in-memory stores plus a
//! cast of principals in the `ICU` department.

use std::sync::Arc;

use reqflow_auth::{Actor, Principal, Role};
use reqflow_core::{DepartmentCode, ExpectedVersion, RequisitionId, UserId};
use reqflow_events::InMemoryEventBus;
use reqflow_requisitions::{LineItem, Priority, RequisitionStatus};

use crate::audit_log::{AuditEntry, AuditLog, InMemoryAuditLog};
use crate::inventory_ledger::{InMemoryInventoryLedger, InventoryLedger};
use crate::store::RequisitionStore;
use crate::workflow::{Action, RequisitionDraft, TransitionOutcome, WorkflowEngine, WorkflowError};

pub(crate) type TestBus = Arc<InMemoryEventBus<AuditEntry>>;
pub(crate) type TestEngine = WorkflowEngine<TestBus>;

pub(crate) fn user(department: &str, role: Role) -> Actor {
    Actor::User(Principal::new(
        UserId::new(),
        DepartmentCode::new(department).unwrap(),
        vec![role],
    ))
}

pub(crate) struct Fixture {
    pub engine: Arc<TestEngine>,
    pub ledger: Arc<InMemoryInventoryLedger>,
    pub bus: TestBus,
    pub clinician: Actor,
    pub hod: Actor,
    pub staff: Actor,
    pub vendor: Actor,
    pub admin: Actor,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_log(Arc::new(InMemoryAuditLog::new()))
    }

    pub fn with_log(log: Arc<dyn AuditLog>) -> Self {
        Self::build(log, |ledger| ledger as Arc<dyn InventoryLedger>)
    }

    /// `wrap` decides which ledger the engine sees; the fixture keeps the
    /// in-memory one underneath for stock assertions.
    pub fn build(
        log: Arc<dyn AuditLog>,
        wrap: impl FnOnce(Arc<InMemoryInventoryLedger>) -> Arc<dyn InventoryLedger>,
    ) -> Self {
        let ledger = Arc::new(InMemoryInventoryLedger::new());
        let bus: TestBus = Arc::new(InMemoryEventBus::new());
        let store = Arc::new(RequisitionStore::new(log).unwrap());
        let engine = Arc::new(WorkflowEngine::new(store, wrap(ledger.clone()), bus.clone()));

        Self {
            engine,
            ledger,
            bus,
            clinician: user("ICU", Role::CLINICIAN),
            hod: user("ICU", Role::HOD),
            staff: user("ICU", Role::DEPARTMENT_STAFF),
            vendor: user("SUPPLY", Role::VENDOR),
            admin: user("ADMIN", Role::ADMIN),
        }
    }

    pub fn stock(&self, item: &str, quantity: u64) {
        self.ledger
            .register_item(item, DepartmentCode::new("ICU").unwrap(), quantity, None)
            .unwrap();
    }

    pub fn available(&self, item: &str) -> (u64, u64) {
        let record = self.ledger.record(item).unwrap().unwrap();
        (record.quantity_available, record.reserved_quantity)
    }

    pub fn create(&self, items: &[(&str, u64)]) -> RequisitionId {
        self.create_with(items, Priority::Standard)
    }

    pub fn create_with(&self, items: &[(&str, u64)], priority: Priority) -> RequisitionId {
        let draft = RequisitionDraft {
            department: None,
            items: items
                .iter()
                .map(|(name, qty)| LineItem::new(*name, *qty).unwrap())
                .collect(),
            priority,
        };
        self.engine.create(&self.clinician, draft, None).unwrap().id
    }

    /// Draft → PendingApproval.
    pub fn submit(&self, id: RequisitionId) {
        self.act(id, &self.clinician, Action::Submit).unwrap();
        self.engine
            .route_for_approval(id, ExpectedVersion::Any)
            .unwrap();
    }

    /// Draft → Reserved or Shortage, depending on stock.
    pub fn approve(&self, id: RequisitionId) -> TransitionOutcome {
        self.submit(id);
        self.act(id, &self.hod, Action::Approve).unwrap()
    }

    pub fn act(
        &self,
        id: RequisitionId,
        actor: &Actor,
        action: Action,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.engine.apply(id, actor, action, ExpectedVersion::Any, None)
    }

    pub fn status(&self, id: RequisitionId) -> RequisitionStatus {
        self.engine.requisition(id).unwrap().status()
    }
}
