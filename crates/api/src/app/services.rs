use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use reqflow_core::DepartmentCode;
use reqflow_events::InMemoryEventBus;
use reqflow_infra::{
    audit_log::{AuditEntry, AuditLog, AuditLogError, InMemoryAuditLog},
    config::EngineConfig,
    inventory_ledger::{InMemoryInventoryLedger, InventoryLedger},
    projections::{BoardError, Escalation, RequisitionBoard},
    store::RequisitionStore,
    vendor::{VendorGateway, VendorOrderCoordinator},
    workers::{ApprovalRouter, NotificationRouter, ProjectionWorker, TracingNotifier, WorkerHandle},
    workflow::{WorkflowEngine, WorkflowError},
};

pub type AppBus = Arc<InMemoryEventBus<AuditEntry>>;
pub type AppEngine = WorkflowEngine<AppBus>;
pub type AppCoordinator = VendorOrderCoordinator<AppBus>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("audit log: {0}")]
    Storage(#[from] AuditLogError),

    #[error("board rebuild: {0}")]
    Board(#[from] BoardError),

    #[error("resuming vendor orders: {0}")]
    Vendor(#[from] WorkflowError),
}

/// Everything the handlers need, wired once at startup.
///
/// In-memory wiring (log, ledger, bus) with four bus consumers: the board
/// projector, the approval router, the notifier and the vendor coordinator's
/// intake.
#[derive(Debug)]
pub struct AppServices {
    pub engine: Arc<AppEngine>,
    pub board: Arc<RequisitionBoard>,
    pub coordinator: Arc<AppCoordinator>,
    pub config: EngineConfig,
    _workers: Vec<WorkerHandle>,
    _poller: Option<JoinHandle<()>>,
}

impl AppServices {
    pub fn ledger(&self) -> &Arc<dyn InventoryLedger> {
        self.engine.ledger()
    }

    /// Urgent requisitions over the configured threshold; empty when the
    /// threshold is unset.
    pub fn escalations(
        &self,
        now: DateTime<Utc>,
        scope: Option<&DepartmentCode>,
    ) -> Result<Vec<Escalation>, BoardError> {
        let Some(after) = self.config.escalation_after else {
            return Ok(Vec::new());
        };
        let threshold = chrono::Duration::from_std(after).unwrap_or(chrono::Duration::MAX);
        self.board.escalations(now, threshold, scope)
    }
}

/// Build the service graph. Must run inside a tokio runtime: vendor
/// placements and the poller are spawned on the current one.
pub fn build_services(
    config: EngineConfig,
    gateway: Arc<dyn VendorGateway>,
) -> Result<AppServices, StartupError> {
    let log: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new());
    let ledger: Arc<dyn InventoryLedger> = Arc::new(InMemoryInventoryLedger::new());
    let bus: AppBus = Arc::new(InMemoryEventBus::new());

    let store = Arc::new(RequisitionStore::new(Arc::clone(&log))?);
    let engine = Arc::new(WorkflowEngine::new(store, ledger, Arc::clone(&bus)));

    let board = Arc::new(RequisitionBoard::new(config.activity_capacity));
    board.rebuild_from_log(&*log)?;

    let coordinator = Arc::new(VendorOrderCoordinator::new(
        Arc::clone(&engine),
        gateway,
        config.vendor_retry.clone(),
        config.vendor_timeout,
        Handle::current(),
    ));

    let board_worker = {
        let board = Arc::clone(&board);
        let log = Arc::clone(&log);
        ProjectionWorker::spawn("requisition-board", &bus, move |entry: AuditEntry| {
            board.apply_or_catch_up(&entry, &*log)
        })
    };
    let router_worker = ApprovalRouter::spawn(Arc::clone(&engine), &bus);
    let notify_worker = NotificationRouter::spawn(Arc::clone(&engine), Arc::new(TracingNotifier), &bus);
    let vendor_worker = {
        let coordinator = Arc::clone(&coordinator);
        ProjectionWorker::spawn("vendor-intake", &bus, move |entry: AuditEntry| {
            coordinator.on_entry(&entry).map(|_| ())
        })
    };

    let resumed = coordinator.resume_parked()?;
    if !resumed.is_empty() {
        tracing::info!(count = resumed.len(), "resumed parked vendor orders");
    }

    let poller = config.vendor_poll_interval.map(|every| {
        tracing::info!(interval_ms = every.as_millis() as u64, "vendor poller enabled");
        coordinator.spawn_poller(every)
    });

    Ok(AppServices {
        engine,
        board,
        coordinator,
        config,
        _workers: vec![board_worker, router_worker, notify_worker, vendor_worker],
        _poller: poller,
    })
}
