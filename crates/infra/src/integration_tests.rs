//! Integration tests for the full requisition pipeline.
//!
//! Tests: Engine → Audit Log + Inventory Ledger → EventBus → Board
//!
//! Verifies:
//! - Lifecycle scenarios move stock the way the ledger contract says
//! - Concurrent writers on one requisition produce exactly one winner
//! - Idempotent replays never append twice
//! - A failed append leaves no stock held

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::time::{Duration, Instant};

    use chrono::Utc;
    use proptest::prelude::*;

    use reqflow_auth::Role;
    use reqflow_core::{
        AggregateRoot, DepartmentCode, ErrorKind, ExpectedVersion, RequisitionId, ReservationId,
    };
    use reqflow_inventory::{
        InventoryRecord, LedgerError, MovementKind, Reservation, StockLine, StockMovement,
    };
    use reqflow_requisitions::{AuditRecord, LineItem, Priority, RequisitionStatus};

    use crate::audit_log::{AuditEntry, AuditLog, AuditLogError, InMemoryAuditLog};
    use crate::inventory_ledger::{InMemoryInventoryLedger, InventoryLedger};
    use crate::projections::RequisitionBoard;
    use crate::test_support::{Fixture, user};
    use crate::workers::ProjectionWorker;
    use crate::workflow::{Action, RequisitionDraft, WorkflowError};

    /// Audit log whose appends can be switched off.
    struct FlakyLog {
        inner: InMemoryAuditLog,
        down: AtomicBool,
    }

    impl AuditLog for FlakyLog {
        fn append(
            &self,
            id: RequisitionId,
            records: Vec<AuditRecord>,
            expected: ExpectedVersion,
        ) -> Result<Vec<AuditEntry>, AuditLogError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(AuditLogError::Unavailable("disk on fire".into()));
            }
            self.inner.append(id, records, expected)
        }

        fn read_page(&self, id: RequisitionId, after: u64, limit: usize) -> Result<Vec<AuditEntry>, AuditLogError> {
            self.inner.read_page(id, after, limit)
        }

        fn current_version(&self, id: RequisitionId) -> Result<u64, AuditLogError> {
            self.inner.current_version(id)
        }

        fn stream_ids(&self) -> Result<Vec<RequisitionId>, AuditLogError> {
            self.inner.stream_ids()
        }
    }

    /// Ledger whose release and debit can be switched off.
    struct FlakyLedger {
        inner: Arc<InMemoryInventoryLedger>,
        down: Arc<AtomicBool>,
    }

    impl FlakyLedger {
        fn check(&self) -> Result<(), LedgerError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(LedgerError::Unavailable("ledger offline".into()));
            }
            Ok(())
        }
    }

    impl InventoryLedger for FlakyLedger {
        fn register_item(
            &self,
            item_name: &str,
            department: DepartmentCode,
            initial_quantity: u64,
            minimum_quantity: Option<u64>,
        ) -> Result<InventoryRecord, LedgerError> {
            self.inner.register_item(item_name, department, initial_quantity, minimum_quantity)
        }

        fn receive(
            &self,
            item_name: &str,
            quantity: u64,
            source: Option<String>,
            requisition: Option<RequisitionId>,
        ) -> Result<InventoryRecord, LedgerError> {
            self.inner.receive(item_name, quantity, source, requisition)
        }

        fn receive_delivery(
            &self,
            delivery: &str,
            lines: &[StockLine],
            source: Option<String>,
            requisition: Option<RequisitionId>,
        ) -> Result<bool, LedgerError> {
            self.inner.receive_delivery(delivery, lines, source, requisition)
        }

        fn reserve(&self, requisition: Option<RequisitionId>, lines: &[StockLine]) -> Result<Reservation, LedgerError> {
            self.inner.reserve(requisition, lines)
        }

        fn release(&self, reservation: ReservationId) -> Result<bool, LedgerError> {
            self.check()?;
            self.inner.release(reservation)
        }

        fn debit(&self, reservation: ReservationId) -> Result<(), LedgerError> {
            self.check()?;
            self.inner.debit(reservation)
        }

        fn record(&self, item_name: &str) -> Result<Option<InventoryRecord>, LedgerError> {
            self.inner.record(item_name)
        }

        fn records(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
            self.inner.records()
        }

        fn movements(&self, item_name: &str) -> Result<Vec<StockMovement>, LedgerError> {
            self.inner.movements(item_name)
        }

        fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError> {
            self.inner.reservation(id)
        }
    }

    fn assert_valid_walk(entries: &[AuditEntry]) {
        let mut current: Option<RequisitionStatus> = None;
        for entry in entries {
            let record = entry.payload();
            assert_eq!(record.from_status, current, "entry {} does not continue the walk", entry.sequence_number());
            if let Some(from) = record.from_status {
                if from != record.to_status {
                    assert!(
                        from.can_transition_to(record.to_status),
                        "{from} -> {} is not an edge",
                        record.to_status
                    );
                }
            }
            current = Some(record.to_status);
        }
    }

    fn movement_count(fx: &Fixture, item: &str, kind: MovementKind) -> usize {
        fx.ledger
            .movements(item)
            .unwrap()
            .iter()
            .filter(|m| m.kind == kind)
            .count()
    }

    #[test]
    fn happy_path_reserves_then_debits() {
        let fx = Fixture::new();
        fx.stock("Gauze", 50);
        let id = fx.create(&[("Gauze", 10)]);

        let approved = fx.approve(id);
        assert_eq!(approved.status, RequisitionStatus::Reserved);
        assert_eq!(fx.available("Gauze"), (40, 10));

        fx.act(id, &fx.vendor, Action::RequestFulfillment).unwrap();
        fx.act(
            id,
            &fx.vendor,
            Action::Ship {
                carrier: Some("DHL".into()),
                tracking_reference: None,
            },
        )
        .unwrap();
        let delivered = fx
            .act(
                id,
                &fx.clinician,
                Action::RecordDelivery {
                    signature: "J. Doe".into(),
                    received_at: Utc::now(),
                },
            )
            .unwrap();

        assert_eq!(delivered.status, RequisitionStatus::Delivered);
        assert_eq!(fx.available("Gauze"), (40, 0));
        assert_eq!(movement_count(&fx, "Gauze", MovementKind::Debit), 1);

        let history = fx.engine.history(id).unwrap();
        assert_valid_walk(&history);
        assert_eq!(history.last().unwrap().sequence_number(), delivered.version);
    }

    #[test]
    fn shortage_is_an_outcome_and_vendor_stock_covers_it() {
        let fx = Fixture::new();
        fx.stock("Gauze", 3);
        let id = fx.create(&[("Gauze", 10)]);

        let outcome = fx.approve(id);
        assert_eq!(outcome.status, RequisitionStatus::Shortage);
        let req = fx.engine.requisition(id).unwrap();
        assert!(req.shortage_flag());
        assert_eq!(req.shortfalls()[0].missing(), 7);
        assert_eq!(fx.available("Gauze"), (3, 0));

        fx.act(id, &fx.vendor, Action::PlaceVendorOrder { vendor: "MedSupply".into() })
            .unwrap();
        let confirmed = fx
            .act(
                id,
                &fx.vendor,
                Action::ConfirmVendorFulfillment {
                    vendor_reference: "PO-1".into(),
                    supplied: vec![],
                },
            )
            .unwrap();

        assert_eq!(confirmed.status, RequisitionStatus::Reserved);
        assert!(!fx.engine.requisition(id).unwrap().shortage_flag());
        assert_eq!(fx.available("Gauze"), (0, 10));
        // Opening stock plus the vendor delivery.
        assert_eq!(movement_count(&fx, "Gauze", MovementKind::StockIn), 2);
        assert_valid_walk(&fx.engine.history(id).unwrap());
    }

    #[test]
    fn insufficient_vendor_supply_keeps_the_requisition_parked() {
        let fx = Fixture::new();
        fx.stock("Gauze", 3);
        let id = fx.create(&[("Gauze", 10)]);
        fx.approve(id);
        fx.act(id, &fx.vendor, Action::PlaceVendorOrder { vendor: "MedSupply".into() })
            .unwrap();

        let err = fx
            .act(
                id,
                &fx.vendor,
                Action::ConfirmVendorFulfillment {
                    vendor_reference: "PO-1".into(),
                    supplied: vec![LineItem::new("Gauze", 2).unwrap()],
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Shortage);
        assert_eq!(fx.status(id), RequisitionStatus::VendorOrdered);
        // A short delivery is refused before any of it is received.
        assert_eq!(fx.available("Gauze"), (3, 0));
        assert_eq!(movement_count(&fx, "Gauze", MovementKind::StockIn), 1);
    }

    #[test]
    fn cancellation_after_reservation_releases_once() {
        let fx = Fixture::new();
        fx.stock("Gauze", 50);
        let id = fx.create(&[("Gauze", 10)]);
        fx.approve(id);
        assert_eq!(fx.available("Gauze"), (40, 10));

        let cancelled = fx
            .act(id, &fx.clinician, Action::Cancel { reason: Some("ward closed".into()) })
            .unwrap();
        assert_eq!(cancelled.status, RequisitionStatus::Cancelled);
        assert_eq!(fx.available("Gauze"), (50, 0));

        let again = fx.act(id, &fx.admin, Action::Cancel { reason: None }).unwrap_err();
        assert_eq!(again.kind(), ErrorKind::InvalidTransition);
        assert_eq!(movement_count(&fx, "Gauze", MovementKind::Release), 1);
    }

    #[test]
    fn concurrent_approvals_yield_one_success_and_one_conflict() {
        concurrent_approvals_with(ExpectedVersion::Exact);
        concurrent_approvals_with(|_| ExpectedVersion::Any);
    }

    fn concurrent_approvals_with(expect: impl Fn(u64) -> ExpectedVersion) {
        let fx = Fixture::new();
        fx.stock("Gauze", 50);
        let id = fx.create(&[("Gauze", 10)]);
        fx.submit(id);
        let expected = expect(fx.engine.requisition(id).unwrap().version());

        let approvers = [fx.hod.clone(), user("ICU", Role::HOD)];
        let barrier = Barrier::new(approvers.len());

        let results: Vec<Result<_, WorkflowError>> = std::thread::scope(|s| {
            let handles: Vec<_> = approvers
                .iter()
                .map(|approver| {
                    let barrier = &barrier;
                    let engine = &fx.engine;
                    s.spawn(move || {
                        barrier.wait();
                        engine.apply(id, approver, Action::Approve, expected, None)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.into_iter().find_map(Result::err).unwrap();
        assert_eq!(loser.kind(), ErrorKind::Conflict);
        assert_eq!(fx.available("Gauze"), (40, 10));
    }

    #[test]
    fn a_late_decision_conflicts_without_a_version() {
        let fx = Fixture::new();
        fx.stock("Gauze", 50);
        let id = fx.create(&[("Gauze", 10)]);

        // Not yet in the queue: the state machine still refuses it.
        let early = fx.act(id, &fx.hod, Action::Approve).unwrap_err();
        assert_eq!(early.kind(), ErrorKind::InvalidTransition);

        fx.approve(id);
        let second_head = user("ICU", Role::HOD);
        let again = fx.act(id, &second_head, Action::Approve).unwrap_err();
        assert_eq!(again.kind(), ErrorKind::Conflict);
        let reject = fx
            .act(id, &second_head, Action::Reject { reason: "over budget".into() })
            .unwrap_err();
        assert_eq!(reject.kind(), ErrorKind::Conflict);

        assert_eq!(fx.status(id), RequisitionStatus::Reserved);
        assert_eq!(fx.available("Gauze"), (40, 10));
    }

    #[test]
    fn unknown_requisitions_leave_no_lock_behind() {
        let fx = Fixture::new();
        for _ in 0..3 {
            let err = fx
                .act(RequisitionId::new(), &fx.admin, Action::Cancel { reason: None })
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        assert_eq!(fx.engine.lock_count(), 0);
    }

    #[test]
    fn retried_vendor_confirmation_receives_the_delivery_once() {
        let log = Arc::new(FlakyLog {
            inner: InMemoryAuditLog::new(),
            down: AtomicBool::new(false),
        });
        let fx = Fixture::with_log(log.clone());
        fx.stock("Gauze", 3);
        let id = fx.create(&[("Gauze", 10)]);
        fx.approve(id);
        fx.act(id, &fx.vendor, Action::PlaceVendorOrder { vendor: "MedSupply".into() })
            .unwrap();

        let confirm = || {
            fx.engine.apply(
                id,
                &fx.vendor,
                Action::ConfirmVendorFulfillment {
                    vendor_reference: "PO-7".into(),
                    supplied: vec![LineItem::new("Gauze", 7).unwrap()],
                },
                ExpectedVersion::Any,
                Some("confirm-1".into()),
            )
        };

        log.down.store(true, Ordering::SeqCst);
        let err = confirm().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(fx.status(id), RequisitionStatus::VendorOrdered);
        assert_eq!(fx.available("Gauze"), (10, 0));

        log.down.store(false, Ordering::SeqCst);
        let outcome = confirm().unwrap();
        assert_eq!(outcome.status, RequisitionStatus::Reserved);
        assert_eq!(fx.available("Gauze"), (0, 10));
        assert_eq!(movement_count(&fx, "Gauze", MovementKind::StockIn), 2);
    }

    #[test]
    fn cancellation_keeps_an_unreleased_hold_owed_until_the_ledger_returns() {
        let down = Arc::new(AtomicBool::new(false));
        let flag = down.clone();
        let fx = Fixture::build(Arc::new(InMemoryAuditLog::new()), move |inner| {
            Arc::new(FlakyLedger { inner, down: flag }) as Arc<dyn InventoryLedger>
        });
        fx.stock("Gauze", 50);
        let id = fx.create(&[("Gauze", 10)]);
        fx.approve(id);

        let cancel = || {
            fx.engine.apply(
                id,
                &fx.clinician,
                Action::Cancel { reason: None },
                ExpectedVersion::Any,
                Some("cancel-1".into()),
            )
        };

        down.store(true, Ordering::SeqCst);
        let err = cancel().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert!(matches!(err, WorkflowError::Unsettled { .. }));
        assert_eq!(fx.status(id), RequisitionStatus::Cancelled);
        assert_eq!(fx.available("Gauze"), (40, 10));

        let still = cancel().unwrap_err();
        assert_eq!(still.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(fx.available("Gauze"), (40, 10));

        down.store(false, Ordering::SeqCst);
        let outcome = cancel().unwrap();
        assert_eq!(outcome.status, RequisitionStatus::Cancelled);
        assert_eq!(fx.available("Gauze"), (50, 0));
        assert_eq!(movement_count(&fx, "Gauze", MovementKind::Release), 1);
    }

    #[test]
    fn cancellation_and_vendor_confirmation_race_has_one_winner() {
        let fx = Fixture::new();
        fx.stock("Gauze", 3);
        let id = fx.create(&[("Gauze", 10)]);
        fx.approve(id);
        fx.act(id, &fx.vendor, Action::PlaceVendorOrder { vendor: "MedSupply".into() })
            .unwrap();
        let version = fx.engine.requisition(id).unwrap().version();
        let barrier = Barrier::new(2);

        let (cancel, confirm) = std::thread::scope(|s| {
            let cancel = s.spawn(|| {
                barrier.wait();
                fx.engine.apply(
                    id,
                    &fx.clinician,
                    Action::Cancel { reason: None },
                    ExpectedVersion::Exact(version),
                    None,
                )
            });
            let confirm = s.spawn(|| {
                barrier.wait();
                fx.engine.apply(
                    id,
                    &fx.vendor,
                    Action::ConfirmVendorFulfillment {
                        vendor_reference: "PO-1".into(),
                        supplied: vec![],
                    },
                    ExpectedVersion::Exact(version),
                    None,
                )
            });
            (cancel.join().unwrap(), confirm.join().unwrap())
        });

        match (&cancel, &confirm) {
            (Ok(_), Err(err)) => {
                assert_eq!(err.kind(), ErrorKind::Conflict);
                assert_eq!(fx.available("Gauze"), (3, 0));
            }
            (Err(err), Ok(_)) => {
                assert_eq!(err.kind(), ErrorKind::Conflict);
                assert_eq!(fx.available("Gauze"), (0, 10));
            }
            other => panic!("expected exactly one winner, got {other:?}"),
        }
    }

    #[test]
    fn idempotent_replay_returns_the_prior_outcome() {
        let fx = Fixture::new();
        let draft = || RequisitionDraft {
            department: None,
            items: vec![LineItem::new("Gauze", 1).unwrap()],
            priority: Priority::High,
        };

        let first = fx.engine.create(&fx.clinician, draft(), Some("create-1".into())).unwrap();
        let replay = fx.engine.create(&fx.clinician, draft(), Some("create-1".into())).unwrap();
        assert_eq!(first, replay);
        assert_eq!(fx.engine.store().ids().unwrap().len(), 1);

        let id = first.id;
        let submit = |key: &str| {
            fx.engine.apply(id, &fx.clinician, Action::Submit, ExpectedVersion::Any, Some(key.into()))
        };
        let submitted = submit("submit-1").unwrap();
        assert_eq!(submit("submit-1").unwrap(), submitted);
        assert_eq!(fx.engine.history(id).unwrap().len(), 2);

        let reused = fx
            .engine
            .apply(
                id,
                &fx.clinician,
                Action::Cancel { reason: None },
                ExpectedVersion::Any,
                Some("submit-1".into()),
            )
            .unwrap_err();
        assert_eq!(reused.kind(), ErrorKind::Conflict);
        assert_eq!(fx.status(id), RequisitionStatus::Submitted);
    }

    #[test]
    fn self_approval_is_always_forbidden() {
        let fx = Fixture::new();
        let draft = RequisitionDraft {
            department: None,
            items: vec![LineItem::new("Gauze", 1).unwrap()],
            priority: Priority::Standard,
        };
        let id = fx.engine.create(&fx.hod, draft, None).unwrap().id;

        // Forbidden in Draft as well as in PendingApproval.
        let early = fx.act(id, &fx.hod, Action::Approve).unwrap_err();
        assert_eq!(early.kind(), ErrorKind::Forbidden);

        fx.act(id, &fx.hod, Action::Submit).unwrap();
        fx.engine.route_for_approval(id, ExpectedVersion::Any).unwrap();
        let err = fx.act(id, &fx.hod, Action::Approve).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(fx.status(id), RequisitionStatus::PendingApproval);
    }

    #[test]
    fn failed_append_releases_the_reservation_and_can_be_retried() {
        let log = Arc::new(FlakyLog {
            inner: InMemoryAuditLog::new(),
            down: AtomicBool::new(false),
        });
        let fx = Fixture::with_log(log.clone());
        fx.stock("Gauze", 50);
        let id = fx.create(&[("Gauze", 10)]);
        fx.submit(id);

        log.down.store(true, Ordering::SeqCst);
        let approve = || {
            fx.engine
                .apply(id, &fx.hod, Action::Approve, ExpectedVersion::Any, Some("approve-1".into()))
        };
        let err = approve().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(fx.status(id), RequisitionStatus::PendingApproval);
        assert_eq!(fx.available("Gauze"), (50, 0));

        log.down.store(false, Ordering::SeqCst);
        let outcome = approve().unwrap();
        assert_eq!(outcome.status, RequisitionStatus::Reserved);
        assert_eq!(fx.available("Gauze"), (40, 10));
    }

    #[test]
    fn board_worker_tracks_the_engine() {
        let fx = Fixture::new();
        fx.stock("Gauze", 50);
        let board = Arc::new(RequisitionBoard::default());
        let log = fx.engine.log().clone();
        let sink = board.clone();
        let worker = ProjectionWorker::spawn("board", &fx.bus, move |entry: AuditEntry| {
            sink.apply_or_catch_up(&entry, &*log)
        });

        let id = fx.create(&[("Gauze", 10)]);
        let outcome = fx.approve(id);

        let deadline = Instant::now() + Duration::from_secs(2);
        while board.get(id).unwrap().map(|r| r.version) != Some(outcome.version)
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        worker.shutdown();

        let row = board.get(id).unwrap().unwrap();
        assert_eq!(row.status, RequisitionStatus::Reserved);
        assert_eq!(board.stats(None).unwrap().by_status[&RequisitionStatus::Reserved], 1);

        let rebuilt = RequisitionBoard::default();
        rebuilt.rebuild_from_log(&**fx.engine.log()).unwrap();
        assert_eq!(rebuilt.get(id).unwrap(), Some(row));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Create(u64),
        Approve(usize),
        Cancel(usize),
        Deliver(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1u64..30).prop_map(Step::Create),
            (0usize..8).prop_map(Step::Approve),
            (0usize..8).prop_map(Step::Cancel),
            (0usize..8).prop_map(Step::Deliver),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Stock is conserved: what is on the shelf, held, and debited always
        /// adds up to what was received, whatever the workflow does.
        #[test]
        fn stock_is_conserved_across_workflows(steps in proptest::collection::vec(step(), 1..40)) {
            const INITIAL: u64 = 60;
            let fx = Fixture::new();
            fx.stock("Gauze", INITIAL);
            let mut ids = Vec::new();

            for step in steps {
                match step {
                    Step::Create(qty) => ids.push(fx.create(&[("Gauze", qty)])),
                    Step::Approve(n) if !ids.is_empty() => {
                        let id = ids[n % ids.len()];
                        if fx.status(id) == RequisitionStatus::Draft {
                            fx.approve(id);
                        }
                    }
                    Step::Cancel(n) if !ids.is_empty() => {
                        let _ = fx.act(ids[n % ids.len()], &fx.clinician, Action::Cancel { reason: None });
                    }
                    Step::Deliver(n) if !ids.is_empty() => {
                        let id = ids[n % ids.len()];
                        let _ = fx.act(id, &fx.vendor, Action::RequestFulfillment);
                        let _ = fx.act(id, &fx.vendor, Action::Ship { carrier: None, tracking_reference: None });
                        let _ = fx.act(id, &fx.clinician, Action::RecordDelivery {
                            signature: "ok".into(),
                            received_at: Utc::now(),
                        });
                    }
                    _ => {}
                }

                let (available, reserved) = fx.available("Gauze");
                let debited: u64 = fx.ledger.movements("Gauze").unwrap().iter()
                    .filter(|m| m.kind == MovementKind::Debit)
                    .map(|m| m.quantity)
                    .sum();
                prop_assert_eq!(available + reserved + debited, INITIAL);

                let held: u64 = ids.iter()
                    .filter_map(|id| fx.engine.requisition(*id).unwrap().held_reservation())
                    .filter_map(|r| fx.ledger.reservation(r).unwrap())
                    .flat_map(|r| r.lines.into_iter().map(|l| l.quantity))
                    .sum();
                prop_assert_eq!(held, reserved);
            }

            for id in &ids {
                assert_valid_walk(&fx.engine.history(*id).unwrap());
            }
        }
    }
}
