use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};

use reqflow_core::{DepartmentCode, RequisitionId, ReservationId};
use reqflow_inventory::record::normalize_item_name;
use reqflow_inventory::{
    DEFAULT_MINIMUM_QUANTITY, InventoryRecord, LedgerError, MovementKind, Reservation,
    ReservationState, Shortfall, StockLine, StockMovement,
};

use super::r#trait::InventoryLedger;

#[derive(Debug)]
struct ItemSlot {
    record: InventoryRecord,
    movements: Vec<StockMovement>,
}

impl ItemSlot {
    fn journal(
        &mut self,
        kind: MovementKind,
        quantity: u64,
        requisition_id: Option<RequisitionId>,
        reservation_id: Option<ReservationId>,
        source: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.movements.push(StockMovement {
            item_name: self.record.item_name.clone(),
            kind,
            quantity,
            requisition_id,
            reservation_id,
            source,
            quantity_available_after: self.record.quantity_available,
            reserved_quantity_after: self.record.reserved_quantity,
            at,
        });
    }
}

/// In-memory inventory ledger with one lock per item.
///
/// Multi-item operations take item locks in ascending name order, then the
/// reservation table lock, so they cannot deadlock against each other.
/// Delivery receipts take the delivery table lock before any item lock.
/// Operations on disjoint items never wait on one another.
#[derive(Debug, Default)]
pub struct InMemoryInventoryLedger {
    items: RwLock<BTreeMap<String, Arc<Mutex<ItemSlot>>>>,
    reservations: Mutex<HashMap<ReservationId, Reservation>>,
    deliveries: Mutex<HashSet<String>>,
}

impl InMemoryInventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, item_name: &str) -> Result<Option<Arc<Mutex<ItemSlot>>>, LedgerError> {
        let items = self
            .items
            .read()
            .map_err(|_| LedgerError::Unavailable("item index lock poisoned".to_string()))?;
        Ok(items.get(item_name.trim()).cloned())
    }

    /// Slots for `names` (already sorted and deduplicated); missing items are `None`.
    fn slots(
        &self,
        names: impl IntoIterator<Item = String>,
    ) -> Result<Vec<(String, Option<Arc<Mutex<ItemSlot>>>)>, LedgerError> {
        let items = self
            .items
            .read()
            .map_err(|_| LedgerError::Unavailable("item index lock poisoned".to_string()))?;
        Ok(names
            .into_iter()
            .map(|name| {
                let slot = items.get(&name).cloned();
                (name, slot)
            })
            .collect())
    }

    fn reservation_table(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ReservationId, Reservation>>, LedgerError> {
        self.reservations
            .lock()
            .map_err(|_| LedgerError::Unavailable("reservation table lock poisoned".to_string()))
    }

    /// Release or debit: lock the reservation's items, then re-check its state.
    fn settle(&self, id: ReservationId, kind: MovementKind) -> Result<bool, LedgerError> {
        let snapshot = self
            .reservation_table()?
            .get(&id)
            .cloned()
            .ok_or(LedgerError::UnknownReservation(id))?;

        // Fast path for already-settled reservations (no item locks needed).
        match (snapshot.state, kind) {
            (ReservationState::Held, _) => {}
            (ReservationState::Released, MovementKind::Release) => return Ok(false),
            (state, _) => {
                return Err(LedgerError::InvalidReservation {
                    id,
                    reason: format!("already {}", state_name(state)),
                });
            }
        }

        let quantities = merge_lines(&snapshot.lines);
        let slots = self.slots(quantities.keys().cloned())?;
        let mut guards = Vec::with_capacity(slots.len());
        for (name, slot) in &slots {
            let slot = slot
                .as_ref()
                .ok_or_else(|| LedgerError::UnknownItem(name.clone()))?;
            guards.push(lock(slot)?);
        }

        let at = Utc::now();
        let mut table = self.reservation_table()?;
        let reservation = table.get_mut(&id).ok_or(LedgerError::UnknownReservation(id))?;
        let changed = match kind {
            MovementKind::Release => reservation.mark_released(at)?,
            _ => {
                reservation.mark_debited(at)?;
                true
            }
        };
        if !changed {
            return Ok(false);
        }
        let requisition_id = reservation.requisition_id;

        for (guard, quantity) in guards.iter_mut().zip(quantities.values()) {
            match kind {
                MovementKind::Release => guard.record.release(*quantity, at)?,
                _ => guard.record.debit(*quantity, at)?,
            }
            guard.journal(kind, *quantity, requisition_id, Some(id), None, at);
        }

        Ok(true)
    }
}

impl InventoryLedger for InMemoryInventoryLedger {
    fn register_item(
        &self,
        item_name: &str,
        department: DepartmentCode,
        initial_quantity: u64,
        minimum_quantity: Option<u64>,
    ) -> Result<InventoryRecord, LedgerError> {
        let at = Utc::now();
        let record = InventoryRecord::new(
            item_name,
            department,
            initial_quantity,
            minimum_quantity.unwrap_or(DEFAULT_MINIMUM_QUANTITY),
            at,
        )?;

        let mut items = self
            .items
            .write()
            .map_err(|_| LedgerError::Unavailable("item index lock poisoned".to_string()))?;
        if items.contains_key(&record.item_name) {
            return Err(LedgerError::DuplicateItem(record.item_name));
        }

        let mut slot = ItemSlot {
            record: record.clone(),
            movements: Vec::new(),
        };
        if initial_quantity > 0 {
            slot.journal(
                MovementKind::StockIn,
                initial_quantity,
                None,
                None,
                Some("initial stock".to_string()),
                at,
            );
        }
        items.insert(record.item_name.clone(), Arc::new(Mutex::new(slot)));
        Ok(record)
    }

    fn receive(
        &self,
        item_name: &str,
        quantity: u64,
        source: Option<String>,
        requisition: Option<RequisitionId>,
    ) -> Result<InventoryRecord, LedgerError> {
        let slot = self
            .slot(item_name)?
            .ok_or_else(|| LedgerError::UnknownItem(item_name.trim().to_string()))?;
        let mut guard = lock(&slot)?;

        let at = Utc::now();
        guard.record.receive(quantity, at)?;
        guard.journal(MovementKind::StockIn, quantity, requisition, None, source, at);
        Ok(guard.record.clone())
    }

    fn receive_delivery(
        &self,
        delivery: &str,
        lines: &[StockLine],
        source: Option<String>,
        requisition: Option<RequisitionId>,
    ) -> Result<bool, LedgerError> {
        let mut deliveries = self
            .deliveries
            .lock()
            .map_err(|_| LedgerError::Unavailable("delivery table lock poisoned".to_string()))?;
        if deliveries.contains(delivery) {
            return Ok(false);
        }

        let mut normalized = Vec::with_capacity(lines.len());
        for line in lines {
            normalized.push(StockLine::new(
                normalize_item_name(line.item_name.clone())?,
                line.quantity,
            ));
        }
        let quantities = merge_lines(&normalized);
        let slots = self.slots(quantities.keys().cloned())?;

        let mut guards = Vec::with_capacity(slots.len());
        for ((name, slot), quantity) in slots.iter().zip(quantities.values()) {
            let slot = slot
                .as_ref()
                .ok_or_else(|| LedgerError::UnknownItem(name.clone()))?;
            let guard = lock(slot)?;
            if *quantity == 0 || guard.record.quantity_available.checked_add(*quantity).is_none() {
                return Err(LedgerError::validation(format!(
                    "cannot receive {quantity} of '{name}'"
                )));
            }
            guards.push((guard, *quantity));
        }

        let at = Utc::now();
        for (guard, quantity) in guards.iter_mut() {
            guard.record.receive(*quantity, at)?;
            guard.journal(MovementKind::StockIn, *quantity, requisition, None, source.clone(), at);
        }
        deliveries.insert(delivery.to_string());
        Ok(true)
    }

    fn reserve(
        &self,
        requisition: Option<RequisitionId>,
        lines: &[StockLine],
    ) -> Result<Reservation, LedgerError> {
        if lines.is_empty() {
            return Err(LedgerError::validation("a reservation needs at least one line"));
        }
        let mut normalized = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                return Err(LedgerError::validation(format!(
                    "quantity for '{}' must be positive",
                    line.item_name
                )));
            }
            normalized.push(StockLine::new(
                normalize_item_name(line.item_name.clone())?,
                line.quantity,
            ));
        }

        let quantities = merge_lines(&normalized);
        let slots = self.slots(quantities.keys().cloned())?;

        // Lock in name order; hold every lock until the decision is applied.
        let mut guards = Vec::with_capacity(slots.len());
        let mut shortfalls = Vec::new();
        for ((name, slot), quantity) in slots.iter().zip(quantities.values()) {
            match slot {
                Some(slot) => {
                    let guard = lock(slot)?;
                    if let Some(short) = guard.record.check_reserve(*quantity) {
                        shortfalls.push(short);
                    }
                    guards.push((guard, *quantity));
                }
                None => shortfalls.push(Shortfall {
                    item_name: name.clone(),
                    requested: *quantity,
                    available: 0,
                }),
            }
        }
        if !shortfalls.is_empty() {
            return Err(LedgerError::Shortage(shortfalls));
        }

        let at = Utc::now();
        let reservation = Reservation::held(ReservationId::new(), requisition, normalized, at);
        for (guard, quantity) in guards.iter_mut() {
            guard.record.reserve(*quantity, at)?;
            guard.journal(
                MovementKind::Reserve,
                *quantity,
                requisition,
                Some(reservation.id),
                None,
                at,
            );
        }

        self.reservation_table()?
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    fn release(&self, reservation: ReservationId) -> Result<bool, LedgerError> {
        self.settle(reservation, MovementKind::Release)
    }

    fn debit(&self, reservation: ReservationId) -> Result<(), LedgerError> {
        self.settle(reservation, MovementKind::Debit).map(|_| ())
    }

    fn record(&self, item_name: &str) -> Result<Option<InventoryRecord>, LedgerError> {
        match self.slot(item_name)? {
            Some(slot) => Ok(Some(lock(&slot)?.record.clone())),
            None => Ok(None),
        }
    }

    fn records(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        let slots: Vec<_> = {
            let items = self
                .items
                .read()
                .map_err(|_| LedgerError::Unavailable("item index lock poisoned".to_string()))?;
            items.values().cloned().collect()
        };
        slots
            .iter()
            .map(|slot| lock(slot).map(|g| g.record.clone()))
            .collect()
    }

    fn movements(&self, item_name: &str) -> Result<Vec<StockMovement>, LedgerError> {
        let slot = self
            .slot(item_name)?
            .ok_or_else(|| LedgerError::UnknownItem(item_name.trim().to_string()))?;
        let guard = lock(&slot)?;
        Ok(guard.movements.clone())
    }

    fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError> {
        Ok(self.reservation_table()?.get(&id).cloned())
    }
}

fn lock(slot: &Mutex<ItemSlot>) -> Result<MutexGuard<'_, ItemSlot>, LedgerError> {
    slot.lock()
        .map_err(|_| LedgerError::Unavailable("item lock poisoned".to_string()))
}

/// Sum quantities per item; the map's order is the lock order.
fn merge_lines(lines: &[StockLine]) -> BTreeMap<String, u64> {
    let mut merged = BTreeMap::new();
    for line in lines {
        *merged.entry(line.item_name.clone()).or_insert(0u64) += line.quantity;
    }
    merged
}

fn state_name(state: ReservationState) -> &'static str {
    match state {
        ReservationState::Held => "held",
        ReservationState::Released => "released",
        ReservationState::Debited => "debited",
    }
}
