use std::sync::Arc;

use reqflow_core::{DepartmentCode, RequisitionId, ReservationId};
use reqflow_inventory::{
    InventoryRecord, LedgerError, Reservation, StockLine, StockMovement, StockStatus,
};

/// Stock bookkeeping for the workflow engine and warehouse receiving.
///
/// ## Concurrency contract
///
/// `reserve`, `release` and `debit` touching the same item are serialized;
/// operations on disjoint items proceed independently. A multi-item
/// `reserve` is all-or-nothing and never partially applied.
pub trait InventoryLedger: Send + Sync {
    /// Register a new item. `minimum_quantity` defaults to
    /// [`reqflow_inventory::DEFAULT_MINIMUM_QUANTITY`].
    fn register_item(
        &self,
        item_name: &str,
        department: DepartmentCode,
        initial_quantity: u64,
        minimum_quantity: Option<u64>,
    ) -> Result<InventoryRecord, LedgerError>;

    /// Stock-in. `requisition` links vendor deliveries to what they cover.
    fn receive(
        &self,
        item_name: &str,
        quantity: u64,
        source: Option<String>,
        requisition: Option<RequisitionId>,
    ) -> Result<InventoryRecord, LedgerError>;

    /// Stock-in for one vendor delivery, applied at most once per `delivery`
    /// key and all-or-nothing across lines. `Ok(false)` when that delivery
    /// was already received.
    fn receive_delivery(
        &self,
        delivery: &str,
        lines: &[StockLine],
        source: Option<String>,
        requisition: Option<RequisitionId>,
    ) -> Result<bool, LedgerError>;

    /// Hold every line or none. Unknown items count as zero stock.
    fn reserve(
        &self,
        requisition: Option<RequisitionId>,
        lines: &[StockLine],
    ) -> Result<Reservation, LedgerError>;

    /// Return held stock. `Ok(false)` when it was already released.
    fn release(&self, reservation: ReservationId) -> Result<bool, LedgerError>;

    /// Convert a held reservation into a permanent deduction.
    fn debit(&self, reservation: ReservationId) -> Result<(), LedgerError>;

    fn record(&self, item_name: &str) -> Result<Option<InventoryRecord>, LedgerError>;

    /// All records, ordered by item name.
    fn records(&self) -> Result<Vec<InventoryRecord>, LedgerError>;

    fn movements(&self, item_name: &str) -> Result<Vec<StockMovement>, LedgerError>;

    fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError>;

    /// Stock alerts: records at or below their reorder threshold.
    fn low_stock(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.status() != StockStatus::Available)
            .collect())
    }
}

impl<L> InventoryLedger for Arc<L>
where
    L: InventoryLedger + ?Sized,
{
    fn register_item(
        &self,
        item_name: &str,
        department: DepartmentCode,
        initial_quantity: u64,
        minimum_quantity: Option<u64>,
    ) -> Result<InventoryRecord, LedgerError> {
        (**self).register_item(item_name, department, initial_quantity, minimum_quantity)
    }

    fn receive(
        &self,
        item_name: &str,
        quantity: u64,
        source: Option<String>,
        requisition: Option<RequisitionId>,
    ) -> Result<InventoryRecord, LedgerError> {
        (**self).receive(item_name, quantity, source, requisition)
    }

    fn receive_delivery(
        &self,
        delivery: &str,
        lines: &[StockLine],
        source: Option<String>,
        requisition: Option<RequisitionId>,
    ) -> Result<bool, LedgerError> {
        (**self).receive_delivery(delivery, lines, source, requisition)
    }

    fn reserve(
        &self,
        requisition: Option<RequisitionId>,
        lines: &[StockLine],
    ) -> Result<Reservation, LedgerError> {
        (**self).reserve(requisition, lines)
    }

    fn release(&self, reservation: ReservationId) -> Result<bool, LedgerError> {
        (**self).release(reservation)
    }

    fn debit(&self, reservation: ReservationId) -> Result<(), LedgerError> {
        (**self).debit(reservation)
    }

    fn record(&self, item_name: &str) -> Result<Option<InventoryRecord>, LedgerError> {
        (**self).record(item_name)
    }

    fn records(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        (**self).records()
    }

    fn movements(&self, item_name: &str) -> Result<Vec<StockMovement>, LedgerError> {
        (**self).movements(item_name)
    }

    fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError> {
        (**self).reservation(id)
    }

    fn low_stock(&self) -> Result<Vec<InventoryRecord>, LedgerError> {
        (**self).low_stock()
    }
}
