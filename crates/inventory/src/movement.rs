use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::{RequisitionId, ReservationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    StockIn,
    Reserve,
    Release,
    Debit,
}

/// One entry in an item's stock journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub item_name: String,
    pub kind: MovementKind,
    pub quantity: u64,
    pub requisition_id: Option<RequisitionId>,
    pub reservation_id: Option<ReservationId>,
    /// Free-text origin for stock-in (supplier, "warehouse receiving", ...).
    pub source: Option<String>,
    pub quantity_available_after: u64,
    pub reserved_quantity_after: u64,
    pub at: DateTime<Utc>,
}
