//! Inventory domain module (stock records, reservations, movements).
//!
//! Pure, deterministic bookkeeping rules: no IO, no locking, no storage. The
//! infra ledger serializes access and calls into these types.

pub mod error;
pub mod movement;
pub mod record;
pub mod reservation;

pub use error::{LedgerError, Shortfall};
pub use movement::{MovementKind, StockMovement};
pub use record::{DEFAULT_MINIMUM_QUANTITY, InventoryRecord, StockLine, StockStatus};
pub use reservation::{Reservation, ReservationState};
