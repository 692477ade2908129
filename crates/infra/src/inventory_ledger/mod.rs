//! Inventory ledger boundary: per-item serialized stock bookkeeping.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryInventoryLedger;
pub use r#trait::InventoryLedger;
