//! Append-only audit log boundary.
//!
//! The log is the source of truth for requisitions: the store rehydrates
//! from it, the projector rebuilds from it, and the bus only distributes
//! what it already holds.

pub mod history;
pub mod in_memory;
pub mod r#trait;

pub use history::{AuditHistory, HISTORY_PAGE_SIZE, HistoryIter, history};
pub use in_memory::InMemoryAuditLog;
pub use r#trait::{AuditEntry, AuditLog, AuditLogError};
