//! Read models built from the audit stream.
//!
//! Projections are:
//! - **Rebuildable**: reconstructed from the audit log at any time
//! - **Idempotent**: safe for at-least-once delivery
//! - **Lagging**: fed by a bus worker, so reads trail writes by queue latency

pub mod requisition_board;

pub use requisition_board::{
    BoardError, BoardFilter, BoardStats, DepartmentLoad, Escalation, Page, PageRequest,
    PendingCount, RequisitionBoard, RequisitionSummary,
};
