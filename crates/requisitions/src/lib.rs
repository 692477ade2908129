//! Requisition domain module (event-sourced).
//!
//! Business rules for supply requisitions, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage). Every accepted command yields
//! `AuditRecord`s; replaying them rebuilds the aggregate.

pub mod actor;
pub mod command;
pub mod event;
pub mod line;
pub mod requisition;
pub mod status;

pub use actor::ActorRef;
pub use command::{NewRequisition, RequisitionAction, RequisitionCommand};
pub use event::{AuditRecord, RequisitionEvent};
pub use line::{Comment, LineItem, MAX_COMMENT_LEN};
pub use requisition::Requisition;
pub use status::{Priority, RequisitionStatus};
