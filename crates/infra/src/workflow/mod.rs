//! Workflow engine: role-gated transitions with inventory side effects.

pub mod action;
pub mod engine;
pub mod error;
pub mod idempotency;
pub mod policy;

pub use action::{Action, RequisitionDraft, TransitionOutcome, VendorAnnotation};
pub use engine::WorkflowEngine;
pub use error::WorkflowError;
pub use idempotency::{Fingerprint, IdempotencyStore};
pub use policy::{actor_ref, authorize_action};
