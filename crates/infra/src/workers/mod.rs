//! Background consumers of the audit entry bus.

pub mod approval_router;
pub mod notifier;
pub mod projection_worker;

pub use approval_router::ApprovalRouter;
pub use notifier::{Notification, NotificationKind, NotificationRouter, Notifier, Recipient, TracingNotifier};
pub use projection_worker::{ProjectionWorker, WorkerHandle};
