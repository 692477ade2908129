use std::sync::Arc;

use tracing::info;

use reqflow_core::{DepartmentCode, RequisitionId, UserId};
use reqflow_events::EventBus;
use reqflow_requisitions::{ActorRef, RequisitionEvent};

use super::projection_worker::{ProjectionWorker, WorkerHandle};
use crate::audit_log::AuditEntry;
use crate::workflow::{WorkflowEngine, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Approved,
    Rejected,
    Delivered,
}

impl NotificationKind {
    pub fn subject(self) -> &'static str {
        match self {
            NotificationKind::Approved => "Requisition Approved",
            NotificationKind::Rejected => "Requisition Rejected",
            NotificationKind::Delivered => "Requisition Delivered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    User(UserId),
    /// Every head of the department; used when no approver is on record.
    DepartmentHeads(DepartmentCode),
}

impl core::fmt::Display for Recipient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Recipient::User(user) => write!(f, "user {user}"),
            Recipient::DepartmentHeads(department) => write!(f, "heads of {department}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub requisition_id: RequisitionId,
    pub recipients: Vec<Recipient>,
    pub message: String,
}

/// Outbound channel for requester and approver notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), WorkflowError>;
}

/// Writes each notice to the log; the default channel.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), WorkflowError> {
        for recipient in &notification.recipients {
            info!(
                requisition_id = %notification.requisition_id,
                subject = notification.kind.subject(),
                %recipient,
                message = %notification.message,
                "notification sent"
            );
        }
        Ok(())
    }
}

/// Tells requesters their requisition was approved, rejected or delivered,
/// and the approving head when it is delivered.
#[derive(Debug)]
pub struct NotificationRouter;

impl NotificationRouter {
    pub fn spawn<B>(engine: Arc<WorkflowEngine<B>>, notifier: Arc<dyn Notifier>, bus: &B) -> WorkerHandle
    where
        B: EventBus<AuditEntry> + 'static,
    {
        ProjectionWorker::spawn("notification-router", bus, move |entry: AuditEntry| {
            notify(&engine, notifier.as_ref(), &entry)
        })
    }
}

/// Send the notice for one entry, if it warrants one.
pub fn notify<B>(
    engine: &WorkflowEngine<B>,
    notifier: &dyn Notifier,
    entry: &AuditEntry,
) -> Result<(), WorkflowError>
where
    B: EventBus<AuditEntry>,
{
    let id = entry.stream_id();
    let kind = match &entry.payload().action {
        RequisitionEvent::Approved => NotificationKind::Approved,
        RequisitionEvent::Rejected { .. } => NotificationKind::Rejected,
        RequisitionEvent::Delivered { .. } => NotificationKind::Delivered,
        _ => return Ok(()),
    };

    let (req, history) = engine.requisition_with_history(id)?;
    let mut recipients: Vec<Recipient> = req.requester().map(Recipient::User).into_iter().collect();

    let message = match (kind, &entry.payload().action) {
        (NotificationKind::Approved, _) => format!("Requisition {id} approved by HOD"),
        (NotificationKind::Rejected, RequisitionEvent::Rejected { reason }) => {
            format!("Requisition {id} rejected by HOD: {reason}")
        }
        (NotificationKind::Rejected, _) => format!("Requisition {id} rejected by HOD"),
        (NotificationKind::Delivered, _) => {
            let approver = history.iter().rev().find_map(|e| match (&e.payload().action, &e.payload().actor) {
                (RequisitionEvent::Approved, ActorRef::User { user_id, .. }) => Some(*user_id),
                _ => None,
            });
            match (approver, req.department()) {
                (Some(user), _) => recipients.push(Recipient::User(user)),
                (None, Some(department)) => recipients.push(Recipient::DepartmentHeads(department.clone())),
                (None, None) => {}
            }
            match req.department() {
                Some(department) => format!("Requisition {id} has been delivered to {department}"),
                None => format!("Requisition {id} has been delivered"),
            }
        }
    };

    if recipients.is_empty() {
        return Ok(());
    }
    notifier.notify(&Notification {
        kind,
        requisition_id: id,
        recipients,
        message,
    })
}
