use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::{DepartmentCode, ReservationId, UserId};
use reqflow_events::Event;
use reqflow_inventory::Shortfall;

use crate::{ActorRef, LineItem, Priority, RequisitionStatus};

/// What happened to a requisition. Each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequisitionEvent {
    Created {
        requester: UserId,
        department: DepartmentCode,
        items: Vec<LineItem>,
        priority: Priority,
    },
    Submitted,
    RoutedForApproval,
    Approved,
    Rejected {
        reason: String,
    },
    InventoryCheckStarted,
    StockReserved {
        reservation_id: ReservationId,
    },
    ShortageFlagged {
        shortfalls: Vec<Shortfall>,
    },
    VendorOrderPlaced {
        vendor: String,
    },
    VendorOrderAcknowledged {
        vendor_reference: String,
    },
    VendorOrderDelayed {
        attempts: u32,
        last_error: String,
    },
    VendorFulfillmentConfirmed {
        vendor_reference: String,
        supplied: Vec<LineItem>,
        reservation_id: ReservationId,
    },
    FulfillmentRequested,
    Shipped {
        carrier: Option<String>,
        tracking_reference: Option<String>,
    },
    Delivered {
        signature: String,
        received_at: DateTime<Utc>,
    },
    Cancelled {
        reason: Option<String>,
        released_reservation: Option<ReservationId>,
    },
    PriorityChanged {
        from: Priority,
        to: Priority,
    },
    CommentAdded {
        text: String,
    },
}

impl RequisitionEvent {
    /// Stable snake_case action name, matching the serialized `kind`.
    pub fn action(&self) -> &'static str {
        match self {
            RequisitionEvent::Created { .. } => "created",
            RequisitionEvent::Submitted => "submitted",
            RequisitionEvent::RoutedForApproval => "routed_for_approval",
            RequisitionEvent::Approved => "approved",
            RequisitionEvent::Rejected { .. } => "rejected",
            RequisitionEvent::InventoryCheckStarted => "inventory_check_started",
            RequisitionEvent::StockReserved { .. } => "stock_reserved",
            RequisitionEvent::ShortageFlagged { .. } => "shortage_flagged",
            RequisitionEvent::VendorOrderPlaced { .. } => "vendor_order_placed",
            RequisitionEvent::VendorOrderAcknowledged { .. } => "vendor_order_acknowledged",
            RequisitionEvent::VendorOrderDelayed { .. } => "vendor_order_delayed",
            RequisitionEvent::VendorFulfillmentConfirmed { .. } => "vendor_fulfillment_confirmed",
            RequisitionEvent::FulfillmentRequested => "fulfillment_requested",
            RequisitionEvent::Shipped { .. } => "shipped",
            RequisitionEvent::Delivered { .. } => "delivered",
            RequisitionEvent::Cancelled { .. } => "cancelled",
            RequisitionEvent::PriorityChanged { .. } => "priority_changed",
            RequisitionEvent::CommentAdded { .. } => "comment_added",
        }
    }

    /// Status after this event, or `None` for annotations that keep the status.
    pub fn target_status(&self) -> Option<RequisitionStatus> {
        use RequisitionStatus as S;
        let to = match self {
            RequisitionEvent::Created { .. } => S::Draft,
            RequisitionEvent::Submitted => S::Submitted,
            RequisitionEvent::RoutedForApproval => S::PendingApproval,
            RequisitionEvent::Approved => S::Approved,
            RequisitionEvent::Rejected { .. } => S::Rejected,
            RequisitionEvent::InventoryCheckStarted => S::InventoryCheck,
            RequisitionEvent::StockReserved { .. } => S::Reserved,
            RequisitionEvent::ShortageFlagged { .. } => S::Shortage,
            RequisitionEvent::VendorOrderPlaced { .. } => S::VendorOrdered,
            RequisitionEvent::VendorFulfillmentConfirmed { .. } => S::Reserved,
            RequisitionEvent::FulfillmentRequested => S::AwaitingFulfillment,
            RequisitionEvent::Shipped { .. } => S::Shipped,
            RequisitionEvent::Delivered { .. } => S::Delivered,
            RequisitionEvent::Cancelled { .. } => S::Cancelled,
            RequisitionEvent::VendorOrderAcknowledged { .. }
            | RequisitionEvent::VendorOrderDelayed { .. }
            | RequisitionEvent::PriorityChanged { .. }
            | RequisitionEvent::CommentAdded { .. } => return None,
        };
        Some(to)
    }

    /// Free-text note carried into the audit entry.
    pub fn note(&self) -> Option<String> {
        match self {
            RequisitionEvent::Rejected { reason } => Some(reason.clone()),
            RequisitionEvent::Cancelled { reason, .. } => reason.clone(),
            RequisitionEvent::VendorOrderDelayed { attempts, last_error } => {
                Some(format!("vendor unreachable after {attempts} attempt(s): {last_error}"))
            }
            RequisitionEvent::ShortageFlagged { shortfalls } => Some(
                shortfalls
                    .iter()
                    .map(|s| format!("{}: {} of {} available", s.item_name, s.available, s.requested))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        }
    }
}

/// One immutable audit record: the event plus who, when, and the status walk.
///
/// `from_status` is `None` only for `Created`. For annotations
/// (`target_status() == None`) `from_status == Some(to_status)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: ActorRef,
    pub occurred_at: DateTime<Utc>,
    pub from_status: Option<RequisitionStatus>,
    pub to_status: RequisitionStatus,
    pub note: Option<String>,
    pub action: RequisitionEvent,
}

impl AuditRecord {
    pub fn is_status_change(&self) -> bool {
        self.from_status != Some(self.to_status)
    }
}

impl Event for AuditRecord {
    fn event_type(&self) -> &'static str {
        match &self.action {
            RequisitionEvent::Created { .. } => "requisition.created",
            RequisitionEvent::Submitted => "requisition.submitted",
            RequisitionEvent::RoutedForApproval => "requisition.routed_for_approval",
            RequisitionEvent::Approved => "requisition.approved",
            RequisitionEvent::Rejected { .. } => "requisition.rejected",
            RequisitionEvent::InventoryCheckStarted => "requisition.inventory_check_started",
            RequisitionEvent::StockReserved { .. } => "requisition.stock_reserved",
            RequisitionEvent::ShortageFlagged { .. } => "requisition.shortage_flagged",
            RequisitionEvent::VendorOrderPlaced { .. } => "requisition.vendor_order_placed",
            RequisitionEvent::VendorOrderAcknowledged { .. } => {
                "requisition.vendor_order_acknowledged"
            }
            RequisitionEvent::VendorOrderDelayed { .. } => "requisition.vendor_order_delayed",
            RequisitionEvent::VendorFulfillmentConfirmed { .. } => {
                "requisition.vendor_fulfillment_confirmed"
            }
            RequisitionEvent::FulfillmentRequested => "requisition.fulfillment_requested",
            RequisitionEvent::Shipped { .. } => "requisition.shipped",
            RequisitionEvent::Delivered { .. } => "requisition.delivered",
            RequisitionEvent::Cancelled { .. } => "requisition.cancelled",
            RequisitionEvent::PriorityChanged { .. } => "requisition.priority_changed",
            RequisitionEvent::CommentAdded { .. } => "requisition.comment_added",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
