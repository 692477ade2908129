use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::{DepartmentCode, RequisitionId, ReservationId};
use reqflow_inventory::Shortfall;

use crate::{ActorRef, LineItem, Priority};

/// Payload of a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequisition {
    pub id: RequisitionId,
    pub department: DepartmentCode,
    pub items: Vec<LineItem>,
    pub priority: Priority,
}

/// A decided action, with side-effect results (reservation ids, shortfalls)
/// already filled in by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RequisitionAction {
    Create(NewRequisition),
    Submit,
    RouteForApproval,
    Approve,
    Reject {
        reason: String,
    },
    BeginInventoryCheck,
    ReserveStock {
        reservation_id: ReservationId,
    },
    FlagShortage {
        shortfalls: Vec<Shortfall>,
    },
    PlaceVendorOrder {
        vendor: String,
    },
    AcknowledgeVendorOrder {
        vendor_reference: String,
    },
    RecordVendorDelay {
        attempts: u32,
        last_error: String,
    },
    ConfirmVendorFulfillment {
        vendor_reference: String,
        supplied: Vec<LineItem>,
        reservation_id: ReservationId,
    },
    RequestFulfillment,
    Ship {
        carrier: Option<String>,
        tracking_reference: Option<String>,
    },
    RecordDelivery {
        signature: String,
        received_at: DateTime<Utc>,
    },
    Cancel {
        reason: Option<String>,
        released_reservation: Option<ReservationId>,
    },
    ChangePriority {
        priority: Priority,
    },
    AddComment {
        text: String,
    },
}

/// Command: an action performed by an actor at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionCommand {
    pub actor: ActorRef,
    pub occurred_at: DateTime<Utc>,
    pub action: RequisitionAction,
}

impl RequisitionCommand {
    pub fn new(actor: ActorRef, occurred_at: DateTime<Utc>, action: RequisitionAction) -> Self {
        Self {
            actor,
            occurred_at,
            action,
        }
    }
}
