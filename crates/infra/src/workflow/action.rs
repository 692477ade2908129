use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use reqflow_core::{DepartmentCode, DomainError, RequisitionId};
use reqflow_requisitions::{LineItem, Priority, RequisitionStatus};

/// A transition request as callers express it.
///
/// Side-effect outcomes (reservation ids, shortfalls) are not part of the
/// request: the engine fills them in after talking to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Action {
    Submit,
    RouteForApproval,
    Approve,
    Reject {
        reason: String,
    },
    BeginInventoryCheck,
    PlaceVendorOrder {
        vendor: String,
    },
    ConfirmVendorFulfillment {
        vendor_reference: String,
        #[serde(default)]
        supplied: Vec<LineItem>,
    },
    RequestFulfillment,
    Ship {
        #[serde(default)]
        carrier: Option<String>,
        #[serde(default)]
        tracking_reference: Option<String>,
    },
    RecordDelivery {
        signature: String,
        received_at: DateTime<Utc>,
    },
    Cancel {
        #[serde(default)]
        reason: Option<String>,
    },
    ChangePriority {
        priority: Priority,
    },
    AddComment {
        text: String,
    },
}

impl Action {
    pub const NAMES: [&'static str; 13] = [
        "submit",
        "route_for_approval",
        "approve",
        "reject",
        "begin_inventory_check",
        "place_vendor_order",
        "confirm_vendor_fulfillment",
        "request_fulfillment",
        "ship",
        "record_delivery",
        "cancel",
        "change_priority",
        "add_comment",
    ];

    /// Snake_case action name, as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Submit => "submit",
            Action::RouteForApproval => "route_for_approval",
            Action::Approve => "approve",
            Action::Reject { .. } => "reject",
            Action::BeginInventoryCheck => "begin_inventory_check",
            Action::PlaceVendorOrder { .. } => "place_vendor_order",
            Action::ConfirmVendorFulfillment { .. } => "confirm_vendor_fulfillment",
            Action::RequestFulfillment => "request_fulfillment",
            Action::Ship { .. } => "ship",
            Action::RecordDelivery { .. } => "record_delivery",
            Action::Cancel { .. } => "cancel",
            Action::ChangePriority { .. } => "change_priority",
            Action::AddComment { .. } => "add_comment",
        }
    }

    /// Approver decisions; only one can ever win.
    pub fn is_decision(&self) -> bool {
        matches!(self, Action::Approve | Action::Reject { .. })
    }

    /// Edges only the engine itself may drive.
    pub fn is_system_only(&self) -> bool {
        matches!(self, Action::RouteForApproval | Action::BeginInventoryCheck)
    }

    /// Build an action from its wire name and optional JSON payload.
    ///
    /// The payload must be an object (or absent); payload-less actions reject
    /// any field.
    pub fn from_parts(action: &str, payload: Option<JsonValue>) -> Result<Self, DomainError> {
        if !Self::NAMES.contains(&action) {
            return Err(DomainError::validation(format!("unknown action '{action}'")));
        }

        let mut body = match payload {
            None | Some(JsonValue::Null) => serde_json::Map::new(),
            Some(JsonValue::Object(map)) => map,
            Some(_) => {
                return Err(DomainError::validation(format!(
                    "payload for '{action}' must be a JSON object"
                )));
            }
        };
        if body.contains_key("action") {
            return Err(DomainError::validation("payload cannot carry an 'action' field"));
        }
        let carried_fields = !body.is_empty();
        body.insert("action".to_string(), JsonValue::String(action.to_string()));

        let parsed: Action = serde_json::from_value(JsonValue::Object(body))
            .map_err(|e| DomainError::validation(format!("invalid payload for '{action}': {e}")))?;

        if carried_fields && parsed.takes_no_payload() {
            return Err(DomainError::validation(format!("'{action}' takes no payload")));
        }
        Ok(parsed)
    }

    fn takes_no_payload(&self) -> bool {
        matches!(
            self,
            Action::Submit
                | Action::RouteForApproval
                | Action::Approve
                | Action::BeginInventoryCheck
                | Action::RequestFulfillment
        )
    }
}

/// Input for creating a requisition. `department` defaults to the caller's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionDraft {
    #[serde(default)]
    pub department: Option<DepartmentCode>,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub priority: Priority,
}

/// Result of an accepted (or replayed) transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub id: RequisitionId,
    pub status: RequisitionStatus,
    pub version: u64,
}

/// Vendor coordinator annotations on a parked order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorAnnotation {
    Acknowledged { vendor_reference: String },
    Delayed { attempts: u32, last_error: String },
}
