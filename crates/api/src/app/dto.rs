use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use reqflow_core::{AggregateRoot, DepartmentCode, UserId};
use reqflow_infra::audit_log::AuditEntry;
use reqflow_infra::projections::BoardFilter;
use reqflow_inventory::{InventoryRecord, StockMovement};
use reqflow_requisitions::{LineItem, Priority, Requisition};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRequisitionRequest {
    /// Informational; must match the token subject when present.
    #[serde(default)]
    pub requester: Option<UserId>,
    #[serde(default)]
    pub department: Option<DepartmentCode>,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionRequest {
    pub action: String,
    #[serde(default)]
    pub actor: Option<UserId>,
    #[serde(default)]
    pub payload: Option<JsonValue>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub department: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl ListQuery {
    pub fn filter(&self) -> Result<BoardFilter, ApiError> {
        Ok(BoardFilter {
            department: self
                .department
                .as_deref()
                .map(DepartmentCode::new)
                .transpose()?,
            status: self
                .status
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(ApiError::BadRequest)?,
            priority: self
                .priority
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(ApiError::BadRequest)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterItemRequest {
    pub item_name: String,
    /// Defaults to the caller's department.
    #[serde(default)]
    pub department: Option<DepartmentCode>,
    #[serde(default)]
    pub initial_quantity: u64,
    #[serde(default)]
    pub minimum_quantity: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiveStockRequest {
    pub quantity: u64,
    #[serde(default)]
    pub source: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn audit_entry_to_json(entry: &AuditEntry) -> JsonValue {
    let record = entry.payload();
    json!({
        "requisition_id": entry.stream_id(),
        "sequence_number": entry.sequence_number(),
        "recorded_at": entry.recorded_at(),
        "occurred_at": record.occurred_at,
        "actor": record.actor,
        "from_status": record.from_status,
        "to_status": record.to_status,
        "note": record.note,
        "action": record.action,
    })
}

pub fn requisition_to_json(req: &Requisition, history: &[AuditEntry]) -> JsonValue {
    json!({
        "id": req.id(),
        "requester": req.requester(),
        "department": req.department(),
        "items": req.items(),
        "priority": req.priority(),
        "status": req.status(),
        "shortage_flag": req.shortage_flag(),
        "shortfalls": req.shortfalls(),
        "reservation_id": req.reservation(),
        "vendor": req.vendor(),
        "vendor_reference": req.vendor_reference(),
        "comments": req.comments(),
        "created_at": req.created_at(),
        "updated_at": req.updated_at(),
        "version": req.version(),
        "history": history.iter().map(audit_entry_to_json).collect::<Vec<_>>(),
    })
}

pub fn inventory_to_json(record: &InventoryRecord) -> JsonValue {
    json!({
        "item_name": record.item_name,
        "department": record.department,
        "quantity_available": record.quantity_available,
        "reserved_quantity": record.reserved_quantity,
        "minimum_quantity": record.minimum_quantity,
        "status": record.status(),
        "updated_at": record.updated_at,
    })
}

pub fn movement_to_json(movement: &StockMovement) -> JsonValue {
    json!({
        "kind": movement.kind,
        "quantity": movement.quantity,
        "requisition_id": movement.requisition_id,
        "reservation_id": movement.reservation_id,
        "source": movement.source,
        "quantity_available_after": movement.quantity_available_after,
        "reserved_quantity_after": movement.reserved_quantity_after,
        "at": movement.at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_requisitions::RequisitionStatus;

    #[test]
    fn list_query_parses_filters() {
        let q = ListQuery {
            department: Some("icu".into()),
            status: Some("pending_approval".into()),
            priority: Some("critical".into()),
            ..ListQuery::default()
        };
        let filter = q.filter().unwrap();
        assert_eq!(filter.department.unwrap().as_str(), "ICU");
        assert_eq!(filter.status, Some(RequisitionStatus::PendingApproval));
        assert_eq!(filter.priority, Some(Priority::Critical));
    }

    #[test]
    fn unknown_filter_values_are_rejected() {
        let q = ListQuery {
            status: Some("lost".into()),
            ..ListQuery::default()
        };
        assert!(matches!(q.filter(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn create_request_rejects_unknown_fields() {
        let parsed: Result<CreateRequisitionRequest, _> = serde_json::from_value(json!({
            "items": [{"item_name": "Gauze", "quantity": 2}],
            "status": "approved",
        }));
        assert!(parsed.is_err());
    }
}
