use chrono::{DateTime, Utc};

use reqflow_core::{
    Aggregate, AggregateRoot, DepartmentCode, DomainError, RequisitionId, ReservationId, UserId,
};
use reqflow_inventory::Shortfall;

use crate::{
    ActorRef, AuditRecord, Comment, LineItem, MAX_COMMENT_LEN, NewRequisition, Priority,
    RequisitionAction, RequisitionCommand, RequisitionEvent, RequisitionStatus,
};

/// Aggregate root: Requisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requisition {
    id: RequisitionId,
    requester: Option<UserId>,
    department: Option<DepartmentCode>,
    items: Vec<LineItem>,
    priority: Priority,
    status: RequisitionStatus,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    comments: Vec<Comment>,
    shortage_flag: bool,
    shortfalls: Vec<Shortfall>,
    reservation: Option<ReservationId>,
    vendor: Option<String>,
    vendor_reference: Option<String>,
    version: u64,
    created: bool,
}

impl Requisition {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RequisitionId) -> Self {
        Self {
            id,
            requester: None,
            department: None,
            items: Vec::new(),
            priority: Priority::default(),
            status: RequisitionStatus::Draft,
            created_at: None,
            updated_at: None,
            comments: Vec::new(),
            shortage_flag: false,
            shortfalls: Vec::new(),
            reservation: None,
            vendor: None,
            vendor_reference: None,
            version: 0,
            created: false,
        }
    }

    /// Rebuild from an ordered record stream.
    pub fn replay<'a>(id: RequisitionId, records: impl IntoIterator<Item = &'a AuditRecord>) -> Self {
        let mut req = Self::empty(id);
        for r in records {
            req.apply(r);
        }
        req
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn requester(&self) -> Option<UserId> {
        self.requester
    }

    pub fn department(&self) -> Option<&DepartmentCode> {
        self.department.as_ref()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> RequisitionStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn shortage_flag(&self) -> bool {
        self.shortage_flag
    }

    /// Lines that could not be covered at the last inventory check.
    pub fn shortfalls(&self) -> &[Shortfall] {
        &self.shortfalls
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn vendor_reference(&self) -> Option<&str> {
        self.vendor_reference.as_deref()
    }

    /// Reservation still holding stock for this requisition, if any.
    ///
    /// A reservation is live from `Reserved` until delivery debits it or a
    /// cancellation releases it.
    pub fn held_reservation(&self) -> Option<ReservationId> {
        match self.status {
            RequisitionStatus::Reserved
            | RequisitionStatus::AwaitingFulfillment
            | RequisitionStatus::Shipped => self.reservation,
            _ => None,
        }
    }

    /// Last reservation recorded, live or settled.
    pub fn reservation(&self) -> Option<ReservationId> {
        self.reservation
    }

    pub fn is_requester(&self, actor: &ActorRef) -> bool {
        actor.user_id().is_some() && actor.user_id() == self.requester
    }
}

impl AggregateRoot for Requisition {
    type Id = RequisitionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Requisition {
    type Command = RequisitionCommand;
    type Event = AuditRecord;
    type Error = DomainError;

    fn apply(&mut self, record: &Self::Event) {
        match &record.action {
            RequisitionEvent::Created {
                requester,
                department,
                items,
                priority,
            } => {
                self.requester = Some(*requester);
                self.department = Some(department.clone());
                self.items = items.clone();
                self.priority = *priority;
                self.created_at = Some(record.occurred_at);
                self.created = true;
            }
            RequisitionEvent::StockReserved { reservation_id } => {
                self.reservation = Some(*reservation_id);
                self.shortage_flag = false;
            }
            RequisitionEvent::ShortageFlagged { shortfalls } => {
                self.shortage_flag = true;
                self.shortfalls = shortfalls.clone();
            }
            RequisitionEvent::VendorOrderPlaced { vendor } => {
                self.vendor = Some(vendor.clone());
            }
            RequisitionEvent::VendorOrderAcknowledged { vendor_reference } => {
                self.vendor_reference = Some(vendor_reference.clone());
            }
            RequisitionEvent::VendorFulfillmentConfirmed {
                vendor_reference,
                reservation_id,
                ..
            } => {
                self.vendor_reference = Some(vendor_reference.clone());
                self.reservation = Some(*reservation_id);
                self.shortage_flag = false;
            }
            RequisitionEvent::PriorityChanged { to, .. } => {
                self.priority = *to;
            }
            RequisitionEvent::CommentAdded { text } => {
                self.comments.push(Comment {
                    author: record.actor.clone(),
                    text: text.clone(),
                    at: record.occurred_at,
                });
            }
            _ => {}
        }

        self.status = record.to_status;
        self.updated_at = Some(record.occurred_at);

        // Deterministic version tracking: +1 per applied record.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let event = match &command.action {
            RequisitionAction::Create(new) => return self.handle_create(command, new),
            _ if !self.created => return Err(DomainError::not_found()),
            action => self.decide(command, action)?,
        };

        let to_status = match event.target_status() {
            Some(to) if !self.status.can_transition_to(to) => {
                return Err(DomainError::invalid_transition(format!(
                    "{} is not allowed from {}",
                    event.action(),
                    self.status
                )));
            }
            Some(to) => to,
            None => self.status,
        };

        Ok(vec![self.record(command, to_status, event)])
    }
}

impl Requisition {
    fn record(
        &self,
        command: &RequisitionCommand,
        to_status: RequisitionStatus,
        action: RequisitionEvent,
    ) -> AuditRecord {
        // Keep the per-requisition trail ordered even if the caller's clock lags.
        let occurred_at = match self.updated_at {
            Some(last) if last > command.occurred_at => last,
            _ => command.occurred_at,
        };

        AuditRecord {
            actor: command.actor.clone(),
            occurred_at,
            from_status: self.created.then_some(self.status),
            to_status,
            note: action.note(),
            action,
        }
    }

    fn handle_create(
        &self,
        command: &RequisitionCommand,
        new: &NewRequisition,
    ) -> Result<Vec<AuditRecord>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!("{} already exists", self.id)));
        }
        if new.id != self.id {
            return Err(DomainError::validation("requisition id mismatch"));
        }
        let requester = command
            .actor
            .user_id()
            .ok_or_else(|| DomainError::validation("a requisition must be raised by a user"))?;
        let items = new
            .items
            .iter()
            .map(|line| LineItem::new(line.item_name.clone(), line.quantity))
            .collect::<Result<Vec<_>, _>>()?;
        LineItem::validate_all(&items)?;

        let event = RequisitionEvent::Created {
            requester,
            department: new.department.clone(),
            items,
            priority: new.priority,
        };
        Ok(vec![self.record(command, RequisitionStatus::Draft, event)])
    }

    fn decide(
        &self,
        command: &RequisitionCommand,
        action: &RequisitionAction,
    ) -> Result<RequisitionEvent, DomainError> {
        use RequisitionStatus as S;

        let event = match action {
            RequisitionAction::Create(_) => {
                return Err(DomainError::conflict(format!("{} already exists", self.id)));
            }
            RequisitionAction::Submit => RequisitionEvent::Submitted,
            RequisitionAction::RouteForApproval => RequisitionEvent::RoutedForApproval,
            RequisitionAction::Approve => RequisitionEvent::Approved,
            RequisitionAction::Reject { reason } => RequisitionEvent::Rejected {
                reason: required_text("rejection reason", reason)?,
            },
            RequisitionAction::BeginInventoryCheck => RequisitionEvent::InventoryCheckStarted,
            RequisitionAction::ReserveStock { reservation_id } => RequisitionEvent::StockReserved {
                reservation_id: *reservation_id,
            },
            RequisitionAction::FlagShortage { shortfalls } => {
                if shortfalls.is_empty() {
                    return Err(DomainError::validation("a shortage needs at least one line"));
                }
                RequisitionEvent::ShortageFlagged {
                    shortfalls: shortfalls.clone(),
                }
            }
            RequisitionAction::PlaceVendorOrder { vendor } => RequisitionEvent::VendorOrderPlaced {
                vendor: required_text("vendor", vendor)?,
            },
            RequisitionAction::AcknowledgeVendorOrder { vendor_reference } => {
                self.ensure_status(S::VendorOrdered, "vendor_order_acknowledged")?;
                RequisitionEvent::VendorOrderAcknowledged {
                    vendor_reference: required_text("vendor reference", vendor_reference)?,
                }
            }
            RequisitionAction::RecordVendorDelay {
                attempts,
                last_error,
            } => {
                self.ensure_status(S::VendorOrdered, "vendor_order_delayed")?;
                RequisitionEvent::VendorOrderDelayed {
                    attempts: *attempts,
                    last_error: last_error.clone(),
                }
            }
            RequisitionAction::ConfirmVendorFulfillment {
                vendor_reference,
                supplied,
                reservation_id,
            } => {
                if self.status == S::Cancelled {
                    return Err(DomainError::conflict(format!(
                        "{} was cancelled before the vendor confirmation was recorded",
                        self.id
                    )));
                }
                for line in supplied {
                    LineItem::new(line.item_name.clone(), line.quantity)?;
                }
                RequisitionEvent::VendorFulfillmentConfirmed {
                    vendor_reference: required_text("vendor reference", vendor_reference)?,
                    supplied: supplied.clone(),
                    reservation_id: *reservation_id,
                }
            }
            RequisitionAction::RequestFulfillment => RequisitionEvent::FulfillmentRequested,
            RequisitionAction::Ship {
                carrier,
                tracking_reference,
            } => RequisitionEvent::Shipped {
                carrier: optional_text(carrier),
                tracking_reference: optional_text(tracking_reference),
            },
            RequisitionAction::RecordDelivery {
                signature,
                received_at,
            } => {
                if *received_at > command.occurred_at {
                    return Err(DomainError::validation("received_at cannot be in the future"));
                }
                RequisitionEvent::Delivered {
                    signature: required_text("signature", signature)?,
                    received_at: *received_at,
                }
            }
            RequisitionAction::Cancel {
                reason,
                released_reservation,
            } => RequisitionEvent::Cancelled {
                reason: optional_text(reason),
                released_reservation: *released_reservation,
            },
            RequisitionAction::ChangePriority { priority } => {
                if !matches!(self.status, S::Draft | S::Submitted | S::PendingApproval) {
                    return Err(DomainError::invalid_transition(format!(
                        "priority is frozen once a requisition is {}",
                        self.status
                    )));
                }
                if *priority == self.priority {
                    return Err(DomainError::validation(format!(
                        "priority is already {priority}"
                    )));
                }
                RequisitionEvent::PriorityChanged {
                    from: self.priority,
                    to: *priority,
                }
            }
            RequisitionAction::AddComment { text } => {
                let text = required_text("comment", text)?;
                if text.chars().count() > MAX_COMMENT_LEN {
                    return Err(DomainError::validation(format!(
                        "comment cannot exceed {MAX_COMMENT_LEN} characters"
                    )));
                }
                RequisitionEvent::CommentAdded { text }
            }
        };

        Ok(event)
    }

    fn ensure_status(&self, expected: RequisitionStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_transition(format!(
                "{action} is only valid while {expected}, requisition is {}",
                self.status
            )));
        }
        Ok(())
    }
}

fn required_text(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
