//! Who may perform which action on which requisition.
//!
//! Permission checks come from `reqflow-auth`; the relational rules
//! (requester-only, same department, no self-approval) need the requisition
//! and live here.

use reqflow_auth::{Actor, AuthzError, Permission, Principal, Role, authorize};
use reqflow_requisitions::{ActorRef, Requisition};

use super::Action;

pub fn actor_ref(actor: &Actor) -> ActorRef {
    match actor {
        Actor::User(p) => ActorRef::user(p.user_id, p.department.clone()),
        Actor::System => ActorRef::System,
    }
}

/// Authorize `action` by `actor` against the requisition's current state.
///
/// Runs before the state machine check, so a forbidden caller learns nothing
/// about the requisition's status.
pub fn authorize_action(
    actor: &Actor,
    req: &Requisition,
    action: &Action,
) -> Result<(), AuthzError> {
    let principal = match actor {
        Actor::System => return authorize_system(action),
        Actor::User(p) => p,
    };

    if action.is_system_only() {
        return Err(AuthzError::denied(format!(
            "{} is performed by the system",
            action.name()
        )));
    }

    let is_requester = req.requester() == Some(principal.user_id);
    let same_department = req.department() == Some(&principal.department);

    match action {
        Action::Submit => {
            authorize(principal, &Permission::REQUISITIONS_SUBMIT)?;
            require(is_requester, "only the requester can submit")
        }
        Action::Approve | Action::Reject { .. } => {
            authorize(principal, &Permission::REQUISITIONS_APPROVE)?;
            require(!is_requester, "requesters cannot decide on their own requisition")?;
            require_department(principal, same_department)
        }
        Action::PlaceVendorOrder { .. } => authorize(principal, &Permission::VENDOR_ORDER),
        Action::ConfirmVendorFulfillment { .. } => {
            authorize(principal, &Permission::VENDOR_CONFIRM)
        }
        Action::RequestFulfillment => authorize(principal, &Permission::REQUISITIONS_FULFIL),
        Action::Ship { .. } => authorize(principal, &Permission::REQUISITIONS_SHIP),
        Action::RecordDelivery { .. } => {
            if is_requester {
                return Ok(());
            }
            authorize(principal, &Permission::REQUISITIONS_DELIVER)?;
            require_department(principal, same_department)
        }
        Action::Cancel { .. } => require(
            is_requester || principal.is_admin(),
            "only the requester or an administrator can cancel",
        ),
        Action::ChangePriority { .. } => {
            authorize(principal, &Permission::REQUISITIONS_PRIORITIZE)?;
            require_department(principal, same_department)
        }
        Action::AddComment { .. } => {
            if is_requester || principal.is_admin() {
                return Ok(());
            }
            authorize(principal, &Permission::REQUISITIONS_COMMENT)?;
            require(
                same_department || principal.has_role(&Role::VENDOR),
                "comments are limited to the department and its vendors",
            )
        }
        Action::RouteForApproval | Action::BeginInventoryCheck => Ok(()),
    }
}

fn authorize_system(action: &Action) -> Result<(), AuthzError> {
    match action {
        Action::RouteForApproval
        | Action::BeginInventoryCheck
        | Action::ConfirmVendorFulfillment { .. } => Ok(()),
        other => Err(AuthzError::denied(format!(
            "the system actor cannot {}",
            other.name()
        ))),
    }
}

fn require(condition: bool, reason: &str) -> Result<(), AuthzError> {
    if condition {
        Ok(())
    } else {
        Err(AuthzError::denied(reason))
    }
}

/// Administrators act across departments; everyone else stays in their own.
fn require_department(principal: &Principal, same_department: bool) -> Result<(), AuthzError> {
    require(
        same_department || principal.is_admin(),
        "actor belongs to another department",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reqflow_core::{DepartmentCode, RequisitionId, UserId};
    use reqflow_events::execute;
    use reqflow_requisitions::{
        LineItem, NewRequisition, Priority, RequisitionAction, RequisitionCommand,
    };

    fn principal(dept: &str, roles: Vec<Role>) -> Principal {
        Principal::new(UserId::new(), DepartmentCode::new(dept).unwrap(), roles)
    }

    fn requisition_by(requester: &Principal) -> Requisition {
        let id = RequisitionId::from_sequence(1).unwrap();
        let mut req = Requisition::empty(id);
        execute(
            &mut req,
            &RequisitionCommand::new(
                actor_ref(&Actor::User(requester.clone())),
                Utc::now(),
                RequisitionAction::Create(NewRequisition {
                    id,
                    department: requester.department.clone(),
                    items: vec![LineItem::new("Gauze", 1).unwrap()],
                    priority: Priority::Standard,
                }),
            ),
        )
        .unwrap();
        req
    }

    fn check(p: &Principal, req: &Requisition, action: Action) -> Result<(), AuthzError> {
        authorize_action(&Actor::User(p.clone()), req, &action)
    }

    #[test]
    fn self_approval_is_forbidden_even_for_hods() {
        let hod = principal("ICU", vec![Role::HOD]);
        let req = requisition_by(&hod);
        assert!(check(&hod, &req, Action::Approve).is_err());

        let other_hod = principal("ICU", vec![Role::HOD]);
        assert!(check(&other_hod, &req, Action::Approve).is_ok());
    }

    #[test]
    fn approvers_are_limited_to_their_department_unless_admin() {
        let clinician = principal("ICU", vec![Role::CLINICIAN]);
        let req = requisition_by(&clinician);

        assert!(check(&principal("ER", vec![Role::HOD]), &req, Action::Approve).is_err());
        assert!(check(&principal("ER", vec![Role::ADMIN]), &req, Action::Approve).is_ok());
        assert!(
            check(&principal("ICU", vec![Role::CLINICIAN]), &req, Action::Approve).is_err()
        );
    }

    #[test]
    fn submit_and_cancel_belong_to_the_requester() {
        let clinician = principal("ICU", vec![Role::CLINICIAN]);
        let colleague = principal("ICU", vec![Role::CLINICIAN]);
        let req = requisition_by(&clinician);

        assert!(check(&clinician, &req, Action::Submit).is_ok());
        assert!(check(&colleague, &req, Action::Submit).is_err());
        assert!(check(&colleague, &req, Action::Cancel { reason: None }).is_err());
        assert!(
            check(
                &principal("ER", vec![Role::ADMIN]),
                &req,
                Action::Cancel { reason: None }
            )
            .is_ok()
        );
    }

    #[test]
    fn system_only_edges_reject_humans_and_system_rejects_human_edges() {
        let clinician = principal("ICU", vec![Role::CLINICIAN]);
        let req = requisition_by(&clinician);
        let admin = principal("ICU", vec![Role::ADMIN]);

        assert!(check(&admin, &req, Action::RouteForApproval).is_err());
        assert!(authorize_action(&Actor::System, &req, &Action::RouteForApproval).is_ok());
        assert!(authorize_action(&Actor::System, &req, &Action::Approve).is_err());
    }

    #[test]
    fn delivery_by_requester_or_department_staff() {
        let clinician = principal("ICU", vec![Role::CLINICIAN]);
        let req = requisition_by(&clinician);
        let delivery = || Action::RecordDelivery {
            signature: "x".into(),
            received_at: Utc::now(),
        };

        assert!(check(&clinician, &req, delivery()).is_ok());
        assert!(check(&principal("ICU", vec![Role::DEPARTMENT_STAFF]), &req, delivery()).is_ok());
        assert!(check(&principal("ER", vec![Role::DEPARTMENT_STAFF]), &req, delivery()).is_err());
        assert!(check(&principal("ICU", vec![Role::VENDOR]), &req, delivery()).is_err());
    }

    #[test]
    fn vendors_order_ship_and_comment_across_departments() {
        let clinician = principal("ICU", vec![Role::CLINICIAN]);
        let req = requisition_by(&clinician);
        let vendor = principal("SUPPLY", vec![Role::VENDOR]);

        assert!(check(&vendor, &req, Action::PlaceVendorOrder { vendor: "Acme".into() }).is_ok());
        assert!(
            check(
                &vendor,
                &req,
                Action::Ship {
                    carrier: None,
                    tracking_reference: None
                }
            )
            .is_ok()
        );
        assert!(check(&vendor, &req, Action::AddComment { text: "eta 2d".into() }).is_ok());
        assert!(
            check(
                &principal("ER", vec![Role::CLINICIAN]),
                &req,
                Action::AddComment { text: "hi".into() }
            )
            .is_err()
        );
    }
}
