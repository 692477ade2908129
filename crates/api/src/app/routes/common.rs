use reqflow_auth::AuthzError;
use reqflow_core::{DepartmentCode, RequisitionId, UserId};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

pub fn parse_requisition_id(raw: &str) -> Result<RequisitionId, ApiError> {
    raw.parse::<RequisitionId>()
        .map_err(|_| ApiError::NotFound(format!("requisition '{raw}' not found")))
}

/// A client-supplied actor is never trusted: it may only restate the token
/// subject.
pub fn ensure_claimed_actor(
    principal: &PrincipalContext,
    claimed: Option<UserId>,
) -> Result<(), AuthzError> {
    match claimed {
        Some(user) if user != principal.user_id() => Err(AuthzError::denied(format!(
            "cannot act as {user}; the token belongs to {}",
            principal.user_id()
        ))),
        _ => Ok(()),
    }
}

/// Another department's requisition reads as missing, not forbidden.
pub fn ensure_visible(
    principal: &PrincipalContext,
    id: RequisitionId,
    department: Option<&DepartmentCode>,
) -> Result<(), ApiError> {
    match (principal.read_scope(), department) {
        (Some(own), Some(department)) if own != department => {
            Err(ApiError::NotFound(format!("requisition {id} not found")))
        }
        _ => Ok(()),
    }
}
