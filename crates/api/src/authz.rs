//! Route-level permission guard.
//!
//! Workflow transitions are authorized inside the engine, which also applies
//! the relational rules. Read models, inventory and vendor endpoints have no
//! aggregate to consult, so they are checked here before touching services.

use reqflow_auth::{AuthzError, Permission, authorize, authorize_any};

use crate::context::PrincipalContext;

/// Require a single permission.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), AuthzError> {
    authorize(principal.principal(), permission)
}

/// Require at least one of `any_of`.
pub fn require_any(principal: &PrincipalContext, any_of: &[Permission]) -> Result<(), AuthzError> {
    authorize_any(principal.principal(), any_of)
}
