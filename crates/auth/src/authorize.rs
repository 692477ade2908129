use thiserror::Error;

use reqflow_core::ErrorKind;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    MissingPermission(String),

    #[error("forbidden: {0}")]
    Denied(String),
}

impl AuthzError {
    pub fn denied(msg: impl Into<String>) -> Self {
        Self::Denied(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Forbidden
    }
}

/// Check that a principal holds a permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.has_permission(required) {
        Ok(())
    } else {
        Err(AuthzError::MissingPermission(required.as_str().to_string()))
    }
}

/// Succeeds if the principal holds at least one of `any_of`.
pub fn authorize_any(principal: &Principal, any_of: &[Permission]) -> Result<(), AuthzError> {
    if any_of.iter().any(|p| principal.has_permission(p)) {
        return Ok(());
    }
    let names = any_of.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(" | ");
    Err(AuthzError::MissingPermission(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use reqflow_core::{DepartmentCode, UserId};

    fn principal(roles: Vec<Role>) -> Principal {
        Principal::new(UserId::new(), DepartmentCode::new("ER").unwrap(), roles)
    }

    #[test]
    fn wildcard_grants_everything() {
        let admin = principal(vec![Role::ADMIN]);
        assert!(authorize(&admin, &Permission::VENDOR_ORDER).is_ok());
        assert!(authorize(&admin, &Permission::new("anything.at_all")).is_ok());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let clinician = principal(vec![Role::CLINICIAN]);
        let err = authorize(&clinician, &Permission::REQUISITIONS_APPROVE).unwrap_err();
        assert_eq!(err, AuthzError::MissingPermission("requisitions.approve".into()));
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn any_of_accepts_a_single_match() {
        let store = principal(vec![Role::STORE_MANAGER]);
        assert!(
            authorize_any(&store, &[Permission::REQUISITIONS_SHIP, Permission::REQUISITIONS_FULFIL]).is_ok()
        );
        assert!(authorize_any(&store, &[Permission::REQUISITIONS_SHIP]).is_err());
    }
}
