use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "requisitions.approve").
/// The wildcard `"*"` grants everything and is reserved for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const REQUISITIONS_CREATE: Permission = Permission(Cow::Borrowed("requisitions.create"));
    pub const REQUISITIONS_READ: Permission = Permission(Cow::Borrowed("requisitions.read"));
    /// Read requisitions of every department, not just one's own.
    pub const REQUISITIONS_READ_ALL: Permission = Permission(Cow::Borrowed("requisitions.read_all"));
    pub const REQUISITIONS_COMMENT: Permission = Permission(Cow::Borrowed("requisitions.comment"));
    pub const REQUISITIONS_SUBMIT: Permission = Permission(Cow::Borrowed("requisitions.submit"));
    pub const REQUISITIONS_CANCEL: Permission = Permission(Cow::Borrowed("requisitions.cancel"));
    /// Covers both approve and reject.
    pub const REQUISITIONS_APPROVE: Permission = Permission(Cow::Borrowed("requisitions.approve"));
    pub const REQUISITIONS_PRIORITIZE: Permission =
        Permission(Cow::Borrowed("requisitions.prioritize"));
    pub const REQUISITIONS_DELIVER: Permission = Permission(Cow::Borrowed("requisitions.deliver"));
    pub const REQUISITIONS_FULFIL: Permission = Permission(Cow::Borrowed("requisitions.fulfil"));
    pub const REQUISITIONS_SHIP: Permission = Permission(Cow::Borrowed("requisitions.ship"));

    pub const VENDOR_ORDER: Permission = Permission(Cow::Borrowed("vendor.order"));
    pub const VENDOR_CONFIRM: Permission = Permission(Cow::Borrowed("vendor.confirm"));

    pub const INVENTORY_READ: Permission = Permission(Cow::Borrowed("inventory.read"));
    pub const INVENTORY_WRITE: Permission = Permission(Cow::Borrowed("inventory.write"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default role → permission mapping.
///
/// Unknown roles grant nothing. A principal's effective permissions are the
/// union over all of its roles.
pub fn default_role_permissions(role: &Role) -> Vec<Permission> {
    match role.as_str() {
        "admin" => vec![Permission::WILDCARD],
        "hod" => vec![
            Permission::REQUISITIONS_CREATE,
            Permission::REQUISITIONS_READ,
            Permission::REQUISITIONS_COMMENT,
            Permission::REQUISITIONS_SUBMIT,
            Permission::REQUISITIONS_CANCEL,
            Permission::REQUISITIONS_APPROVE,
            Permission::REQUISITIONS_PRIORITIZE,
            Permission::REQUISITIONS_DELIVER,
            Permission::INVENTORY_READ,
        ],
        "clinician" => vec![
            Permission::REQUISITIONS_CREATE,
            Permission::REQUISITIONS_READ,
            Permission::REQUISITIONS_COMMENT,
            Permission::REQUISITIONS_SUBMIT,
            Permission::REQUISITIONS_CANCEL,
            Permission::REQUISITIONS_DELIVER,
        ],
        "department_staff" => vec![
            Permission::REQUISITIONS_READ,
            Permission::REQUISITIONS_COMMENT,
            Permission::REQUISITIONS_DELIVER,
        ],
        "vendor" => vec![
            Permission::REQUISITIONS_READ,
            Permission::REQUISITIONS_READ_ALL,
            Permission::REQUISITIONS_COMMENT,
            Permission::VENDOR_ORDER,
            Permission::VENDOR_CONFIRM,
            Permission::REQUISITIONS_FULFIL,
            Permission::REQUISITIONS_SHIP,
        ],
        "store_manager" => vec![
            Permission::REQUISITIONS_READ,
            Permission::REQUISITIONS_READ_ALL,
            Permission::REQUISITIONS_FULFIL,
            Permission::INVENTORY_READ,
            Permission::INVENTORY_WRITE,
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_wildcard_and_unknown_roles_get_nothing() {
        assert_eq!(default_role_permissions(&Role::ADMIN), vec![Permission::WILDCARD]);
        assert!(default_role_permissions(&Role::new("viewer")).is_empty());
    }

    #[test]
    fn only_approver_roles_can_approve() {
        let approvers: Vec<_> = [
            Role::CLINICIAN,
            Role::HOD,
            Role::VENDOR,
            Role::DEPARTMENT_STAFF,
            Role::STORE_MANAGER,
        ]
        .into_iter()
        .filter(|r| default_role_permissions(r).contains(&Permission::REQUISITIONS_APPROVE))
        .collect();

        assert_eq!(approvers, vec![Role::HOD]);
    }
}
