use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use reqflow_core::{DepartmentCode, UserId};

use crate::{JwtClaims, Permission, Role, default_role_permissions};

/// A fully resolved principal for authorization decisions.
///
/// Built from verified claims; `permissions` is the union of the role grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub department: DepartmentCode,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(user_id: UserId, department: DepartmentCode, roles: Vec<Role>) -> Self {
        let permissions = roles
            .iter()
            .flat_map(default_role_permissions)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            user_id,
            department,
            roles,
            permissions,
        }
    }

    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self::new(claims.sub, claims.department.clone(), claims.roles.clone())
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::ADMIN)
    }

    pub fn has_permission(&self, required: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == required)
    }

    /// The only department whose requisitions this principal may read, or
    /// `None` when it may read all of them.
    pub fn read_scope(&self) -> Option<&DepartmentCode> {
        if self.has_permission(&Permission::REQUISITIONS_READ_ALL) {
            None
        } else {
            Some(&self.department)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_are_the_union_of_roles() {
        let p = Principal::new(
            UserId::new(),
            DepartmentCode::new("ICU").unwrap(),
            vec![Role::DEPARTMENT_STAFF, Role::STORE_MANAGER],
        );

        assert!(p.has_permission(&Permission::REQUISITIONS_DELIVER));
        assert!(p.has_permission(&Permission::INVENTORY_WRITE));
        assert!(!p.has_permission(&Permission::REQUISITIONS_APPROVE));
        // requisitions.read is granted by both roles but listed once
        let reads = p
            .permissions
            .iter()
            .filter(|x| **x == Permission::REQUISITIONS_READ)
            .count();
        assert_eq!(reads, 1);
    }

    #[test]
    fn reads_are_scoped_to_the_department_unless_granted_all() {
        let icu = DepartmentCode::new("ICU").unwrap();
        let scoped = |role: Role| Principal::new(UserId::new(), icu.clone(), vec![role]);

        assert_eq!(scoped(Role::HOD).read_scope(), Some(&icu));
        assert_eq!(scoped(Role::CLINICIAN).read_scope(), Some(&icu));
        assert_eq!(scoped(Role::ADMIN).read_scope(), None);
        assert_eq!(scoped(Role::STORE_MANAGER).read_scope(), None);
    }
}
