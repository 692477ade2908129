use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Roles arrive as opaque strings in token claims. The well-known hospital
/// roles are exposed as constants; unknown roles are carried through but grant
/// nothing by default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Ward clinician / procurement officer raising requisitions.
    pub const CLINICIAN: Role = Role(Cow::Borrowed("clinician"));
    /// Head of department; approves requisitions of their own department.
    pub const HOD: Role = Role(Cow::Borrowed("hod"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const VENDOR: Role = Role(Cow::Borrowed("vendor"));
    /// Designated staff allowed to sign for deliveries.
    pub const DEPARTMENT_STAFF: Role = Role(Cow::Borrowed("department_staff"));
    pub const STORE_MANAGER: Role = Role(Cow::Borrowed("store_manager"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
