use reqflow_auth::{Actor, Principal, Role};
use reqflow_core::{DepartmentCode, UserId};

/// Principal context for a request (authenticated identity, department and
/// roles), derived from a verified bearer token.
///
/// This is immutable and must be present for all protected routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn department(&self) -> &DepartmentCode {
        &self.principal.department
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    /// Department this caller's reads are limited to; `None` reads all.
    pub fn read_scope(&self) -> Option<&DepartmentCode> {
        self.principal.read_scope()
    }

    /// The workflow actor for this request.
    pub fn actor(&self) -> Actor {
        Actor::User(self.principal.clone())
    }
}
