use reqflow_core::{DepartmentCode, UserId};

use crate::Principal;

/// Who is performing an action: an authenticated human or the engine itself.
///
/// The system actor drives the automatic edges (approval routing, inventory
/// check outcomes) and vendor callbacks; it never holds a `Principal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(Principal),
    System,
}

impl Actor {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Actor::User(p) => Some(p),
            Actor::System => None,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.principal().map(|p| p.user_id)
    }

    pub fn department(&self) -> Option<&DepartmentCode> {
        self.principal().map(|p| &p.department)
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Actor::System)
    }
}

impl From<Principal> for Actor {
    fn from(value: Principal) -> Self {
        Actor::User(value)
    }
}
