use serde::{Deserialize, Serialize};

use reqflow_core::{DepartmentCode, UserId};

/// Actor as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActorRef {
    User {
        user_id: UserId,
        department: DepartmentCode,
    },
    System,
}

impl ActorRef {
    pub fn user(user_id: UserId, department: DepartmentCode) -> Self {
        ActorRef::User {
            user_id,
            department,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            ActorRef::User { user_id, .. } => Some(*user_id),
            ActorRef::System => None,
        }
    }
}

impl core::fmt::Display for ActorRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ActorRef::User {
                user_id,
                department,
            } => write!(f, "{user_id}@{department}"),
            ActorRef::System => f.write_str("system"),
        }
    }
}
