use serde::{Deserialize, Serialize};
use thiserror::Error;

use reqflow_core::{ErrorKind, ReservationId};

/// One line that could not be covered by current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub item_name: String,
    pub requested: u64,
    pub available: u64,
}

impl Shortfall {
    /// Units missing to cover the request.
    pub fn missing(&self) -> u64 {
        self.requested.saturating_sub(self.available)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// At least one line exceeds `quantity_available`; nothing was reserved.
    #[error("insufficient stock for {} item(s)", .0.len())]
    Shortage(Vec<Shortfall>),

    /// The reservation was already released or debited.
    #[error("invalid reservation {id}: {reason}")]
    InvalidReservation { id: ReservationId, reason: String },

    #[error("unknown reservation {0}")]
    UnknownReservation(ReservationId),

    #[error("unknown item '{0}'")]
    UnknownItem(String),

    #[error("item '{0}' is already registered")]
    DuplicateItem(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("inventory store unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Shortage(_) => ErrorKind::Shortage,
            LedgerError::InvalidReservation { .. } | LedgerError::DuplicateItem(_) => {
                ErrorKind::Conflict
            }
            LedgerError::UnknownReservation(_) | LedgerError::UnknownItem(_) => ErrorKind::NotFound,
            LedgerError::Validation(_) => ErrorKind::ValidationFailed,
            LedgerError::Unavailable(_) => ErrorKind::StorageUnavailable,
        }
    }
}
