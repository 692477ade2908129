use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::{RequisitionId, ReservationId};

use crate::{LedgerError, StockLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Held,
    Released,
    Debited,
}

/// A hold on stock across one or more items, granted all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub requisition_id: Option<RequisitionId>,
    pub lines: Vec<StockLine>,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn held(
        id: ReservationId,
        requisition_id: Option<RequisitionId>,
        lines: Vec<StockLine>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            requisition_id,
            lines,
            state: ReservationState::Held,
            created_at: at,
            settled_at: None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.state == ReservationState::Held
    }

    /// `Ok(false)` when already released (release is idempotent); debited
    /// reservations cannot be released.
    pub fn mark_released(&mut self, at: DateTime<Utc>) -> Result<bool, LedgerError> {
        match self.state {
            ReservationState::Held => {
                self.state = ReservationState::Released;
                self.settled_at = Some(at);
                Ok(true)
            }
            ReservationState::Released => Ok(false),
            ReservationState::Debited => Err(LedgerError::InvalidReservation {
                id: self.id,
                reason: "already debited".into(),
            }),
        }
    }

    pub fn mark_debited(&mut self, at: DateTime<Utc>) -> Result<(), LedgerError> {
        match self.state {
            ReservationState::Held => {
                self.state = ReservationState::Debited;
                self.settled_at = Some(at);
                Ok(())
            }
            ReservationState::Released => Err(LedgerError::InvalidReservation {
                id: self.id,
                reason: "already released".into(),
            }),
            ReservationState::Debited => Err(LedgerError::InvalidReservation {
                id: self.id,
                reason: "already debited".into(),
            }),
        }
    }
}
