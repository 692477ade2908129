use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::DepartmentCode;

use crate::{LedgerError, Shortfall};

/// Reorder threshold applied when none is given at registration.
pub const DEFAULT_MINIMUM_QUANTITY: u64 = 10;

/// Derived stock level used for alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    LowStock,
    OutOfStock,
}

/// A requested (item, quantity) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockLine {
    pub item_name: String,
    pub quantity: u64,
}

impl StockLine {
    pub fn new(item_name: impl Into<String>, quantity: u64) -> Self {
        Self {
            item_name: item_name.into(),
            quantity,
        }
    }
}

/// Stock held for one item.
///
/// Both quantities are unsigned, so neither can go negative; every mutator
/// checks before subtracting and leaves the record untouched on error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub item_name: String,
    pub department: DepartmentCode,
    pub quantity_available: u64,
    pub reserved_quantity: u64,
    pub minimum_quantity: u64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn new(
        item_name: impl Into<String>,
        department: DepartmentCode,
        quantity_available: u64,
        minimum_quantity: u64,
        at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let item_name = normalize_item_name(item_name.into())?;
        Ok(Self {
            item_name,
            department,
            quantity_available,
            reserved_quantity: 0,
            minimum_quantity,
            updated_at: at,
        })
    }

    pub fn status(&self) -> StockStatus {
        if self.quantity_available == 0 {
            StockStatus::OutOfStock
        } else if self.quantity_available <= self.minimum_quantity {
            StockStatus::LowStock
        } else {
            StockStatus::Available
        }
    }

    /// Returns the shortfall if `quantity` cannot be granted right now.
    pub fn check_reserve(&self, quantity: u64) -> Option<Shortfall> {
        (quantity > self.quantity_available).then(|| Shortfall {
            item_name: self.item_name.clone(),
            requested: quantity,
            available: self.quantity_available,
        })
    }

    /// Move `quantity` from available into reserved.
    pub fn reserve(&mut self, quantity: u64, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if let Some(short) = self.check_reserve(quantity) {
            return Err(LedgerError::Shortage(vec![short]));
        }
        self.quantity_available -= quantity;
        self.reserved_quantity += quantity;
        self.updated_at = at;
        Ok(())
    }

    /// Return a held quantity to available stock.
    pub fn release(&mut self, quantity: u64, at: DateTime<Utc>) -> Result<(), LedgerError> {
        self.take_reserved(quantity)?;
        self.quantity_available += quantity;
        self.updated_at = at;
        Ok(())
    }

    /// Turn a held quantity into a permanent deduction.
    ///
    /// `quantity_available` was already reduced when the hold was granted, so
    /// only the reserved side shrinks.
    pub fn debit(&mut self, quantity: u64, at: DateTime<Utc>) -> Result<(), LedgerError> {
        self.take_reserved(quantity)?;
        self.updated_at = at;
        Ok(())
    }

    /// Stock-in (warehouse receiving or vendor delivery).
    pub fn receive(&mut self, quantity: u64, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::validation("received quantity must be positive"));
        }
        self.quantity_available = self
            .quantity_available
            .checked_add(quantity)
            .ok_or_else(|| LedgerError::validation("quantity overflow"))?;
        self.updated_at = at;
        Ok(())
    }

    fn take_reserved(&mut self, quantity: u64) -> Result<(), LedgerError> {
        if quantity > self.reserved_quantity {
            return Err(LedgerError::validation(format!(
                "'{}' holds {} reserved, cannot take {}",
                self.item_name, self.reserved_quantity, quantity
            )));
        }
        self.reserved_quantity -= quantity;
        Ok(())
    }
}

/// Item names are keys: trimmed, non-empty, at most 200 characters.
pub fn normalize_item_name(raw: String) -> Result<String, LedgerError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("item name cannot be empty"));
    }
    if name.chars().count() > 200 {
        return Err(LedgerError::validation("item name cannot exceed 200 characters"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(available: u64) -> InventoryRecord {
        InventoryRecord::new(
            "Surgical Gloves",
            DepartmentCode::new("ICU").unwrap(),
            available,
            DEFAULT_MINIMUM_QUANTITY,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn status_follows_thresholds() {
        assert_eq!(record(0).status(), StockStatus::OutOfStock);
        assert_eq!(record(10).status(), StockStatus::LowStock);
        assert_eq!(record(11).status(), StockStatus::Available);
    }

    #[test]
    fn reserve_then_debit_keeps_available_reduced() {
        let mut r = record(50);
        r.reserve(10, Utc::now()).unwrap();
        assert_eq!((r.quantity_available, r.reserved_quantity), (40, 10));

        r.debit(10, Utc::now()).unwrap();
        assert_eq!((r.quantity_available, r.reserved_quantity), (40, 0));
    }

    #[test]
    fn over_reservation_is_a_shortage_and_changes_nothing() {
        let mut r = record(3);
        let err = r.reserve(10, Utc::now()).unwrap_err();
        match err {
            LedgerError::Shortage(lines) => {
                assert_eq!(lines[0].missing(), 7);
            }
            other => panic!("expected shortage, got {other:?}"),
        }
        assert_eq!((r.quantity_available, r.reserved_quantity), (3, 0));
    }

    #[test]
    fn blank_item_names_are_rejected() {
        let err = InventoryRecord::new("  ", DepartmentCode::new("ER").unwrap(), 1, 1, Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(u64),
        Release(u64),
        Debit(u64),
        Receive(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..40).prop_map(Op::Reserve),
            (1u64..40).prop_map(Op::Release),
            (1u64..40).prop_map(Op::Debit),
            (1u64..40).prop_map(Op::Receive),
        ]
    }

    proptest! {
        #[test]
        fn reserved_never_exceeds_stock_ever_received(initial in 0u64..100, ops in proptest::collection::vec(op(), 0..60)) {
            let mut r = record(initial);
            let mut received = initial;
            let mut debited = 0u64;

            for op in ops {
                let before = r.clone();
                let res = match op {
                    Op::Reserve(q) => r.reserve(q, Utc::now()),
                    Op::Release(q) => r.release(q, Utc::now()),
                    Op::Debit(q) => r.debit(q, Utc::now()).map(|_| debited += q),
                    Op::Receive(q) => r.receive(q, Utc::now()).map(|_| received += q),
                };
                if res.is_err() {
                    prop_assert_eq!(&r.quantity_available, &before.quantity_available);
                    prop_assert_eq!(&r.reserved_quantity, &before.reserved_quantity);
                }
                prop_assert!(r.reserved_quantity <= received);
                prop_assert_eq!(r.quantity_available + r.reserved_quantity + debited, received);
            }
        }
    }
}
