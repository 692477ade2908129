use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::DomainError;
use reqflow_inventory::StockLine;

use crate::ActorRef;

pub const MAX_COMMENT_LEN: usize = 2000;

/// One requested item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItem {
    pub item_name: String,
    pub quantity: u64,
}

impl LineItem {
    pub fn new(item_name: impl Into<String>, quantity: u64) -> Result<Self, DomainError> {
        let item_name = item_name.into().trim().to_string();
        if item_name.is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if quantity == 0 {
            return Err(DomainError::validation(format!(
                "quantity for '{item_name}' must be positive"
            )));
        }
        Ok(Self {
            item_name,
            quantity,
        })
    }

    pub fn to_stock_line(&self) -> StockLine {
        StockLine::new(self.item_name.clone(), self.quantity)
    }

    /// Validate an ordered list of lines: non-empty, each valid, no repeated item.
    pub fn validate_all(lines: &[LineItem]) -> Result<(), DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation("a requisition needs at least one item"));
        }
        let mut seen = std::collections::HashSet::new();
        for line in lines {
            LineItem::new(line.item_name.clone(), line.quantity)?;
            if !seen.insert(line.item_name.trim()) {
                return Err(DomainError::validation(format!(
                    "item '{}' is listed more than once",
                    line.item_name
                )));
            }
        }
        Ok(())
    }
}

/// Append-only comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: ActorRef,
    pub text: String,
    pub at: DateTime<Utc>,
}
