use serde::{Deserialize, Serialize};

/// Requisition lifecycle states.
///
/// ```text
/// Draft → Submitted → PendingApproval ─┬→ Approved → InventoryCheck ─┬→ Reserved → AwaitingFulfillment → Shipped → Delivered
///                                      └→ Rejected                   └→ Shortage → VendorOrdered → Reserved
/// any non-terminal → Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequisitionStatus {
    Draft,
    Submitted,
    PendingApproval,
    Approved,
    Rejected,
    InventoryCheck,
    Reserved,
    Shortage,
    VendorOrdered,
    AwaitingFulfillment,
    Shipped,
    Delivered,
    Cancelled,
}

impl RequisitionStatus {
    pub const ALL: [RequisitionStatus; 13] = [
        RequisitionStatus::Draft,
        RequisitionStatus::Submitted,
        RequisitionStatus::PendingApproval,
        RequisitionStatus::Approved,
        RequisitionStatus::Rejected,
        RequisitionStatus::InventoryCheck,
        RequisitionStatus::Reserved,
        RequisitionStatus::Shortage,
        RequisitionStatus::VendorOrdered,
        RequisitionStatus::AwaitingFulfillment,
        RequisitionStatus::Shipped,
        RequisitionStatus::Delivered,
        RequisitionStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequisitionStatus::Delivered | RequisitionStatus::Rejected | RequisitionStatus::Cancelled
        )
    }

    /// Waiting on an approver.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            RequisitionStatus::Submitted | RequisitionStatus::PendingApproval
        )
    }

    /// The approval decision is behind it, or it was withdrawn first.
    pub fn is_past_approval(self) -> bool {
        !matches!(
            self,
            RequisitionStatus::Draft
                | RequisitionStatus::Submitted
                | RequisitionStatus::PendingApproval
        )
    }

    /// Whether `next` is exactly one edge away.
    pub fn can_transition_to(self, next: RequisitionStatus) -> bool {
        use RequisitionStatus::*;

        if next == Cancelled {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, PendingApproval)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, InventoryCheck)
                | (InventoryCheck, Reserved)
                | (InventoryCheck, Shortage)
                | (Shortage, VendorOrdered)
                | (VendorOrdered, Reserved)
                | (Reserved, AwaitingFulfillment)
                | (AwaitingFulfillment, Shipped)
                | (Shipped, Delivered)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequisitionStatus::Draft => "draft",
            RequisitionStatus::Submitted => "submitted",
            RequisitionStatus::PendingApproval => "pending_approval",
            RequisitionStatus::Approved => "approved",
            RequisitionStatus::Rejected => "rejected",
            RequisitionStatus::InventoryCheck => "inventory_check",
            RequisitionStatus::Reserved => "reserved",
            RequisitionStatus::Shortage => "shortage",
            RequisitionStatus::VendorOrdered => "vendor_ordered",
            RequisitionStatus::AwaitingFulfillment => "awaiting_fulfillment",
            RequisitionStatus::Shipped => "shipped",
            RequisitionStatus::Delivered => "delivered",
            RequisitionStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for RequisitionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RequisitionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Standard,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Standard,
        Priority::High,
        Priority::Critical,
    ];

    /// High and Critical requisitions are escalation candidates.
    pub fn is_urgent(self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Standard => "standard",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Standard
    }
}

impl core::fmt::Display for Priority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown priority '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in RequisitionStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in RequisitionStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn cancel_is_reachable_from_every_open_state() {
        for from in RequisitionStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(RequisitionStatus::Cancelled));
        }
    }

    #[test]
    fn shortage_branch_rejoins_at_reserved() {
        use RequisitionStatus::*;
        assert!(Shortage.can_transition_to(VendorOrdered));
        assert!(VendorOrdered.can_transition_to(Reserved));
        assert!(!Shortage.can_transition_to(Reserved));
        assert!(!Approved.can_transition_to(Reserved));
    }

    #[test]
    fn only_the_queue_states_precede_the_decision() {
        use RequisitionStatus::*;
        for status in [Draft, Submitted, PendingApproval] {
            assert!(!status.is_past_approval(), "{status}");
        }
        for status in [Approved, Rejected, Reserved, Shortage, Cancelled, Delivered] {
            assert!(status.is_past_approval(), "{status}");
        }
    }

    #[test]
    fn status_names_are_stable() {
        let json = serde_json::to_string(&RequisitionStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"pending_approval\"");
        assert_eq!(
            "awaiting_fulfillment".parse::<RequisitionStatus>().unwrap(),
            RequisitionStatus::AwaitingFulfillment
        );
        assert_eq!("critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
