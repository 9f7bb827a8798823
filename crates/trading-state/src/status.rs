//! Trigger status and its transition table.

use serde::{Deserialize, Serialize};

/// State-machine state of a monitored symbol.
///
/// Persisted as SCREAMING_SNAKE_CASE strings. Any out-of-enum value found in
/// stored state deserializes to `Unknown` and is reclassified by the repair
/// pass; `Unknown` is never written intentionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerStatus {
    Waiting,
    WaitingForEntry,
    WaitingForReversal,
    ConfirmingReversal,
    OrderPlaced,
    OrderModified,
    OrderRejected,
    Executed,
    ActivePosition,
    WaitingReentry,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl TriggerStatus {
    /// Whether an order may be live at the gateway in this status.
    pub fn order_may_be_live(&self) -> bool {
        matches!(self, Self::OrderPlaced | Self::OrderModified)
    }

    /// Whether this status ends the current attempt.
    ///
    /// `Cancelled` additionally stops monitoring for the symbol;
    /// `OrderRejected` is operator-recoverable via retrigger.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::OrderRejected)
    }

    /// Check whether a transition between two statuses is legal.
    ///
    /// A no-op transition (from == to) is always allowed, as is the
    /// `OrderPlaced`/`OrderModified` self-loop for repeated re-pricing.
    pub fn can_transition(from: Self, to: Self) -> bool {
        use TriggerStatus::*;

        if from == to {
            return true;
        }

        match (from, to) {
            // Initial classification, and boundary repair of unknown values
            (Waiting | Unknown, WaitingForEntry | WaitingForReversal) => true,

            // Reclassification between the two waiting states
            (WaitingForEntry, WaitingForReversal) => true,
            (WaitingForReversal, WaitingForEntry) => true,

            // Reversal confirmation
            (WaitingForReversal, ConfirmingReversal) => true,
            (ConfirmingReversal, WaitingForEntry) => true,
            (ConfirmingReversal, WaitingForReversal) => true,

            // Order lifecycle
            (WaitingForEntry, OrderPlaced) => true,
            (OrderPlaced, OrderModified | Executed | OrderRejected) => true,
            (OrderModified, Executed | OrderRejected) => true,
            (Executed, ActivePosition) => true,

            // Exit and re-entry
            (ActivePosition, WaitingReentry | Cancelled) => true,
            (WaitingReentry, WaitingForReversal) => true,

            // Administrative resets (only legal when no order is live;
            // enforced by the caller, which owns the order linkage)
            (
                WaitingForEntry | WaitingForReversal | ConfirmingReversal | OrderRejected
                | WaitingReentry | Cancelled | Unknown,
                Waiting,
            ) => true,

            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TriggerStatus::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            (Waiting, WaitingForReversal),
            (WaitingForReversal, ConfirmingReversal),
            (ConfirmingReversal, WaitingForEntry),
            (WaitingForEntry, OrderPlaced),
            (OrderPlaced, OrderModified),
            (OrderModified, Executed),
            (Executed, ActivePosition),
            (ActivePosition, WaitingReentry),
            (WaitingReentry, WaitingForReversal),
        ];

        for (from, to) in path {
            assert!(
                TriggerStatus::can_transition(from, to),
                "{:?} -> {:?} should be legal",
                from,
                to
            );
        }
    }

    #[test]
    fn test_self_loop_allowed() {
        assert!(TriggerStatus::can_transition(OrderModified, OrderModified));
        assert!(TriggerStatus::can_transition(Waiting, Waiting));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!TriggerStatus::can_transition(Waiting, OrderPlaced));
        assert!(!TriggerStatus::can_transition(WaitingForReversal, OrderPlaced));
        assert!(!TriggerStatus::can_transition(Executed, OrderPlaced));
        assert!(!TriggerStatus::can_transition(Cancelled, WaitingForEntry));
        assert!(!TriggerStatus::can_transition(ActivePosition, OrderPlaced));
        assert!(!TriggerStatus::can_transition(OrderPlaced, Waiting));
    }

    #[test]
    fn test_rejection_is_operator_recoverable() {
        assert!(TriggerStatus::can_transition(OrderRejected, Waiting));
        assert!(!TriggerStatus::can_transition(OrderRejected, OrderPlaced));
    }

    #[test]
    fn test_unknown_repairs_to_waiting_states() {
        assert!(TriggerStatus::can_transition(Unknown, WaitingForEntry));
        assert!(TriggerStatus::can_transition(Unknown, WaitingForReversal));
        assert!(!TriggerStatus::can_transition(Unknown, OrderPlaced));
    }

    #[test]
    fn test_unknown_from_out_of_enum_string() {
        let status: TriggerStatus = serde_json::from_str("\"SOMETHING_LEGACY\"").unwrap();
        assert_eq!(status, Unknown);
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&WaitingForEntry).unwrap();
        assert_eq!(json, "\"WAITING_FOR_ENTRY\"");
        let back: TriggerStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, WaitingForEntry);
    }

    #[test]
    fn test_order_may_be_live() {
        assert!(OrderPlaced.order_may_be_live());
        assert!(OrderModified.order_may_be_live());
        assert!(!Executed.order_may_be_live());
        assert!(!WaitingForEntry.order_may_be_live());
    }
}
