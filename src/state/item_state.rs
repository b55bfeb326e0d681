/// Work-item lifecycle
///
/// Every item moves `Queued -> InFlight -> {Completed, Failed, Skipped}`.
/// Items still queued when the run ends are also reported as skipped.
use std::fmt;

/// Represents the current state of a work item in the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Waiting in the frontier
    Queued,

    /// Dequeued by a worker; fetch and extraction in progress
    InFlight,

    // ===== Terminal States =====
    /// Result persisted to the store
    Completed,

    /// Retries exhausted or non-retryable error; nothing persisted
    Failed,

    /// Excluded by robots.txt, content type, budget or cancellation
    Skipped,
}

impl ItemState {
    /// Returns true if no further processing happens in this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Returns true if the transition `self -> next` is part of the lifecycle
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        match (self, next) {
            (Self::Queued, Self::InFlight) | (Self::Queued, Self::Skipped) => true,
            (Self::InFlight, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Stable lowercase name, used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ItemState::Queued.is_terminal());
        assert!(!ItemState::InFlight.is_terminal());
        assert!(ItemState::Completed.is_terminal());
        assert!(ItemState::Failed.is_terminal());
        assert!(ItemState::Skipped.is_terminal());
    }

    #[test]
    fn test_valid_transitions() {
        assert!(ItemState::Queued.can_transition_to(ItemState::InFlight));
        assert!(ItemState::Queued.can_transition_to(ItemState::Skipped));
        assert!(ItemState::InFlight.can_transition_to(ItemState::Completed));
        assert!(ItemState::InFlight.can_transition_to(ItemState::Failed));
        assert!(ItemState::InFlight.can_transition_to(ItemState::Skipped));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!ItemState::Queued.can_transition_to(ItemState::Completed));
        assert!(!ItemState::Completed.can_transition_to(ItemState::Queued));
        assert!(!ItemState::Failed.can_transition_to(ItemState::InFlight));
        assert!(!ItemState::InFlight.can_transition_to(ItemState::Queued));
    }

    #[test]
    fn test_display() {
        assert_eq!(ItemState::InFlight.to_string(), "in_flight");
        assert_eq!(format!("{}", ItemState::Skipped), "skipped");
    }
}
