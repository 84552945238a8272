//! Workflow state machine: `parsed → enriching →
//! {paused ⇄ enriching} → {completed | failed | cancelled}`, collapsed into
//! one enum since this engine owns a single stage sequence rather than a
//! parent/child stage tree.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Parsed,
    Enriching,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed | WorkflowState::Cancelled)
    }

    /// Validates a transition against the allowed edge table. `cancel` is
    /// reachable from any non-terminal state; every other edge is explicit.
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Parsed, Enriching) | (Enriching, Paused) | (Paused, Enriching) | (Enriching, Completed) | (Enriching, Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BomProgress {
    pub total: u32,
    pub enriched: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl BomProgress {
    pub fn processed(&self) -> u32 {
        self.enriched + self.failed + self.skipped
    }

    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed() as f64 / self.total as f64) * 100.0).round() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.processed() >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkflowState::*;

    #[test]
    fn parsed_moves_only_to_enriching() {
        assert!(Parsed.can_transition_to(Enriching));
        assert!(!Parsed.can_transition_to(Paused));
        assert!(!Parsed.can_transition_to(Completed));
    }

    #[test]
    fn cancel_reachable_from_any_non_terminal_state() {
        for s in [Parsed, Enriching, Paused] {
            assert!(s.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        for s in [Completed, Failed, Cancelled] {
            assert!(!s.can_transition_to(Enriching));
            assert!(!s.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn pause_resume_cycle_is_allowed() {
        assert!(Enriching.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Enriching));
    }

    #[test]
    fn progress_monotonicity_bounds_hold() {
        let p = BomProgress { total: 10, enriched: 6, failed: 2, skipped: 0 };
        assert_eq!(p.processed(), 8);
        assert!(!p.is_complete());
        assert_eq!(p.percent_complete(), 80);

        let done = BomProgress { total: 10, enriched: 7, failed: 2, skipped: 1 };
        assert!(done.is_complete());
        assert_eq!(done.percent_complete(), 100);
    }

    #[test]
    fn zero_item_bom_is_immediately_complete() {
        let p = BomProgress::default();
        assert!(p.is_complete());
        assert_eq!(p.percent_complete(), 100);
    }
}
