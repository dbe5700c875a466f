//! StepStatus - per-context status of one step.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Status of a step for one (user, group?) context.
///
/// Ordered by advancement so contexts can be folded with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl StepStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepStatus::Completed)
    }

    pub fn is_started(&self) -> bool {
        !matches!(self, StepStatus::NotStarted)
    }
}

impl StateMachine for StepStatus {
    /// Valid transitions:
    /// - NotStarted -> InProgress
    /// - InProgress -> Completed
    /// - Completed -> InProgress (badge revocation only)
    fn can_transition_to(&self, target: &Self) -> bool {
        use StepStatus::*;
        matches!(
            (self, target),
            (NotStarted, InProgress) | (InProgress, Completed) | (Completed, InProgress)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            StepStatus::NotStarted => vec![StepStatus::InProgress],
            StepStatus::InProgress => vec![StepStatus::Completed],
            StepStatus::Completed => vec![StepStatus::InProgress],
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::NotStarted => "NOT_STARTED",
            StepStatus::InProgress => "IN_PROGRESS",
            StepStatus::Completed => "COMPLETED",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_started() {
        assert_eq!(StepStatus::default(), StepStatus::NotStarted);
    }

    #[test]
    fn forward_path_is_valid() {
        let status = StepStatus::NotStarted
            .transition_to(StepStatus::InProgress)
            .and_then(|s| s.transition_to(StepStatus::Completed))
            .unwrap();
        assert_eq!(status, StepStatus::Completed);
    }

    #[test]
    fn cannot_skip_in_progress() {
        assert!(StepStatus::NotStarted.transition_to(StepStatus::Completed).is_err());
    }

    #[test]
    fn only_backward_edge_is_completed_to_in_progress() {
        assert!(StepStatus::Completed.can_transition_to(&StepStatus::InProgress));
        assert!(!StepStatus::Completed.can_transition_to(&StepStatus::NotStarted));
        assert!(!StepStatus::InProgress.can_transition_to(&StepStatus::NotStarted));
    }

    #[test]
    fn statuses_fold_by_advancement() {
        let folded = [StepStatus::InProgress, StepStatus::Completed, StepStatus::NotStarted]
            .into_iter()
            .max()
            .unwrap();
        assert_eq!(folded, StepStatus::Completed);
        assert!(!StepStatus::NotStarted.is_terminal());
    }

    #[test]
    fn displays_screaming_case() {
        assert_eq!(StepStatus::InProgress.to_string(), "IN_PROGRESS");
    }
}
