//! PathwayProgress - a user's enrollment in one pathway.
//!
//! # Invariants
//!
//! - The pinned version only changes on re-enrollment, never silently
//! - `percentage` is 100 exactly when `is_completed`
//! - Unenrolling is a status change; the record is kept
//! - Re-enrolling closes the previous period into `history` before re-pinning

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PathwayId, PathwayVersionId, Percentage, StateMachine, Timestamp, UserId};
use crate::domain::pathway::PathwayError;

use super::ProgressError;

/// Enrollment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Unenrolled,
}

impl StateMachine for EnrollmentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use EnrollmentStatus::*;
        matches!((self, target), (Active, Unenrolled) | (Unenrolled, Active))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            EnrollmentStatus::Active => vec![EnrollmentStatus::Unenrolled],
            EnrollmentStatus::Unenrolled => vec![EnrollmentStatus::Active],
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentStatus::Active => write!(f, "ACTIVE"),
            EnrollmentStatus::Unenrolled => write!(f, "UNENROLLED"),
        }
    }
}

/// A closed enrollment period, kept when the record is reactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentPeriod {
    pub version_id: PathwayVersionId,
    pub version: u32,
    pub enrolled_at: Timestamp,
    pub unenrolled_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub percentage: Percentage,
}

/// One record per (user, pathway).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayProgress {
    user_id: UserId,
    pathway_id: PathwayId,
    version_id: PathwayVersionId,
    version: u32,
    status: EnrollmentStatus,
    is_completed: bool,
    percentage: Percentage,
    completed_steps: usize,
    total_steps: usize,
    enrolled_at: Timestamp,
    completed_at: Option<Timestamp>,
    unenrolled_at: Option<Timestamp>,
    #[serde(default)]
    history: Vec<EnrollmentPeriod>,
    updated_at: Timestamp,
    revision: u64,
}

impl PathwayProgress {
    /// Creates an active enrollment pinned to `version_id`.
    pub fn enroll(
        user_id: UserId,
        pathway_id: PathwayId,
        version_id: PathwayVersionId,
        version: u32,
        total_steps: usize,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            user_id,
            pathway_id,
            version_id,
            version,
            status: EnrollmentStatus::Active,
            is_completed: false,
            percentage: Percentage::ZERO,
            completed_steps: 0,
            total_steps,
            enrolled_at: now,
            completed_at: None,
            unenrolled_at: None,
            history: Vec::new(),
            updated_at: now,
            revision: 0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn pathway_id(&self) -> PathwayId {
        self.pathway_id
    }

    pub fn version_id(&self) -> PathwayVersionId {
        self.version_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn percentage(&self) -> Percentage {
        self.percentage
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn enrolled_at(&self) -> Timestamp {
        self.enrolled_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn unenrolled_at(&self) -> Option<Timestamp> {
        self.unenrolled_at
    }

    /// Earlier enrollment periods, oldest first.
    pub fn history(&self) -> &[EnrollmentPeriod] {
        &self.history
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Store-side: stamps the revision a write was accepted at.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    pub fn unenroll(&mut self) -> Result<(), ProgressError> {
        self.status = self.status.transition_to(EnrollmentStatus::Unenrolled).map_err(|_| {
            ProgressError::NotEnrolled {
                user_id: self.user_id.clone(),
                pathway_id: self.pathway_id,
            }
        })?;
        let now = Timestamp::now();
        self.unenrolled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Reactivates an unenrolled record, pinning it to `version_id`.
    ///
    /// The closed period moves to `history` untouched. Progress is recounted
    /// from scratch by the caller.
    pub fn re_enroll(&mut self, version_id: PathwayVersionId, version: u32, total_steps: usize) -> Result<(), ProgressError> {
        self.status = self
            .status
            .transition_to(EnrollmentStatus::Active)
            .map_err(|_| PathwayError::invalid_state(self.status.to_string(), "re-enroll in"))?;
        let now = Timestamp::now();
        self.history.push(EnrollmentPeriod {
            version_id: self.version_id,
            version: self.version,
            enrolled_at: self.enrolled_at,
            unenrolled_at: self.unenrolled_at.unwrap_or(self.updated_at),
            completed_at: self.completed_at,
            percentage: self.percentage,
        });
        self.unenrolled_at = None;
        self.version_id = version_id;
        self.version = version;
        self.total_steps = total_steps;
        self.completed_steps = 0;
        self.percentage = Percentage::ZERO;
        self.is_completed = false;
        self.completed_at = None;
        self.enrolled_at = now;
        self.updated_at = now;
        Ok(())
    }

    /// Applies freshly counted leaves.
    ///
    /// Returns true when this call completed the pathway.
    pub fn apply_counts(&mut self, completed: usize, total: usize) -> bool {
        let completed = completed.min(total);
        let was_completed = self.is_completed;

        self.completed_steps = completed;
        self.total_steps = total;
        self.percentage = Percentage::from_ratio(completed, total);
        self.is_completed = total > 0 && completed == total;
        self.completed_at = match (was_completed, self.is_completed) {
            (false, true) => Some(Timestamp::now()),
            (_, false) => None,
            (true, true) => self.completed_at,
        };
        self.updated_at = Timestamp::now();

        !was_completed && self.is_completed
    }

    /// True if `apply_counts(completed, total)` would change anything visible.
    pub fn counts_differ(&self, completed: usize, total: usize) -> bool {
        self.completed_steps != completed.min(total) || self.total_steps != total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(total: usize) -> PathwayProgress {
        PathwayProgress::enroll(
            UserId::new("learner-1").unwrap(),
            PathwayId::new(),
            PathwayVersionId::new(),
            1,
            total,
        )
    }

    #[test]
    fn enrollment_starts_active_at_zero() {
        let p = progress(3);
        assert!(p.is_active());
        assert_eq!(p.percentage(), Percentage::ZERO);
        assert!(!p.is_completed());
    }

    #[test]
    fn apply_counts_floors_percentage() {
        let mut p = progress(3);
        assert!(!p.apply_counts(2, 3));
        assert_eq!(p.percentage().value(), 66);
        assert!(!p.is_completed());
    }

    #[test]
    fn full_counts_complete_the_pathway_once() {
        let mut p = progress(2);
        assert!(p.apply_counts(2, 2));
        assert!(p.is_completed());
        assert_eq!(p.percentage(), Percentage::HUNDRED);
        assert!(p.completed_at().is_some());

        assert!(!p.apply_counts(2, 2));
    }

    #[test]
    fn losing_a_step_clears_completion() {
        let mut p = progress(2);
        p.apply_counts(2, 2);
        p.apply_counts(1, 2);

        assert!(!p.is_completed());
        assert_eq!(p.percentage().value(), 50);
        assert!(p.completed_at().is_none());
    }

    #[test]
    fn unenroll_keeps_the_record_and_cannot_repeat() {
        let mut p = progress(1);
        p.unenroll().unwrap();
        assert_eq!(p.status(), EnrollmentStatus::Unenrolled);
        assert!(p.unenroll().is_err());
    }

    #[test]
    fn re_enroll_repins_and_resets() {
        let mut p = progress(2);
        p.apply_counts(2, 2);
        p.unenroll().unwrap();

        let first_pin = p.version_id();
        let first_enrolled_at = p.enrolled_at();
        let unenrolled_at = p.unenrolled_at();
        assert!(unenrolled_at.is_some());

        let next = PathwayVersionId::new();
        p.re_enroll(next, 2, 5).unwrap();

        assert_eq!(p.history().len(), 1);
        let closed = &p.history()[0];
        assert_eq!(closed.version_id, first_pin);
        assert_eq!(closed.version, 1);
        assert_eq!(closed.enrolled_at, first_enrolled_at);
        assert_eq!(Some(closed.unenrolled_at), unenrolled_at);
        assert_eq!(closed.percentage, Percentage::HUNDRED);
        assert!(closed.completed_at.is_some());
        assert!(p.unenrolled_at().is_none());

        assert!(p.is_active());
        assert_eq!(p.version_id(), next);
        assert_eq!(p.version(), 2);
        assert_eq!(p.total_steps(), 5);
        assert!(!p.is_completed());
    }

    #[test]
    fn counts_differ_detects_changes() {
        let p = progress(3);
        assert!(!p.counts_differ(0, 3));
        assert!(p.counts_differ(1, 3));
    }
}
