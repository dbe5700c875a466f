//! StepProgress - one user's status on one step in one context.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{GroupId, PathwayVersionId, StateMachine, StepId, Timestamp, UserId};

use super::{ProgressError, StepStatus};

/// Identity of a step progress row.
///
/// `group_id: None` is the user's own (ungrouped) context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepProgressKey {
    pub version_id: PathwayVersionId,
    pub step_id: StepId,
    pub user_id: UserId,
    pub group_id: Option<GroupId>,
}

impl StepProgressKey {
    pub fn new(version_id: PathwayVersionId, step_id: StepId, user_id: UserId, group_id: Option<GroupId>) -> Self {
        Self {
            version_id,
            step_id,
            user_id,
            group_id,
        }
    }
}

impl fmt::Display for StepProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.group_id {
            Some(group) => write!(f, "{}/{}/{}@{}", self.version_id, self.step_id, self.user_id, group),
            None => write!(f, "{}/{}/{}", self.version_id, self.step_id, self.user_id),
        }
    }
}

/// Per-context step status record.
///
/// Rows are created lazily when a step first becomes reachable. `unlocked`
/// caches the last prerequisite evaluation for this context. `revision` is
/// the optimistic-concurrency token: 0 means the row has never been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    key: StepProgressKey,
    status: StepStatus,
    unlocked: bool,
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
    updated_at: Timestamp,
    revision: u64,
}

impl StepProgress {
    pub fn new(key: StepProgressKey, unlocked: bool) -> Self {
        Self {
            key,
            status: StepStatus::NotStarted,
            unlocked,
            started_at: None,
            completed_at: None,
            updated_at: Timestamp::now(),
            revision: 0,
        }
    }

    pub fn key(&self) -> &StepProgressKey {
        &self.key
    }

    pub fn step_id(&self) -> StepId {
        self.key.step_id
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.key.group_id
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Store-side: stamps the revision a write was accepted at.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Records the latest unlock evaluation. Returns true if it changed.
    pub fn set_unlocked(&mut self, unlocked: bool) -> bool {
        if self.unlocked == unlocked {
            return false;
        }
        self.unlocked = unlocked;
        self.updated_at = Timestamp::now();
        true
    }

    /// NOT_STARTED -> IN_PROGRESS. Already started rows are left alone.
    pub fn start(&mut self) -> Result<bool, ProgressError> {
        if self.status.is_started() {
            return Ok(false);
        }
        self.transition(StepStatus::InProgress)?;
        self.started_at = Some(Timestamp::now());
        Ok(true)
    }

    /// Moves to COMPLETED, starting first when needed.
    ///
    /// Returns false when the step was already completed.
    pub fn complete(&mut self) -> Result<bool, ProgressError> {
        if self.status.is_completed() {
            return Ok(false);
        }
        self.start()?;
        self.transition(StepStatus::Completed)?;
        self.completed_at = Some(Timestamp::now());
        Ok(true)
    }

    /// COMPLETED -> IN_PROGRESS after a backing badge was revoked.
    pub fn reopen(&mut self) -> Result<bool, ProgressError> {
        if !self.status.is_completed() {
            return Ok(false);
        }
        self.transition(StepStatus::InProgress)?;
        self.completed_at = None;
        Ok(true)
    }

    fn transition(&mut self, target: StepStatus) -> Result<(), ProgressError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| ProgressError::InvalidTransition {
                step_id: self.key.step_id,
                from: self.status,
                to: target,
            })?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> StepProgress {
        let key = StepProgressKey::new(
            PathwayVersionId::new(),
            StepId::new(),
            UserId::new("learner-1").unwrap(),
            None,
        );
        StepProgress::new(key, true)
    }

    #[test]
    fn new_row_is_not_started_and_unsaved() {
        let row = row();
        assert_eq!(row.status(), StepStatus::NotStarted);
        assert_eq!(row.revision(), 0);
        assert!(row.is_unlocked());
    }

    #[test]
    fn complete_auto_starts() {
        let mut row = row();
        assert!(row.complete().unwrap());

        assert_eq!(row.status(), StepStatus::Completed);
        assert!(row.started_at().is_some());
        assert!(row.completed_at().is_some());
    }

    #[test]
    fn completing_twice_is_a_no_op() {
        let mut row = row();
        row.complete().unwrap();
        let completed_at = row.completed_at();

        assert!(!row.complete().unwrap());
        assert_eq!(row.completed_at(), completed_at);
    }

    #[test]
    fn start_is_idempotent() {
        let mut row = row();
        assert!(row.start().unwrap());
        assert!(!row.start().unwrap());
        assert_eq!(row.status(), StepStatus::InProgress);
    }

    #[test]
    fn reopen_only_applies_to_completed_rows() {
        let mut row = row();
        assert!(!row.reopen().unwrap());

        row.complete().unwrap();
        assert!(row.reopen().unwrap());
        assert_eq!(row.status(), StepStatus::InProgress);
        assert!(row.completed_at().is_none());
    }

    #[test]
    fn set_unlocked_reports_change() {
        let mut row = row();
        assert!(!row.set_unlocked(true));
        assert!(row.set_unlocked(false));
        assert!(!row.is_unlocked());
    }

    #[test]
    fn key_display_includes_group_when_present() {
        let group = GroupId::new();
        let mut key = row().key().clone();
        key.group_id = Some(group);
        assert!(key.to_string().ends_with(&format!("@{}", group)));
    }
}
