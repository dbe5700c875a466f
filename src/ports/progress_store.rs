//! Progress store port.
//!
//! Holds enrollment records, per-context step rows and the cached element
//! view. Only the progress engine writes here.
//!
//! # Optimistic concurrency
//!
//! Every record carries the `revision` it was read at (0 for a record that
//! has never been stored). A write succeeds only if the stored revision still
//! matches, and stores the record at `revision + 1`. A mismatch fails with
//! `StaleProgress`. `commit` applies a whole unit of work or nothing.

use async_trait::async_trait;

use crate::domain::foundation::{GroupId, PathwayId, PathwayVersionId, UserId};
use crate::domain::progress::{
    PathwayElementProgress, PathwayProgress, ProgressError, StepProgress, StepProgressKey,
};

/// One unit of work for a single (user, pathway).
///
/// The enrollment record is always part of the batch, so two units of work
/// on the same enrollment conflict even when they touch different steps.
#[derive(Debug, Clone)]
pub struct ProgressCommit {
    pub pathway: PathwayProgress,
    pub steps: Vec<StepProgress>,
    /// Replaces the cached element view when present.
    pub elements: Option<Vec<PathwayElementProgress>>,
}

impl ProgressCommit {
    pub fn new(pathway: PathwayProgress) -> Self {
        Self {
            pathway,
            steps: Vec::new(),
            elements: None,
        }
    }

    pub fn with_steps(mut self, steps: Vec<StepProgress>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_elements(mut self, elements: Vec<PathwayElementProgress>) -> Self {
        self.elements = Some(elements);
        self
    }
}

/// Records as stored by a successful commit, with their new revisions.
#[derive(Debug, Clone)]
pub struct CommittedProgress {
    pub pathway: PathwayProgress,
    pub steps: Vec<StepProgress>,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_pathway_progress(
        &self,
        user_id: &UserId,
        pathway_id: PathwayId,
    ) -> Result<Option<PathwayProgress>, ProgressError>;

    /// Revision-checked single-record write.
    async fn upsert_pathway_progress(&self, progress: PathwayProgress) -> Result<PathwayProgress, ProgressError>;

    async fn get_step_progress(&self, key: &StepProgressKey) -> Result<Option<StepProgress>, ProgressError>;

    /// Returns the stored row, inserting a NOT_STARTED one first if absent.
    async fn get_or_create_step_progress(
        &self,
        key: StepProgressKey,
        unlocked: bool,
    ) -> Result<StepProgress, ProgressError>;

    /// Revision-checked single-record write.
    async fn upsert_step_progress(&self, progress: StepProgress) -> Result<StepProgress, ProgressError>;

    /// All of a user's rows for a version, every context.
    async fn list_step_progress(
        &self,
        version_id: PathwayVersionId,
        user_id: &UserId,
    ) -> Result<Vec<StepProgress>, ProgressError>;

    /// Every member's rows for a version in one group's context.
    async fn list_group_step_progress(
        &self,
        version_id: PathwayVersionId,
        group_id: GroupId,
    ) -> Result<Vec<StepProgress>, ProgressError>;

    /// Enrollment records of a user, active or not.
    async fn list_user_pathways(&self, user_id: &UserId) -> Result<Vec<PathwayProgress>, ProgressError>;

    /// Cached element view; empty if never computed.
    async fn get_element_progress(
        &self,
        user_id: &UserId,
        pathway_id: PathwayId,
    ) -> Result<Vec<PathwayElementProgress>, ProgressError>;

    /// Applies a unit of work atomically.
    ///
    /// # Errors
    ///
    /// - `StaleProgress` if any record's revision no longer matches; nothing
    ///   is written
    async fn commit(&self, commit: ProgressCommit) -> Result<CommittedProgress, ProgressError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn ProgressStore) {}
    }
}
