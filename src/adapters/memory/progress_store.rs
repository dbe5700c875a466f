//! In-memory progress store with revision checks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{GroupId, PathwayId, PathwayVersionId, UserId};
use crate::domain::progress::{
    PathwayElementProgress, PathwayProgress, ProgressError, StepProgress, StepProgressKey,
};
use crate::ports::{CommittedProgress, ProgressCommit, ProgressStore};

type EnrollmentKey = (UserId, PathwayId);

#[derive(Debug, Default)]
struct State {
    pathways: HashMap<EnrollmentKey, PathwayProgress>,
    steps: HashMap<StepProgressKey, StepProgress>,
    elements: HashMap<EnrollmentKey, Vec<PathwayElementProgress>>,
}

impl State {
    fn check_pathway(&self, progress: &PathwayProgress) -> Result<(), ProgressError> {
        let key = (progress.user_id().clone(), progress.pathway_id());
        let actual = self.pathways.get(&key).map_or(0, |p| p.revision());
        check_revision("pathway_progress", || format!("{}/{}", key.0, key.1), progress.revision(), actual)
    }

    fn check_step(&self, progress: &StepProgress) -> Result<(), ProgressError> {
        let actual = self.steps.get(progress.key()).map_or(0, |s| s.revision());
        check_revision("step_progress", || progress.key().to_string(), progress.revision(), actual)
    }

    fn put_pathway(&mut self, progress: PathwayProgress) -> PathwayProgress {
        let next = progress.revision() + 1;
        let stored = progress.with_revision(next);
        self.pathways
            .insert((stored.user_id().clone(), stored.pathway_id()), stored.clone());
        stored
    }

    fn put_step(&mut self, progress: StepProgress) -> StepProgress {
        let next = progress.revision() + 1;
        let stored = progress.with_revision(next);
        self.steps.insert(stored.key().clone(), stored.clone());
        stored
    }
}

fn check_revision(
    entity: &'static str,
    key: impl FnOnce() -> String,
    expected: u64,
    actual: u64,
) -> Result<(), ProgressError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ProgressError::stale(entity, key(), expected, actual))
    }
}

/// Everything behind one lock; `commit` checks every revision before it
/// writes anything.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProgressStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn step_row_count(&self) -> usize {
        self.state.read().await.steps.len()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn get_pathway_progress(
        &self,
        user_id: &UserId,
        pathway_id: PathwayId,
    ) -> Result<Option<PathwayProgress>, ProgressError> {
        let key = (user_id.clone(), pathway_id);
        Ok(self.state.read().await.pathways.get(&key).cloned())
    }

    async fn upsert_pathway_progress(&self, progress: PathwayProgress) -> Result<PathwayProgress, ProgressError> {
        let mut state = self.state.write().await;
        state.check_pathway(&progress)?;
        Ok(state.put_pathway(progress))
    }

    async fn get_step_progress(&self, key: &StepProgressKey) -> Result<Option<StepProgress>, ProgressError> {
        Ok(self.state.read().await.steps.get(key).cloned())
    }

    async fn get_or_create_step_progress(
        &self,
        key: StepProgressKey,
        unlocked: bool,
    ) -> Result<StepProgress, ProgressError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.steps.get(&key) {
            return Ok(existing.clone());
        }
        Ok(state.put_step(StepProgress::new(key, unlocked)))
    }

    async fn upsert_step_progress(&self, progress: StepProgress) -> Result<StepProgress, ProgressError> {
        let mut state = self.state.write().await;
        state.check_step(&progress)?;
        Ok(state.put_step(progress))
    }

    async fn list_step_progress(
        &self,
        version_id: PathwayVersionId,
        user_id: &UserId,
    ) -> Result<Vec<StepProgress>, ProgressError> {
        let state = self.state.read().await;
        let mut rows: Vec<StepProgress> = state
            .steps
            .values()
            .filter(|s| s.key().version_id == version_id && &s.key().user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(rows)
    }

    async fn list_group_step_progress(
        &self,
        version_id: PathwayVersionId,
        group_id: GroupId,
    ) -> Result<Vec<StepProgress>, ProgressError> {
        let state = self.state.read().await;
        let mut rows: Vec<StepProgress> = state
            .steps
            .values()
            .filter(|s| s.key().version_id == version_id && s.group_id() == Some(group_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(rows)
    }

    async fn list_user_pathways(&self, user_id: &UserId) -> Result<Vec<PathwayProgress>, ProgressError> {
        let state = self.state.read().await;
        let mut enrollments: Vec<PathwayProgress> = state
            .pathways
            .values()
            .filter(|p| p.user_id() == user_id)
            .cloned()
            .collect();
        enrollments.sort_by_key(|p| p.enrolled_at());
        Ok(enrollments)
    }

    async fn get_element_progress(
        &self,
        user_id: &UserId,
        pathway_id: PathwayId,
    ) -> Result<Vec<PathwayElementProgress>, ProgressError> {
        let key = (user_id.clone(), pathway_id);
        Ok(self.state.read().await.elements.get(&key).cloned().unwrap_or_default())
    }

    async fn commit(&self, commit: ProgressCommit) -> Result<CommittedProgress, ProgressError> {
        let mut state = self.state.write().await;
        state.check_pathway(&commit.pathway)?;
        for step in &commit.steps {
            state.check_step(step)?;
        }

        let enrollment = (commit.pathway.user_id().clone(), commit.pathway.pathway_id());
        let pathway = state.put_pathway(commit.pathway);
        let steps = commit.steps.into_iter().map(|s| state.put_step(s)).collect();
        if let Some(elements) = commit.elements {
            state.elements.insert(enrollment, elements);
        }
        Ok(CommittedProgress { pathway, steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ErrorCode, StepId};
    use crate::domain::progress::StepStatus;

    fn user() -> UserId {
        UserId::new("learner-1").unwrap()
    }

    fn enrollment() -> PathwayProgress {
        PathwayProgress::enroll(user(), PathwayId::new(), PathwayVersionId::new(), 1, 2)
    }

    fn step_key(progress: &PathwayProgress, group: Option<GroupId>) -> StepProgressKey {
        StepProgressKey::new(progress.version_id(), StepId::new(), progress.user_id().clone(), group)
    }

    #[tokio::test]
    async fn upsert_bumps_revision() {
        let store = InMemoryProgressStore::new();
        let stored = store.upsert_pathway_progress(enrollment()).await.unwrap();
        assert_eq!(stored.revision(), 1);

        let again = store.upsert_pathway_progress(stored).await.unwrap();
        assert_eq!(again.revision(), 2);
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let store = InMemoryProgressStore::new();
        let stored = store.upsert_pathway_progress(enrollment()).await.unwrap();
        store.upsert_pathway_progress(stored.clone()).await.unwrap();

        let err = store.upsert_pathway_progress(stored).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::StaleProgress);
    }

    #[tokio::test]
    async fn inserting_over_an_existing_row_is_stale() {
        let store = InMemoryProgressStore::new();
        let progress = enrollment();
        store.upsert_pathway_progress(progress.clone()).await.unwrap();

        assert!(store.upsert_pathway_progress(progress).await.unwrap_err().is_stale());
    }

    #[tokio::test]
    async fn get_or_create_inserts_once() {
        let store = InMemoryProgressStore::new();
        let key = step_key(&enrollment(), None);

        let created = store.get_or_create_step_progress(key.clone(), true).await.unwrap();
        let mut started = created.clone();
        started.start().unwrap();
        store.upsert_step_progress(started).await.unwrap();

        let fetched = store.get_or_create_step_progress(key, false).await.unwrap();
        assert_eq!(fetched.status(), StepStatus::InProgress);
        assert_eq!(fetched.revision(), 2);
        assert_eq!(store.step_row_count().await, 1);
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let store = InMemoryProgressStore::new();
        let progress = enrollment();
        let key = step_key(&progress, None);
        let existing = store.get_or_create_step_progress(key.clone(), true).await.unwrap();
        store.upsert_step_progress(existing).await.unwrap();

        let stale_row = StepProgress::new(key.clone(), true);
        let fresh_row = StepProgress::new(step_key(&progress, None), true);
        let commit = ProgressCommit::new(progress.clone()).with_steps(vec![fresh_row, stale_row]);

        assert!(store.commit(commit).await.unwrap_err().is_stale());
        assert!(store.get_pathway_progress(progress.user_id(), progress.pathway_id()).await.unwrap().is_none());
        assert_eq!(store.step_row_count().await, 1);
    }

    #[tokio::test]
    async fn commit_stores_elements_and_returns_revisions() {
        let store = InMemoryProgressStore::new();
        let progress = enrollment();
        let row = StepProgress::new(step_key(&progress, None), true);
        let commit = ProgressCommit::new(progress.clone())
            .with_steps(vec![row])
            .with_elements(Vec::new());

        let committed = store.commit(commit).await.unwrap();

        assert_eq!(committed.pathway.revision(), 1);
        assert_eq!(committed.steps[0].revision(), 1);
        assert!(store
            .get_element_progress(progress.user_id(), progress.pathway_id())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn lists_rows_by_user_and_by_group() {
        let store = InMemoryProgressStore::new();
        let progress = enrollment();
        let group = GroupId::new();
        for key in [step_key(&progress, None), step_key(&progress, Some(group))] {
            store.get_or_create_step_progress(key, true).await.unwrap();
        }

        let mine = store.list_step_progress(progress.version_id(), progress.user_id()).await.unwrap();
        let grouped = store.list_group_step_progress(progress.version_id(), group).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(grouped.len(), 1);
    }
}
