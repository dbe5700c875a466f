//! In-memory pathway repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{OrganizationId, PathwayId, PathwayVersionId, StepId};
use crate::domain::pathway::{Pathway, PathwayError, PathwayVersion};
use crate::ports::PathwayRepository;

#[derive(Debug, Default)]
struct State {
    pathways: HashMap<PathwayId, Pathway>,
    versions: HashMap<PathwayVersionId, PathwayVersion>,
    step_index: HashMap<StepId, PathwayVersionId>,
}

impl State {
    fn store_version(&mut self, version: &PathwayVersion) -> Result<(), PathwayError> {
        if let Some(existing) = self.versions.get(&version.id()) {
            existing.ensure_draft()?;
            self.step_index.retain(|_, v| *v != version.id());
        }
        for step in version.steps() {
            self.step_index.insert(step.id(), version.id());
        }
        self.versions.insert(version.id(), version.clone());
        Ok(())
    }
}

/// Pathways and versions behind one lock, so a publish lands atomically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPathwayRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryPathwayRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn version_count(&self) -> usize {
        self.state.read().await.versions.len()
    }
}

#[async_trait]
impl PathwayRepository for InMemoryPathwayRepository {
    async fn save_pathway(&self, pathway: &Pathway) -> Result<(), PathwayError> {
        self.state.write().await.pathways.insert(pathway.id(), pathway.clone());
        Ok(())
    }

    async fn find_pathway(&self, id: PathwayId) -> Result<Option<Pathway>, PathwayError> {
        Ok(self.state.read().await.pathways.get(&id).cloned())
    }

    async fn list_pathways(&self, organization_id: OrganizationId) -> Result<Vec<Pathway>, PathwayError> {
        let state = self.state.read().await;
        let mut pathways: Vec<Pathway> = state
            .pathways
            .values()
            .filter(|p| p.organization_id() == organization_id)
            .cloned()
            .collect();
        pathways.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(pathways)
    }

    async fn save_version(&self, version: &PathwayVersion) -> Result<(), PathwayError> {
        self.state.write().await.store_version(version)
    }

    async fn find_version(&self, id: PathwayVersionId) -> Result<Option<PathwayVersion>, PathwayError> {
        Ok(self.state.read().await.versions.get(&id).cloned())
    }

    async fn find_version_by_step(&self, step_id: StepId) -> Result<Option<PathwayVersion>, PathwayError> {
        let state = self.state.read().await;
        Ok(state
            .step_index
            .get(&step_id)
            .and_then(|version_id| state.versions.get(version_id))
            .cloned())
    }

    async fn list_versions(&self, pathway_id: PathwayId) -> Result<Vec<PathwayVersion>, PathwayError> {
        let state = self.state.read().await;
        let mut versions: Vec<PathwayVersion> = state
            .versions
            .values()
            .filter(|v| v.pathway_id() == pathway_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.version());
        Ok(versions)
    }

    async fn delete_draft(&self, id: PathwayVersionId) -> Result<(), PathwayError> {
        let mut state = self.state.write().await;
        let version = state.versions.get(&id).ok_or(PathwayError::VersionNotFound(id))?;
        version.ensure_draft()?;
        state.versions.remove(&id);
        state.step_index.retain(|_, v| *v != id);
        Ok(())
    }

    async fn commit_publish(&self, pathway: &Pathway, version: &PathwayVersion) -> Result<(), PathwayError> {
        let mut state = self.state.write().await;
        state.store_version(version)?;
        state.pathways.insert(pathway.id(), pathway.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use crate::domain::pathway::NewStep;

    fn draft_with_step(pathway_id: PathwayId) -> (PathwayVersion, StepId) {
        let mut v = PathwayVersion::new_draft(pathway_id, 1);
        let step = v.add_step(NewStep::new("Intro")).unwrap();
        (v, step)
    }

    #[tokio::test]
    async fn finds_version_by_step() {
        let repo = InMemoryPathwayRepository::new();
        let (v, step) = draft_with_step(PathwayId::new());
        repo.save_version(&v).await.unwrap();

        let found = repo.find_version_by_step(step).await.unwrap().unwrap();
        assert_eq!(found.id(), v.id());
        assert!(repo.find_version_by_step(StepId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resaving_a_draft_reindexes_removed_steps() {
        let repo = InMemoryPathwayRepository::new();
        let (mut v, step) = draft_with_step(PathwayId::new());
        repo.save_version(&v).await.unwrap();

        v.remove_step(step).unwrap();
        repo.save_version(&v).await.unwrap();

        assert!(repo.find_version_by_step(step).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn published_versions_cannot_be_overwritten_or_deleted() {
        let repo = InMemoryPathwayRepository::new();
        let (mut v, _) = draft_with_step(PathwayId::new());
        v.publish().unwrap();
        repo.save_version(&v).await.unwrap();

        let err = repo.save_version(&v).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ImmutableVersion);
        assert_eq!(repo.delete_draft(v.id()).await.unwrap_err().code(), ErrorCode::ImmutableVersion);
    }

    #[tokio::test]
    async fn delete_draft_removes_version() {
        let repo = InMemoryPathwayRepository::new();
        let (v, step) = draft_with_step(PathwayId::new());
        repo.save_version(&v).await.unwrap();

        repo.delete_draft(v.id()).await.unwrap();

        assert_eq!(repo.version_count().await, 0);
        assert!(repo.find_version_by_step(step).await.unwrap().is_none());
        assert_eq!(repo.delete_draft(v.id()).await.unwrap_err().code(), ErrorCode::VersionNotFound);
    }

    #[tokio::test]
    async fn lists_versions_in_order() {
        let repo = InMemoryPathwayRepository::new();
        let pathway_id = PathwayId::new();
        let (mut first, _) = draft_with_step(pathway_id);
        first.publish().unwrap();
        let second = first.clone_as_draft(2);
        repo.save_version(&second).await.unwrap();
        repo.save_version(&first).await.unwrap();

        let versions: Vec<u32> = repo
            .list_versions(pathway_id)
            .await
            .unwrap()
            .iter()
            .map(|v| v.version())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }
}
