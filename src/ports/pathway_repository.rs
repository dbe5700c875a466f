//! Pathway repository port.
//!
//! Persists `Pathway` aggregates and their `PathwayVersion` snapshots.
//!
//! # Design
//!
//! - **Published versions are append-only**: implementations refuse to
//!   overwrite or delete a published version
//! - **Atomic publish**: `commit_publish` stores the frozen version and the
//!   pathway's swapped pointer together

use async_trait::async_trait;

use crate::domain::foundation::{OrganizationId, PathwayId, PathwayVersionId, StepId};
use crate::domain::pathway::{Pathway, PathwayError, PathwayVersion};

#[async_trait]
pub trait PathwayRepository: Send + Sync {
    /// Insert or replace a pathway aggregate.
    async fn save_pathway(&self, pathway: &Pathway) -> Result<(), PathwayError>;

    /// Returns `None` if not found.
    async fn find_pathway(&self, id: PathwayId) -> Result<Option<Pathway>, PathwayError>;

    /// Pathways owned by an organization, by name.
    async fn list_pathways(&self, organization_id: OrganizationId) -> Result<Vec<Pathway>, PathwayError>;

    /// Insert or replace a version.
    ///
    /// # Errors
    ///
    /// - `ImmutableVersion` if a published version with this ID is stored
    async fn save_version(&self, version: &PathwayVersion) -> Result<(), PathwayError>;

    async fn find_version(&self, id: PathwayVersionId) -> Result<Option<PathwayVersion>, PathwayError>;

    /// The version whose arena holds `step_id`. Step IDs are unique across
    /// versions, so there is at most one.
    async fn find_version_by_step(&self, step_id: StepId) -> Result<Option<PathwayVersion>, PathwayError>;

    /// All versions of a pathway, ascending by version number.
    async fn list_versions(&self, pathway_id: PathwayId) -> Result<Vec<PathwayVersion>, PathwayError>;

    /// Deletes a draft with all its steps.
    ///
    /// # Errors
    ///
    /// - `ImmutableVersion` for a published version
    /// - `VersionNotFound` if nothing is stored under `id`
    async fn delete_draft(&self, id: PathwayVersionId) -> Result<(), PathwayError>;

    /// Stores a just-published version and the pathway pointing at it in one
    /// step.
    async fn commit_publish(&self, pathway: &Pathway, version: &PathwayVersion) -> Result<(), PathwayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathway_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn PathwayRepository) {}
    }
}
