//! VersionStore - authoring side of pathways.
//!
//! Owns the draft/publish lifecycle. Every mutation loads the draft, applies
//! one domain operation and saves it back while holding the pathway's
//! lineage lock exclusively, so enrollment never sees a half-published
//! pathway.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{
    DomainError, ErrorCode, EventId, OrganizationId, PathwayId, PathwayVersionId, SerializableDomainEvent, StepId, Timestamp,
};
use crate::domain::pathway::{
    NewStep, Pathway, PathwayDefinition, PathwayError, PathwayVersion, PathwayVersionPublished, StepPatch,
    StepVersion,
};
use crate::domain::rule::{Rule, RuleKind};
use crate::ports::{EventPublisher, PathwayRepository};

use super::lineage::LineageLocks;

/// Result of importing a pathway definition.
#[derive(Debug, Clone)]
pub struct ImportedPathway {
    pub pathway: Pathway,
    pub draft: PathwayVersion,
    /// Definition key → step ID in the draft.
    pub keys: HashMap<String, StepId>,
}

pub struct VersionStore {
    repository: Arc<dyn PathwayRepository>,
    event_publisher: Arc<dyn EventPublisher>,
    locks: Arc<LineageLocks>,
}

impl VersionStore {
    pub fn new(
        repository: Arc<dyn PathwayRepository>,
        event_publisher: Arc<dyn EventPublisher>,
        locks: Arc<LineageLocks>,
    ) -> Self {
        Self {
            repository,
            event_publisher,
            locks,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pathway lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a pathway with an empty draft version 1.
    pub async fn create_pathway(
        &self,
        organization_id: OrganizationId,
        name: impl Into<String>,
    ) -> Result<(Pathway, PathwayVersion), PathwayError> {
        let mut pathway = Pathway::new(organization_id, name)?;
        let draft = PathwayVersion::new_draft(pathway.id(), pathway.next_version_number());
        pathway.attach_draft(&draft)?;

        self.repository.save_version(&draft).await?;
        self.repository.save_pathway(&pathway).await?;

        tracing::info!(pathway_id = %pathway.id(), name = pathway.name(), "pathway created");
        Ok((pathway, draft))
    }

    /// Returns the open draft, or clones the current published version into
    /// a new one.
    pub async fn open_draft(&self, pathway_id: PathwayId) -> Result<PathwayVersion, PathwayError> {
        let _lineage = self.locks.write(pathway_id).await;
        let mut pathway = self.load_pathway(pathway_id).await?;

        if let Some(draft_id) = pathway.draft_version_id() {
            return self.load_version(draft_id).await;
        }

        let next = pathway.next_version_number();
        let draft = match pathway.current_version_id() {
            Some(current_id) => self.load_version(current_id).await?.clone_as_draft(next),
            None => PathwayVersion::new_draft(pathway_id, next),
        };
        pathway.attach_draft(&draft)?;

        self.repository.save_version(&draft).await?;
        self.repository.save_pathway(&pathway).await?;

        tracing::debug!(%pathway_id, version = draft.version(), steps = draft.step_count(), "draft opened");
        Ok(draft)
    }

    /// Validates and publishes the open draft, making it current.
    ///
    /// With no open draft the current version is returned unchanged. The
    /// `pathway.version_published.v1` event is best-effort: once the version
    /// is committed, a failure to send it is logged and the version is still
    /// returned.
    pub async fn publish(&self, pathway_id: PathwayId) -> Result<PathwayVersion, PathwayError> {
        let _lineage = self.locks.write(pathway_id).await;
        let mut pathway = self.load_pathway(pathway_id).await?;

        let Some(draft_id) = pathway.draft_version_id() else {
            let current_id = pathway.current_version_id().ok_or(PathwayError::NoDraft(pathway_id))?;
            tracing::debug!(%pathway_id, "publish with no open draft; returning current version");
            return self.load_version(current_id).await;
        };

        let mut version = self.load_version(draft_id).await?;
        version.publish()?;
        let previous_version_id = pathway.current_version_id();
        pathway.record_publish(&version)?;
        self.repository.commit_publish(&pathway, &version).await?;

        tracing::info!(
            %pathway_id,
            version = version.version(),
            steps = version.step_count(),
            "pathway version published"
        );

        let event = PathwayVersionPublished {
            event_id: EventId::new(),
            pathway_id,
            organization_id: pathway.organization_id(),
            version_id: version.id(),
            version: version.version(),
            previous_version_id,
            step_count: version.step_count(),
            published_at: version.published_at().unwrap_or_else(Timestamp::now),
        };
        let sent = match event.to_envelope() {
            Ok(envelope) => self.event_publisher.publish(envelope).await,
            Err(e) => Err(DomainError::new(ErrorCode::InternalError, e.to_string())),
        };
        if let Err(e) = sent {
            tracing::warn!(%pathway_id, version_id = %version.id(), error = %e, "failed to publish version event");
        }

        Ok(version)
    }

    /// Drops the open draft and its steps. Published versions are untouched.
    pub async fn discard_draft(&self, pathway_id: PathwayId) -> Result<Pathway, PathwayError> {
        let _lineage = self.locks.write(pathway_id).await;
        let mut pathway = self.load_pathway(pathway_id).await?;

        let draft_id = pathway.discard_draft()?;
        self.repository.delete_draft(draft_id).await?;
        self.repository.save_pathway(&pathway).await?;

        tracing::info!(%pathway_id, %draft_id, "draft discarded");
        Ok(pathway)
    }

    pub async fn archive(&self, pathway_id: PathwayId) -> Result<Pathway, PathwayError> {
        self.update_pathway(pathway_id, Pathway::archive).await
    }

    pub async fn unarchive(&self, pathway_id: PathwayId) -> Result<Pathway, PathwayError> {
        self.update_pathway(pathway_id, Pathway::unarchive).await
    }

    /// Creates a pathway whose draft is built from a declarative definition.
    ///
    /// Nothing is stored when the definition is invalid.
    pub async fn import_definition(
        &self,
        organization_id: OrganizationId,
        definition: &PathwayDefinition,
    ) -> Result<ImportedPathway, PathwayError> {
        let mut pathway = Pathway::new(organization_id, definition.name.clone())?;
        let mut draft = PathwayVersion::new_draft(pathway.id(), pathway.next_version_number());
        let keys = definition.build_into(&mut draft)?;
        pathway.attach_draft(&draft)?;

        self.repository.save_version(&draft).await?;
        self.repository.save_pathway(&pathway).await?;

        tracing::info!(
            pathway_id = %pathway.id(),
            name = pathway.name(),
            steps = draft.step_count(),
            "pathway definition imported"
        );
        Ok(ImportedPathway { pathway, draft, keys })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Draft edits
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn add_step(&self, version_id: PathwayVersionId, new: NewStep) -> Result<StepId, PathwayError> {
        self.edit_draft(version_id, |draft| draft.add_step(new)).await
    }

    /// Removes a step with its subtree. Returns every removed step ID.
    pub async fn remove_step(&self, version_id: PathwayVersionId, step_id: StepId) -> Result<Vec<StepId>, PathwayError> {
        self.edit_draft(version_id, |draft| draft.remove_step(step_id)).await
    }

    pub async fn update_step(
        &self,
        version_id: PathwayVersionId,
        step_id: StepId,
        patch: StepPatch,
    ) -> Result<StepVersion, PathwayError> {
        self.edit_draft(version_id, |draft| draft.update_step(step_id, patch).cloned())
            .await
    }

    /// Attaches, replaces or (with `None`) clears a step's prerequisite.
    pub async fn set_prerequisite(
        &self,
        version_id: PathwayVersionId,
        step_id: StepId,
        rule: Option<Rule>,
    ) -> Result<(), PathwayError> {
        self.edit_draft(version_id, |draft| draft.set_rule(step_id, RuleKind::Prerequisite, rule))
            .await
    }

    pub async fn set_requirement(
        &self,
        version_id: PathwayVersionId,
        step_id: StepId,
        rule: Option<Rule>,
    ) -> Result<(), PathwayError> {
        self.edit_draft(version_id, |draft| draft.set_rule(step_id, RuleKind::Requirement, rule))
            .await
    }

    pub async fn move_step(
        &self,
        version_id: PathwayVersionId,
        step_id: StepId,
        new_parent_id: Option<StepId>,
        new_order_index: u32,
    ) -> Result<(), PathwayError> {
        self.edit_draft(version_id, |draft| draft.move_step(step_id, new_parent_id, new_order_index))
            .await
    }

    pub async fn reorder_steps(
        &self,
        version_id: PathwayVersionId,
        parent_id: Option<StepId>,
        ordered_ids: &[StepId],
    ) -> Result<(), PathwayError> {
        self.edit_draft(version_id, |draft| draft.reorder_children(parent_id, ordered_ids))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_pathway(&self, pathway_id: PathwayId) -> Result<Pathway, PathwayError> {
        self.load_pathway(pathway_id).await
    }

    pub async fn get_version(&self, version_id: PathwayVersionId) -> Result<PathwayVersion, PathwayError> {
        self.load_version(version_id).await
    }

    pub async fn current_version(&self, pathway_id: PathwayId) -> Result<Option<PathwayVersion>, PathwayError> {
        match self.load_pathway(pathway_id).await?.current_version_id() {
            Some(id) => self.load_version(id).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list_versions(&self, pathway_id: PathwayId) -> Result<Vec<PathwayVersion>, PathwayError> {
        self.load_pathway(pathway_id).await?;
        self.repository.list_versions(pathway_id).await
    }

    pub async fn list_pathways(&self, organization_id: OrganizationId) -> Result<Vec<Pathway>, PathwayError> {
        self.repository.list_pathways(organization_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn load_pathway(&self, pathway_id: PathwayId) -> Result<Pathway, PathwayError> {
        self.repository
            .find_pathway(pathway_id)
            .await?
            .ok_or(PathwayError::NotFound(pathway_id))
    }

    async fn load_version(&self, version_id: PathwayVersionId) -> Result<PathwayVersion, PathwayError> {
        self.repository
            .find_version(version_id)
            .await?
            .ok_or(PathwayError::VersionNotFound(version_id))
    }

    async fn update_pathway(
        &self,
        pathway_id: PathwayId,
        change: impl FnOnce(&mut Pathway) -> Result<(), PathwayError>,
    ) -> Result<Pathway, PathwayError> {
        let _lineage = self.locks.write(pathway_id).await;
        let mut pathway = self.load_pathway(pathway_id).await?;
        change(&mut pathway)?;
        self.repository.save_pathway(&pathway).await?;

        tracing::info!(%pathway_id, status = %pathway.status(), "pathway status changed");
        Ok(pathway)
    }

    /// Applies one edit to a draft under the lineage lock.
    ///
    /// The draft is only saved when the edit succeeds, so a failed edit
    /// leaves the stored tree as it was.
    async fn edit_draft<T>(
        &self,
        version_id: PathwayVersionId,
        edit: impl FnOnce(&mut PathwayVersion) -> Result<T, PathwayError>,
    ) -> Result<T, PathwayError> {
        let pathway_id = self.load_version(version_id).await?.pathway_id();
        let _lineage = self.locks.write(pathway_id).await;

        // Reload under the lock; a publish may have frozen it meanwhile.
        let mut draft = self.load_version(version_id).await?;
        draft.ensure_draft()?;
        let out = edit(&mut draft)?;
        self.repository.save_version(&draft).await?;
        Ok(out)
    }
}
