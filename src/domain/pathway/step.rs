//! StepVersion - a node of a pathway version's step tree.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{BadgeClassId, PathwayVersionId, StepId};
use crate::domain::rule::{Rule, RuleKind};

/// A step node. Lives in the arena of its `PathwayVersion` and refers to its
/// parent and rule dependencies by ID only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepVersion {
    id: StepId,
    version_id: PathwayVersionId,
    title: String,
    description: Option<String>,
    parent_id: Option<StepId>,
    order_index: u32,
    milestone: bool,
    prerequisite: Option<Rule>,
    requirement: Option<Rule>,
    /// The step this one was cloned from, when it came from an earlier version.
    source_step_id: Option<StepId>,
}

impl StepVersion {
    pub(crate) fn new(
        version_id: PathwayVersionId,
        title: String,
        parent_id: Option<StepId>,
        order_index: u32,
    ) -> Self {
        Self {
            id: StepId::new(),
            version_id,
            title,
            description: None,
            parent_id,
            order_index,
            milestone: false,
            prerequisite: None,
            requirement: None,
            source_step_id: None,
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn version_id(&self) -> PathwayVersionId {
        self.version_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parent_id(&self) -> Option<StepId> {
        self.parent_id
    }

    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    pub fn is_milestone(&self) -> bool {
        self.milestone
    }

    pub fn prerequisite(&self) -> Option<&Rule> {
        self.prerequisite.as_ref()
    }

    pub fn requirement(&self) -> Option<&Rule> {
        self.requirement.as_ref()
    }

    pub fn rule(&self, kind: RuleKind) -> Option<&Rule> {
        match kind {
            RuleKind::Prerequisite => self.prerequisite.as_ref(),
            RuleKind::Requirement => self.requirement.as_ref(),
        }
    }

    pub fn source_step_id(&self) -> Option<StepId> {
        self.source_step_id
    }

    /// Badge classes that must be earned to complete this step.
    pub fn required_badges(&self) -> Vec<BadgeClassId> {
        self.requirement
            .as_ref()
            .map(|r| r.badge_dependencies().collect())
            .unwrap_or_default()
    }

    // Mutators are crate-private: only a draft `PathwayVersion` may call them.

    pub(crate) fn set_parent(&mut self, parent_id: Option<StepId>) {
        self.parent_id = parent_id;
    }

    pub(crate) fn set_order_index(&mut self, order_index: u32) {
        self.order_index = order_index;
    }

    pub(crate) fn set_rule(&mut self, kind: RuleKind, rule: Option<Rule>) {
        match kind {
            RuleKind::Prerequisite => self.prerequisite = rule,
            RuleKind::Requirement => self.requirement = rule,
        }
    }

    pub(crate) fn apply(&mut self, patch: StepPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(milestone) = patch.milestone {
            self.milestone = milestone;
        }
    }

    /// Copies this step into another version under a fresh ID.
    ///
    /// Parent and rule references still point at the old IDs; the caller
    /// remaps them once every step has its new ID.
    pub(crate) fn clone_into(&self, version_id: PathwayVersionId) -> StepVersion {
        StepVersion {
            id: StepId::new(),
            version_id,
            source_step_id: Some(self.id),
            ..self.clone()
        }
    }
}

/// Partial update for a draft step.
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<bool>,
}

impl StepPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.milestone.is_none()
    }
}

/// Input for adding a step to a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStep {
    pub title: String,
    pub description: Option<String>,
    pub parent_id: Option<StepId>,
    pub milestone: bool,
    /// Insert position among siblings; appends when `None`.
    pub position: Option<u32>,
}

impl NewStep {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            parent_id: None,
            milestone: false,
            position: None,
        }
    }

    pub fn under(mut self, parent_id: StepId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn milestone(mut self) -> Self {
        self.milestone = true;
        self
    }

    pub fn at(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
