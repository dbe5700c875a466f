//! PathwayVersion - one snapshot of a pathway's step tree.
//!
//! All steps of a version live in a single arena keyed by `StepId`. Parent,
//! child and sibling views are computed on demand; nothing holds a direct
//! reference to another node.
//!
//! # Invariants
//!
//! - A published version is frozen: every mutator fails with `ImmutableVersion`
//! - Sibling `order_index` values are contiguous `0..n-1` after every mutation
//! - Parent links are acyclic and every parent exists
//! - Step dependencies of rules resolve inside this version
//! - The prerequisite graph over step edges is acyclic
//!
//! Mutators validate before they touch the arena, so a rejected edit leaves
//! the draft exactly as it was.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{BadgeClassId, PathwayId, PathwayVersionId, StateMachine, StepId, Timestamp};
use crate::domain::rule::{Rule, RuleKind};

use super::graph;
use super::{NewStep, PathwayError, StepPatch, StepVersion};

/// Maximum length for a step title.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Lifecycle of a single version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    #[default]
    Draft,
    Published,
}

impl StateMachine for VersionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (VersionStatus::Draft, VersionStatus::Published))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            VersionStatus::Draft => vec![VersionStatus::Published],
            VersionStatus::Published => vec![],
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionStatus::Draft => write!(f, "Draft"),
            VersionStatus::Published => write!(f, "Published"),
        }
    }
}

/// A draft or published snapshot of a pathway's steps and rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayVersion {
    id: PathwayVersionId,
    pathway_id: PathwayId,
    version: u32,
    status: VersionStatus,
    steps: BTreeMap<StepId, StepVersion>,
    created_at: Timestamp,
    published_at: Option<Timestamp>,
}

impl PathwayVersion {
    /// Creates an empty draft.
    pub fn new_draft(pathway_id: PathwayId, version: u32) -> Self {
        Self {
            id: PathwayVersionId::new(),
            pathway_id,
            version,
            status: VersionStatus::Draft,
            steps: BTreeMap::new(),
            created_at: Timestamp::now(),
            published_at: None,
        }
    }

    /// Deep-copies this version into a new draft numbered `version`.
    ///
    /// Every step gets a fresh ID; parent links and step dependencies are
    /// rewritten to the fresh IDs so the copy has the same shape.
    pub fn clone_as_draft(&self, version: u32) -> PathwayVersion {
        let id = PathwayVersionId::new();
        let mut mapping = HashMap::with_capacity(self.steps.len());
        let mut copies: Vec<StepVersion> = self
            .steps
            .values()
            .map(|step| {
                let copy = step.clone_into(id);
                mapping.insert(step.id(), copy.id());
                copy
            })
            .collect();

        for copy in &mut copies {
            let parent = copy.parent_id().and_then(|p| mapping.get(&p).copied());
            copy.set_parent(parent);
            for kind in [RuleKind::Prerequisite, RuleKind::Requirement] {
                let remapped = copy.rule(kind).map(|r| r.remap_steps(&mapping));
                copy.set_rule(kind, remapped);
            }
        }

        Self {
            id,
            pathway_id: self.pathway_id,
            version,
            status: VersionStatus::Draft,
            steps: copies.into_iter().map(|s| (s.id(), s)).collect(),
            created_at: Timestamp::now(),
            published_at: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> PathwayVersionId {
        self.id
    }

    pub fn pathway_id(&self) -> PathwayId {
        self.pathway_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn status(&self) -> VersionStatus {
        self.status
    }

    pub fn is_draft(&self) -> bool {
        self.status == VersionStatus::Draft
    }

    pub fn is_published(&self) -> bool {
        self.status == VersionStatus::Published
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn published_at(&self) -> Option<Timestamp> {
        self.published_at
    }

    /// Fails with `ImmutableVersion` unless this is a draft.
    pub fn ensure_draft(&self) -> Result<(), PathwayError> {
        if self.is_draft() {
            Ok(())
        } else {
            Err(PathwayError::ImmutableVersion {
                pathway_id: self.pathway_id,
                version_id: self.id,
                version: self.version,
            })
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tree queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_step(&self, step_id: StepId) -> Option<&StepVersion> {
        self.steps.get(&step_id)
    }

    /// Looks up a step, failing with `StepNotFound`.
    pub fn step(&self, step_id: StepId) -> Result<&StepVersion, PathwayError> {
        self.steps
            .get(&step_id)
            .ok_or_else(|| PathwayError::step_not_found(self.id, step_id))
    }

    pub fn contains_step(&self, step_id: StepId) -> bool {
        self.steps.contains_key(&step_id)
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepVersion> {
        self.steps.values()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Children of `parent` (roots when `None`) in sibling order.
    pub fn children(&self, parent: Option<StepId>) -> Vec<&StepVersion> {
        let mut children: Vec<&StepVersion> =
            self.steps.values().filter(|s| s.parent_id() == parent).collect();
        children.sort_by_key(|s| (s.order_index(), s.id()));
        children
    }

    pub fn roots(&self) -> Vec<&StepVersion> {
        self.children(None)
    }

    fn child_ids(&self, parent: Option<StepId>) -> Vec<StepId> {
        self.children(parent).into_iter().map(|s| s.id()).collect()
    }

    pub fn is_leaf(&self, step_id: StepId) -> bool {
        !self.steps.values().any(|s| s.parent_id() == Some(step_id))
    }

    /// Leaf steps that count toward completion (milestones are markers only).
    pub fn countable_leaves(&self) -> Vec<StepId> {
        let parents: HashSet<StepId> = self.steps.values().filter_map(|s| s.parent_id()).collect();
        self.steps
            .values()
            .filter(|s| !parents.contains(&s.id()) && !s.is_milestone())
            .map(|s| s.id())
            .collect()
    }

    /// Steps whose prerequisite rule references `step_id`.
    pub fn prerequisite_dependents(&self, step_id: StepId) -> Vec<StepId> {
        self.steps
            .values()
            .filter(|s| s.prerequisite().is_some_and(|r| r.references_step(step_id)))
            .map(|s| s.id())
            .collect()
    }

    /// Steps whose requirement rule references `badge_id`.
    pub fn steps_requiring_badge(&self, badge_id: BadgeClassId) -> Vec<StepId> {
        self.steps
            .values()
            .filter(|s| s.requirement().is_some_and(|r| r.references_badge(badge_id)))
            .map(|s| s.id())
            .collect()
    }

    /// Every badge class any rule in this version depends on.
    pub fn badge_dependencies(&self) -> HashSet<BadgeClassId> {
        self.steps
            .values()
            .flat_map(|s| s.prerequisite().into_iter().chain(s.requirement()))
            .flat_map(|r| r.badge_dependencies())
            .collect()
    }

    pub fn descendants(&self, step_id: StepId) -> HashSet<StepId> {
        graph::descendants(&self.steps, step_id)
    }

    /// Steps ordered so each prerequisite precedes its dependents.
    pub fn topological_order(&self) -> Result<Vec<StepId>, PathwayError> {
        graph::prerequisite_order(&self.steps).map_err(|cycle| PathwayError::CyclicDependency {
            version_id: self.id,
            cycle,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Draft mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds a step under `new.parent_id`, shifting later siblings down.
    pub fn add_step(&mut self, new: NewStep) -> Result<StepId, PathwayError> {
        self.ensure_draft()?;
        let title = validate_title(new.title)?;
        if let Some(parent) = new.parent_id {
            self.step(parent)?;
        }

        let mut siblings = self.child_ids(new.parent_id);
        let position = match new.position {
            None => siblings.len(),
            Some(p) if (p as usize) <= siblings.len() => p as usize,
            Some(p) => {
                return Err(PathwayError::invalid_order(
                    new.parent_id,
                    format!("position {} is past the end of {} sibling(s)", p, siblings.len()),
                ))
            }
        };

        let mut step = StepVersion::new(self.id, title, new.parent_id, position as u32);
        step.apply(StepPatch {
            title: None,
            description: Some(new.description),
            milestone: Some(new.milestone),
        });
        let step_id = step.id();
        self.steps.insert(step_id, step);

        siblings.insert(position, step_id);
        self.renumber(&siblings);
        Ok(step_id)
    }

    /// Applies a patch to a draft step.
    pub fn update_step(&mut self, step_id: StepId, patch: StepPatch) -> Result<&StepVersion, PathwayError> {
        self.ensure_draft()?;
        self.step(step_id)?;
        let patch = StepPatch {
            title: patch.title.map(validate_title).transpose()?,
            ..patch
        };
        let step = self.step_mut(step_id)?;
        step.apply(patch);
        Ok(&*step)
    }

    /// Attaches, replaces or clears (`None`) one of a step's rules.
    ///
    /// Step dependencies must resolve inside this version and may not point
    /// at the step itself. A prerequisite that closes a cycle is rejected
    /// with `CyclicDependency` and the previous rule stays in place.
    pub fn set_rule(&mut self, step_id: StepId, kind: RuleKind, rule: Option<Rule>) -> Result<(), PathwayError> {
        self.ensure_draft()?;
        let previous = self.step(step_id)?.rule(kind).cloned();
        if let Some(rule) = &rule {
            self.check_rule_references(step_id, kind, rule)?;
        }

        self.step_mut(step_id)?.set_rule(kind, rule);
        if kind == RuleKind::Prerequisite {
            if let Err(cycle) = graph::prerequisite_order(&self.steps) {
                self.step_mut(step_id)?.set_rule(kind, previous);
                return Err(PathwayError::CyclicDependency {
                    version_id: self.id,
                    cycle,
                });
            }
        }
        Ok(())
    }

    /// Removes a step and its whole subtree.
    ///
    /// Rules elsewhere lose their references to removed steps; a rule left
    /// with nothing to gate on is dropped. Returns the removed IDs.
    pub fn remove_step(&mut self, step_id: StepId) -> Result<Vec<StepId>, PathwayError> {
        self.ensure_draft()?;
        let parent = self.step(step_id)?.parent_id();

        let mut removed = self.descendants(step_id);
        removed.insert(step_id);
        self.steps.retain(|id, _| !removed.contains(id));

        for step in self.steps.values_mut() {
            for kind in [RuleKind::Prerequisite, RuleKind::Requirement] {
                let touches_removed = step
                    .rule(kind)
                    .is_some_and(|r| r.step_dependencies().any(|d| removed.contains(&d)));
                if touches_removed {
                    let pruned = step.rule(kind).and_then(|r| r.without_steps(&removed));
                    step.set_rule(kind, pruned);
                }
            }
        }

        let siblings = self.child_ids(parent);
        self.renumber(&siblings);

        let mut removed: Vec<StepId> = removed.into_iter().collect();
        removed.sort();
        Ok(removed)
    }

    /// Re-parents a step and places it at `new_order_index` among its new
    /// siblings, renumbering both sibling groups.
    ///
    /// Fails with `CyclicMove` when `new_parent_id` is the step itself or one
    /// of its descendants.
    pub fn move_step(
        &mut self,
        step_id: StepId,
        new_parent_id: Option<StepId>,
        new_order_index: u32,
    ) -> Result<(), PathwayError> {
        self.ensure_draft()?;
        let old_parent = self.step(step_id)?.parent_id();
        if let Some(new_parent) = new_parent_id {
            self.step(new_parent)?;
            if new_parent == step_id || self.descendants(step_id).contains(&new_parent) {
                return Err(PathwayError::CyclicMove {
                    step_id,
                    new_parent_id: new_parent,
                });
            }
        }

        let mut new_siblings: Vec<StepId> = self
            .child_ids(new_parent_id)
            .into_iter()
            .filter(|id| *id != step_id)
            .collect();
        if new_order_index as usize > new_siblings.len() {
            return Err(PathwayError::invalid_order(
                new_parent_id,
                format!(
                    "order index {} is past the end of {} sibling(s)",
                    new_order_index,
                    new_siblings.len()
                ),
            ));
        }

        if old_parent != new_parent_id {
            let old_siblings: Vec<StepId> = self
                .child_ids(old_parent)
                .into_iter()
                .filter(|id| *id != step_id)
                .collect();
            self.renumber(&old_siblings);
        }

        self.step_mut(step_id)?.set_parent(new_parent_id);
        new_siblings.insert(new_order_index as usize, step_id);
        self.renumber(&new_siblings);
        Ok(())
    }

    /// Reorders the children of `parent_id` (roots when `None`).
    ///
    /// `ordered_ids` must be a permutation of the current children; the result
    /// is numbered `0..n-1` in the given order.
    pub fn reorder_children(&mut self, parent_id: Option<StepId>, ordered_ids: &[StepId]) -> Result<(), PathwayError> {
        self.ensure_draft()?;
        if let Some(parent) = parent_id {
            self.step(parent)?;
        }

        let proposed: HashSet<StepId> = ordered_ids.iter().copied().collect();
        if proposed.len() != ordered_ids.len() {
            return Err(PathwayError::invalid_order(parent_id, "ordered ids contain duplicates"));
        }
        let current: HashSet<StepId> = self.child_ids(parent_id).into_iter().collect();
        if proposed != current {
            return Err(PathwayError::invalid_order(
                parent_id,
                "ordered ids must be a permutation of the current children",
            ));
        }

        self.renumber(ordered_ids);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation & publishing
    // ─────────────────────────────────────────────────────────────────────────

    /// Full structural check run before publishing.
    pub fn validate(&self) -> Result<(), PathwayError> {
        graph::check_parent_links(&self.steps).map_err(|reason| PathwayError::invalid_structure(self.id, reason))?;

        let mut groups: HashMap<Option<StepId>, Vec<u32>> = HashMap::new();
        for step in self.steps.values() {
            groups.entry(step.parent_id()).or_default().push(step.order_index());
        }
        for (parent, mut indexes) in groups {
            indexes.sort_unstable();
            let contiguous = indexes.iter().enumerate().all(|(i, idx)| *idx as usize == i);
            if !contiguous {
                return Err(PathwayError::invalid_order(
                    parent,
                    format!("order indexes {:?} are not contiguous from 0", indexes),
                ));
            }
        }

        for step in self.steps.values() {
            for kind in [RuleKind::Prerequisite, RuleKind::Requirement] {
                if let Some(rule) = step.rule(kind) {
                    self.check_rule_references(step.id(), kind, rule)?;
                }
            }
        }

        self.topological_order()?;

        if self.countable_leaves().is_empty() {
            return Err(PathwayError::invalid_structure(
                self.id,
                "a version needs at least one leaf step that is not a milestone",
            ));
        }
        Ok(())
    }

    /// Validates and freezes the draft. Publishing a published version is a
    /// no-op.
    pub fn publish(&mut self) -> Result<(), PathwayError> {
        if self.is_published() {
            return Ok(());
        }
        self.validate()?;
        self.status = self
            .status
            .transition_to(VersionStatus::Published)
            .map_err(|e| PathwayError::invalid_state(self.status.to_string(), e.to_string()))?;
        self.published_at = Some(Timestamp::now());
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn step_mut(&mut self, step_id: StepId) -> Result<&mut StepVersion, PathwayError> {
        let version_id = self.id;
        self.steps
            .get_mut(&step_id)
            .ok_or_else(|| PathwayError::step_not_found(version_id, step_id))
    }

    fn renumber(&mut self, ordered: &[StepId]) {
        for (index, id) in ordered.iter().enumerate() {
            if let Some(step) = self.steps.get_mut(id) {
                step.set_order_index(index as u32);
            }
        }
    }

    fn check_rule_references(&self, step_id: StepId, kind: RuleKind, rule: &Rule) -> Result<(), PathwayError> {
        for dependency in rule.step_dependencies() {
            let reason = if dependency == step_id {
                "a step cannot depend on itself".to_string()
            } else if !self.steps.contains_key(&dependency) {
                format!("step {} is not part of this version", dependency)
            } else {
                continue;
            };
            return Err(PathwayError::InvalidRule {
                step_id,
                kind: kind.to_string(),
                reason,
            });
        }
        Ok(())
    }
}

fn validate_title(title: String) -> Result<String, PathwayError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(PathwayError::validation("title", "must not be empty"));
    }
    if trimmed.len() > MAX_TITLE_LENGTH {
        return Err(PathwayError::validation(
            "title",
            format!("must be at most {} characters", MAX_TITLE_LENGTH),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use crate::domain::rule::DependencyRef;

    fn draft() -> PathwayVersion {
        PathwayVersion::new_draft(PathwayId::new(), 1)
    }

    fn order_of(version: &PathwayVersion, parent: Option<StepId>) -> Vec<(StepId, u32)> {
        version
            .children(parent)
            .into_iter()
            .map(|s| (s.id(), s.order_index()))
            .collect()
    }

    fn prereq(deps: &[StepId]) -> Rule {
        Rule::all(deps.iter().map(|d| DependencyRef::Step(*d))).unwrap()
    }

    // ───────────────────────────────────────────────────────────────
    // Adding & removing
    // ───────────────────────────────────────────────────────────────

    #[test]
    fn add_step_appends_and_inserts_contiguously() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();
        let c = v.add_step(NewStep::new("C").at(1)).unwrap();

        assert_eq!(order_of(&v, None), vec![(a, 0), (c, 1), (b, 2)]);
    }

    #[test]
    fn add_step_rejects_blank_title_and_bad_position() {
        let mut v = draft();
        assert_eq!(v.add_step(NewStep::new("   ")).unwrap_err().code(), ErrorCode::ValidationFailed);
        assert_eq!(v.add_step(NewStep::new("X").at(3)).unwrap_err().code(), ErrorCode::InvalidOrder);
        assert_eq!(v.step_count(), 0);
    }

    #[test]
    fn add_step_under_unknown_parent_fails() {
        let mut v = draft();
        let err = v.add_step(NewStep::new("child").under(StepId::new())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StepNotFound);
    }

    #[test]
    fn remove_step_drops_subtree_prunes_rules_and_renumbers() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();
        let b1 = v.add_step(NewStep::new("B1").under(b)).unwrap();
        let c = v.add_step(NewStep::new("C")).unwrap();
        v.set_rule(c, RuleKind::Prerequisite, Some(Rule::any([DependencyRef::Step(a), DependencyRef::Step(b1)]).unwrap()))
            .unwrap();
        v.set_rule(a, RuleKind::Prerequisite, Some(prereq(&[b1]))).unwrap();

        let removed = v.remove_step(b).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!v.contains_step(b1));
        assert_eq!(order_of(&v, None), vec![(a, 0), (c, 1)]);
        let c_rule = v.step(c).unwrap().prerequisite().unwrap();
        assert!(c_rule.references_step(a));
        assert!(!c_rule.references_step(b1));
        assert!(v.step(a).unwrap().prerequisite().is_none());
    }

    #[test]
    fn update_step_changes_title_and_milestone() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        v.update_step(
            a,
            StepPatch {
                title: Some("Orientation".into()),
                milestone: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        let step = v.step(a).unwrap();
        assert_eq!(step.title(), "Orientation");
        assert!(step.is_milestone());
    }

    // ───────────────────────────────────────────────────────────────
    // Rules
    // ───────────────────────────────────────────────────────────────

    #[test]
    fn set_rule_rejects_self_and_foreign_references() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();

        let self_ref = v.set_rule(a, RuleKind::Prerequisite, Some(prereq(&[a]))).unwrap_err();
        assert_eq!(self_ref.code(), ErrorCode::InvalidRule);

        let foreign = v
            .set_rule(a, RuleKind::Requirement, Some(prereq(&[StepId::new()])))
            .unwrap_err();
        assert_eq!(foreign.code(), ErrorCode::InvalidRule);
    }

    #[test]
    fn set_rule_rejects_cycle_and_keeps_previous_rule() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();
        let c = v.add_step(NewStep::new("C")).unwrap();
        v.set_rule(b, RuleKind::Prerequisite, Some(prereq(&[a]))).unwrap();
        v.set_rule(c, RuleKind::Prerequisite, Some(prereq(&[b]))).unwrap();

        let err = v.set_rule(a, RuleKind::Prerequisite, Some(prereq(&[c]))).unwrap_err();

        assert!(matches!(err, PathwayError::CyclicDependency { ref cycle, .. } if cycle.len() == 3));
        assert!(v.step(a).unwrap().prerequisite().is_none());
    }

    #[test]
    fn requirement_step_references_do_not_count_as_prerequisite_edges() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();
        v.set_rule(b, RuleKind::Prerequisite, Some(prereq(&[a]))).unwrap();

        assert!(v.set_rule(a, RuleKind::Requirement, Some(prereq(&[b]))).is_ok());
    }

    // ───────────────────────────────────────────────────────────────
    // Moving & reordering
    // ───────────────────────────────────────────────────────────────

    #[test]
    fn move_into_own_descendant_is_rejected_and_tree_unchanged() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let a1 = v.add_step(NewStep::new("A1").under(a)).unwrap();
        let a11 = v.add_step(NewStep::new("A11").under(a1)).unwrap();
        let before = v.clone();

        let err = v.move_step(a, Some(a11), 0).unwrap_err();
        assert_eq!(err, PathwayError::CyclicMove { step_id: a, new_parent_id: a11 });
        assert_eq!(v.move_step(a, Some(a), 0).unwrap_err().code(), ErrorCode::CyclicMove);
        assert_eq!(v, before);
    }

    #[test]
    fn move_renumbers_both_sibling_groups() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();
        let c = v.add_step(NewStep::new("C")).unwrap();
        let b1 = v.add_step(NewStep::new("B1").under(b)).unwrap();

        v.move_step(a, Some(b), 0).unwrap();

        assert_eq!(order_of(&v, None), vec![(b, 0), (c, 1)]);
        assert_eq!(order_of(&v, Some(b)), vec![(a, 0), (b1, 1)]);
    }

    #[test]
    fn move_within_same_parent_reorders() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();
        let c = v.add_step(NewStep::new("C")).unwrap();

        v.move_step(a, None, 2).unwrap();

        assert_eq!(order_of(&v, None), vec![(b, 0), (c, 1), (a, 2)]);
    }

    #[test]
    fn reorder_children_yields_contiguous_sequence() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();
        let c = v.add_step(NewStep::new("C")).unwrap();

        v.reorder_children(None, &[c, a, b]).unwrap();

        assert_eq!(order_of(&v, None), vec![(c, 0), (a, 1), (b, 2)]);
    }

    #[test]
    fn reorder_children_requires_a_permutation() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();

        assert_eq!(v.reorder_children(None, &[a]).unwrap_err().code(), ErrorCode::InvalidOrder);
        assert_eq!(v.reorder_children(None, &[a, a]).unwrap_err().code(), ErrorCode::InvalidOrder);
        assert_eq!(
            v.reorder_children(None, &[a, b, StepId::new()]).unwrap_err().code(),
            ErrorCode::InvalidOrder
        );
    }

    // ───────────────────────────────────────────────────────────────
    // Publishing & cloning
    // ───────────────────────────────────────────────────────────────

    #[test]
    fn publish_freezes_the_version() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        v.publish().unwrap();

        assert!(v.is_published());
        assert!(v.published_at().is_some());
        assert!(v.status().is_terminal());
        let err = v.update_step(a, StepPatch::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ImmutableVersion);
        assert_eq!(v.add_step(NewStep::new("B")).unwrap_err().code(), ErrorCode::ImmutableVersion);
        assert!(v.publish().is_ok());
    }

    #[test]
    fn publish_requires_a_countable_leaf() {
        let mut v = draft();
        v.add_step(NewStep::new("Checkpoint").milestone()).unwrap();

        assert_eq!(v.publish().unwrap_err().code(), ErrorCode::InvalidStructure);
        assert!(v.is_draft());
    }

    #[test]
    fn countable_leaves_skip_parents_and_milestones() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let a1 = v.add_step(NewStep::new("A1").under(a)).unwrap();
        v.add_step(NewStep::new("Gate").milestone()).unwrap();

        assert_eq!(v.countable_leaves(), vec![a1]);
        assert!(!v.is_leaf(a));
    }

    #[test]
    fn clone_as_draft_remaps_parents_and_rules() {
        let mut v = draft();
        let a = v.add_step(NewStep::new("A")).unwrap();
        let a1 = v.add_step(NewStep::new("A1").under(a)).unwrap();
        let b = v.add_step(NewStep::new("B")).unwrap();
        let badge = BadgeClassId::new();
        v.set_rule(b, RuleKind::Prerequisite, Some(prereq(&[a1]))).unwrap();
        v.set_rule(b, RuleKind::Requirement, Some(Rule::all([DependencyRef::Badge(badge)]).unwrap()))
            .unwrap();
        v.publish().unwrap();

        let next = v.clone_as_draft(2);

        assert!(next.is_draft());
        assert_eq!(next.version(), 2);
        assert_eq!(next.step_count(), 3);
        assert!(next.steps().all(|s| !v.contains_step(s.id())));

        let new_b = next.steps().find(|s| s.source_step_id() == Some(b)).unwrap();
        let new_a1 = next.steps().find(|s| s.source_step_id() == Some(a1)).unwrap();
        let new_a = next.steps().find(|s| s.source_step_id() == Some(a)).unwrap();
        assert!(new_b.prerequisite().unwrap().references_step(new_a1.id()));
        assert_eq!(new_b.required_badges(), vec![badge]);
        assert_eq!(new_a1.parent_id(), Some(new_a.id()));
        assert!(next.validate().is_ok());
    }

    #[test]
    fn version_status_only_moves_forward() {
        assert!(VersionStatus::Draft.can_transition_to(&VersionStatus::Published));
        assert!(VersionStatus::Published.transition_to(VersionStatus::Draft).is_err());
    }
}
