//! Group progress summary - a read-only fold over members' group-context rows.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{GroupId, PathwayId, PathwayVersionId, StepId};
use crate::domain::pathway::PathwayVersion;

use super::{PathwayProgress, StepProgress, StepStatus};

/// Member counts per status for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatusCounts {
    pub not_started: u32,
    pub in_progress: u32,
    pub completed: u32,
}

impl StepStatusCounts {
    pub fn record(&mut self, status: StepStatus) {
        match status {
            StepStatus::NotStarted => self.not_started += 1,
            StepStatus::InProgress => self.in_progress += 1,
            StepStatus::Completed => self.completed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.not_started + self.in_progress + self.completed
    }
}

/// Roll-up for the members pinned to one pathway version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub pathway_id: PathwayId,
    pub version_id: PathwayVersionId,
    pub version: u32,
    pub enrolled_members: u32,
    /// Members who completed every countable step in the group context.
    pub completed_members: u32,
    pub steps: BTreeMap<StepId, StepStatusCounts>,
    /// Members who completed each milestone step in the group context.
    pub milestones_reached: BTreeMap<StepId, u32>,
}

impl VersionSummary {
    fn empty(version: &PathwayVersion) -> Self {
        Self {
            pathway_id: version.pathway_id(),
            version_id: version.id(),
            version: version.version(),
            enrolled_members: 0,
            completed_members: 0,
            steps: version.steps().map(|s| (s.id(), StepStatusCounts::default())).collect(),
            milestones_reached: version
                .steps()
                .filter(|s| s.is_milestone())
                .map(|s| (s.id(), 0))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProgressSummary {
    pub group_id: GroupId,
    /// Set when the summary was restricted to one pathway.
    pub pathway_id: Option<PathwayId>,
    pub member_count: u32,
    pub versions: Vec<VersionSummary>,
}

impl GroupProgressSummary {
    pub fn version(&self, version_id: PathwayVersionId) -> Option<&VersionSummary> {
        self.versions.iter().find(|v| v.version_id == version_id)
    }
}

/// Accumulates members into a `GroupProgressSummary`.
#[derive(Debug)]
pub struct GroupSummaryBuilder {
    group_id: GroupId,
    pathway_id: Option<PathwayId>,
    member_count: u32,
    versions: BTreeMap<(PathwayId, u32), VersionSummary>,
}

impl GroupSummaryBuilder {
    pub fn new(group_id: GroupId, pathway_id: Option<PathwayId>, member_count: u32) -> Self {
        Self {
            group_id,
            pathway_id,
            member_count,
            versions: BTreeMap::new(),
        }
    }

    /// Folds one member's enrollment.
    ///
    /// `rows` are that member's rows for `version`; only rows in this
    /// group's context are counted. A step with no row counts as not started.
    pub fn add_member(&mut self, version: &PathwayVersion, progress: &PathwayProgress, rows: &[StepProgress]) {
        if !progress.is_active() || progress.version_id() != version.id() {
            return;
        }
        let statuses: HashMap<StepId, StepStatus> = rows
            .iter()
            .filter(|r| r.group_id() == Some(self.group_id) && r.key().version_id == version.id())
            .map(|r| (r.step_id(), r.status()))
            .collect();
        let status_of = |id: StepId| statuses.get(&id).copied().unwrap_or_default();

        let summary = self
            .versions
            .entry((version.pathway_id(), version.version()))
            .or_insert_with(|| VersionSummary::empty(version));
        summary.enrolled_members += 1;

        for step in version.steps() {
            let status = status_of(step.id());
            summary.steps.entry(step.id()).or_default().record(status);
            if step.is_milestone() && status.is_completed() {
                *summary.milestones_reached.entry(step.id()).or_default() += 1;
            }
        }

        let leaves = version.countable_leaves();
        if !leaves.is_empty() && leaves.iter().all(|id| status_of(*id).is_completed()) {
            summary.completed_members += 1;
        }
    }

    pub fn build(self) -> GroupProgressSummary {
        GroupProgressSummary {
            group_id: self.group_id,
            pathway_id: self.pathway_id,
            member_count: self.member_count,
            versions: self.versions.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::pathway::NewStep;
    use crate::domain::progress::StepProgressKey;

    fn version() -> (PathwayVersion, StepId, StepId) {
        let mut v = PathwayVersion::new_draft(PathwayId::new(), 1);
        let a = v.add_step(NewStep::new("A")).unwrap();
        let gate = v.add_step(NewStep::new("Gate").milestone()).unwrap();
        v.publish().unwrap();
        (v, a, gate)
    }

    fn member(v: &PathwayVersion, name: &str) -> PathwayProgress {
        PathwayProgress::enroll(UserId::new(name).unwrap(), v.pathway_id(), v.id(), 1, 1)
    }

    fn completed(v: &PathwayVersion, step: StepId, p: &PathwayProgress, group: Option<GroupId>) -> StepProgress {
        let mut row = StepProgress::new(StepProgressKey::new(v.id(), step, p.user_id().clone(), group), true);
        row.complete().unwrap();
        row
    }

    #[test]
    fn counts_group_rows_only() {
        let (v, a, gate) = version();
        let group = GroupId::new();
        let alice = member(&v, "alice");
        let bob = member(&v, "bob");

        let mut builder = GroupSummaryBuilder::new(group, Some(v.pathway_id()), 2);
        builder.add_member(
            &v,
            &alice,
            &[completed(&v, a, &alice, Some(group)), completed(&v, gate, &alice, Some(group))],
        );
        builder.add_member(&v, &bob, &[completed(&v, a, &bob, None)]);
        let summary = builder.build();

        let vs = summary.version(v.id()).unwrap();
        assert_eq!(vs.enrolled_members, 2);
        assert_eq!(vs.completed_members, 1);
        assert_eq!(vs.steps[&a].completed, 1);
        assert_eq!(vs.steps[&a].not_started, 1);
        assert_eq!(vs.steps[&a].total(), 2);
        assert_eq!(vs.milestones_reached[&gate], 1);
    }

    #[test]
    fn unenrolled_members_are_skipped() {
        let (v, _, _) = version();
        let mut carol = member(&v, "carol");
        carol.unenroll().unwrap();

        let mut builder = GroupSummaryBuilder::new(GroupId::new(), None, 1);
        builder.add_member(&v, &carol, &[]);

        assert!(builder.build().versions.is_empty());
    }
}
