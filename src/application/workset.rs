//! Working copy of one enrollment's step rows during a unit of work.
//!
//! Rows are read once, changed in memory and handed to the store as one
//! `ProgressCommit`. Only rows that were created or changed are written.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::domain::foundation::{BadgeClassId, GroupId, StepId, UserId};
use crate::domain::pathway::PathwayVersion;
use crate::domain::progress::{
    completion_counts, derive_elements, PathwayElementProgress, PathwayProgress, ProgressError, StepProgress,
    StepProgressKey, StepStatus,
};
use crate::domain::rule::{evaluate_facts, is_unlocked, SatisfiedFacts};
use crate::ports::ProgressCommit;

pub(crate) struct Workset<'a> {
    version: &'a PathwayVersion,
    user_id: UserId,
    rows: BTreeMap<StepProgressKey, StepProgress>,
    dirty: BTreeSet<StepProgressKey>,
}

impl<'a> Workset<'a> {
    /// Rows belonging to other versions are dropped.
    pub fn new(version: &'a PathwayVersion, user_id: &UserId, rows: Vec<StepProgress>) -> Self {
        let rows = rows
            .into_iter()
            .filter(|r| r.key().version_id == version.id() && &r.key().user_id == user_id)
            .map(|r| (r.key().clone(), r))
            .collect();
        Self {
            version,
            user_id: user_id.clone(),
            rows,
            dirty: BTreeSet::new(),
        }
    }

    pub fn key(&self, step_id: StepId, group_id: Option<GroupId>) -> StepProgressKey {
        StepProgressKey::new(self.version.id(), step_id, self.user_id.clone(), group_id)
    }

    pub fn row(&self, step_id: StepId, group_id: Option<GroupId>) -> Option<&StepProgress> {
        self.rows.get(&self.key(step_id, group_id))
    }

    pub fn status(&self, step_id: StepId, group_id: Option<GroupId>) -> StepStatus {
        self.row(step_id, group_id).map(|r| r.status()).unwrap_or_default()
    }

    /// A copy of the stored row, or a fresh locked one.
    pub fn row_or_new(&self, step_id: StepId, group_id: Option<GroupId>) -> StepProgress {
        self.row(step_id, group_id)
            .cloned()
            .unwrap_or_else(|| StepProgress::new(self.key(step_id, group_id), false))
    }

    pub fn put(&mut self, row: StepProgress) {
        let key = row.key().clone();
        self.rows.insert(key.clone(), row);
        self.dirty.insert(key);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// The ungrouped context plus every group the user has rows in.
    pub fn contexts(&self) -> Vec<Option<GroupId>> {
        let mut contexts: BTreeSet<Option<GroupId>> = self.rows.keys().map(|k| k.group_id).collect();
        contexts.insert(None);
        contexts.into_iter().collect()
    }

    /// Completed steps count as satisfied only while they are unlocked.
    pub fn facts(&self, group_id: Option<GroupId>, earned: &HashSet<BadgeClassId>) -> SatisfiedFacts {
        let completed = self
            .rows
            .values()
            .filter(|r| r.group_id() == group_id && r.status().is_completed() && r.is_unlocked())
            .map(|r| r.step_id())
            .collect();
        SatisfiedFacts::new(completed, earned.clone())
    }

    /// Re-evaluates the unlock flag of `steps` in one context.
    ///
    /// Steps are visited in prerequisite order. When a completed step is
    /// locked or unlocked, its dependents are visited as well, so a re-lock
    /// reaches every level below it. Unlocked steps without a row get a
    /// NOT_STARTED one. Locked steps keep their status. Returns the steps
    /// that went from locked (or absent) to unlocked.
    pub fn refresh_unlocks(
        &mut self,
        group_id: Option<GroupId>,
        earned: &HashSet<BadgeClassId>,
        steps: impl IntoIterator<Item = StepId>,
    ) -> Vec<StepId> {
        let version = self.version;
        let mut facts = self.facts(group_id, earned);
        let mut pending: HashSet<StepId> = steps.into_iter().collect();
        let order = version
            .topological_order()
            .unwrap_or_else(|_| version.steps().map(|s| s.id()).collect());

        let mut opened = Vec::new();
        for step_id in order {
            if !pending.remove(&step_id) {
                continue;
            }
            let Some(step) = version.get_step(step_id) else {
                continue;
            };
            let unlocked = is_unlocked(step.prerequisite(), &facts);
            match self.row(step_id, group_id).map(|r| r.is_unlocked()) {
                Some(current) if current == unlocked => continue,
                None if !unlocked => continue,
                _ => {}
            }

            let mut row = self.row_or_new(step_id, group_id);
            row.set_unlocked(unlocked);
            let completed = row.status().is_completed();
            self.put(row);
            if unlocked {
                opened.push(step_id);
            }
            if completed {
                if unlocked {
                    facts.completed_steps.insert(step_id);
                } else {
                    facts.completed_steps.remove(&step_id);
                }
                pending.extend(version.prerequisite_dependents(step_id));
            }
        }
        opened
    }

    /// Moves completed `candidates` whose requirement no longer holds back to
    /// IN_PROGRESS.
    ///
    /// Only requirements that depend on an unearned badge reopen a step.
    /// Returns each reopened step with the badge it is now missing.
    pub fn reopen_unsatisfied(
        &mut self,
        group_id: Option<GroupId>,
        earned: &HashSet<BadgeClassId>,
        candidates: &[StepId],
    ) -> Result<Vec<(StepId, BadgeClassId)>, ProgressError> {
        let facts = self.facts(group_id, earned);
        let mut reopened = Vec::new();
        for &step_id in candidates {
            if !self.status(step_id, group_id).is_completed() {
                continue;
            }
            let Some(requirement) = self.version.get_step(step_id).and_then(|s| s.requirement()) else {
                continue;
            };
            if evaluate_facts(requirement, &facts) {
                continue;
            }
            let Some(missing) = requirement.badge_dependencies().find(|b| !earned.contains(b)) else {
                continue;
            };

            let mut row = self.row_or_new(step_id, group_id);
            if row.reopen()? {
                self.put(row);
                reopened.push((step_id, missing));
            }
        }
        Ok(reopened)
    }

    pub fn elements(&self, progress: &PathwayProgress) -> Vec<PathwayElementProgress> {
        let rows: Vec<StepProgress> = self.rows.values().cloned().collect();
        derive_elements(progress, self.version, &rows)
    }

    /// Recounts `progress` from `elements` and builds the commit.
    ///
    /// The flag is true when this commit completes the pathway.
    pub fn into_commit(
        self,
        mut progress: PathwayProgress,
        elements: Vec<PathwayElementProgress>,
    ) -> (ProgressCommit, bool) {
        let (done, total) = completion_counts(&elements);
        let completed_now = progress.apply_counts(done, total);
        let Workset { mut rows, dirty, .. } = self;
        let steps = dirty.iter().filter_map(|key| rows.remove(key)).collect();
        let commit = ProgressCommit::new(progress).with_steps(steps).with_elements(elements);
        (commit, completed_now)
    }
}
