//! PathwayElementProgress - derived per-step view of one enrollment.
//!
//! Always rebuilt from step progress rows plus the pinned version; the stored
//! copy is a cache for reads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PathwayId, PathwayVersionId, StepId, UserId};
use crate::domain::pathway::PathwayVersion;

use super::{PathwayProgress, StepProgress, StepStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayElementProgress {
    pub user_id: UserId,
    pub pathway_id: PathwayId,
    pub version_id: PathwayVersionId,
    pub step_id: StepId,
    pub parent_id: Option<StepId>,
    pub order_index: u32,
    pub depth: usize,
    /// Most advanced status across the user's contexts.
    pub status: StepStatus,
    /// Unlocked in at least one context.
    pub unlocked: bool,
    pub is_leaf: bool,
    pub is_milestone: bool,
}

impl PathwayElementProgress {
    /// Leaf, non-milestone steps are the ones the percentage counts.
    pub fn counts_toward_completion(&self) -> bool {
        self.is_leaf && !self.is_milestone
    }
}

/// Derives the element view in tree pre-order (parents before children,
/// siblings by order index).
///
/// `rows` may hold rows of any context; rows for other versions are ignored.
pub fn derive_elements(
    progress: &PathwayProgress,
    version: &PathwayVersion,
    rows: &[StepProgress],
) -> Vec<PathwayElementProgress> {
    let mut folded: HashMap<StepId, (StepStatus, bool)> = HashMap::new();
    for row in rows.iter().filter(|r| r.key().version_id == version.id()) {
        let entry = folded.entry(row.step_id()).or_insert((StepStatus::NotStarted, false));
        entry.0 = entry.0.max(row.status());
        entry.1 |= row.is_unlocked();
    }

    let mut elements = Vec::with_capacity(version.step_count());
    let mut stack: Vec<(StepId, usize)> = version.roots().iter().rev().map(|s| (s.id(), 0)).collect();
    while let Some((step_id, depth)) = stack.pop() {
        let Some(step) = version.get_step(step_id) else {
            continue;
        };
        let children = version.children(Some(step_id));
        let (status, unlocked) = folded.get(&step_id).copied().unwrap_or_default();
        elements.push(PathwayElementProgress {
            user_id: progress.user_id().clone(),
            pathway_id: progress.pathway_id(),
            version_id: version.id(),
            step_id,
            parent_id: step.parent_id(),
            order_index: step.order_index(),
            depth,
            status,
            unlocked,
            is_leaf: children.is_empty(),
            is_milestone: step.is_milestone(),
        });
        stack.extend(children.iter().rev().map(|c| (c.id(), depth + 1)));
    }
    elements
}

/// (completed, total) over countable elements.
pub fn completion_counts(elements: &[PathwayElementProgress]) -> (usize, usize) {
    elements
        .iter()
        .filter(|e| e.counts_toward_completion())
        .fold((0, 0), |(done, total), e| {
            (done + usize::from(e.status.is_completed()), total + 1)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::GroupId;
    use crate::domain::pathway::NewStep;
    use crate::domain::progress::StepProgressKey;

    struct Fixture {
        version: PathwayVersion,
        progress: PathwayProgress,
        a: StepId,
        a1: StepId,
        a2: StepId,
        gate: StepId,
    }

    fn fixture() -> Fixture {
        let mut version = PathwayVersion::new_draft(PathwayId::new(), 1);
        let a = version.add_step(NewStep::new("A")).unwrap();
        let a1 = version.add_step(NewStep::new("A1").under(a)).unwrap();
        let a2 = version.add_step(NewStep::new("A2").under(a)).unwrap();
        let gate = version.add_step(NewStep::new("Gate").milestone()).unwrap();
        let progress = PathwayProgress::enroll(
            UserId::new("learner").unwrap(),
            version.pathway_id(),
            version.id(),
            1,
            2,
        );
        Fixture {
            version,
            progress,
            a,
            a1,
            a2,
            gate,
        }
    }

    fn row(f: &Fixture, step: StepId, group: Option<GroupId>, status: StepStatus) -> StepProgress {
        let key = StepProgressKey::new(f.version.id(), step, f.progress.user_id().clone(), group);
        let mut row = StepProgress::new(key, true);
        match status {
            StepStatus::NotStarted => {}
            StepStatus::InProgress => {
                row.start().unwrap();
            }
            StepStatus::Completed => {
                row.complete().unwrap();
            }
        }
        row
    }

    #[test]
    fn elements_follow_tree_pre_order() {
        let f = fixture();
        let elements = derive_elements(&f.progress, &f.version, &[]);

        let order: Vec<StepId> = elements.iter().map(|e| e.step_id).collect();
        assert_eq!(order, vec![f.a, f.a1, f.a2, f.gate]);
        assert_eq!(elements[1].depth, 1);
        assert!(!elements[0].is_leaf);
        assert!(elements.iter().all(|e| !e.unlocked && e.status == StepStatus::NotStarted));
    }

    #[test]
    fn status_folds_across_contexts() {
        let f = fixture();
        let rows = vec![
            row(&f, f.a1, None, StepStatus::InProgress),
            row(&f, f.a1, Some(GroupId::new()), StepStatus::Completed),
        ];
        let elements = derive_elements(&f.progress, &f.version, &rows);

        let a1 = elements.iter().find(|e| e.step_id == f.a1).unwrap();
        assert_eq!(a1.status, StepStatus::Completed);
        assert!(a1.unlocked);
    }

    #[test]
    fn completion_counts_skip_parents_and_milestones() {
        let f = fixture();
        let rows = vec![
            row(&f, f.a, None, StepStatus::Completed),
            row(&f, f.a1, None, StepStatus::Completed),
            row(&f, f.gate, None, StepStatus::Completed),
        ];
        let elements = derive_elements(&f.progress, &f.version, &rows);

        assert_eq!(completion_counts(&elements), (1, 2));
    }
}
