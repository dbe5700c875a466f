//! Graph algorithms over a version's step arena.
//!
//! Two graphs live in one arena: the parent/child tree and the prerequisite
//! dependency graph (edges from a dependency to the step it gates). Both must
//! stay acyclic.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::domain::foundation::StepId;

use super::StepVersion;

/// Steps whose prerequisite rule references each step.
pub fn prerequisite_dependents(steps: &BTreeMap<StepId, StepVersion>) -> HashMap<StepId, Vec<StepId>> {
    let mut dependents: HashMap<StepId, Vec<StepId>> = HashMap::new();
    for step in steps.values() {
        if let Some(rule) = step.prerequisite() {
            for dep in rule.step_dependencies() {
                dependents.entry(dep).or_default().push(step.id());
            }
        }
    }
    dependents
}

/// Orders steps so every prerequisite comes before the steps it gates.
///
/// Kahn's algorithm over step edges only; badge dependencies are leaves.
/// On failure returns one concrete cycle.
pub fn prerequisite_order(steps: &BTreeMap<StepId, StepVersion>) -> Result<Vec<StepId>, Vec<StepId>> {
    let dependents = prerequisite_dependents(steps);
    let mut in_degree: BTreeMap<StepId, usize> = steps
        .values()
        .map(|s| {
            let degree = s
                .prerequisite()
                .map(|r| r.step_dependencies().filter(|d| steps.contains_key(d)).count())
                .unwrap_or(0);
            (s.id(), degree)
        })
        .collect();

    let mut ready: VecDeque<StepId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(steps.len());

    while let Some(id) = ready.pop_front() {
        order.push(id);
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*dependent);
                }
            }
        }
    }

    if order.len() == steps.len() {
        return Ok(order);
    }

    let sorted: HashSet<StepId> = order.into_iter().collect();
    let remaining: BTreeSet<StepId> = steps.keys().filter(|id| !sorted.contains(id)).copied().collect();
    Err(extract_cycle(steps, &remaining))
}

/// Walks dependency edges inside `remaining` until a node repeats.
///
/// Every node left over by Kahn's algorithm has an unsorted dependency, so
/// the walk always closes.
fn extract_cycle(steps: &BTreeMap<StepId, StepVersion>, remaining: &BTreeSet<StepId>) -> Vec<StepId> {
    let Some(start) = remaining.iter().next().copied() else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut position: HashMap<StepId, usize> = HashMap::from([(start, 0)]);
    let mut current = start;

    loop {
        let next = steps
            .get(&current)
            .and_then(|s| s.prerequisite())
            .and_then(|r| r.step_dependencies().find(|d| remaining.contains(d)));
        let Some(next) = next else {
            return path;
        };
        if let Some(&at) = position.get(&next) {
            return path.split_off(at);
        }
        position.insert(next, path.len());
        path.push(next);
        current = next;
    }
}

/// Checks the parent links: every parent exists and no chain loops.
///
/// Returns a human-readable reason on failure.
pub fn check_parent_links(steps: &BTreeMap<StepId, StepVersion>) -> Result<(), String> {
    for step in steps.values() {
        let mut seen = HashSet::from([step.id()]);
        let mut cursor = step.parent_id();
        while let Some(parent) = cursor {
            let Some(parent_step) = steps.get(&parent) else {
                return Err(format!("step {} has unknown parent {}", step.id(), parent));
            };
            if !seen.insert(parent) {
                return Err(format!("step {} is part of a parent cycle", step.id()));
            }
            cursor = parent_step.parent_id();
        }
    }
    Ok(())
}

/// All descendants of `root` (excluding itself).
pub fn descendants(steps: &BTreeMap<StepId, StepVersion>, root: StepId) -> HashSet<StepId> {
    let mut children: HashMap<StepId, Vec<StepId>> = HashMap::new();
    for step in steps.values() {
        if let Some(parent) = step.parent_id() {
            children.entry(parent).or_default().push(step.id());
        }
    }

    let mut found = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        for child in children.get(&id).into_iter().flatten() {
            if found.insert(*child) {
                stack.push(*child);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PathwayVersionId;
    use crate::domain::rule::{DependencyRef, Rule, RuleKind};

    fn arena(specs: &[(&str, Option<usize>, &[usize])]) -> (Vec<StepId>, BTreeMap<StepId, StepVersion>) {
        let version = PathwayVersionId::new();
        let mut steps: Vec<StepVersion> = specs
            .iter()
            .enumerate()
            .map(|(i, (title, _, _))| StepVersion::new(version, title.to_string(), None, i as u32))
            .collect();
        let ids: Vec<StepId> = steps.iter().map(|s| s.id()).collect();
        for (i, (_, parent, deps)) in specs.iter().enumerate() {
            steps[i].set_parent(parent.map(|p| ids[p]));
            if !deps.is_empty() {
                let rule = Rule::all(deps.iter().map(|d| DependencyRef::Step(ids[*d]))).unwrap();
                steps[i].set_rule(RuleKind::Prerequisite, Some(rule));
            }
        }
        let map = steps.into_iter().map(|s| (s.id(), s)).collect();
        (ids, map)
    }

    #[test]
    fn topological_order_respects_prerequisites() {
        let (ids, steps) = arena(&[("a", None, &[]), ("b", None, &[0]), ("c", None, &[0, 1])]);
        let order = prerequisite_order(&steps).unwrap();

        let pos = |id: StepId| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(ids[0]) < pos(ids[1]));
        assert!(pos(ids[1]) < pos(ids[2]));
    }

    #[test]
    fn cycle_is_reported() {
        let (ids, steps) = arena(&[("a", None, &[2]), ("b", None, &[0]), ("c", None, &[1]), ("d", None, &[])]);
        let cycle = prerequisite_order(&steps).unwrap_err();

        assert_eq!(cycle.len(), 3);
        assert!(!cycle.contains(&ids[3]));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let (ids, steps) = arena(&[("a", None, &[0])]);
        assert_eq!(prerequisite_order(&steps).unwrap_err(), vec![ids[0]]);
    }

    #[test]
    fn parent_links_detect_loops() {
        let (_, mut steps) = arena(&[("a", None, &[]), ("b", Some(0), &[])]);
        let ids: Vec<StepId> = steps.keys().copied().collect();
        let b_id = steps.values().find(|s| s.title() == "b").unwrap().id();
        let a_id = *ids.iter().find(|id| **id != b_id).unwrap();
        steps.get_mut(&a_id).unwrap().set_parent(Some(b_id));

        assert!(check_parent_links(&steps).is_err());
    }

    #[test]
    fn descendants_are_transitive() {
        let (ids, steps) = arena(&[("root", None, &[]), ("child", Some(0), &[]), ("grandchild", Some(1), &[])]);
        let found = descendants(&steps, ids[0]);

        assert_eq!(found, HashSet::from([ids[1], ids[2]]));
        assert!(descendants(&steps, ids[2]).is_empty());
    }
}
