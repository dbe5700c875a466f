//! Rule value object - a gating condition over steps and badges.
//!
//! The same shape serves both roles a step can carry: a prerequisite rule
//! (what must hold to unlock the step) and a requirement rule (what must hold
//! to complete it).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{BadgeClassId, StepId};

/// How a rule folds its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Every dependency must be satisfied.
    #[default]
    All,
    /// At least one dependency must be satisfied.
    Any,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::All => write!(f, "ALL"),
            Combinator::Any => write!(f, "ANY"),
        }
    }
}

/// A single fact a rule depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DependencyRef {
    /// Another step of the same version must be completed.
    Step(StepId),
    /// The user must hold a badge of this class.
    Badge(BadgeClassId),
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyRef::Step(id) => write!(f, "step:{}", id),
            DependencyRef::Badge(id) => write!(f, "badge:{}", id),
        }
    }
}

/// Which gate a rule is attached as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Prerequisite,
    Requirement,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Prerequisite => write!(f, "prerequisite"),
            RuleKind::Requirement => write!(f, "requirement"),
        }
    }
}

/// Errors raised while constructing a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("a rule must depend on at least one step or badge")]
    NoDependencies,
}

/// Immutable gating condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    combinator: Combinator,
    dependencies: BTreeSet<DependencyRef>,
}

impl Rule {
    /// Creates a rule, rejecting an empty dependency set.
    pub fn new(
        combinator: Combinator,
        dependencies: impl IntoIterator<Item = DependencyRef>,
    ) -> Result<Self, RuleError> {
        let dependencies: BTreeSet<_> = dependencies.into_iter().collect();
        if dependencies.is_empty() {
            return Err(RuleError::NoDependencies);
        }
        Ok(Self {
            combinator,
            dependencies,
        })
    }

    /// Shorthand for an ALL rule.
    pub fn all(dependencies: impl IntoIterator<Item = DependencyRef>) -> Result<Self, RuleError> {
        Self::new(Combinator::All, dependencies)
    }

    /// Shorthand for an ANY rule.
    pub fn any(dependencies: impl IntoIterator<Item = DependencyRef>) -> Result<Self, RuleError> {
        Self::new(Combinator::Any, dependencies)
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &DependencyRef> {
        self.dependencies.iter()
    }

    /// Step IDs this rule depends on.
    pub fn step_dependencies(&self) -> impl Iterator<Item = StepId> + '_ {
        self.dependencies.iter().filter_map(|d| match d {
            DependencyRef::Step(id) => Some(*id),
            DependencyRef::Badge(_) => None,
        })
    }

    /// Badge class IDs this rule depends on.
    pub fn badge_dependencies(&self) -> impl Iterator<Item = BadgeClassId> + '_ {
        self.dependencies.iter().filter_map(|d| match d {
            DependencyRef::Badge(id) => Some(*id),
            DependencyRef::Step(_) => None,
        })
    }

    pub fn references_step(&self, step_id: StepId) -> bool {
        self.dependencies.contains(&DependencyRef::Step(step_id))
    }

    pub fn references_badge(&self, badge_id: BadgeClassId) -> bool {
        self.dependencies.contains(&DependencyRef::Badge(badge_id))
    }

    /// Rewrites step references through `mapping`.
    ///
    /// Used when a version is cloned into a draft with fresh step IDs.
    /// References missing from the mapping are kept as-is.
    pub fn remap_steps(&self, mapping: &HashMap<StepId, StepId>) -> Rule {
        let dependencies = self
            .dependencies
            .iter()
            .map(|d| match d {
                DependencyRef::Step(id) => {
                    DependencyRef::Step(mapping.get(id).copied().unwrap_or(*id))
                }
                other => *other,
            })
            .collect();
        Rule {
            combinator: self.combinator,
            dependencies,
        }
    }

    /// Drops references to `removed` steps.
    ///
    /// Returns `None` when nothing is left to gate on.
    pub fn without_steps(&self, removed: &HashSet<StepId>) -> Option<Rule> {
        let dependencies: BTreeSet<_> = self
            .dependencies
            .iter()
            .filter(|d| !matches!(d, DependencyRef::Step(id) if removed.contains(id)))
            .copied()
            .collect();
        if dependencies.is_empty() {
            None
        } else {
            Some(Rule {
                combinator: self.combinator,
                dependencies,
            })
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deps: Vec<String> = self.dependencies.iter().map(|d| d.to_string()).collect();
        write!(f, "{} {{{}}}", self.combinator, deps.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rule_is_rejected() {
        let result = Rule::all(Vec::new());
        assert_eq!(result, Err(RuleError::NoDependencies));
    }

    #[test]
    fn duplicate_dependencies_collapse() {
        let step = StepId::new();
        let rule = Rule::all([DependencyRef::Step(step), DependencyRef::Step(step)]).unwrap();
        assert_eq!(rule.dependencies().count(), 1);
    }

    #[test]
    fn splits_step_and_badge_dependencies() {
        let step = StepId::new();
        let badge = BadgeClassId::new();
        let rule = Rule::any([DependencyRef::Step(step), DependencyRef::Badge(badge)]).unwrap();

        assert_eq!(rule.step_dependencies().collect::<Vec<_>>(), vec![step]);
        assert_eq!(rule.badge_dependencies().collect::<Vec<_>>(), vec![badge]);
        assert!(rule.references_step(step));
        assert!(rule.references_badge(badge));
        assert_eq!(rule.combinator(), Combinator::Any);
    }

    #[test]
    fn remap_steps_rewrites_step_references_only() {
        let old = StepId::new();
        let new = StepId::new();
        let badge = BadgeClassId::new();
        let rule = Rule::all([DependencyRef::Step(old), DependencyRef::Badge(badge)]).unwrap();

        let mapping = HashMap::from([(old, new)]);
        let remapped = rule.remap_steps(&mapping);

        assert!(remapped.references_step(new));
        assert!(!remapped.references_step(old));
        assert!(remapped.references_badge(badge));
    }

    #[test]
    fn without_steps_drops_removed_references() {
        let keep = StepId::new();
        let drop = StepId::new();
        let rule = Rule::any([DependencyRef::Step(keep), DependencyRef::Step(drop)]).unwrap();

        let pruned = rule.without_steps(&HashSet::from([drop])).unwrap();
        assert!(pruned.references_step(keep));
        assert!(!pruned.references_step(drop));
    }

    #[test]
    fn without_steps_returns_none_when_emptied() {
        let only = StepId::new();
        let rule = Rule::all([DependencyRef::Step(only)]).unwrap();
        assert!(rule.without_steps(&HashSet::from([only])).is_none());
    }

    #[test]
    fn dependency_ref_serializes_tagged() {
        let badge = BadgeClassId::new();
        let json = serde_json::to_value(DependencyRef::Badge(badge)).unwrap();
        assert_eq!(json["kind"], "badge");
        assert_eq!(json["id"], badge.to_string());
    }
}
