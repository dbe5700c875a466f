//! Rule evaluation - pure functions over satisfied facts.
//!
//! Nothing here performs I/O. Callers gather the completed step IDs for the
//! relevant (user, group) context and the badges the user has earned, then
//! ask whether a step is unlocked or completable.

use std::collections::HashSet;

use crate::domain::foundation::{BadgeClassId, StepId};

use super::{Combinator, DependencyRef, Rule};

/// The facts a rule is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SatisfiedFacts {
    pub completed_steps: HashSet<StepId>,
    pub earned_badges: HashSet<BadgeClassId>,
}

impl SatisfiedFacts {
    pub fn new(completed_steps: HashSet<StepId>, earned_badges: HashSet<BadgeClassId>) -> Self {
        Self {
            completed_steps,
            earned_badges,
        }
    }

    /// Returns true if a single dependency holds.
    pub fn satisfies(&self, dependency: &DependencyRef) -> bool {
        match dependency {
            DependencyRef::Step(id) => self.completed_steps.contains(id),
            DependencyRef::Badge(id) => self.earned_badges.contains(id),
        }
    }
}

/// Evaluates a rule: ALL needs every dependency, ANY needs one.
pub fn evaluate(
    rule: &Rule,
    satisfied_steps: &HashSet<StepId>,
    satisfied_badges: &HashSet<BadgeClassId>,
) -> bool {
    let holds = |d: &DependencyRef| match d {
        DependencyRef::Step(id) => satisfied_steps.contains(id),
        DependencyRef::Badge(id) => satisfied_badges.contains(id),
    };
    match rule.combinator() {
        Combinator::All => rule.dependencies().all(holds),
        Combinator::Any => rule.dependencies().any(holds),
    }
}

/// Evaluates a rule against a fact set.
pub fn evaluate_facts(rule: &Rule, facts: &SatisfiedFacts) -> bool {
    evaluate(rule, &facts.completed_steps, &facts.earned_badges)
}

/// Dependencies that keep the rule from holding.
///
/// Empty when the rule holds. For ALL that is every unsatisfied dependency;
/// for ANY with nothing satisfied it is the whole set.
pub fn unsatisfied(rule: &Rule, facts: &SatisfiedFacts) -> Vec<DependencyRef> {
    if evaluate_facts(rule, facts) {
        return Vec::new();
    }
    rule.dependencies()
        .filter(|d| !facts.satisfies(d))
        .copied()
        .collect()
}

/// A step with no prerequisite is unlocked by definition.
pub fn is_unlocked(prerequisite: Option<&Rule>, facts: &SatisfiedFacts) -> bool {
    prerequisite.map_or(true, |rule| evaluate_facts(rule, facts))
}

/// Completion gate.
///
/// The step must be unlocked. With a requirement rule the rule must hold;
/// without one, the explicit completion signal is what completes it.
pub fn can_complete(
    prerequisite: Option<&Rule>,
    requirement: Option<&Rule>,
    facts: &SatisfiedFacts,
    explicit_signal: bool,
) -> bool {
    if !is_unlocked(prerequisite, facts) {
        return false;
    }
    match requirement {
        Some(rule) => evaluate_facts(rule, facts),
        None => explicit_signal,
    }
}
