//! Rule module - gating conditions and their evaluation.
//!
//! - `rule` - the immutable `Rule` value (ALL/ANY over step and badge facts)
//! - `evaluator` - pure unlock/completion checks

mod evaluator;
mod rule;

pub use evaluator::{can_complete, evaluate, evaluate_facts, is_unlocked, unsatisfied, SatisfiedFacts};
pub use rule::{Combinator, DependencyRef, Rule, RuleError, RuleKind};
