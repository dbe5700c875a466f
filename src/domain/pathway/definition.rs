//! Declarative pathway definitions.
//!
//! A definition describes a whole step tree in YAML, with steps addressed by
//! a local `key` instead of an ID. Building one into a draft goes through the
//! same `PathwayVersion` mutators as interactive authoring, so every
//! structural rule applies.
//!
//! ```yaml
//! name: Data Literacy
//! steps:
//!   - key: basics
//!     title: Spreadsheet basics
//!     children:
//!       - key: formulas
//!         title: Formulas
//!   - key: capstone
//!     title: Capstone project
//!     prerequisite:
//!       combinator: all
//!       steps: [basics]
//!     requirement:
//!       badges: ["5d0c5a0e-3f64-4f39-9d5a-63e7b0d3c0aa"]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{BadgeClassId, StepId};
use crate::domain::rule::{Combinator, DependencyRef, Rule, RuleKind};

use super::{NewStep, PathwayError, PathwayVersion};

/// Root of a definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayDefinition {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub milestone: bool,
    #[serde(default)]
    pub prerequisite: Option<RuleDefinition>,
    #[serde(default)]
    pub requirement: Option<RuleDefinition>,
    #[serde(default)]
    pub children: Vec<StepDefinition>,
}

/// Rule written against step keys and badge class IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub badges: Vec<BadgeClassId>,
}

impl PathwayDefinition {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PathwayError> {
        serde_yaml::from_str(yaml).map_err(|e| PathwayError::validation("definition", e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, PathwayError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PathwayError::infrastructure(format!("reading {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&contents)
    }

    /// Adds every step to `draft`, then attaches the rules.
    ///
    /// Returns the key → step ID mapping.
    pub fn build_into(&self, draft: &mut PathwayVersion) -> Result<HashMap<String, StepId>, PathwayError> {
        let mut keys = HashMap::new();
        add_steps(draft, None, &self.steps, &mut keys)?;

        let mut pending = Vec::new();
        collect_rules(&self.steps, &mut pending);
        for (key, kind, rule_def) in pending {
            let step_id = keys
                .get(key)
                .copied()
                .ok_or_else(|| PathwayError::validation("key", format!("unknown step key '{}'", key)))?;
            let rule = resolve_rule(step_id, kind, rule_def, &keys)?;
            draft.set_rule(step_id, kind, Some(rule))?;
        }
        Ok(keys)
    }
}

fn add_steps(
    draft: &mut PathwayVersion,
    parent: Option<StepId>,
    defs: &[StepDefinition],
    keys: &mut HashMap<String, StepId>,
) -> Result<(), PathwayError> {
    for def in defs {
        let key = def.key.trim();
        if key.is_empty() {
            return Err(PathwayError::validation("key", "step keys must not be empty"));
        }
        if keys.contains_key(key) {
            return Err(PathwayError::validation("key", format!("duplicate step key '{}'", key)));
        }

        let mut new = NewStep::new(def.title.clone());
        new.parent_id = parent;
        new.milestone = def.milestone;
        new.description = def.description.clone();
        let step_id = draft.add_step(new)?;
        keys.insert(key.to_string(), step_id);

        add_steps(draft, Some(step_id), &def.children, keys)?;
    }
    Ok(())
}

fn collect_rules<'a>(defs: &'a [StepDefinition], out: &mut Vec<(&'a str, RuleKind, &'a RuleDefinition)>) {
    for def in defs {
        if let Some(rule) = &def.prerequisite {
            out.push((def.key.trim(), RuleKind::Prerequisite, rule));
        }
        if let Some(rule) = &def.requirement {
            out.push((def.key.trim(), RuleKind::Requirement, rule));
        }
        collect_rules(&def.children, out);
    }
}

fn resolve_rule(
    step_id: StepId,
    kind: RuleKind,
    def: &RuleDefinition,
    keys: &HashMap<String, StepId>,
) -> Result<Rule, PathwayError> {
    let invalid = |reason: String| PathwayError::InvalidRule {
        step_id,
        kind: kind.to_string(),
        reason,
    };

    let mut dependencies = Vec::with_capacity(def.steps.len() + def.badges.len());
    for key in &def.steps {
        let dep = keys
            .get(key.trim())
            .ok_or_else(|| invalid(format!("unknown step key '{}'", key)))?;
        dependencies.push(DependencyRef::Step(*dep));
    }
    dependencies.extend(def.badges.iter().copied().map(DependencyRef::Badge));

    Rule::new(def.combinator, dependencies).map_err(|e| invalid(e.to_string()))
}
