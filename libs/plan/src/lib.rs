//! Dependency resolution and execution planning.
//!
//! Given a registry and a target set of cases (selected by group label
//! or explicit name), this library computes a linear execution order
//! covering the targets plus the transitive closure of their
//! predecessors, such that every predecessor precedes every dependent.
//!
//! # Invariants
//!
//! - The plan is a permutation of the transitive closure
//! - Ties are broken by declaration order, so identical inputs always
//!   produce identical plans
//! - A cyclic predecessor graph is a fatal configuration error, detected
//!   before any case executes

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use rigor_registry::{Registry, RegistryError, TestCase};

/// Errors from plan construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The predecessor graph contains a cycle.
    #[error("cyclic dependency: {}", members.join(" -> "))]
    Cycle {
        /// Case names forming the cycle, in traversal order.
        members: Vec<String>,
    },

    /// A target or predecessor reference does not resolve.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// How the target set of a run is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// All cases carrying any of the given group labels.
    Groups(Vec<String>),

    /// Explicitly named cases.
    Names(Vec<String>),
}

impl Selection {
    /// Select by group labels.
    pub fn groups<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Groups(labels.into_iter().map(Into::into).collect())
    }

    /// Select by explicit case names.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Names(names.into_iter().map(Into::into).collect())
    }

    /// Resolve the selection to target case names, in declaration order.
    ///
    /// Group labels matching no case contribute nothing; an unknown
    /// explicit name is an error.
    pub fn targets(&self, registry: &Registry) -> Result<Vec<String>, PlanError> {
        match self {
            Selection::Groups(labels) => Ok(registry
                .cases()
                .filter(|case| labels.iter().any(|label| case.in_group(label)))
                .map(|case| case.name.clone())
                .collect()),
            Selection::Names(names) => {
                let mut targets = Vec::new();
                for name in names {
                    let case = registry.resolve(name)?;
                    if !targets.contains(&case.name) {
                        targets.push(case.name.clone());
                    }
                }
                Ok(targets)
            }
        }
    }
}

/// Ordered sequence of cases satisfying the predecessor partial order.
///
/// Created fresh per run; consumed once by the executor.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    cases: Vec<Arc<TestCase>>,
}

impl ExecutionPlan {
    /// Cases in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TestCase>> {
        self.cases.iter()
    }

    /// Case names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of planned cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if nothing is planned.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Resolve a selection into an execution plan.
pub fn resolve_selection(
    registry: &Registry,
    selection: &Selection,
) -> Result<ExecutionPlan, PlanError> {
    let targets = selection.targets(registry)?;
    resolve(registry, &targets)
}

/// Compute an execution plan for the given target case names.
///
/// The plan contains the targets plus the transitive closure of their
/// predecessors. Depth-first traversal with in-progress marks detects
/// cycles; targets are expanded in declaration order and predecessors
/// in their declared order, so the result is deterministic.
pub fn resolve(registry: &Registry, targets: &[String]) -> Result<ExecutionPlan, PlanError> {
    let mut ordered_targets = Vec::new();
    for name in targets {
        let case = registry.resolve(name)?;
        if !ordered_targets.contains(&case.name) {
            ordered_targets.push(case.name.clone());
        }
    }
    ordered_targets.sort_by_key(|name| registry.declaration_index(name));

    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut path: Vec<String> = Vec::new();
    let mut cases: Vec<Arc<TestCase>> = Vec::new();

    for name in &ordered_targets {
        visit(registry, name, &mut marks, &mut path, &mut cases)?;
    }

    Ok(ExecutionPlan { cases })
}

fn visit(
    registry: &Registry,
    name: &str,
    marks: &mut HashMap<String, Mark>,
    path: &mut Vec<String>,
    cases: &mut Vec<Arc<TestCase>>,
) -> Result<(), PlanError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            let start = path.iter().position(|n| n == name).unwrap_or(0);
            let mut members: Vec<String> = path[start..].to_vec();
            members.push(name.to_string());
            return Err(PlanError::Cycle { members });
        }
        None => {}
    }

    let case = registry.resolve(name)?;
    marks.insert(name.to_string(), Mark::InProgress);
    path.push(name.to_string());

    for dep in &case.depends_on {
        visit(registry, dep, marks, path, cases)?;
    }

    path.pop();
    marks.insert(name.to_string(), Mark::Done);
    cases.push(Arc::clone(case));
    Ok(())
}
