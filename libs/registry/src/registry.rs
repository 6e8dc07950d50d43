//! The suite registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::case::TestCase;
use crate::error::RegistryError;

/// Insertion-ordered collection of declared test cases.
///
/// Populated once at startup and passed by reference to the resolver
/// and executor; there is no ambient global. Declaration order is
/// significant: it breaks ties when the resolver linearizes the
/// dependency graph.
#[derive(Default)]
pub struct Registry {
    cases: Vec<Arc<TestCase>>,
    by_name: HashMap<String, usize>,
    producers: HashMap<String, String>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a case.
    ///
    /// Fails if the name is already taken, if another case already
    /// produces the declared snapshot, or if the declaration is
    /// malformed (empty name, self-dependency).
    pub fn register(&mut self, case: TestCase) -> Result<(), RegistryError> {
        if case.name.is_empty() {
            return Err(RegistryError::InvalidCase("empty case name".to_string()));
        }
        if case.depends_on.iter().any(|dep| *dep == case.name) {
            return Err(RegistryError::InvalidCase(format!(
                "case {:?} depends on itself",
                case.name
            )));
        }
        if self.by_name.contains_key(&case.name) {
            return Err(RegistryError::DuplicateCase(case.name.clone()));
        }
        if let Some(snapshot) = &case.produces_snapshot {
            if let Some(producer) = self.producers.get(snapshot) {
                return Err(RegistryError::DuplicateSnapshot {
                    snapshot: snapshot.clone(),
                    producer: producer.clone(),
                });
            }
            self.producers.insert(snapshot.clone(), case.name.clone());
        }

        self.by_name.insert(case.name.clone(), self.cases.len());
        self.cases.push(Arc::new(case));
        Ok(())
    }

    /// Look up a case by name.
    pub fn resolve(&self, name: &str) -> Result<&Arc<TestCase>, RegistryError> {
        self.by_name
            .get(name)
            .map(|&idx| &self.cases[idx])
            .ok_or_else(|| RegistryError::UnknownCase(name.to_string()))
    }

    /// All cases carrying the given group label, in declaration order.
    ///
    /// An empty result is valid, not an error.
    pub fn find_by_group(&self, label: &str) -> Vec<&Arc<TestCase>> {
        self.cases.iter().filter(|c| c.in_group(label)).collect()
    }

    /// Position of a case in declaration order.
    pub fn declaration_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// All cases in declaration order.
    pub fn cases(&self) -> impl Iterator<Item = &Arc<TestCase>> {
        self.cases.iter()
    }

    /// Number of registered cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if no cases are registered.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
