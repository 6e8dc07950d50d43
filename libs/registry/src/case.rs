//! Test case declarations and the body capability.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use rigor_snapshot::EnvState;

use crate::error::CaseError;

/// Execution context handed to a case body.
///
/// Carries the environment state the case starts from (restored from a
/// snapshot when the case declares one, empty otherwise). The body
/// mutates it to reflect what it did; the executor captures the final
/// state when the case produces a snapshot.
#[derive(Debug)]
pub struct CaseContext {
    /// Name of the case being executed.
    pub case: String,

    /// Current environment state.
    pub env: EnvState,
}

impl CaseContext {
    /// Create a context for a case with the given starting state.
    pub fn new(case: impl Into<String>, env: EnvState) -> Self {
        Self {
            case: case.into(),
            env,
        }
    }
}

/// The body capability of a test case.
///
/// Bodies drive external collaborators (control-plane client, node
/// fleet) and check postconditions. Any waiting on asynchronous
/// deployment tasks happens inside the body; the scheduler only
/// observes the eventual outcome.
#[async_trait]
pub trait CaseBody: Send + Sync {
    /// Run the case against the given context.
    async fn run(&self, ctx: &mut CaseContext) -> Result<(), CaseError>;
}

/// Body that does nothing and passes.
///
/// Default for cases declared purely for their ordering effect.
pub struct NoopBody;

#[async_trait]
impl CaseBody for NoopBody {
    async fn run(&self, _ctx: &mut CaseContext) -> Result<(), CaseError> {
        Ok(())
    }
}

/// A declared test case.
///
/// Identity is the unique name. Group labels select subsets of the
/// suite; predecessors induce the execution partial order; the optional
/// snapshot names tie the case into the memoization scheme.
#[derive(Clone)]
pub struct TestCase {
    /// Unique case name.
    pub name: String,

    /// Group labels this case belongs to.
    pub groups: BTreeSet<String>,

    /// Names of cases that must reach a healthy terminal state first,
    /// in declaration order.
    pub depends_on: Vec<String>,

    /// Snapshot this case captures on success, if any.
    pub produces_snapshot: Option<String>,

    /// Snapshot this case restores before running, if any.
    pub restores_snapshot: Option<String>,

    /// Disabled cases are planned for ordering but never executed.
    pub enabled: bool,

    /// The case body.
    pub body: Arc<dyn CaseBody>,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .field("depends_on", &self.depends_on)
            .field("produces_snapshot", &self.produces_snapshot)
            .field("restores_snapshot", &self.restores_snapshot)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl TestCase {
    /// Start building a case with the given name.
    pub fn builder(name: impl Into<String>) -> TestCaseBuilder {
        TestCaseBuilder::new(name)
    }

    /// Returns true if the case carries the given group label.
    pub fn in_group(&self, label: &str) -> bool {
        self.groups.contains(label)
    }
}

/// Builder for [`TestCase`].
///
/// Replaces the decorator-style declarations of older suites with
/// explicit fields.
pub struct TestCaseBuilder {
    name: String,
    groups: BTreeSet<String>,
    depends_on: Vec<String>,
    produces_snapshot: Option<String>,
    restores_snapshot: Option<String>,
    enabled: bool,
    body: Option<Arc<dyn CaseBody>>,
}

impl TestCaseBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: BTreeSet::new(),
            depends_on: Vec::new(),
            produces_snapshot: None,
            restores_snapshot: None,
            enabled: true,
            body: None,
        }
    }

    /// Add a group label.
    pub fn group(mut self, label: impl Into<String>) -> Self {
        self.groups.insert(label.into());
        self
    }

    /// Add a predecessor case by name.
    pub fn depends_on(mut self, case: impl Into<String>) -> Self {
        self.depends_on.push(case.into());
        self
    }

    /// Declare the snapshot this case captures on success.
    pub fn produces_snapshot(mut self, name: impl Into<String>) -> Self {
        self.produces_snapshot = Some(name.into());
        self
    }

    /// Declare the snapshot this case restores before running.
    pub fn restores_snapshot(mut self, name: impl Into<String>) -> Self {
        self.restores_snapshot = Some(name.into());
        self
    }

    /// Mark the case as disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set the case body.
    pub fn body(mut self, body: Arc<dyn CaseBody>) -> Self {
        self.body = Some(body);
        self
    }

    /// Finish the declaration.
    pub fn build(self) -> TestCase {
        TestCase {
            name: self.name,
            groups: self.groups,
            depends_on: self.depends_on,
            produces_snapshot: self.produces_snapshot,
            restores_snapshot: self.restores_snapshot,
            enabled: self.enabled,
            body: self.body.unwrap_or_else(|| Arc::new(NoopBody)),
        }
    }
}
