//! # rigor-runner
//!
//! Sequential suite execution with snapshot memoization.
//!
//! The runner ties the pieces together:
//!
//! - Resolve a [`Selection`](rigor_plan::Selection) against the registry
//!   into an execution plan (fatal configuration errors - unknown cases,
//!   cycles - abort here, before anything runs)
//! - Walk the plan strictly in order, one case at a time
//! - Skip snapshot-producing cases whose snapshot already exists
//! - Block dependents of failed cases instead of running them
//! - Capture diagnostics on failure and report every case's terminal
//!   state
//!
//! ## Running a suite
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rigor_plan::Selection;
//! use rigor_registry::Registry;
//! use rigor_runner::Suite;
//! use rigor_snapshot::MemoryStore;
//!
//! # async fn demo(registry: Registry) -> anyhow::Result<()> {
//! let suite = Suite::new(registry, Arc::new(MemoryStore::new()));
//! let report = suite.run(&Selection::groups(["smoke"])).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod config;
mod diagnostics;
mod executor;
mod memo;
mod report;

pub use config::Config;
pub use diagnostics::{
    CapturedDiagnostic, DiagnosticError, DiagnosticRef, DiagnosticSink, FailureInfo, LogSink,
    MemorySink,
};
pub use executor::Executor;
pub use memo::Memoizer;
pub use report::{Outcome, ReportEntry, RunId, RunReport};

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use rigor_plan::{resolve_selection, PlanError, Selection};
use rigor_registry::Registry;
use rigor_snapshot::SnapshotStore;

/// Errors that abort a suite run before any case executes.
#[derive(Debug, Error)]
pub enum SuiteError {
    /// The declared suite is not runnable (unknown case, cycle).
    #[error("configuration error: {0}")]
    Config(#[from] PlanError),
}

/// A declared suite wired to its store, sink, and configuration.
pub struct Suite {
    registry: Registry,
    store: Arc<dyn SnapshotStore>,
    sink: Arc<dyn DiagnosticSink>,
    config: Config,
}

impl Suite {
    /// Create a suite with the default log sink and configuration.
    pub fn new(registry: Registry, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            registry,
            store,
            sink: Arc::new(LogSink),
            config: Config::default(),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// The declared cases.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve the selection and run the resulting plan to completion.
    ///
    /// Configuration errors abort before any case executes. Case
    /// failures do not: they are recorded in the report and block only
    /// their own dependents.
    pub async fn run(&self, selection: &Selection) -> Result<RunReport, SuiteError> {
        let plan = resolve_selection(&self.registry, selection)?;
        info!(cases = plan.len(), "Execution plan resolved");

        let executor = Executor::with_config(
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
            self.config.clone(),
        );
        Ok(executor.run(&plan).await)
    }
}
