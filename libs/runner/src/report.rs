//! Per-run execution report.
//!
//! Every planned case appears exactly once with its terminal state and,
//! for failures, the cause and the captured diagnostic reference.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::diagnostics::DiagnosticRef;

/// Stable run identifier in the `run_{ulid}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run identifier.
    pub fn new() -> Self {
        Self(format!("run_{}", Ulid::new()))
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal state of a planned case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    /// The body ran and all postconditions held.
    Passed,

    /// The body failed, a precondition restore failed, or the produced
    /// snapshot could not be saved.
    Failed {
        /// Human-readable cause.
        cause: String,
    },

    /// A predecessor did not reach a healthy terminal state; the case
    /// was never attempted.
    Blocked {
        /// The predecessor that kept this case from running.
        on: String,
    },

    /// The produced snapshot already existed; postconditions are
    /// satisfied without re-running.
    SkippedMemoized,

    /// The case is disabled; planned for ordering only.
    SkippedDisabled,
}

impl Outcome {
    /// Returns true if dependents of this case may run.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(
            self,
            Outcome::Passed | Outcome::SkippedMemoized | Outcome::SkippedDisabled
        )
    }

    /// Returns true for the states an operator treats as failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. } | Outcome::Blocked { .. })
    }

    /// Short state label for report lines.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed { .. } => "failed",
            Outcome::Blocked { .. } => "blocked",
            Outcome::SkippedMemoized => "skipped-memoized",
            Outcome::SkippedDisabled => "skipped-disabled",
        }
    }
}

/// One report line: a case and how it ended.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Case name.
    pub case: String,

    /// Terminal state.
    pub outcome: Outcome,

    /// Reference to captured diagnostics, for failed cases with a
    /// successful capture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<DiagnosticRef>,

    /// Wall-clock duration of the case, including restore and save.
    pub duration_ms: u64,
}

/// Report for a single suite run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    pub finished_at: DateTime<Utc>,

    /// One entry per planned case, in execution order.
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    /// Terminal state of a case, if it was planned.
    pub fn outcome_of(&self, case: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|e| e.case == case)
            .map(|e| &e.outcome)
    }

    /// Number of passed cases.
    pub fn passed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == Outcome::Passed)
            .count()
    }

    /// Number of failed or blocked cases.
    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_failure()).count()
    }

    /// Returns true if no case failed or was blocked.
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "run {} - {} cases, {} passed, {} failed",
            self.run_id,
            self.entries.len(),
            self.passed_count(),
            self.failure_count()
        )?;
        for entry in &self.entries {
            write!(
                f,
                "{:<17} {} ({}ms)",
                entry.outcome.label(),
                entry.case,
                entry.duration_ms
            )?;
            match &entry.outcome {
                Outcome::Failed { cause } => write!(f, " cause: {cause}")?,
                Outcome::Blocked { on } => write!(f, " blocked on: {on}")?,
                _ => {}
            }
            if let Some(diagnostic) = &entry.diagnostic {
                write!(f, " diag: {diagnostic}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
