//! Sequential plan execution.
//!
//! The executor walks an execution plan strictly in order: one case at
//! a time, each run to a terminal state before the next is considered.
//! Per case, the state machine is
//!
//! `pending -> {running -> (passed | failed)} | skipped-memoized |
//! skipped-disabled | blocked`
//!
//! A case reaches `running` only when every direct predecessor ended in
//! a healthy terminal state and its declared restore precondition
//! succeeded. A failed or blocked predecessor blocks the case instead;
//! running against a known-bad environment is never attempted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use rigor_plan::ExecutionPlan;
use rigor_registry::{CaseContext, CaseError, TestCase};
use rigor_snapshot::{EnvState, SnapshotStore};

use crate::config::Config;
use crate::diagnostics::{DiagnosticRef, DiagnosticSink, FailureInfo};
use crate::memo::Memoizer;
use crate::report::{Outcome, ReportEntry, RunId, RunReport};

/// Executes plans against a snapshot store and a diagnostic sink.
pub struct Executor {
    store: Arc<dyn SnapshotStore>,
    sink: Arc<dyn DiagnosticSink>,
    config: Config,
}

impl Executor {
    /// Create an executor with default configuration.
    pub fn new(store: Arc<dyn SnapshotStore>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self::with_config(store, sink, Config::default())
    }

    /// Create an executor with explicit configuration.
    pub fn with_config(
        store: Arc<dyn SnapshotStore>,
        sink: Arc<dyn DiagnosticSink>,
        config: Config,
    ) -> Self {
        Self {
            store,
            sink,
            config,
        }
    }

    /// Run the plan to completion and report every case's terminal state.
    pub async fn run(&self, plan: &ExecutionPlan) -> RunReport {
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(run_id = %run_id, cases = plan.len(), "Starting suite run");

        let mut outcomes: HashMap<String, Outcome> = HashMap::new();
        let mut entries = Vec::with_capacity(plan.len());

        for case in plan.iter() {
            let case_started = Instant::now();
            let (outcome, diagnostic) = self.run_case(case, &outcomes).await;
            let duration_ms = case_started.elapsed().as_millis() as u64;

            if outcome.is_failure() {
                warn!(
                    case = %case.name,
                    outcome = outcome.label(),
                    duration_ms,
                    "Case did not pass"
                );
            } else {
                info!(
                    case = %case.name,
                    outcome = outcome.label(),
                    duration_ms,
                    "Case finished"
                );
            }

            outcomes.insert(case.name.clone(), outcome.clone());
            entries.push(ReportEntry {
                case: case.name.clone(),
                outcome,
                diagnostic,
                duration_ms,
            });
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            entries,
        };
        info!(
            run_id = %report.run_id,
            passed = report.passed_count(),
            failures = report.failure_count(),
            "Suite run complete"
        );
        report
    }

    #[instrument(skip_all, fields(case = %case.name))]
    async fn run_case(
        &self,
        case: &TestCase,
        outcomes: &HashMap<String, Outcome>,
    ) -> (Outcome, Option<DiagnosticRef>) {
        // Predecessor gate comes before everything else: dependents of a
        // failure are blocked even when disabled or memoized.
        for dep in &case.depends_on {
            let healthy = outcomes
                .get(dep)
                .map(Outcome::satisfies_dependents)
                .unwrap_or(false);
            if !healthy {
                return (Outcome::Blocked { on: dep.clone() }, None);
            }
        }

        if !case.enabled {
            return (Outcome::SkippedDisabled, None);
        }

        match Memoizer::new(self.store.as_ref())
            .already_satisfied(case)
            .await
        {
            Ok(true) => {
                debug!(
                    snapshot = case.produces_snapshot.as_deref().unwrap_or_default(),
                    "Produced snapshot exists, skipping"
                );
                return (Outcome::SkippedMemoized, None);
            }
            Ok(false) => {}
            Err(e) => {
                return (
                    Outcome::Failed {
                        cause: format!("snapshot existence check: {e}"),
                    },
                    None,
                );
            }
        }

        let mut env = EnvState::new();
        if let Some(snapshot) = &case.restores_snapshot {
            match self.store.restore(snapshot).await {
                Ok(state) => {
                    debug!(snapshot = %snapshot, "Snapshot restored");
                    env = state;
                }
                Err(e) => {
                    warn!(snapshot = %snapshot, error = %e, "Restore precondition failed");
                    return (
                        Outcome::Failed {
                            cause: format!("restoring snapshot {snapshot}: {e}"),
                        },
                        None,
                    );
                }
            }
        }

        let mut ctx = CaseContext::new(case.name.clone(), env);
        match case.body.run(&mut ctx).await {
            Ok(()) => {
                if let Some(snapshot) = &case.produces_snapshot {
                    if let Err(e) = self.store.save(snapshot, ctx.env.clone()).await {
                        return (
                            Outcome::Failed {
                                cause: format!("saving snapshot {snapshot}: {e}"),
                            },
                            None,
                        );
                    }
                    debug!(snapshot = %snapshot, "Snapshot saved");
                }
                (Outcome::Passed, None)
            }
            Err(err) => {
                let diagnostic = self.capture_failure(case, &ctx, &err).await;
                (
                    Outcome::Failed {
                        cause: err.to_string(),
                    },
                    diagnostic,
                )
            }
        }
    }

    async fn capture_failure(
        &self,
        case: &TestCase,
        ctx: &CaseContext,
        err: &CaseError,
    ) -> Option<DiagnosticRef> {
        if self.config.failure_snapshots {
            let name = format!("{}{}", self.config.failure_snapshot_prefix, case.name);
            if let Err(e) = self.store.save(&name, ctx.env.clone()).await {
                warn!(case = %case.name, snapshot = %name, error = %e, "Failed to save failure snapshot");
            }
        }

        let failure = FailureInfo {
            case: case.name.clone(),
            error: err.to_string(),
            occurred_at: Utc::now(),
        };
        match self.sink.capture(&failure, &ctx.env).await {
            Ok(reference) => Some(reference),
            Err(e) => {
                error!(case = %case.name, error = %e, "Diagnostic capture failed");
                None
            }
        }
    }
}
