//! Diagnostic capture on case failure.
//!
//! When a case fails, the executor hands the failure and the current
//! environment state to a [`DiagnosticSink`] before recording the
//! outcome. The sink is an external collaborator: real deployments wire
//! one that dumps remote logs and hypervisor state; the bundled sinks
//! log through `tracing` or buffer in memory.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use ulid::Ulid;

use rigor_snapshot::EnvState;

/// Errors from a diagnostic sink.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    /// The sink could not record the capture.
    #[error("diagnostic capture failed: {0}")]
    Capture(String),
}

/// Reference to a captured diagnostic, in the `diag_{ulid}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRef(String);

impl DiagnosticRef {
    /// Generate a fresh reference.
    pub fn new() -> Self {
        Self(format!("diag_{}", Ulid::new()))
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DiagnosticRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DiagnosticRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What failed, with enough context for the sink to act on.
#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    /// Name of the failed case.
    pub case: String,

    /// Rendered failure cause.
    pub error: String,

    /// When the failure was observed.
    pub occurred_at: DateTime<Utc>,
}

/// Sink invoked by the executor on case failure.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    /// Capture diagnostics for a failure and return a reference to them.
    async fn capture(
        &self,
        failure: &FailureInfo,
        env: &EnvState,
    ) -> Result<DiagnosticRef, DiagnosticError>;
}

/// Sink that records failures through `tracing`.
///
/// Default for suites that have no external diagnostic pipeline.
pub struct LogSink;

#[async_trait]
impl DiagnosticSink for LogSink {
    async fn capture(
        &self,
        failure: &FailureInfo,
        env: &EnvState,
    ) -> Result<DiagnosticRef, DiagnosticError> {
        let reference = DiagnosticRef::new();
        error!(
            case = %failure.case,
            error = %failure.error,
            diagnostic = %reference,
            env_keys = env.len(),
            "Case failed, diagnostics captured"
        );
        Ok(reference)
    }
}

/// A single buffered capture.
#[derive(Debug, Clone)]
pub struct CapturedDiagnostic {
    /// Reference handed back to the executor.
    pub reference: DiagnosticRef,

    /// The failure that triggered the capture.
    pub failure: FailureInfo,

    /// Environment state at the time of failure.
    pub env: EnvState,
}

/// Sink that buffers captures in memory, for tests and local runs.
#[derive(Default)]
pub struct MemorySink {
    captures: Mutex<Vec<CapturedDiagnostic>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captures so far.
    pub fn captures(&self) -> Vec<CapturedDiagnostic> {
        self.captures.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of captures so far.
    pub fn len(&self) -> usize {
        self.captures.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DiagnosticSink for MemorySink {
    async fn capture(
        &self,
        failure: &FailureInfo,
        env: &EnvState,
    ) -> Result<DiagnosticRef, DiagnosticError> {
        let reference = DiagnosticRef::new();
        let mut captures = self
            .captures
            .lock()
            .map_err(|_| DiagnosticError::Capture("sink poisoned".to_string()))?;
        captures.push(CapturedDiagnostic {
            reference: reference.clone(),
            failure: failure.clone(),
            env: env.clone(),
        });
        Ok(reference)
    }
}
