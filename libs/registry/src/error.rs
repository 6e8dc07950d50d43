//! Error types for case declaration and execution.

use thiserror::Error;

/// Errors from registering or resolving test cases.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A case with this name is already registered.
    #[error("duplicate case name: {0}")]
    DuplicateCase(String),

    /// Another case already declares this produced-snapshot name.
    #[error("snapshot {snapshot:?} already produced by case {producer:?}")]
    DuplicateSnapshot { snapshot: String, producer: String },

    /// No case with this name is registered.
    #[error("unknown case: {0}")]
    UnknownCase(String),

    /// The case declaration itself is malformed.
    #[error("invalid case declaration: {0}")]
    InvalidCase(String),
}

/// Errors a case body reports back to the executor.
///
/// Both variants schedule identically: the case is recorded as failed
/// and its dependents are blocked.
#[derive(Debug, Error)]
pub enum CaseError {
    /// A postcondition check inside the case did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A call to an external collaborator failed.
    #[error("external collaborator error: {0}")]
    External(#[from] anyhow::Error),
}

impl CaseError {
    /// Build an assertion failure from a message.
    pub fn assertion(message: impl Into<String>) -> Self {
        CaseError::Assertion(message.into())
    }
}

/// Assert a condition inside a case body, failing the case otherwise.
#[macro_export]
macro_rules! case_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::CaseError::Assertion(format!($($arg)+)));
        }
    };
}
