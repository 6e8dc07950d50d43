//! Run memoization keyed on produced snapshots.
//!
//! Setup-style cases are expensive (minutes) while the verification
//! cases sharing their snapshot are cheap (seconds). A case that
//! declares a produced snapshot runs at most once per suite invocation:
//! when the snapshot already exists, the case is skipped and its
//! postconditions are treated as satisfied for every dependent.

use rigor_registry::TestCase;
use rigor_snapshot::{SnapshotError, SnapshotStore};

/// Skip check for snapshot-producing cases.
pub struct Memoizer<'a> {
    store: &'a dyn SnapshotStore,
}

impl<'a> Memoizer<'a> {
    /// Create a memoizer over the given store.
    pub fn new(store: &'a dyn SnapshotStore) -> Self {
        Self { store }
    }

    /// Returns true if the case's produced snapshot already exists and
    /// execution can be skipped. Cases that produce nothing are never
    /// memoized.
    pub async fn already_satisfied(&self, case: &TestCase) -> Result<bool, SnapshotError> {
        match &case.produces_snapshot {
            Some(name) => self.store.exists(name).await,
            None => Ok(false),
        }
    }
}
