//! Error types for the check-in ledger.
//!
//! Scan and check-in rejections (`Invalid`, `AlreadyCheckedIn`, `NotFound`)
//! are ordinary results, not errors. The errors here come from the
//! collaborators around the ledger: storage and the store runtime.

use crate::reducer::CheckInOutcome;
use crate::types::{EventId, RosterError};
use strike_events_core::storage::StorageError;
use strike_events_runtime::StoreError;
use thiserror::Error;

/// Errors returned by [`crate::CheckInLedger`] and [`crate::CheckInDesk`]
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Reading or writing the key-value store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The store runtime failed while running effects
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A roster snapshot could not be written.
    ///
    /// The in-memory roster already reflects the operation; only the
    /// stored copy is behind. `outcome` is what the operation returned, so a
    /// door still sees who was admitted.
    #[error("Roster for event {event_id} not saved (revision {revision}): {message}")]
    Persistence {
        /// Event whose roster was being written
        event_id: EventId,
        /// Revision of the unsaved snapshot
        revision: u64,
        /// Storage error message
        message: String,
        /// Result of the operation that produced the unsaved snapshot
        outcome: Box<CheckInOutcome>,
    },

    /// The stored roster violates roster invariants (duplicate ids)
    #[error("Corrupt roster for event {event_id}: {source}")]
    CorruptRoster {
        /// Event whose roster was loaded
        event_id: EventId,
        /// What is wrong with it
        #[source]
        source: RosterError,
    },
}

impl LedgerError {
    /// Outcome of an operation that took effect in memory but was not saved
    #[must_use]
    pub fn unsaved_outcome(&self) -> Option<&CheckInOutcome> {
        match self {
            Self::Persistence { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

/// Convenience alias for ledger results
pub type Result<T> = std::result::Result<T, LedgerError>;
