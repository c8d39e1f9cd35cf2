//! Roster persistence over a [`KeyValueStore`].
//!
//! Each event's roster is stored under `strike-events-roster-{event_id}` as a
//! JSON array of attendee records, the same shape the browser kept in local
//! storage.

use crate::reducer::CheckInAction;
use crate::types::{Attendee, EventId};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strike_events_core::storage::{KeyValueStore, StorageError, StorageFuture};
use tokio::sync::Mutex;

/// Prefix of every roster key
pub const ROSTER_KEY_PREFIX: &str = "strike-events-roster";

/// Storage key for an event's roster
#[must_use]
pub fn roster_key(event_id: &EventId) -> String {
    format!("{ROSTER_KEY_PREFIX}-{event_id}")
}

/// Serializes a roster to its stored JSON form
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if encoding fails.
pub fn encode_roster(key: &str, attendees: &[Attendee]) -> Result<String, StorageError> {
    serde_json::to_string(attendees).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Parses a stored roster
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the value is not a valid roster.
pub fn decode_roster(key: &str, value: &str) -> Result<Vec<Attendee>, StorageError> {
    serde_json::from_str(value).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Loads an event's roster, or `None` if nothing is stored yet
///
/// # Errors
///
/// Returns [`StorageError`] if the store cannot be read or the value is corrupt.
pub async fn load_roster(
    storage: &dyn KeyValueStore,
    event_id: &EventId,
) -> Result<Option<Vec<Attendee>>, StorageError> {
    let key = roster_key(event_id);
    match storage.get(&key).await? {
        Some(value) => decode_roster(&key, &value).map(Some),
        None => Ok(None),
    }
}

/// Writes roster snapshots for one event, newest revision wins.
///
/// Snapshots are written after the roster lock is released, so two writes
/// can race. Writes are serialized here and a snapshot older than the last
/// one written is dropped, which keeps storage from going backwards.
pub struct RosterWriter {
    key: String,
    storage: Arc<dyn KeyValueStore>,
    last_written: Mutex<u64>,
}

impl RosterWriter {
    /// Creates a writer for `event_id`'s roster
    #[must_use]
    pub fn new(event_id: &EventId, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            key: roster_key(event_id),
            storage,
            last_written: Mutex::new(0),
        }
    }

    /// Storage key this writer targets
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Writes the snapshot taken at `revision`
    ///
    /// Returns the event to feed back into the reducer: `RosterPersisted`,
    /// `PersistFailed`, or `None` when a newer snapshot is already stored.
    pub async fn write(&self, revision: u64, attendees: Vec<Attendee>) -> Option<CheckInAction> {
        let mut last_written = self.last_written.lock().await;
        if revision <= *last_written {
            tracing::debug!(key = %self.key, revision, last_written = *last_written, "Skipping stale roster snapshot");
            return None;
        }

        let result = match encode_roster(&self.key, &attendees) {
            Ok(value) => self.storage.set(&self.key, value).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                *last_written = revision;
                tracing::debug!(key = %self.key, revision, attendees = attendees.len(), "Roster snapshot saved");
                Some(CheckInAction::RosterPersisted { revision })
            },
            Err(error) => Some(CheckInAction::PersistFailed {
                revision,
                error: error.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for RosterWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterWriter").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Key-value store keeping one JSON file per key in a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write never leaves a truncated roster behind.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at `dir`; the directory is created on first write
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        Box::pin(async move {
            match tokio::fs::read_to_string(self.path_for(key)).await {
                Ok(value) => Ok(Some(value)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(source) => Err(StorageError::Io {
                    key: key.to_string(),
                    source,
                }),
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let io_error = |source| StorageError::Io {
                key: key.to_string(),
                source,
            };
            let path = self.path_for(key);
            let tmp = path.with_extension("json.tmp");

            tokio::fs::create_dir_all(&self.dir).await.map_err(io_error)?;
            tokio::fs::write(&tmp, value).await.map_err(io_error)?;
            tokio::fs::rename(&tmp, &path).await.map_err(io_error)?;
            Ok(())
        })
    }
}
