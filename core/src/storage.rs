//! Key-value storage trait for client-local persistence.
//!
//! Features that must survive restarts (an event roster, for instance) keep a
//! serialized snapshot under a well-known key. The store itself knows nothing
//! about the value format.
//!
//! # Implementations
//!
//! - `JsonFileStore` (in `strike-checkin`): one file per key in a data directory
//! - `InMemoryKeyValueStore` (in `strike-events-testing`): `HashMap` backed, for tests

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`KeyValueStore`] methods.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Errors that can occur while reading or writing the key-value store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying medium failed (disk full, permission denied, ...).
    #[error("I/O error for key {key}: {source}")]
    Io {
        /// Key being read or written
        key: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error for key {key}: {message}")]
    Serialization {
        /// Key being read or written
        key: String,
        /// Description of the failure
        message: String,
    },

    /// The backend rejected the operation.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A string-keyed store of string values.
///
/// Values are opaque to the store; callers own serialization.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the trait can be used as
/// `Arc<dyn KeyValueStore>` inside an environment.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be read.
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be written.
    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_key() {
        let error = StorageError::Io {
            key: "strike-events-roster-1".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let message = error.to_string();
        assert!(message.contains("strike-events-roster-1"));
        assert!(message.contains("denied"));
    }
}
