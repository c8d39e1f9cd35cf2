//! # Strike Events Testing
//!
//! Testing utilities and helpers for Strike Events reducers.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (clock, key-value store)
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use strike_events_testing::{ReducerTest, assertions, test_clock};
//!
//! ReducerTest::new(CheckInReducer::new())
//!     .with_env(test_environment())
//!     .given_state(roster_with_one_pending_ticket())
//!     .when_action(CheckInAction::Scan { ticket_id })
//!     .then_state(|state| assert_eq!(state.summary().checked_in, 1))
//!     .run();
//! ```

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use strike_events_core::environment::Clock;
use strike_events_core::storage::{KeyValueStore, StorageError, StorageFuture};


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{
        Arc, Clock, DateTime, Duration, HashMap, KeyValueStore, Mutex, PoisonError, RwLock,
        StorageError, StorageFuture, Utc,
    };

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until explicitly advanced. Clones share the
    /// same underlying time, so a test can keep a handle and advance the clock
    /// an environment holds.
    ///
    /// # Example
    ///
    /// ```
    /// use strike_events_testing::mocks::FixedClock;
    /// use strike_events_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::minutes(5));
    /// assert_eq!(clock.now() - time1, Duration::minutes(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward by `by`
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2024-02-15 09:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(1_707_987_600, 0).unwrap_or_default())
    }

    /// In-memory key-value store for testing.
    ///
    /// Clones share the same map, so a test can inspect what an environment
    /// wrote.
    #[derive(Clone, Debug, Default)]
    pub struct InMemoryKeyValueStore {
        data: Arc<RwLock<HashMap<String, String>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl InMemoryKeyValueStore {
        /// Create a new empty store
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a store pre-populated with one value
        #[must_use]
        pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
            let store = Self::new();
            store
                .data
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.into(), value.into());
            store
        }

        /// Read a value without going through the async trait
        #[must_use]
        pub fn peek(&self, key: &str) -> Option<String> {
            self.data
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned()
        }

        /// Number of successful `set` calls so far
        #[must_use]
        pub fn write_count(&self) -> usize {
            *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl KeyValueStore for InMemoryKeyValueStore {
        fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
            Box::pin(async move { Ok(self.peek(key)) })
        }

        fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
            Box::pin(async move {
                self.data
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key.to_string(), value);
                *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
                Ok(())
            })
        }
    }

    /// Key-value store whose writes always fail.
    ///
    /// Reads return `None`, so a feature loads an empty (or seeded) state and
    /// then hits the failure on its first write.
    #[derive(Clone, Debug, Default)]
    pub struct FailingKeyValueStore;

    impl KeyValueStore for FailingKeyValueStore {
        fn get<'a>(&'a self, _key: &'a str) -> StorageFuture<'a, Option<String>> {
            Box::pin(async { Ok(None) })
        }

        fn set<'a>(&'a self, key: &'a str, _value: String) -> StorageFuture<'a, ()> {
            Box::pin(async move {
                Err(StorageError::Backend(format!("write to {key} rejected")))
            })
        }
    }
}

// Re-export commonly used items
pub use mocks::{FailingKeyValueStore, FixedClock, InMemoryKeyValueStore, test_clock};
pub use reducer_test::{ReducerTest, assertions};
