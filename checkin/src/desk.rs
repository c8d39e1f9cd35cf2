//! Multi-event check-in desk.
//!
//! Staff at the door pick an event, then scan. The desk keeps one
//! [`CheckInLedger`] per event, opened on first use. Ledgers do not share a
//! lock, so scans at different events never wait on each other.

use crate::catalog::{self, CatalogEvent};
use crate::error::Result;
use crate::ledger::CheckInLedger;
use crate::types::{CheckInSummary, EventId};
use std::collections::HashMap;
use std::sync::Arc;
use strike_events_core::environment::Clock;
use strike_events_core::storage::KeyValueStore;
use tokio::sync::{Mutex, OnceCell};

type LedgerSlot = Arc<OnceCell<Arc<CheckInLedger>>>;

/// Ledgers for every event staff have opened
pub struct CheckInDesk {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    seed_catalog: bool,
    // The map lock only guards slot lookup; loading happens in the slot
    ledgers: Mutex<HashMap<EventId, LedgerSlot>>,
}

impl CheckInDesk {
    /// Creates a desk over `storage`
    ///
    /// With `seed_catalog`, events with nothing stored start from the demo
    /// roster in [`catalog::seed_roster`]; otherwise they start empty.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, seed_catalog: bool) -> Self {
        Self {
            storage,
            clock,
            seed_catalog,
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    /// The ledger for `event_id`, opening it on first use
    ///
    /// Concurrent first calls for the same event open it once. Opening one
    /// event does not hold up callers asking for another. A failed open
    /// leaves the event unopened, so the next call retries.
    ///
    /// # Errors
    ///
    /// Returns the [`crate::LedgerError`] from [`CheckInLedger::open`].
    pub async fn ledger(&self, event_id: &EventId) -> Result<Arc<CheckInLedger>> {
        let slot = Arc::clone(self.ledgers.lock().await.entry(event_id.clone()).or_default());

        let ledger = slot.get_or_try_init(|| self.open(event_id)).await?;
        Ok(Arc::clone(ledger))
    }

    async fn open(&self, event_id: &EventId) -> Result<Arc<CheckInLedger>> {
        if catalog::find(event_id).is_none() {
            tracing::warn!(%event_id, "Opening ledger for an event outside the catalog");
        }
        let seed = if self.seed_catalog {
            catalog::seed_roster(event_id)
        } else {
            Vec::new()
        };

        let ledger = CheckInLedger::open(
            event_id.clone(),
            Arc::clone(&self.storage),
            Arc::clone(&self.clock),
            seed,
        )
        .await?;
        Ok(Arc::new(ledger))
    }

    /// Ids of the events opened so far, sorted
    pub async fn open_events(&self) -> Vec<EventId> {
        let mut ids: Vec<_> = self
            .ledgers
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Check-in summary of every catalog event, in catalog order
    ///
    /// # Errors
    ///
    /// Returns the first error from opening a ledger.
    pub async fn catalog_overview(&self) -> Result<Vec<(&'static CatalogEvent, CheckInSummary)>> {
        let mut overview = Vec::with_capacity(catalog::events().len());
        for event in catalog::events() {
            let ledger = self.ledger(&event.event_id()).await?;
            overview.push((event, ledger.summary().await));
        }
        Ok(overview)
    }
}

impl std::fmt::Debug for CheckInDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckInDesk")
            .field("seed_catalog", &self.seed_catalog)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::persistence::roster_key;
    use crate::types::TicketId;
    use std::time::Duration;
    use strike_events_core::storage::StorageFuture;
    use strike_events_testing::{InMemoryKeyValueStore, test_clock};

    fn desk(seed_catalog: bool) -> CheckInDesk {
        CheckInDesk::new(
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(test_clock()),
            seed_catalog,
        )
    }

    #[tokio::test]
    async fn ledger_is_opened_once() {
        let desk = desk(true);

        let first = desk.ledger(&EventId::new("1")).await.unwrap();
        let second = desk.ledger(&EventId::new("1")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(desk.open_events().await, vec![EventId::new("1")]);
    }

    #[tokio::test]
    async fn events_keep_separate_rosters() {
        let desk = desk(true);

        let tech = desk.ledger(&EventId::new("1")).await.unwrap();
        let meetup = desk.ledger(&EventId::new("2")).await.unwrap();

        assert!(tech.scan(&TicketId::new("TKT-003")).await.unwrap().is_success());
        assert!(!meetup.scan(&TicketId::new("TKT-003")).await.unwrap().is_success());
        assert_eq!(meetup.summary().await.total_tickets, 0);
    }

    #[tokio::test]
    async fn without_seeding_rosters_start_empty() {
        let desk = desk(false);

        let ledger = desk.ledger(&EventId::new("1")).await.unwrap();

        assert!(ledger.roster().await.is_empty());
    }

    /// Storage whose reads of one key wait until released
    struct GatedStore {
        inner: InMemoryKeyValueStore,
        gated_key: String,
        gate: Arc<tokio::sync::Notify>,
    }

    impl KeyValueStore for GatedStore {
        fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
            Box::pin(async move {
                if key == self.gated_key {
                    self.gate.notified().await;
                }
                self.inner.get(key).await
            })
        }

        fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
            self.inner.set(key, value)
        }
    }

    #[tokio::test]
    async fn slow_open_does_not_block_other_events() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let desk = Arc::new(CheckInDesk::new(
            Arc::new(GatedStore {
                inner: InMemoryKeyValueStore::new(),
                gated_key: roster_key(&EventId::new("2")),
                gate: Arc::clone(&gate),
            }),
            Arc::new(test_clock()),
            true,
        ));
        desk.ledger(&EventId::new("1")).await.unwrap();

        let loading = {
            let desk = Arc::clone(&desk);
            tokio::spawn(async move { desk.ledger(&EventId::new("2")).await.map(|_| ()) })
        };
        tokio::task::yield_now().await;

        let tech = tokio::time::timeout(Duration::from_secs(1), desk.ledger(&EventId::new("1")))
            .await
            .expect("event 1 waited on event 2 loading")
            .unwrap();
        assert!(tech.scan(&TicketId::new("TKT-003")).await.unwrap().is_success());
        assert_eq!(desk.open_events().await, vec![EventId::new("1")]);

        gate.notify_one();
        loading.await.unwrap().unwrap();
        assert_eq!(desk.open_events().await, vec![EventId::new("1"), EventId::new("2")]);
    }

    #[tokio::test]
    async fn failed_open_is_retried() {
        let storage = InMemoryKeyValueStore::with_value(roster_key(&EventId::new("1")), "not json");
        let desk = CheckInDesk::new(Arc::new(storage.clone()), Arc::new(test_clock()), true);

        assert!(desk.ledger(&EventId::new("1")).await.is_err());
        assert!(desk.open_events().await.is_empty());

        storage.set(&roster_key(&EventId::new("1")), "[]".to_string()).await.unwrap();
        let ledger = desk.ledger(&EventId::new("1")).await.unwrap();
        assert!(ledger.roster().await.is_empty());
    }

    #[tokio::test]
    async fn overview_covers_the_catalog() {
        let desk = desk(true);

        let overview = desk.catalog_overview().await.unwrap();

        let totals: Vec<_> = overview
            .iter()
            .map(|(event, summary)| (event.id, summary.total_tickets))
            .collect();
        assert_eq!(totals, vec![("1", 3), ("2", 0), ("3", 0)]);
    }
}
