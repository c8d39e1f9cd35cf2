//! Roster persistence across ledger restarts.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect

use std::sync::Arc;
use strike_checkin::persistence::{load_roster, roster_key};
use strike_checkin::{
    AttendeeId, CheckInDesk, CheckInLedger, CheckInOutcome, EventId, JsonFileStore, LedgerError,
    RegistrationResult, ScanResult, TicketId, TicketType, catalog,
};
use strike_events_core::storage::KeyValueStore;
use strike_events_testing::{FailingKeyValueStore, InMemoryKeyValueStore, test_clock};

async fn open(storage: Arc<dyn KeyValueStore>) -> CheckInLedger {
    let event_id = EventId::new("1");
    let seed = catalog::seed_roster(&event_id);
    CheckInLedger::open(event_id, storage, Arc::new(test_clock()), seed)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_roster_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    let before = {
        let ledger = open(Arc::new(JsonFileStore::new(dir.path()))).await;
        ledger.scan(&TicketId::new("TKT-003")).await.unwrap();
        let RegistrationResult::Registered { .. } = ledger
            .register("Juan Pérez", "juan@example.com", TicketType::Other("Early Bird".to_string()))
            .await
            .unwrap()
        else {
            panic!("registration rejected");
        };
        ledger.roster().await
    };

    let reopened = open(Arc::new(JsonFileStore::new(dir.path()))).await;

    assert_eq!(reopened.roster().await, before);
    assert_eq!(reopened.summary().await.total_tickets, 4);
    assert_eq!(reopened.summary().await.checked_in, 3);
}

#[tokio::test]
async fn test_stored_value_uses_browser_roster_format() {
    let storage = InMemoryKeyValueStore::new();
    let ledger = open(Arc::new(storage.clone())).await;

    ledger.manual_check_in(&AttendeeId::new("3")).await.unwrap();

    let raw = storage.peek("strike-events-roster-1").unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let ana = &json[2];
    assert_eq!(ana["id"], "3");
    assert_eq!(ana["ticketId"], "TKT-003");
    assert_eq!(ana["ticketType"], "General");
    assert_eq!(ana["checkedIn"], true);
    assert_eq!(ana["checkedInAt"], "2024-02-15T09:00:00Z");
}

#[tokio::test]
async fn test_last_write_wins_after_many_mutations() {
    let storage = InMemoryKeyValueStore::new();
    let ledger = open(Arc::new(storage.clone())).await;

    for n in 0..10 {
        ledger
            .register(format!("Walk-in {n}"), format!("walkin{n}@example.com"), TicketType::General)
            .await
            .unwrap();
    }

    let stored = load_roster(&storage, &EventId::new("1")).await.unwrap().unwrap();
    assert_eq!(stored, ledger.roster().await);
    assert!(ledger.is_saved().await);
}

#[tokio::test]
async fn test_failed_write_is_reported_and_check_in_stands() {
    let ledger = open(Arc::new(FailingKeyValueStore)).await;

    let error = ledger.scan(&TicketId::new("TKT-003")).await.unwrap_err();

    match error {
        LedgerError::Persistence {
            event_id,
            revision,
            outcome,
            ..
        } => {
            assert_eq!(event_id, EventId::new("1"));
            assert_eq!(revision, 1);
            // The door still learns who was admitted
            let attendee = match *outcome {
                CheckInOutcome::Scan(ScanResult::Success { attendee }) => attendee,
                other => panic!("expected Success, got {other:?}"),
            };
            assert_eq!(attendee.id, AttendeeId::new("3"));
            assert_eq!(attendee.name, "Ana Martínez");
            assert!(attendee.is_checked_in());
        },
        other => panic!("expected Persistence, got {other:?}"),
    }
    // The attendee did enter
    assert_eq!(ledger.summary().await.pending, 0);
    let again = ledger.scan(&TicketId::new("TKT-003")).await.unwrap();
    assert!(!again.is_success());
}

#[tokio::test]
async fn test_corrupt_stored_roster_is_an_error() {
    let storage = InMemoryKeyValueStore::with_value(roster_key(&EventId::new("1")), "[{\"id\": 1}]");
    let desk = CheckInDesk::new(Arc::new(storage), Arc::new(test_clock()), true);

    let error = desk.ledger(&EventId::new("1")).await.unwrap_err();

    assert!(matches!(error, LedgerError::Storage(_)));
}
