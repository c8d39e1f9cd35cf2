//! The check-in ledger for one event.
//!
//! [`CheckInLedger`] owns a [`Store`] running the [`CheckInReducer`] over the
//! event's roster. Every operation goes through the store's write lock, so a
//! lookup and the check-in that follows it are one atomic step: two staff
//! members scanning the same ticket at once get one `Success` and one
//! `AlreadyCheckedIn`.
//!
//! # Example
//!
//! ```ignore
//! let ledger = CheckInLedger::open(EventId::new("1"), storage, clock, seed).await?;
//!
//! match ledger.scan(&TicketId::new("TKT-003")).await? {
//!     ScanResult::Success { attendee } => println!("Welcome, {}", attendee.name),
//!     ScanResult::AlreadyCheckedIn { attendee } => println!("Already in: {}", attendee.name),
//!     ScanResult::Invalid { ticket_id } => println!("Unknown ticket {ticket_id}"),
//! }
//! ```

use crate::error::{LedgerError, Result};
use crate::export::roster_csv;
use crate::metrics as checkin_metrics;
use crate::persistence::{RosterWriter, load_roster};
use crate::qr;
use crate::reducer::{
    CheckInAction, CheckInEnvironment, CheckInOutcome, CheckInReducer, ManualCheckInResult,
    RegistrationResult, ScanResult,
};
use crate::types::{Attendee, AttendeeId, CheckInSummary, EventId, RosterState, TicketId, TicketType};
use std::sync::Arc;
use strike_events_core::environment::Clock;
use strike_events_core::storage::KeyValueStore;
use strike_events_runtime::Store;

type RosterStore = Store<RosterState, CheckInAction, CheckInEnvironment, CheckInReducer>;

/// Check-in ledger for one event
pub struct CheckInLedger {
    event_id: EventId,
    store: RosterStore,
}

impl CheckInLedger {
    /// Creates a ledger over `attendees`, writing snapshots to `storage`
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CorruptRoster`] if two attendees share an id or
    /// a ticket id.
    pub fn new(
        event_id: EventId,
        attendees: Vec<Attendee>,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let state = RosterState::from_attendees(event_id.clone(), attendees).map_err(|source| {
            LedgerError::CorruptRoster {
                event_id: event_id.clone(),
                source,
            }
        })?;
        let writer = Arc::new(RosterWriter::new(&event_id, storage));
        let env = CheckInEnvironment::new(clock, writer);

        Ok(Self {
            event_id,
            store: Store::new(state, CheckInReducer::new(), env),
        })
    }

    /// Opens an event's ledger from storage, falling back to `seed` when
    /// nothing has been stored for the event yet
    ///
    /// The seed is not written until the first mutation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the stored roster cannot be read or
    /// parsed, and [`LedgerError::CorruptRoster`] if it has duplicate ids.
    #[tracing::instrument(skip(storage, clock, seed), fields(event_id = %event_id))]
    pub async fn open(
        event_id: EventId,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        seed: Vec<Attendee>,
    ) -> Result<Self> {
        let attendees = match load_roster(storage.as_ref(), &event_id).await? {
            Some(stored) => {
                tracing::info!(attendees = stored.len(), "Loaded stored roster");
                stored
            },
            None => {
                tracing::info!(attendees = seed.len(), "No stored roster, using seed");
                seed
            },
        };
        Self::new(event_id, attendees, clock, storage)
    }

    /// Event this ledger belongs to
    #[must_use]
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Checks in the holder of `ticket_id`
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] if the check-in happened but the
    /// roster could not be saved (the error carries the [`ScanResult`]), or
    /// [`LedgerError::Store`] if the runtime failed.
    #[tracing::instrument(skip(self), fields(event_id = %self.event_id))]
    pub async fn scan(&self, ticket_id: &TicketId) -> Result<ScanResult> {
        let action = CheckInAction::Scan {
            ticket_id: ticket_id.clone(),
        };
        let (outcome, unsaved) = self.dispatch(action).await?;

        let result = match outcome {
            Some(CheckInOutcome::Scan(result)) => result,
            _ => ScanResult::Invalid {
                ticket_id: ticket_id.clone(),
            },
        };
        checkin_metrics::record_scan(result.label());
        self.settle(result, unsaved, CheckInOutcome::Scan)
    }

    /// Decodes a raw QR payload and scans the ticket it names
    ///
    /// Undecodable payloads and tickets for another event are `Invalid`.
    ///
    /// # Errors
    ///
    /// Same as [`CheckInLedger::scan`].
    #[tracing::instrument(skip(self), fields(event_id = %self.event_id))]
    pub async fn scan_payload(&self, payload: &str) -> Result<ScanResult> {
        let decoded = match qr::decode(payload) {
            Ok(decoded) => decoded,
            Err(error) => {
                tracing::warn!(%error, "Unreadable ticket payload");
                checkin_metrics::record_scan("invalid");
                return Ok(ScanResult::Invalid {
                    ticket_id: TicketId::new(payload.trim()),
                });
            },
        };

        if !decoded.is_for(&self.event_id) {
            tracing::warn!(
                ticket_id = %decoded.ticket_id,
                ticket_event = ?decoded.event_id,
                "Ticket is for another event"
            );
            checkin_metrics::record_scan("invalid");
            return Ok(ScanResult::Invalid {
                ticket_id: decoded.ticket_id,
            });
        }

        self.scan(&decoded.ticket_id).await
    }

    /// Checks in an attendee picked from the roster
    ///
    /// Checking in someone who is already in succeeds without changing their
    /// check-in time.
    ///
    /// # Errors
    ///
    /// Same as [`CheckInLedger::scan`].
    #[tracing::instrument(skip(self), fields(event_id = %self.event_id))]
    pub async fn manual_check_in(&self, attendee_id: &AttendeeId) -> Result<ManualCheckInResult> {
        let action = CheckInAction::ManualCheckIn {
            attendee_id: attendee_id.clone(),
        };
        let (outcome, unsaved) = self.dispatch(action).await?;

        let result = match outcome {
            Some(CheckInOutcome::Manual(result)) => result,
            _ => ManualCheckInResult::NotFound {
                attendee_id: attendee_id.clone(),
            },
        };
        checkin_metrics::record_manual(match &result {
            ManualCheckInResult::Success {
                newly_checked_in: true,
                ..
            } => "checked_in",
            ManualCheckInResult::Success { .. } => "already_checked_in",
            ManualCheckInResult::NotFound { .. } => "not_found",
        });
        self.settle(result, unsaved, CheckInOutcome::Manual)
    }

    /// Adds a pending attendee with a fresh id and the next free ticket id
    ///
    /// # Errors
    ///
    /// Same as [`CheckInLedger::scan`].
    #[tracing::instrument(skip(self, name, email), fields(event_id = %self.event_id))]
    pub async fn register(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
        ticket_type: TicketType,
    ) -> Result<RegistrationResult> {
        let action = CheckInAction::Register {
            attendee_id: AttendeeId::generate(),
            name: name.into(),
            email: email.into(),
            ticket_type,
        };
        let (outcome, unsaved) = self.dispatch(action).await?;

        let result = match outcome {
            Some(CheckInOutcome::Registration(result)) => result,
            _ => RegistrationResult::Rejected {
                reason: "registration was not processed".to_string(),
            },
        };
        checkin_metrics::record_registration(match &result {
            RegistrationResult::Registered { .. } => "registered",
            RegistrationResult::Rejected { .. } => "rejected",
        });
        self.settle(result, unsaved, CheckInOutcome::Registration)
    }

    /// Attendees matching `query` (name, email or ticket id, ignoring case),
    /// in roster order
    pub async fn filter_roster(&self, query: &str) -> Vec<Attendee> {
        self.store
            .state(|state| state.filter(query).cloned().collect())
            .await
    }

    /// The whole roster, in roster order
    pub async fn roster(&self) -> Vec<Attendee> {
        self.store.state(|state| state.attendees().to_vec()).await
    }

    /// Check-in counts, computed from the roster now
    pub async fn summary(&self) -> CheckInSummary {
        self.store.state(RosterState::summary).await
    }

    /// Roster as CSV
    pub async fn export_csv(&self) -> String {
        self.store.state(|state| roster_csv(state.attendees())).await
    }

    /// Whether the last roster change has reached storage
    pub async fn is_saved(&self) -> bool {
        self.store
            .state(|state| state.persisted_revision >= state.revision)
            .await
    }

    /// Sends a command and returns its outcome, read under the same lock that
    /// reduced it, along with any snapshot write that failed
    async fn dispatch(
        &self,
        action: CheckInAction,
    ) -> Result<(Option<CheckInOutcome>, Option<UnsavedWrite>)> {
        let (outcome, feedback) = self
            .store
            .send_and_inspect(action, |state| state.last_outcome.clone())
            .await?;

        let unsaved = feedback.into_iter().find_map(|action| match action {
            CheckInAction::PersistFailed { revision, error } => Some(UnsavedWrite {
                revision,
                message: error,
            }),
            _ => None,
        });

        Ok((outcome, unsaved))
    }

    /// Returns `result`, or a [`LedgerError::Persistence`] carrying it when
    /// the snapshot write failed
    fn settle<T>(
        &self,
        result: T,
        unsaved: Option<UnsavedWrite>,
        wrap: impl FnOnce(T) -> CheckInOutcome,
    ) -> Result<T> {
        match unsaved {
            None => Ok(result),
            Some(UnsavedWrite { revision, message }) => Err(LedgerError::Persistence {
                event_id: self.event_id.clone(),
                revision,
                message,
                outcome: Box::new(wrap(result)),
            }),
        }
    }
}

struct UnsavedWrite {
    revision: u64,
    message: String,
}

impl std::fmt::Debug for CheckInLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckInLedger")
            .field("event_id", &self.event_id)
            .finish_non_exhaustive()
    }
}
