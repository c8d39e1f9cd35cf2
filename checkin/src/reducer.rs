//! Reducer logic for an event's check-in roster.
//!
//! Commands (`Scan`, `ManualCheckIn`, `Register`) are validated against the
//! roster and turned into events; events are applied to state. Every command
//! leaves its result in [`RosterState::last_outcome`], which the ledger reads
//! under the same lock that ran the reducer.
//!
//! Every event that changes the roster bumps the revision and returns one
//! effect that writes a snapshot of the roster to storage.

use crate::persistence::RosterWriter;
use crate::types::{Attendee, AttendeeId, PersistFailure, RosterState, TicketId, TicketType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strike_events_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of scanning a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanResult {
    /// The ticket was pending and is now checked in
    Success {
        /// The attendee, as stored after check-in
        attendee: Attendee,
    },
    /// The ticket was already used; nothing changed
    AlreadyCheckedIn {
        /// The attendee, with the original check-in time
        attendee: Attendee,
    },
    /// No attendee holds this ticket
    Invalid {
        /// The ticket id that was scanned
        ticket_id: TicketId,
    },
}

impl ScanResult {
    /// The ticket id the scan was for
    #[must_use]
    pub const fn ticket_id(&self) -> &TicketId {
        match self {
            Self::Success { attendee } | Self::AlreadyCheckedIn { attendee } => &attendee.ticket_id,
            Self::Invalid { ticket_id } => ticket_id,
        }
    }

    /// Whether the scan let someone in
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Label used for logs and metrics
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::AlreadyCheckedIn { .. } => "already_checked_in",
            Self::Invalid { .. } => "invalid",
        }
    }
}

/// Result of a manual check-in from the roster view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManualCheckInResult {
    /// The attendee is checked in (now, or from before)
    Success {
        /// The attendee after the operation
        attendee: Attendee,
        /// `false` when the attendee was already checked in
        newly_checked_in: bool,
    },
    /// No attendee with this id
    NotFound {
        /// The id that was requested
        attendee_id: AttendeeId,
    },
}

/// Result of registering a new attendee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationResult {
    /// The attendee was added to the roster
    Registered {
        /// The new, pending attendee
        attendee: Attendee,
    },
    /// The registration failed validation
    Rejected {
        /// Why
        reason: String,
    },
}

/// Outcome of the last command, see [`RosterState::last_outcome`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckInOutcome {
    /// From [`CheckInAction::Scan`]
    Scan(ScanResult),
    /// From [`CheckInAction::ManualCheckIn`]
    Manual(ManualCheckInResult),
    /// From [`CheckInAction::Register`]
    Registration(RegistrationResult),
}

/// How an attendee got checked in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckInMethod {
    /// QR scan at the door
    Scan,
    /// Staff picked the attendee from the roster
    Manual,
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions representing commands and events for an event roster
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CheckInAction {
    // ========== Commands ==========
    /// Command: check in the holder of a scanned ticket
    Scan {
        /// Ticket id decoded from the QR code
        ticket_id: TicketId,
    },

    /// Command: check in an attendee picked from the roster
    ManualCheckIn {
        /// Attendee record id
        attendee_id: AttendeeId,
    },

    /// Command: add a pending attendee with the next free ticket id
    Register {
        /// Id for the new record, generated by the caller
        attendee_id: AttendeeId,
        /// Display name
        name: String,
        /// Contact email
        email: String,
        /// Ticket category
        ticket_type: TicketType,
    },

    // ========== Events ==========
    /// Event: an attendee moved from pending to checked in
    AttendeeCheckedIn {
        /// Attendee record id
        attendee_id: AttendeeId,
        /// When
        checked_in_at: DateTime<Utc>,
        /// Scan or manual
        method: CheckInMethod,
    },

    /// Event: an attendee was added to the roster
    AttendeeRegistered {
        /// The new record
        attendee: Attendee,
    },

    /// Event: a roster snapshot reached storage
    RosterPersisted {
        /// Revision of the snapshot
        revision: u64,
    },

    /// Event: writing a roster snapshot failed
    PersistFailed {
        /// Revision of the snapshot
        revision: u64,
        /// Storage error message
        error: String,
    },
}

impl CheckInAction {
    /// Returns `true` for commands
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::Scan { .. } | Self::ManualCheckIn { .. } | Self::Register { .. }
        )
    }

    /// Returns `true` for events
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !self.is_command()
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the check-in reducer
#[derive(Clone)]
pub struct CheckInEnvironment {
    /// Clock for check-in timestamps
    pub clock: Arc<dyn Clock>,
    /// Writes roster snapshots after each mutation
    pub writer: Arc<RosterWriter>,
}

impl CheckInEnvironment {
    /// Creates a new `CheckInEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, writer: Arc<RosterWriter>) -> Self {
        Self { clock, writer }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for an event's check-in roster
#[derive(Clone, Debug, Default)]
pub struct CheckInReducer;

impl CheckInReducer {
    /// Creates a new `CheckInReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a `Register` command
    fn validate_registration(
        state: &RosterState,
        attendee_id: &AttendeeId,
        name: &str,
        email: &str,
    ) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err("Attendee name cannot be empty".to_string());
        }

        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(format!("Invalid email address: {email:?}"));
        }

        if state.get(attendee_id).is_some() {
            return Err(format!("Attendee {attendee_id} already registered"));
        }

        Ok(())
    }

    /// Applies an event to state, returning `true` if the roster changed
    fn apply_event(state: &mut RosterState, action: &CheckInAction) -> bool {
        match action {
            CheckInAction::AttendeeCheckedIn {
                attendee_id,
                checked_in_at,
                ..
            } => {
                let changed = state
                    .get_mut(attendee_id)
                    .is_some_and(|attendee| attendee.check_in(*checked_in_at));
                if changed {
                    state.revision += 1;
                }
                changed
            },
            CheckInAction::AttendeeRegistered { attendee } => {
                if state.get(&attendee.id).is_some() || state.by_ticket(&attendee.ticket_id).is_some() {
                    return false;
                }
                state.push(attendee.clone());
                state.revision += 1;
                true
            },
            CheckInAction::RosterPersisted { revision } => {
                state.persisted_revision = state.persisted_revision.max(*revision);
                if state
                    .last_persist_error
                    .as_ref()
                    .is_some_and(|failure| *revision >= failure.revision)
                {
                    state.last_persist_error = None;
                }
                false
            },
            CheckInAction::PersistFailed { revision, error } => {
                tracing::error!(event_id = %state.event_id, revision = *revision, error = %error, "Roster snapshot was not saved");
                crate::metrics::record_persist_failure();
                state.last_persist_error = Some(PersistFailure {
                    revision: *revision,
                    message: error.clone(),
                });
                false
            },
            // Commands are not applied to state
            CheckInAction::Scan { .. }
            | CheckInAction::ManualCheckIn { .. }
            | CheckInAction::Register { .. } => false,
        }
    }

    /// Applies an event and, if the roster changed, describes the snapshot write
    fn commit(
        state: &mut RosterState,
        event: &CheckInAction,
        env: &CheckInEnvironment,
    ) -> SmallVec<[Effect<CheckInAction>; 4]> {
        if !Self::apply_event(state, event) {
            return SmallVec::new();
        }

        let writer = Arc::clone(&env.writer);
        let revision = state.revision;
        let snapshot = state.attendees().to_vec();
        smallvec![Effect::future(async move { writer.write(revision, snapshot).await })]
    }

    fn scan(
        state: &mut RosterState,
        ticket_id: TicketId,
        env: &CheckInEnvironment,
    ) -> SmallVec<[Effect<CheckInAction>; 4]> {
        let Some(attendee) = state.by_ticket(&ticket_id) else {
            tracing::warn!(event_id = %state.event_id, %ticket_id, "Scan rejected: unknown ticket");
            state.last_outcome = Some(CheckInOutcome::Scan(ScanResult::Invalid { ticket_id }));
            return SmallVec::new();
        };

        if attendee.is_checked_in() {
            tracing::warn!(event_id = %state.event_id, %ticket_id, "Scan rejected: ticket already used");
            let attendee = attendee.clone();
            state.last_outcome = Some(CheckInOutcome::Scan(ScanResult::AlreadyCheckedIn { attendee }));
            return SmallVec::new();
        }

        let attendee_id = attendee.id.clone();
        let event = CheckInAction::AttendeeCheckedIn {
            attendee_id: attendee_id.clone(),
            checked_in_at: env.clock.now(),
            method: CheckInMethod::Scan,
        };
        let effects = Self::commit(state, &event, env);

        if let Some(attendee) = state.get(&attendee_id).cloned() {
            tracing::info!(event_id = %state.event_id, %ticket_id, name = %attendee.name, "Checked in by scan");
            state.last_outcome = Some(CheckInOutcome::Scan(ScanResult::Success { attendee }));
        }
        effects
    }

    fn manual_check_in(
        state: &mut RosterState,
        attendee_id: AttendeeId,
        env: &CheckInEnvironment,
    ) -> SmallVec<[Effect<CheckInAction>; 4]> {
        let Some(attendee) = state.get(&attendee_id) else {
            tracing::warn!(event_id = %state.event_id, %attendee_id, "Manual check-in for unknown attendee");
            state.last_outcome = Some(CheckInOutcome::Manual(ManualCheckInResult::NotFound { attendee_id }));
            return SmallVec::new();
        };

        if attendee.is_checked_in() {
            tracing::debug!(event_id = %state.event_id, %attendee_id, "Manual check-in: already checked in");
            let attendee = attendee.clone();
            state.last_outcome = Some(CheckInOutcome::Manual(ManualCheckInResult::Success {
                attendee,
                newly_checked_in: false,
            }));
            return SmallVec::new();
        }

        let event = CheckInAction::AttendeeCheckedIn {
            attendee_id: attendee_id.clone(),
            checked_in_at: env.clock.now(),
            method: CheckInMethod::Manual,
        };
        let effects = Self::commit(state, &event, env);

        if let Some(attendee) = state.get(&attendee_id).cloned() {
            tracing::info!(event_id = %state.event_id, %attendee_id, name = %attendee.name, "Checked in manually");
            state.last_outcome = Some(CheckInOutcome::Manual(ManualCheckInResult::Success {
                attendee,
                newly_checked_in: true,
            }));
        }
        effects
    }

    fn register(
        state: &mut RosterState,
        attendee_id: AttendeeId,
        name: String,
        email: String,
        ticket_type: TicketType,
        env: &CheckInEnvironment,
    ) -> SmallVec<[Effect<CheckInAction>; 4]> {
        if let Err(reason) = Self::validate_registration(state, &attendee_id, &name, &email) {
            tracing::warn!(event_id = %state.event_id, %reason, "Registration rejected");
            state.last_outcome = Some(CheckInOutcome::Registration(RegistrationResult::Rejected { reason }));
            return SmallVec::new();
        }

        let attendee = Attendee::new(
            attendee_id,
            name.trim(),
            email.trim(),
            state.next_ticket_id(),
            ticket_type,
        );
        let event = CheckInAction::AttendeeRegistered {
            attendee: attendee.clone(),
        };
        let effects = Self::commit(state, &event, env);

        tracing::info!(event_id = %state.event_id, ticket_id = %attendee.ticket_id, "Attendee registered");
        state.last_outcome = Some(CheckInOutcome::Registration(RegistrationResult::Registered { attendee }));
        effects
    }
}

impl Reducer for CheckInReducer {
    type State = RosterState;
    type Action = CheckInAction;
    type Environment = CheckInEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            CheckInAction::Scan { ticket_id } => Self::scan(state, ticket_id, env),
            CheckInAction::ManualCheckIn { attendee_id } => Self::manual_check_in(state, attendee_id, env),
            CheckInAction::Register {
                attendee_id,
                name,
                email,
                ticket_type,
            } => Self::register(state, attendee_id, name, email, ticket_type, env),

            // ========== Events ==========
            // Replayed or fed back from effects
            event @ (CheckInAction::AttendeeCheckedIn { .. }
            | CheckInAction::AttendeeRegistered { .. }
            | CheckInAction::RosterPersisted { .. }
            | CheckInAction::PersistFailed { .. }) => Self::commit(state, &event, env),
        }
    }
}
