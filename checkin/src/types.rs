//! Domain types for attendee check-in.
//!
//! An event's roster is an ordered list of [`Attendee`] records. Each record
//! moves one way, from pending to checked in. The check-in counts shown to
//! staff ([`CheckInSummary`]) are always computed from the roster; nothing
//! in this module stores a count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "` from any string")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Identifier of an event (`"1"`, `"2"`, ...)
    EventId
);

string_id!(
    /// Identifier of an attendee record, immutable once assigned
    AttendeeId
);

string_id!(
    /// Ticket identifier encoded in the attendee's QR code, unique per event
    TicketId
);

impl AttendeeId {
    /// Generates a fresh random identifier for a new registration
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl TicketId {
    /// Sequential ticket identifier in the `TKT-001` format
    #[must_use]
    pub fn sequential(number: usize) -> Self {
        Self(format!("TKT-{number:03}"))
    }
}

// ============================================================================
// Attendee
// ============================================================================

/// Ticket category. Has no effect on check-in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketType {
    /// General admission
    General,
    /// VIP ticket
    Vip,
    /// Any other category label
    Other(String),
}

impl From<String> for TicketType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "General" => Self::General,
            "VIP" => Self::Vip,
            _ => Self::Other(label),
        }
    }
}

impl From<TicketType> for String {
    fn from(ticket_type: TicketType) -> Self {
        ticket_type.to_string()
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => f.write_str("General"),
            Self::Vip => f.write_str("VIP"),
            Self::Other(label) => f.write_str(label),
        }
    }
}

/// One person holding a ticket to the event.
///
/// Checked-in status and timestamp are one field, so a checked-in attendee
/// always has a timestamp and a pending one never does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AttendeeRecord", into = "AttendeeRecord")]
pub struct Attendee {
    /// Record identifier
    pub id: AttendeeId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Scan/lookup key
    pub ticket_id: TicketId,
    /// Ticket category
    pub ticket_type: TicketType,
    checked_in_at: Option<DateTime<Utc>>,
}

impl Attendee {
    /// Creates a pending attendee
    #[must_use]
    pub fn new(
        id: AttendeeId,
        name: impl Into<String>,
        email: impl Into<String>,
        ticket_id: TicketId,
        ticket_type: TicketType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            ticket_id,
            ticket_type,
            checked_in_at: None,
        }
    }

    /// Builder for an attendee who already checked in (seed data, restores)
    #[must_use]
    pub fn checked_in_at(mut self, at: DateTime<Utc>) -> Self {
        self.checked_in_at = Some(at);
        self
    }

    /// Whether the attendee has checked in
    #[must_use]
    pub const fn is_checked_in(&self) -> bool {
        self.checked_in_at.is_some()
    }

    /// When the attendee checked in, if they have
    #[must_use]
    pub const fn checked_in_time(&self) -> Option<DateTime<Utc>> {
        self.checked_in_at
    }

    /// Current position in the check-in state machine
    #[must_use]
    pub const fn status(&self) -> CheckInStatus {
        if self.is_checked_in() {
            CheckInStatus::CheckedIn
        } else {
            CheckInStatus::Pending
        }
    }

    /// Moves a pending attendee to checked in.
    ///
    /// Returns `false` and leaves the record untouched if the attendee was
    /// already checked in; the first timestamp is never overwritten.
    pub fn check_in(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_checked_in() {
            return false;
        }
        self.checked_in_at = Some(at);
        true
    }

    /// Case-insensitive match of an already lowercased needle against name,
    /// email and ticket id
    fn matches_lowercase(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.name.to_lowercase().contains(needle)
            || self.email.to_lowercase().contains(needle)
            || self.ticket_id.as_str().to_lowercase().contains(needle)
    }
}

/// Per-attendee check-in state. `Pending → CheckedIn`, never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckInStatus {
    /// Ticket not yet used
    Pending,
    /// Attendee is in
    CheckedIn,
}

/// Stored form of an attendee, matching the browser roster format.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendeeRecord {
    id: AttendeeId,
    name: String,
    email: String,
    ticket_id: TicketId,
    ticket_type: TicketType,
    checked_in: bool,
    checked_in_at: Option<DateTime<Utc>>,
}

impl TryFrom<AttendeeRecord> for Attendee {
    type Error = String;

    fn try_from(record: AttendeeRecord) -> Result<Self, Self::Error> {
        if record.checked_in != record.checked_in_at.is_some() {
            return Err(format!(
                "attendee {} has checkedIn={} but checkedInAt={:?}",
                record.id, record.checked_in, record.checked_in_at
            ));
        }
        Ok(Self {
            id: record.id,
            name: record.name,
            email: record.email,
            ticket_id: record.ticket_id,
            ticket_type: record.ticket_type,
            checked_in_at: record.checked_in_at,
        })
    }
}

impl From<Attendee> for AttendeeRecord {
    fn from(attendee: Attendee) -> Self {
        Self {
            checked_in: attendee.is_checked_in(),
            checked_in_at: attendee.checked_in_at,
            id: attendee.id,
            name: attendee.name,
            email: attendee.email,
            ticket_id: attendee.ticket_id,
            ticket_type: attendee.ticket_type,
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Check-in counts for one event, derived from the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInSummary {
    /// Number of attendee records
    pub total_tickets: usize,
    /// Records that have checked in
    pub checked_in: usize,
    /// `total_tickets - checked_in`
    pub pending: usize,
}

impl CheckInSummary {
    /// Computes the summary of a sequence of attendees
    pub fn of<'a>(attendees: impl IntoIterator<Item = &'a Attendee>) -> Self {
        let (total_tickets, checked_in) = attendees
            .into_iter()
            .fold((0, 0), |(total, checked_in), attendee| {
                (total + 1, checked_in + usize::from(attendee.is_checked_in()))
            });
        Self {
            total_tickets,
            checked_in,
            pending: total_tickets - checked_in,
        }
    }

    /// Percentage of tickets checked in, rounded to the nearest integer
    ///
    /// Returns 0 for an empty roster.
    #[must_use]
    pub fn check_in_rate(&self) -> u32 {
        if self.total_tickets == 0 {
            return 0;
        }
        let rate = (self.checked_in * 200 + self.total_tickets) / (self.total_tickets * 2);
        u32::try_from(rate).unwrap_or(100)
    }
}

// ============================================================================
// Roster
// ============================================================================

/// Errors building a roster from attendee records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// Two records share an attendee id
    #[error("duplicate attendee id {0}")]
    DuplicateAttendee(AttendeeId),

    /// Two records share a ticket id
    #[error("duplicate ticket id {0}")]
    DuplicateTicket(TicketId),
}

/// State of one event's check-in ledger.
#[derive(Clone, Debug, Default)]
pub struct RosterState {
    /// Event the roster belongs to
    pub event_id: EventId,
    attendees: Vec<Attendee>,
    /// Incremented by every roster mutation
    pub revision: u64,
    /// Highest revision known to be in storage
    pub persisted_revision: u64,
    /// Outcome of the last command reduced
    pub last_outcome: Option<crate::reducer::CheckInOutcome>,
    /// Last persistence failure, cleared once a revision at least as new is saved
    pub last_persist_error: Option<PersistFailure>,
}

/// A roster snapshot that did not reach storage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistFailure {
    /// Revision of the unsaved snapshot
    pub revision: u64,
    /// Storage error message
    pub message: String,
}

impl RosterState {
    /// Creates an empty roster
    #[must_use]
    pub fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            ..Self::default()
        }
    }

    /// Creates a roster from existing records, keeping their order
    ///
    /// # Errors
    ///
    /// Returns [`RosterError`] if two records share an attendee id or a ticket id.
    pub fn from_attendees(event_id: EventId, attendees: Vec<Attendee>) -> Result<Self, RosterError> {
        let mut ids = HashSet::with_capacity(attendees.len());
        let mut tickets = HashSet::with_capacity(attendees.len());
        for attendee in &attendees {
            if !ids.insert(&attendee.id) {
                return Err(RosterError::DuplicateAttendee(attendee.id.clone()));
            }
            if !tickets.insert(&attendee.ticket_id) {
                return Err(RosterError::DuplicateTicket(attendee.ticket_id.clone()));
            }
        }
        Ok(Self {
            attendees,
            ..Self::new(event_id)
        })
    }

    /// All attendees in roster order
    #[must_use]
    pub fn attendees(&self) -> &[Attendee] {
        &self.attendees
    }

    /// Number of attendee records
    #[must_use]
    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    /// Whether the roster has no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    /// Looks up an attendee by ticket id
    #[must_use]
    pub fn by_ticket(&self, ticket_id: &TicketId) -> Option<&Attendee> {
        self.attendees.iter().find(|a| &a.ticket_id == ticket_id)
    }

    /// Looks up an attendee by record id
    #[must_use]
    pub fn get(&self, id: &AttendeeId) -> Option<&Attendee> {
        self.attendees.iter().find(|a| &a.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &AttendeeId) -> Option<&mut Attendee> {
        self.attendees.iter_mut().find(|a| &a.id == id)
    }

    pub(crate) fn push(&mut self, attendee: Attendee) {
        self.attendees.push(attendee);
    }

    /// First sequential ticket id past the roster size that is not taken
    ///
    /// Numbers below the roster size are never reused, even when free.
    #[must_use]
    pub fn next_ticket_id(&self) -> TicketId {
        (self.attendees.len() + 1..)
            .map(TicketId::sequential)
            .find(|candidate| self.by_ticket(candidate).is_none())
            .unwrap_or_else(|| TicketId::sequential(0))
    }

    /// Check-in counts computed from the current records
    #[must_use]
    pub fn summary(&self) -> CheckInSummary {
        CheckInSummary::of(&self.attendees)
    }

    /// Attendees whose name, email or ticket id contains `query`, ignoring case
    ///
    /// The iterator is lazy and `Clone`, so a view can be walked again
    /// without re-running the query. An empty query yields the whole roster.
    #[must_use]
    pub fn filter(&self, query: &str) -> RosterFilter<'_> {
        RosterFilter {
            attendees: self.attendees.iter(),
            needle: query.to_lowercase(),
        }
    }
}

/// Lazy filtered view over a roster, see [`RosterState::filter`].
#[derive(Clone, Debug)]
pub struct RosterFilter<'a> {
    attendees: std::slice::Iter<'a, Attendee>,
    needle: String,
}

impl<'a> Iterator for RosterFilter<'a> {
    type Item = &'a Attendee;

    fn next(&mut self) -> Option<Self::Item> {
        let needle = &self.needle;
        self.attendees.find(|attendee| attendee.matches_lowercase(needle))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.attendees.size_hint().1)
    }
}

impl std::iter::FusedIterator for RosterFilter<'_> {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 15, hour, minute, 0).unwrap()
    }

    fn roster() -> RosterState {
        RosterState::from_attendees(
            EventId::new("1"),
            vec![
                Attendee::new(
                    AttendeeId::new("1"),
                    "María González",
                    "maria@example.com",
                    TicketId::new("TKT-001"),
                    TicketType::General,
                )
                .checked_in_at(at(9, 15)),
                Attendee::new(
                    AttendeeId::new("2"),
                    "Carlos Rodríguez",
                    "carlos@example.com",
                    TicketId::new("TKT-002"),
                    TicketType::Vip,
                ),
                Attendee::new(
                    AttendeeId::new("3"),
                    "Ana Martínez",
                    "ana@example.com",
                    TicketId::new("TKT-003"),
                    TicketType::General,
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn check_in_is_one_way() {
        let mut attendee = Attendee::new(
            AttendeeId::new("9"),
            "Juan",
            "juan@example.com",
            TicketId::new("TKT-009"),
            TicketType::General,
        );
        assert_eq!(attendee.status(), CheckInStatus::Pending);
        assert!(attendee.check_in(at(10, 0)));
        assert!(!attendee.check_in(at(11, 0)));
        assert_eq!(attendee.checked_in_time(), Some(at(10, 0)));
        assert_eq!(attendee.status(), CheckInStatus::CheckedIn);
    }

    #[test]
    fn summary_is_derived_from_records() {
        let summary = roster().summary();
        assert_eq!(
            summary,
            CheckInSummary {
                total_tickets: 3,
                checked_in: 1,
                pending: 2
            }
        );
        assert_eq!(summary.check_in_rate(), 33);
    }

    #[test]
    fn check_in_rate_rounds_half_up_and_handles_empty() {
        let empty = CheckInSummary::of(&Vec::<Attendee>::new());
        assert_eq!(empty.check_in_rate(), 0);

        let half = CheckInSummary {
            total_tickets: 8,
            checked_in: 5,
            pending: 3,
        };
        // 62.5% rounds to 63
        assert_eq!(half.check_in_rate(), 63);

        let tech_conference = CheckInSummary {
            total_tickets: 245,
            checked_in: 180,
            pending: 65,
        };
        assert_eq!(tech_conference.check_in_rate(), 73);
    }

    #[test]
    fn duplicate_ticket_is_rejected() {
        let attendees = vec![
            Attendee::new(AttendeeId::new("1"), "A", "a@x", TicketId::new("TKT-001"), TicketType::General),
            Attendee::new(AttendeeId::new("2"), "B", "b@x", TicketId::new("TKT-001"), TicketType::General),
        ];
        assert_eq!(
            RosterState::from_attendees(EventId::new("1"), attendees).unwrap_err(),
            RosterError::DuplicateTicket(TicketId::new("TKT-001"))
        );
    }

    #[test]
    fn duplicate_attendee_is_rejected() {
        let attendees = vec![
            Attendee::new(AttendeeId::new("1"), "A", "a@x", TicketId::new("TKT-001"), TicketType::General),
            Attendee::new(AttendeeId::new("1"), "B", "b@x", TicketId::new("TKT-002"), TicketType::General),
        ];
        assert!(matches!(
            RosterState::from_attendees(EventId::new("1"), attendees),
            Err(RosterError::DuplicateAttendee(_))
        ));
    }

    #[test]
    fn empty_filter_returns_full_roster_in_order() {
        let roster = roster();
        let ids: Vec<_> = roster.filter("").map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn filter_matches_any_field_ignoring_case() {
        let roster = roster();
        let by_name: Vec<_> = roster.filter("GONZ").map(|a| a.id.as_str()).collect();
        assert_eq!(by_name, vec!["1"]);

        let by_email: Vec<_> = roster.filter("Carlos@Example").map(|a| a.id.as_str()).collect();
        assert_eq!(by_email, vec!["2"]);

        let by_ticket: Vec<_> = roster.filter("tkt-003").map(|a| a.id.as_str()).collect();
        assert_eq!(by_ticket, vec!["3"]);

        let shared: Vec<_> = roster.filter("example.com").map(|a| a.id.as_str()).collect();
        assert_eq!(shared, vec!["1", "2", "3"]);

        assert_eq!(roster.filter("nobody").count(), 0);
    }

    #[test]
    fn filter_is_restartable() {
        let roster = roster();
        let view = roster.filter("a");
        let first: Vec<_> = view.clone().collect();
        let second: Vec<_> = view.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn next_ticket_id_skips_taken_numbers() {
        let mut roster = roster();
        assert_eq!(roster.next_ticket_id(), TicketId::new("TKT-004"));
        roster.push(Attendee::new(
            AttendeeId::new("x"),
            "X",
            "x@x",
            TicketId::new("TKT-005"),
            TicketType::General,
        ));
        // len is 4, TKT-005 is taken
        assert_eq!(roster.next_ticket_id(), TicketId::new("TKT-006"));
    }

    #[test]
    fn attendee_json_uses_browser_roster_shape() {
        let attendee = roster().attendees()[0].clone();
        let json = serde_json::to_value(&attendee).unwrap();
        assert_eq!(json["ticketId"], "TKT-001");
        assert_eq!(json["ticketType"], "General");
        assert_eq!(json["checkedIn"], true);
        assert_eq!(json["checkedInAt"], "2024-02-15T09:15:00Z");
    }

    #[test]
    fn inconsistent_record_is_rejected() {
        let json = r#"{
            "id": "3",
            "name": "Ana Martínez",
            "email": "ana@example.com",
            "ticketId": "TKT-003",
            "ticketType": "General",
            "checkedIn": true,
            "checkedInAt": null
        }"#;
        assert!(serde_json::from_str::<Attendee>(json).is_err());
    }

    #[test]
    fn unknown_ticket_type_is_preserved() {
        let ticket_type: TicketType = serde_json::from_str("\"Early Bird\"").unwrap();
        assert_eq!(ticket_type, TicketType::Other("Early Bird".to_string()));
        assert_eq!(serde_json::to_string(&ticket_type).unwrap(), "\"Early Bird\"");
    }
}
