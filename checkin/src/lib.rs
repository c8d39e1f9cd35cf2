//! Strike Events attendee check-in
//!
//! The authoritative roster of attendees for an event, and the operations door
//! staff run against it: scan a ticket, check someone in by hand, search the
//! roster, read the counts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   Scan / ManualCheckIn / Register   ┌──────────────────┐
//! │ CheckInDesk  │ ──────────────────────────────────▶ │  CheckInLedger   │
//! │ (per event)  │                                     │  Store + Reducer │
//! └──────────────┘                                     └──────────────────┘
//!                                                               │ snapshot effect
//!                                                               ▼
//!                                                      ┌──────────────────┐
//!                                                      │   RosterWriter   │
//!                                                      │  KeyValueStore   │
//!                                                      └──────────────────┘
//! ```
//!
//! # Key Properties
//!
//! - **One lock per roster**: lookup and check-in happen under one write
//!   lock, so a ticket scanned twice at once is admitted once.
//! - **Derived counts**: [`CheckInSummary`] is recomputed from the roster on
//!   every read; there is no counter to drift.
//! - **One-way check-in**: `Pending → CheckedIn`, and the first timestamp is
//!   kept.
//! - **Surfaced write failures**: a roster that could not be saved is
//!   reported as [`LedgerError::Persistence`]; the check-in itself stands.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod desk;
pub mod error;
pub mod export;
pub mod ledger;
pub mod metrics;
pub mod persistence;
pub mod qr;
pub mod reducer;
pub mod types;

pub use config::Config;
pub use desk::CheckInDesk;
pub use error::{LedgerError, Result};
pub use ledger::CheckInLedger;
pub use persistence::JsonFileStore;
pub use reducer::{
    CheckInAction, CheckInEnvironment, CheckInOutcome, CheckInReducer, ManualCheckInResult,
    RegistrationResult, ScanResult,
};
pub use types::{
    Attendee, AttendeeId, CheckInStatus, CheckInSummary, EventId, PersistFailure, RosterState,
    TicketId, TicketType,
};
