//! Check-in metrics.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `checkin_scans_total{outcome}` - Ticket scans by outcome (success, already_checked_in, invalid)
//! - `checkin_manual_total{outcome}` - Manual check-ins by outcome (checked_in, already_checked_in, not_found)
//! - `checkin_registrations_total{outcome}` - Registrations by outcome (registered, rejected)
//! - `checkin_persist_failures_total` - Roster snapshots that could not be written
//!
//! No recorder is installed by this crate; without one the macros are no-ops.

use metrics::describe_counter;

/// Register descriptions for all check-in metrics.
///
/// Call once at startup, before any metric is recorded.
pub fn register_checkin_metrics() {
    describe_counter!(
        "checkin_scans_total",
        "Total ticket scans by outcome (success, already_checked_in, invalid)"
    );
    describe_counter!(
        "checkin_manual_total",
        "Total manual check-ins by outcome (checked_in, already_checked_in, not_found)"
    );
    describe_counter!(
        "checkin_registrations_total",
        "Total attendee registrations by outcome (registered, rejected)"
    );
    describe_counter!(
        "checkin_persist_failures_total",
        "Total roster snapshots that failed to reach storage"
    );

    tracing::info!("Check-in metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a ticket scan.
pub fn record_scan(outcome: &'static str) {
    metrics::counter!("checkin_scans_total", "outcome" => outcome).increment(1);
}

/// Record a manual check-in.
pub fn record_manual(outcome: &'static str) {
    metrics::counter!("checkin_manual_total", "outcome" => outcome).increment(1);
}

/// Record a registration attempt.
pub fn record_registration(outcome: &'static str) {
    metrics::counter!("checkin_registrations_total", "outcome" => outcome).increment(1);
}

/// Record a failed roster write.
pub fn record_persist_failure() {
    metrics::counter!("checkin_persist_failures_total").increment(1);
}
