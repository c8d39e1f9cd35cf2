//! CSV export of a roster.

use crate::types::{Attendee, CheckInStatus};
use std::borrow::Cow;
use std::fmt::Write;

/// Header row of the export
pub const CSV_HEADER: &str = "id,name,email,ticket_id,ticket_type,status,checked_in_at";

/// Renders attendees as CSV, one row per attendee in the given order
#[must_use]
pub fn roster_csv<'a>(attendees: impl IntoIterator<Item = &'a Attendee>) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for attendee in attendees {
        let status = match attendee.status() {
            CheckInStatus::Pending => "pending",
            CheckInStatus::CheckedIn => "checked_in",
        };
        let checked_in_at = attendee
            .checked_in_time()
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{}",
            escape(attendee.id.as_str()),
            escape(&attendee.name),
            escape(&attendee.email),
            escape(attendee.ticket_id.as_str()),
            escape(&attendee.ticket_type.to_string()),
            status,
            checked_in_at,
        );
    }
    out
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
