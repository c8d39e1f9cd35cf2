//! QR payload decoding.
//!
//! Tickets carry either a bare ticket id (`TKT-001`) or a deep link of the
//! form `strike-events://event/{event_id}/ticket/{ticket_id}`.

use crate::types::{EventId, TicketId};
use thiserror::Error;

/// URI scheme of ticket deep links
pub const SCHEME: &str = "strike-events://";

/// A decoded ticket payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketPayload {
    /// Event the ticket is for, when the payload names one
    pub event_id: Option<EventId>,
    /// The ticket id
    pub ticket_id: TicketId,
}

impl TicketPayload {
    /// Deep link encoding of a ticket, as printed in its QR code
    #[must_use]
    pub fn deep_link(event_id: &EventId, ticket_id: &TicketId) -> String {
        format!("{SCHEME}event/{event_id}/ticket/{ticket_id}")
    }

    /// Whether this ticket may be used at `event_id`
    ///
    /// Bare ticket ids carry no event and are accepted anywhere.
    #[must_use]
    pub fn is_for(&self, event_id: &EventId) -> bool {
        self.event_id.as_ref().is_none_or(|id| id == event_id)
    }
}

/// Reasons a payload could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QrError {
    /// Nothing but whitespace was read
    #[error("empty QR payload")]
    Empty,

    /// A URI with a scheme other than `strike-events://`
    #[error("unsupported QR payload scheme in {0:?}")]
    UnsupportedScheme(String),

    /// A `strike-events://` link that is not `event/{id}/ticket/{id}`
    #[error("malformed ticket link {0:?}")]
    MalformedPath(String),
}

/// Decodes a raw QR payload
///
/// # Errors
///
/// Returns [`QrError`] if the payload is empty, uses another URI scheme, or is
/// a malformed ticket link.
pub fn decode(payload: &str) -> Result<TicketPayload, QrError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(QrError::Empty);
    }

    let Some(path) = payload.strip_prefix(SCHEME) else {
        if payload.contains("://") {
            return Err(QrError::UnsupportedScheme(payload.to_string()));
        }
        return Ok(TicketPayload {
            event_id: None,
            ticket_id: TicketId::new(payload),
        });
    };

    let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
    match segments.as_slice() {
        ["event", event_id, "ticket", ticket_id] if !event_id.is_empty() && !ticket_id.is_empty() => {
            Ok(TicketPayload {
                event_id: Some(EventId::new(*event_id)),
                ticket_id: TicketId::new(*ticket_id),
            })
        },
        _ => Err(QrError::MalformedPath(payload.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bare_ticket_id() {
        let payload = decode("  TKT-001\n").unwrap();
        assert_eq!(payload.ticket_id, TicketId::new("TKT-001"));
        assert!(payload.event_id.is_none());
        assert!(payload.is_for(&EventId::new("2")));
    }

    #[test]
    fn deep_link() {
        let payload = decode("strike-events://event/1/ticket/TKT-004").unwrap();
        assert_eq!(payload.event_id, Some(EventId::new("1")));
        assert_eq!(payload.ticket_id, TicketId::new("TKT-004"));
        assert!(payload.is_for(&EventId::new("1")));
        assert!(!payload.is_for(&EventId::new("2")));
    }

    #[test]
    fn deep_link_round_trip() {
        let link = TicketPayload::deep_link(&EventId::new("3"), &TicketId::new("TKT-010"));
        assert_eq!(link, "strike-events://event/3/ticket/TKT-010");
        assert_eq!(decode(&link).unwrap().ticket_id, TicketId::new("TKT-010"));
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        assert!(decode("strike-events://event/1/ticket/TKT-001/").is_ok());
    }

    #[test]
    fn rejects_bad_payloads() {
        assert_eq!(decode("   "), Err(QrError::Empty));
        assert!(matches!(decode("https://example.com/t/1"), Err(QrError::UnsupportedScheme(_))));
        assert!(matches!(decode("strike-events://event/1"), Err(QrError::MalformedPath(_))));
        assert!(matches!(decode("strike-events://event//ticket/TKT-1"), Err(QrError::MalformedPath(_))));
        assert!(matches!(
            decode("strike-events://event/1/ticket/TKT-1/extra"),
            Err(QrError::MalformedPath(_))
        ));
        assert!(matches!(decode("strike-events://show/1/ticket/TKT-1"), Err(QrError::MalformedPath(_))));
    }
}
