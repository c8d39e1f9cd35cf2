//! Built-in event catalog and demo rosters.
//!
//! The catalog is static: three demo events used by the desk to seed rosters
//! and by the binary to show something useful on a fresh data directory.

use crate::types::{Attendee, AttendeeId, EventId, TicketId, TicketType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// One event in the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogEvent {
    /// Event id, also the roster key suffix
    pub id: &'static str,
    /// Title shown to attendees
    pub title: &'static str,
    /// Day of the event (`YYYY-MM-DD`)
    pub date: &'static str,
    /// Doors open (`HH:MM`, local time)
    pub time: &'static str,
    /// Venue name
    pub venue: &'static str,
    /// City
    pub city: &'static str,
    /// Category label
    pub category: &'static str,
    /// Ticket price in whole currency units; 0 for free events
    pub price: u64,
    /// ISO 4217 currency code
    pub currency: &'static str,
    /// Maximum number of attendees
    pub capacity: u32,
    /// Organizer name
    pub organizer: &'static str,
}

impl CatalogEvent {
    /// Event id as an [`EventId`]
    #[must_use]
    pub fn event_id(&self) -> EventId {
        EventId::new(self.id)
    }

    /// Parsed event date
    #[must_use]
    pub fn day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date, "%Y-%m-%d").ok()
    }

    /// Whether tickets are free
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.price == 0
    }

    /// Price as shown on the event card: `Gratis` or `$150.000 COP`
    #[must_use]
    pub fn display_price(&self) -> String {
        if self.is_free() {
            return "Gratis".to_string();
        }
        let digits = self.price.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, digit) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(digit);
        }
        format!("${grouped} {}", self.currency)
    }

    fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.city.to_lowercase().contains(needle)
            || self.category.to_lowercase().contains(needle)
    }
}

static EVENTS: [CatalogEvent; 3] = [
    CatalogEvent {
        id: "1",
        title: "Conferencia Tech Bogotá 2024",
        date: "2024-02-15",
        time: "09:00",
        venue: "Centro de Convenciones Ágora",
        city: "Bogotá",
        category: "Tecnología",
        price: 150_000,
        currency: "COP",
        capacity: 500,
        organizer: "TechColombia",
    },
    CatalogEvent {
        id: "2",
        title: "Meetup React Medellín - Gratis",
        date: "2024-02-20",
        time: "18:00",
        venue: "Ruta N",
        city: "Medellín",
        category: "Tecnología",
        price: 0,
        currency: "COP",
        capacity: 120,
        organizer: "React Medellín",
    },
    CatalogEvent {
        id: "3",
        title: "Workshop Node.js Avanzado",
        date: "2024-02-25",
        time: "08:00",
        venue: "Universidad EAFIT",
        city: "Medellín",
        category: "Educación",
        price: 280_000,
        currency: "COP",
        capacity: 30,
        organizer: "DevEducation",
    },
];

/// All catalog events, in catalog order
#[must_use]
pub fn events() -> &'static [CatalogEvent] {
    &EVENTS
}

/// Looks up an event by id
#[must_use]
pub fn find(event_id: &EventId) -> Option<&'static CatalogEvent> {
    EVENTS.iter().find(|event| event.id == event_id.as_str())
}

/// Events whose title, city or category contains `query`, ignoring case
pub fn search(query: &str) -> impl Iterator<Item = &'static CatalogEvent> + Clone {
    let needle = query.trim().to_lowercase();
    EVENTS.iter().filter(move |event| event.matches_lowercase(&needle))
}

/// Demo roster for an event: three attendees for event `1`, empty otherwise
#[must_use]
pub fn seed_roster(event_id: &EventId) -> Vec<Attendee> {
    if event_id.as_str() != "1" {
        return Vec::new();
    }

    let at = |rfc3339: &str| {
        DateTime::parse_from_rfc3339(rfc3339)
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_default()
    };

    vec![
        Attendee::new(
            AttendeeId::new("1"),
            "María González",
            "maria@example.com",
            TicketId::new("TKT-001"),
            TicketType::General,
        )
        .checked_in_at(at("2024-02-15T09:15:00Z")),
        Attendee::new(
            AttendeeId::new("2"),
            "Carlos Rodríguez",
            "carlos@example.com",
            TicketId::new("TKT-002"),
            TicketType::Vip,
        )
        .checked_in_at(at("2024-02-15T09:22:00Z")),
        Attendee::new(
            AttendeeId::new("3"),
            "Ana Martínez",
            "ana@example.com",
            TicketId::new("TKT-003"),
            TicketType::General,
        ),
    ]
}
