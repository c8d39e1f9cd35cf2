//! Check-in desk demo
//!
//! Walks through a morning at the door of the configured event:
//! - Scanning a pending ticket, the same ticket again, and an unknown ticket
//! - Scanning a deep-link QR payload
//! - A manual check-in from the roster, a walk-in registration
//! - Roster search, counts and CSV export
//!
//! Rosters are kept under `CHECKIN_DATA_DIR`, so running the demo twice
//! continues where the first run stopped.
//!
//! # Usage
//!
//! ```bash
//! CHECKIN_DATA_DIR=/tmp/checkin cargo run --bin strike-checkin
//! ```

use std::sync::Arc;
use strike_checkin::metrics::register_checkin_metrics;
use strike_checkin::qr::TicketPayload;
use strike_checkin::{
    CheckInDesk, Config, JsonFileStore, ManualCheckInResult, RegistrationResult, ScanResult,
    TicketId, TicketType, catalog,
};
use strike_events_core::environment::SystemClock;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| EnvFilter::new(strike_checkin::config::DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    register_checkin_metrics();
    tracing::info!(data_dir = %config.data_dir.display(), event_id = %config.event_id, "Starting check-in desk");

    let storage = Arc::new(JsonFileStore::new(&config.data_dir));
    let desk = CheckInDesk::new(storage, Arc::new(SystemClock), config.seed_catalog);
    let ledger = desk.ledger(&config.event_id).await?;

    println!("\n🎫 ============================================");
    match catalog::find(&config.event_id) {
        Some(event) => {
            println!("   Check-in: {}", event.title);
            println!("   {} • {} • {}", event.date, event.venue, event.display_price());
        },
        None => println!("   Check-in: event {}", config.event_id),
    }
    println!("============================================\n");

    print_summary("Before doors open", ledger.summary().await);

    // ========== Scanner ==========

    println!("📷 Scanner");
    for ticket in ["TKT-003", "TKT-003", "TKT-999"] {
        match ledger.scan(&TicketId::new(ticket)).await? {
            ScanResult::Success { attendee } => {
                println!("   ✓ {ticket}: welcome, {} ({})", attendee.name, attendee.ticket_type);
            },
            ScanResult::AlreadyCheckedIn { attendee } => {
                let at = attendee
                    .checked_in_time()
                    .map(|at| at.format("%H:%M").to_string())
                    .unwrap_or_default();
                println!("   ⚠ {ticket}: {} already checked in at {at}", attendee.name);
            },
            ScanResult::Invalid { ticket_id } => println!("   ✗ {ticket_id}: not a ticket for this event"),
        }
    }

    // ========== Walk-in ==========

    println!("\n📝 Walk-in registration");
    let walk_in = match ledger
        .register("Juan Pérez", "juan@example.com", TicketType::General)
        .await?
    {
        RegistrationResult::Registered { attendee } => {
            println!("   ✓ {} registered with ticket {}", attendee.name, attendee.ticket_id);
            Some(attendee)
        },
        RegistrationResult::Rejected { reason } => {
            println!("   ✗ registration rejected: {reason}");
            None
        },
    };

    if let Some(attendee) = &walk_in {
        let link = TicketPayload::deep_link(ledger.event_id(), &attendee.ticket_id);
        let result = ledger.scan_payload(&link).await?;
        println!("   📷 {link} → {}", result.label());
    }

    // ========== Roster ==========

    println!("\n👥 Roster search: \"mart\"");
    for attendee in ledger.filter_roster("mart").await {
        println!("   {} <{}> {} {:?}", attendee.name, attendee.email, attendee.ticket_id, attendee.status());
    }

    if let Some(pending) = ledger.roster().await.into_iter().find(|a| !a.is_checked_in()) {
        println!("\n🖐  Manual check-in");
        match ledger.manual_check_in(&pending.id).await? {
            ManualCheckInResult::Success { attendee, .. } => println!("   ✓ {} checked in", attendee.name),
            ManualCheckInResult::NotFound { attendee_id } => println!("   ✗ no attendee {attendee_id}"),
        }
    }

    println!();
    print_summary("Now", ledger.summary().await);

    println!("📄 Export\n{}", ledger.export_csv().await);

    Ok(())
}

fn print_summary(label: &str, summary: strike_checkin::CheckInSummary) {
    println!("📊 {label}");
    println!("   Total tickets: {}", summary.total_tickets);
    println!(
        "   Checked in:    {} ({}% of total)",
        summary.checked_in,
        summary.check_in_rate()
    );
    println!("   Pending:       {}\n", summary.pending);
}
