//! Configuration for the check-in desk.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::types::EventId;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default `tracing` filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,strike_checkin=debug";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one JSON file per event roster (`CHECKIN_DATA_DIR`)
    pub data_dir: PathBuf,
    /// Event the desk opens at startup (`CHECKIN_EVENT_ID`)
    pub event_id: EventId,
    /// Seed rosters from the demo catalog when nothing is stored (`CHECKIN_SEED_CATALOG`)
    pub seed_catalog: bool,
    /// `tracing` filter directives (`RUST_LOG`)
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            data_dir: lookup("CHECKIN_DATA_DIR")
                .filter(|s| !s.trim().is_empty())
                .map_or_else(|| PathBuf::from("./data"), PathBuf::from),
            event_id: lookup("CHECKIN_EVENT_ID")
                .filter(|s| !s.trim().is_empty())
                .map_or_else(|| EventId::new("1"), |s| EventId::new(s.trim())),
            seed_catalog: lookup("CHECKIN_SEED_CATALOG")
                .and_then(|s| parse_flag(&s))
                .unwrap_or(true),
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
