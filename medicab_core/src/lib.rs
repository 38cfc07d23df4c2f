#![forbid(unsafe_code)]

//! Core domain model and business logic for the Medicab medicine cabinet.
//!
//! This crate provides:
//! - Domain types (medicines, reminder schedules, dose records)
//! - Expiry classification
//! - Weekly reminder recurrence
//! - Input validation
//! - Persistence (JSON store, JSONL dose history)
//! - Listings enriched with computed fields

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod session;
pub mod validation;
pub mod expiry;
pub mod recurrence;
pub mod store;
pub mod dose_log;
pub mod listing;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use session::Session;
pub use expiry::{classify, ExpiryClassification, EXPIRY_WINDOW_DAYS};
pub use recurrence::{format_active_days, mask_from_selection, next_occurrence};
pub use store::{Database, Store};
pub use dose_log::{mark_reminder_taken, DoseLog, DoseSink};
pub use listing::{list_medicines, list_reminders};
