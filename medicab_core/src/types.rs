//! Core domain types for the medicine cabinet.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medicines and their derived expiry view
//! - Reminder schedules (time of day + weekly day mask)
//! - Dose history records
//!
//! Persisted records are plain serde structs. Views are derived on every
//! read and never written back.

use crate::Error;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of an authenticated user
pub type UserId = u64;

// ============================================================================
// Display Language
// ============================================================================

/// Language used for human-readable labels
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Bahasa Indonesia
    #[default]
    Id,
    /// English
    En,
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" | "indonesian" => Ok(Self::Id),
            "en" | "english" => Ok(Self::En),
            other => Err(Error::Config(format!("unknown language: {other}"))),
        }
    }
}

// ============================================================================
// Medicine Types
// ============================================================================

/// A medicine in a user's cabinet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: u64,
    pub user_id: UserId,
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub expiry_date: NaiveDate,
    pub stock: u32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Expiry status of a medicine relative to a reference date
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryStatus {
    Safe,
    Expiring,
    Expired,
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Expiring => write!(f, "expiring"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// A medicine together with its expiry classification
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedicineView {
    pub id: u64,
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub expiry_date: NaiveDate,
    pub stock: u32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: ExpiryStatus,
    #[serde(rename = "daysUntilExpiry")]
    pub days_until_expiry: i64,
}

// ============================================================================
// Schedule Types
// ============================================================================

/// Wall-clock time with minute granularity, rendered as `HH:MM`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Build a time of day, returning None when out of range
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    /// Accepts `H:MM` or `HH:MM`, hour 0-23, minute 00-59.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Validation("Time must be in HH:MM format".into());

        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(h) || !all_digits(m) || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }

        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Weekly recurrence mask, index 0 = Monday ... index 6 = Sunday
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayMask([bool; 7]);

impl DayMask {
    pub const EMPTY: DayMask = DayMask([false; 7]);
    pub const EVERY_DAY: DayMask = DayMask([true; 7]);
    pub const WEEKDAYS: DayMask = DayMask([true, true, true, true, true, false, false]);

    pub fn from_selection(days: [bool; 7]) -> Self {
        Self(days)
    }

    pub fn days(&self) -> [bool; 7] {
        self.0
    }

    /// Whether the given weekday is part of the schedule
    pub fn is_active(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_monday() as usize]
    }

    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|&&d| d).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}

impl FromStr for DayMask {
    type Err = Error;

    /// Parses exactly seven `0`/`1` characters, Monday first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 7 {
            return Err(Error::Validation(
                "Days of week must be exactly 7 characters of 0 or 1".into(),
            ));
        }

        let mut days = [false; 7];
        for (slot, ch) in days.iter_mut().zip(s.chars()) {
            *slot = match ch {
                '1' => true,
                '0' => false,
                other => {
                    return Err(Error::Validation(format!(
                        "Invalid day flag '{other}', expected 0 or 1"
                    )))
                }
            };
        }
        Ok(Self(days))
    }
}

impl fmt::Display for DayMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &day in &self.0 {
            f.write_str(if day { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl TryFrom<String> for DayMask {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayMask> for String {
    fn from(value: DayMask) -> Self {
        value.to_string()
    }
}

// ============================================================================
// Reminder Types
// ============================================================================

/// A recurring dose reminder for one medicine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub id: u64,
    pub user_id: UserId,
    pub medicine_id: u64,
    pub time_of_day: TimeOfDay,
    pub days_of_week: DayMask,
    pub is_active: bool,
    #[serde(default)]
    pub notification_sent_today: bool,
    #[serde(default)]
    pub last_notification_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reminder joined with its medicine and computed schedule fields
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReminderView {
    pub id: u64,
    pub medicine_id: u64,
    pub time_of_day: TimeOfDay,
    pub days_of_week: DayMask,
    pub is_active: bool,
    pub notification_sent_today: bool,
    pub last_notification_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub medicine: MedicineView,
    #[serde(rename = "daysLabel")]
    pub days_label: String,
    #[serde(rename = "nextReminderTime")]
    pub next_reminder_time: Option<DateTime<FixedOffset>>,
    #[serde(rename = "isOverdue")]
    pub is_overdue: bool,
}

/// One "dose taken" entry in the append-only history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseRecord {
    pub id: Uuid,
    pub reminder_id: u64,
    pub user_id: UserId,
    pub medicine_id: u64,
    pub notification_date: NaiveDate,
    pub was_taken: bool,
    pub taken_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
