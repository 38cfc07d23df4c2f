//! Boundary validation for user-entered medicines and reminders.
//!
//! Raw input structs are checked once here and turned into typed drafts;
//! the store and the computation modules only ever see validated values.
//! The first failing field produces the error.

use crate::{DayMask, Error, Result, TimeOfDay};
use chrono::NaiveDate;

pub const NAME_MAX_CHARS: usize = 255;
pub const DOSAGE_MAX_CHARS: usize = 100;
pub const FREQUENCY_MAX_CHARS: usize = 100;
pub const NOTES_MAX_CHARS: usize = 500;

/// Stock assigned when the user does not enter one
pub const DEFAULT_STOCK: u32 = 1;

/// Medicine fields as entered by the user
#[derive(Clone, Debug, Default)]
pub struct MedicineInput {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub expiry_date: String,
    pub stock: Option<i64>,
    pub notes: Option<String>,
}

/// A validated medicine ready to be stored
#[derive(Clone, Debug, PartialEq)]
pub struct NewMedicine {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub expiry_date: NaiveDate,
    pub stock: u32,
    pub notes: Option<String>,
}

/// Partial medicine edit; `Some("")` on an optional field clears it
#[derive(Clone, Debug, Default)]
pub struct MedicineEdit {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub expiry_date: Option<String>,
    pub notes: Option<String>,
}

/// A validated medicine edit. Outer None leaves the field unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MedicineChanges {
    pub name: Option<String>,
    pub dosage: Option<Option<String>>,
    pub frequency: Option<Option<String>>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<Option<String>>,
}

impl MedicineChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reminder fields as entered by the user
#[derive(Clone, Debug, Default)]
pub struct ReminderInput {
    pub medicine_id: i64,
    pub time_of_day: String,
    pub days_of_week: String,
}

/// A validated reminder schedule ready to be stored
#[derive(Clone, Debug, PartialEq)]
pub struct NewReminder {
    pub medicine_id: u64,
    pub time_of_day: TimeOfDay,
    pub days_of_week: DayMask,
}

impl MedicineInput {
    pub fn validate(self) -> Result<NewMedicine> {
        let name = validate_name(&self.name)?;
        let dosage = optional_text(self.dosage, "Dosage", DOSAGE_MAX_CHARS)?;
        let frequency = optional_text(self.frequency, "Frequency", FREQUENCY_MAX_CHARS)?;
        let expiry_date = parse_expiry_date(&self.expiry_date)?;

        let stock = match self.stock {
            None => DEFAULT_STOCK,
            Some(stock) if stock < 1 => {
                return Err(Error::Validation("Stock must be at least 1".into()))
            }
            Some(stock) => u32::try_from(stock)
                .map_err(|_| Error::Validation(format!("Stock {stock} is too large")))?,
        };

        let notes = optional_text(self.notes, "Notes", NOTES_MAX_CHARS)?;

        Ok(NewMedicine {
            name,
            dosage,
            frequency,
            expiry_date,
            stock,
            notes,
        })
    }
}

impl MedicineEdit {
    pub fn validate(self) -> Result<MedicineChanges> {
        let name = self.name.as_deref().map(validate_name).transpose()?;
        let dosage = self
            .dosage
            .map(|v| optional_text(Some(v), "Dosage", DOSAGE_MAX_CHARS))
            .transpose()?;
        let frequency = self
            .frequency
            .map(|v| optional_text(Some(v), "Frequency", FREQUENCY_MAX_CHARS))
            .transpose()?;
        let expiry_date = self
            .expiry_date
            .as_deref()
            .map(parse_expiry_date)
            .transpose()?;
        let notes = self
            .notes
            .map(|v| optional_text(Some(v), "Notes", NOTES_MAX_CHARS))
            .transpose()?;

        Ok(MedicineChanges {
            name,
            dosage,
            frequency,
            expiry_date,
            notes,
        })
    }
}

impl ReminderInput {
    pub fn validate(self) -> Result<NewReminder> {
        let medicine_id = u64::try_from(self.medicine_id)
            .ok()
            .filter(|&id| id > 0)
            .ok_or_else(|| Error::Validation("Select a medicine first".into()))?;

        let time_of_day: TimeOfDay = self.time_of_day.trim().parse()?;

        let days_of_week: DayMask = self.days_of_week.trim().parse()?;
        if days_of_week.is_empty() {
            return Err(Error::Validation("Select at least one day".into()));
        }

        Ok(NewReminder {
            medicine_id,
            time_of_day,
            days_of_week,
        })
    }
}

/// Validate a stock update; zero is allowed, negatives are not
pub fn validate_stock(stock: i64) -> Result<u32> {
    if stock < 0 {
        return Err(Error::Validation("Stock cannot be negative".into()));
    }
    u32::try_from(stock).map_err(|_| Error::Validation(format!("Stock {stock} is too large")))
}

/// Parse an ISO-8601 calendar date, exactly `YYYY-MM-DD` with zero padding
pub fn parse_expiry_date(s: &str) -> Result<NaiveDate> {
    let invalid = || Error::Validation(format!("Invalid expiry date: {:?}", s));

    let trimmed = s.trim();
    let well_formed = trimmed.len() == 10
        && trimmed.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Medicine name is required".into()));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(Error::Validation(format!(
            "Medicine name must be at most {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// Trim an optional field, mapping empty to None and enforcing a length cap
fn optional_text(value: Option<String>, field: &str, max_chars: usize) -> Result<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };

    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.chars().count() > max_chars {
        return Err(Error::Validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(Some(value.to_string()))
}
