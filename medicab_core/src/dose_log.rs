//! Append-only dose history.
//!
//! "Taken" entries are appended to a JSONL (JSON Lines) file with file
//! locking. At most one entry exists per reminder per calendar day.

use crate::session::{self, Session};
use crate::store::Store;
use crate::{DoseRecord, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the dose history inside the data directory
pub const DOSE_LOG_FILE: &str = "dose_history.jsonl";

/// Sink for dose records
pub trait DoseSink {
    /// Record a dose unless one already exists for the same reminder and day.
    /// Returns whether a new entry was written.
    fn record(&mut self, record: &DoseRecord) -> Result<bool>;
}

/// JSONL-based dose history with file locking
#[derive(Clone, Debug)]
pub struct DoseLog {
    path: PathBuf,
}

impl DoseLog {
    /// Dose history rooted in a data directory
    pub fn open(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DOSE_LOG_FILE))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record, skipping lines that fail to parse
    pub fn read_all(&self) -> Result<Vec<DoseRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;
        let records = parse_records(&file);
        file.unlock()?;

        let records = records?;
        tracing::debug!("Read {} dose records from {:?}", records.len(), self.path);
        Ok(records)
    }

    /// Ids of the reminders taken on `date`
    pub fn taken_on(&self, date: NaiveDate) -> Result<HashSet<u64>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.was_taken && r.notification_date == date)
            .map(|r| r.reminder_id)
            .collect())
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

fn parse_records(file: &File) -> Result<Vec<DoseRecord>> {
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DoseRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse dose record at line {}: {}", line_num + 1, e);
            }
        }
    }
    Ok(records)
}

impl DoseSink for DoseLog {
    fn record(&mut self, record: &DoseRecord) -> Result<bool> {
        self.ensure_parent_dir()?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        // Held across the duplicate check and the append
        file.lock_exclusive()?;

        let result = (|| -> Result<bool> {
            file.seek(SeekFrom::Start(0))?;
            let duplicate = parse_records(&file)?.iter().any(|existing| {
                existing.reminder_id == record.reminder_id
                    && existing.notification_date == record.notification_date
            });
            if duplicate {
                return Ok(false);
            }

            let mut line = serde_json::to_string(record)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
            file.flush()?;
            Ok(true)
        })();

        file.unlock()?;

        if let Ok(true) = result {
            tracing::debug!(
                "Recorded dose for reminder {} on {}",
                record.reminder_id,
                record.notification_date
            );
        }
        result
    }
}

/// Mark a reminder's dose as taken for the calendar day of `now`
///
/// The day is taken in `now`'s timezone. Returns false when the dose was
/// already recorded that day.
pub fn mark_reminder_taken<Tz: TimeZone, S: DoseSink>(
    store: &Store,
    sink: &mut S,
    session: Option<&Session>,
    reminder_id: u64,
    now: &DateTime<Tz>,
) -> Result<bool> {
    let user = session::require(session)?.user_id;

    let db = store.load()?;
    let reminder = db.reminder(user, reminder_id)?;

    let taken_at = now.with_timezone(&Utc);
    let record = DoseRecord {
        id: Uuid::new_v4(),
        reminder_id,
        user_id: user,
        medicine_id: reminder.medicine_id,
        notification_date: now.date_naive(),
        was_taken: true,
        taken_at: Some(taken_at),
        created_at: taken_at,
    };

    let written = sink.record(&record)?;
    if written {
        tracing::info!("User {} took dose for reminder {}", user, reminder_id);
    } else {
        tracing::info!(
            "Dose for reminder {} already recorded on {}",
            reminder_id,
            record.notification_date
        );
    }
    Ok(written)
}
