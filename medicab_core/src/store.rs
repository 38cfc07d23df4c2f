//! File-backed medicine and reminder store.
//!
//! All records live in one JSON document. Readers take a shared lock and
//! writers an exclusive lock on a sidecar lock file; writes go to a temp
//! file in the same directory and are renamed over the original.

use crate::session::{self, Session};
use crate::validation::{MedicineChanges, NewMedicine, NewReminder};
use crate::{Error, Medicine, Reminder, Result, UserId};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the store document inside the data directory
pub const STORE_FILE: &str = "medicab.json";

/// In-memory image of the store document
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Database {
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    last_medicine_id: u64,
    #[serde(default)]
    last_reminder_id: u64,
}

impl Database {
    /// Raise the id counters to at least the largest stored id
    ///
    /// Documents written without counters would otherwise hand out ids
    /// that are already taken.
    fn sync_counters(&mut self) {
        let max_medicine = self.medicines.iter().map(|m| m.id).max().unwrap_or(0);
        let max_reminder = self.reminders.iter().map(|r| r.id).max().unwrap_or(0);
        self.last_medicine_id = self.last_medicine_id.max(max_medicine);
        self.last_reminder_id = self.last_reminder_id.max(max_reminder);
    }

    /// All medicines owned by `user`, in insertion order
    pub fn medicines_for(&self, user: UserId) -> impl Iterator<Item = &Medicine> {
        self.medicines.iter().filter(move |m| m.user_id == user)
    }

    /// Look up a medicine, distinguishing missing from foreign
    pub fn medicine(&self, user: UserId, id: u64) -> Result<&Medicine> {
        let medicine = self
            .medicines
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("Medicine {id} not found")))?;

        if medicine.user_id != user {
            return Err(Error::Forbidden(format!(
                "Medicine {id} belongs to another user"
            )));
        }
        Ok(medicine)
    }

    fn medicine_mut(&mut self, user: UserId, id: u64) -> Result<&mut Medicine> {
        self.medicine(user, id)?;
        self.medicines
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("Medicine {id} not found")))
    }

    pub fn add_medicine(&mut self, user: UserId, new: NewMedicine, now: DateTime<Utc>) -> Medicine {
        self.last_medicine_id += 1;
        let medicine = Medicine {
            id: self.last_medicine_id,
            user_id: user,
            name: new.name,
            dosage: new.dosage,
            frequency: new.frequency,
            expiry_date: new.expiry_date,
            stock: new.stock,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        self.medicines.push(medicine.clone());
        medicine
    }

    pub fn edit_medicine(
        &mut self,
        user: UserId,
        id: u64,
        changes: MedicineChanges,
        now: DateTime<Utc>,
    ) -> Result<Medicine> {
        let medicine = self.medicine_mut(user, id)?;

        if let Some(name) = changes.name {
            medicine.name = name;
        }
        if let Some(dosage) = changes.dosage {
            medicine.dosage = dosage;
        }
        if let Some(frequency) = changes.frequency {
            medicine.frequency = frequency;
        }
        if let Some(expiry_date) = changes.expiry_date {
            medicine.expiry_date = expiry_date;
        }
        if let Some(notes) = changes.notes {
            medicine.notes = notes;
        }
        medicine.updated_at = now;

        Ok(medicine.clone())
    }

    pub fn set_stock(
        &mut self,
        user: UserId,
        id: u64,
        stock: u32,
        now: DateTime<Utc>,
    ) -> Result<Medicine> {
        let medicine = self.medicine_mut(user, id)?;
        medicine.stock = stock;
        medicine.updated_at = now;
        Ok(medicine.clone())
    }

    /// Delete a medicine and the reminders that reference it
    ///
    /// Returns the number of reminders removed alongside it.
    pub fn remove_medicine(&mut self, user: UserId, id: u64) -> Result<usize> {
        self.medicine(user, id)?;
        self.medicines.retain(|m| m.id != id);

        let before = self.reminders.len();
        self.reminders.retain(|r| r.medicine_id != id);
        Ok(before - self.reminders.len())
    }

    /// Look up a reminder; foreign reminders are reported as missing
    pub fn reminder(&self, user: UserId, id: u64) -> Result<&Reminder> {
        self.reminders
            .iter()
            .find(|r| r.id == id && r.user_id == user)
            .ok_or_else(|| Error::NotFound(format!("Reminder {id} not found")))
    }

    pub fn add_reminder(
        &mut self,
        user: UserId,
        new: NewReminder,
        now: DateTime<Utc>,
    ) -> Result<Reminder> {
        // A foreign medicine is indistinguishable from a missing one here
        if self.medicine(user, new.medicine_id).is_err() {
            return Err(Error::NotFound(format!(
                "Medicine {} not found",
                new.medicine_id
            )));
        }

        self.last_reminder_id += 1;
        let reminder = Reminder {
            id: self.last_reminder_id,
            user_id: user,
            medicine_id: new.medicine_id,
            time_of_day: new.time_of_day,
            days_of_week: new.days_of_week,
            is_active: true,
            notification_sent_today: false,
            last_notification_at: None,
            created_at: now,
            updated_at: now,
        };
        self.reminders.push(reminder.clone());
        Ok(reminder)
    }

    pub fn set_reminder_active(
        &mut self,
        user: UserId,
        id: u64,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Reminder> {
        let reminder = self
            .reminders
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user)
            .ok_or_else(|| Error::NotFound(format!("Reminder {id} not found")))?;

        reminder.is_active = active;
        reminder.updated_at = now;
        Ok(reminder.clone())
    }

    pub fn remove_reminder(&mut self, user: UserId, id: u64) -> Result<()> {
        self.reminder(user, id)?;
        self.reminders.retain(|r| r.id != id);
        Ok(())
    }

    /// Active reminders of `user` joined with their medicine
    ///
    /// Reminders whose medicine is missing are skipped, as an inner join would.
    pub fn active_reminders_for(&self, user: UserId) -> Vec<(&Reminder, &Medicine)> {
        self.reminders
            .iter()
            .filter(|r| r.user_id == user && r.is_active)
            .filter_map(|r| {
                self.medicines
                    .iter()
                    .find(|m| m.id == r.medicine_id)
                    .map(|m| (r, m))
            })
            .collect()
    }
}

/// Handle on the store document in a data directory
#[derive(Clone, Debug)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Store rooted in a data directory
    pub fn open(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STORE_FILE))
    }

    /// Store at an explicit document path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Open (creating if needed) the lock file and take a lock on it
    fn lock(&self, exclusive: bool) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;

        if exclusive {
            file.lock_exclusive()?;
        } else {
            file.lock_shared()?;
        }
        Ok(file)
    }

    /// Load a snapshot of the whole store
    ///
    /// A missing document is an empty store. An unparseable one is an error,
    /// so that a later save can never silently discard records.
    pub fn load(&self) -> Result<Database> {
        if !self.path.exists() {
            tracing::debug!("No store file at {:?}, starting empty", self.path);
            return Ok(Database::default());
        }

        let lock = self.lock(false)?;
        let result = self.read_unlocked();
        lock.unlock()?;
        result
    }

    fn read_unlocked(&self) -> Result<Database> {
        if !self.path.exists() {
            return Ok(Database::default());
        }

        let mut contents = String::new();
        File::open(&self.path)?.read_to_string(&mut contents)?;

        let mut db = serde_json::from_str::<Database>(&contents).map_err(|e| {
            tracing::error!("Failed to parse store file {:?}: {}", self.path, e);
            Error::Store(format!("Corrupted store file {:?}: {}", self.path, e))
        })?;
        db.sync_counters();

        tracing::debug!(
            "Loaded {} medicines and {} reminders from {:?}",
            db.medicines.len(),
            db.reminders.len(),
            self.path
        );
        Ok(db)
    }

    fn write_unlocked(&self, db: &Database) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
        })?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(db)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved store to {:?}", self.path);
        Ok(())
    }

    /// Load, modify and save the store under one exclusive lock
    ///
    /// Nothing is written when `f` fails.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T>,
    {
        let lock = self.lock(true)?;

        let result = self.read_unlocked().and_then(|mut db| {
            let value = f(&mut db)?;
            self.write_unlocked(&db)?;
            Ok(value)
        });

        lock.unlock()?;
        result
    }

    pub fn add_medicine(
        &self,
        session: Option<&Session>,
        new: NewMedicine,
        now: DateTime<Utc>,
    ) -> Result<Medicine> {
        let user = session::require(session)?.user_id;
        let medicine = self.update(|db| Ok(db.add_medicine(user, new, now)))?;
        tracing::info!("User {} added medicine {} ({})", user, medicine.id, medicine.name);
        Ok(medicine)
    }

    pub fn edit_medicine(
        &self,
        session: Option<&Session>,
        id: u64,
        changes: MedicineChanges,
        now: DateTime<Utc>,
    ) -> Result<Medicine> {
        let user = session::require(session)?.user_id;
        let medicine = self.update(|db| db.edit_medicine(user, id, changes, now))?;
        tracing::info!("User {} edited medicine {}", user, id);
        Ok(medicine)
    }

    pub fn update_medicine_stock(
        &self,
        session: Option<&Session>,
        id: u64,
        stock: u32,
        now: DateTime<Utc>,
    ) -> Result<Medicine> {
        let user = session::require(session)?.user_id;
        let medicine = self.update(|db| db.set_stock(user, id, stock, now))?;
        tracing::info!("User {} set stock of medicine {} to {}", user, id, stock);
        Ok(medicine)
    }

    pub fn delete_medicine(&self, session: Option<&Session>, id: u64) -> Result<usize> {
        let user = session::require(session)?.user_id;
        let removed = self.update(|db| db.remove_medicine(user, id))?;
        tracing::info!(
            "User {} deleted medicine {} ({} reminders removed)",
            user,
            id,
            removed
        );
        Ok(removed)
    }

    pub fn create_reminder(
        &self,
        session: Option<&Session>,
        new: NewReminder,
        now: DateTime<Utc>,
    ) -> Result<Reminder> {
        let user = session::require(session)?.user_id;
        let reminder = self.update(|db| db.add_reminder(user, new, now))?;
        tracing::info!(
            "User {} created reminder {} at {} on {}",
            user,
            reminder.id,
            reminder.time_of_day,
            reminder.days_of_week
        );
        Ok(reminder)
    }

    pub fn set_reminder_active(
        &self,
        session: Option<&Session>,
        id: u64,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Reminder> {
        let user = session::require(session)?.user_id;
        let reminder = self.update(|db| db.set_reminder_active(user, id, active, now))?;
        tracing::info!("User {} set reminder {} active={}", user, id, active);
        Ok(reminder)
    }

    pub fn delete_reminder(&self, session: Option<&Session>, id: u64) -> Result<()> {
        let user = session::require(session)?.user_id;
        self.update(|db| db.remove_reminder(user, id))?;
        tracing::info!("User {} deleted reminder {}", user, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{MedicineEdit, MedicineInput, ReminderInput};
    use chrono::NaiveDate;

    fn new_medicine(name: &str, expiry: &str) -> NewMedicine {
        MedicineInput {
            name: name.into(),
            expiry_date: expiry.into(),
            stock: Some(10),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn new_reminder(medicine_id: u64, time: &str, days: &str) -> NewReminder {
        ReminderInput {
            medicine_id: medicine_id as i64,
            time_of_day: time.into(),
            days_of_week: days.into(),
        }
        .validate()
        .unwrap()
    }

    fn test_store() -> (tempfile::TempDir, Store) {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path());
        (temp_dir, store)
    }

    #[test]
    fn test_load_nonexistent_returns_empty() {
        let (_dir, store) = test_store();
        let db = store.load().unwrap();
        assert!(db.medicines.is_empty());
        assert!(db.reminders.is_empty());
    }

    #[test]
    fn test_add_and_reload_medicine() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);
        let now = Utc::now();

        let added = store
            .add_medicine(Some(&alice), new_medicine("Ibuprofen", "2025-05-01"), now)
            .unwrap();
        assert_eq!(added.id, 1);
        assert_eq!(added.created_at, now);

        let db = store.load().unwrap();
        let loaded = db.medicine(1, added.id).unwrap();
        assert_eq!(loaded, &added);
        assert_eq!(
            loaded.expiry_date,
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
        );
    }

    #[test]
    fn test_ids_are_never_reused() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);
        let now = Utc::now();

        let first = store
            .add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), now)
            .unwrap();
        store.delete_medicine(Some(&alice), first.id).unwrap();
        let second = store
            .add_medicine(Some(&alice), new_medicine("B", "2025-01-01"), now)
            .unwrap();

        assert_eq!(second.id, first.id + 1);
    }

    #[test]
    fn test_missing_session_touches_nothing() {
        let (_dir, store) = test_store();
        let result = store.add_medicine(None, new_medicine("A", "2025-01-01"), Utc::now());
        assert!(matches!(result, Err(Error::Unauthorized)));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_medicine_ownership() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);
        let bob = Session::new(2);
        let now = Utc::now();

        let med = store
            .add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), now)
            .unwrap();

        assert!(matches!(
            store.update_medicine_stock(Some(&bob), med.id, 3, now),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            store.delete_medicine(Some(&bob), med.id),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            store.delete_medicine(Some(&alice), 99),
            Err(Error::NotFound(_))
        ));

        // Bob's failed attempts left the record alone
        assert_eq!(store.load().unwrap().medicine(1, med.id).unwrap().stock, 10);
    }

    #[test]
    fn test_update_stock_and_edit() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);
        let created = Utc::now();
        let later = created + chrono::Duration::hours(1);

        let med = store
            .add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), created)
            .unwrap();

        let updated = store
            .update_medicine_stock(Some(&alice), med.id, 0, later)
            .unwrap();
        assert_eq!(updated.stock, 0);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, created);

        let changes = MedicineEdit {
            name: Some("Aspirin".into()),
            notes: Some("after meals".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let edited = store
            .edit_medicine(Some(&alice), med.id, changes, later)
            .unwrap();
        assert_eq!(edited.name, "Aspirin");
        assert_eq!(edited.notes.as_deref(), Some("after meals"));
        assert_eq!(edited.stock, 0);
    }

    #[test]
    fn test_reminder_requires_own_medicine() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);
        let bob = Session::new(2);
        let now = Utc::now();

        let med = store
            .add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), now)
            .unwrap();

        let err = store
            .create_reminder(Some(&bob), new_reminder(med.id, "08:00", "1111111"), now)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let reminder = store
            .create_reminder(Some(&alice), new_reminder(med.id, "08:00", "1111111"), now)
            .unwrap();
        assert!(reminder.is_active);
        assert_eq!(reminder.id, 1);
    }

    #[test]
    fn test_foreign_reminder_reported_missing() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);
        let bob = Session::new(2);
        let now = Utc::now();

        let med = store
            .add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), now)
            .unwrap();
        let reminder = store
            .create_reminder(Some(&alice), new_reminder(med.id, "08:00", "1111111"), now)
            .unwrap();

        assert!(matches!(
            store.delete_reminder(Some(&bob), reminder.id),
            Err(Error::NotFound(_))
        ));
        store.delete_reminder(Some(&alice), reminder.id).unwrap();
        assert!(store.load().unwrap().reminders.is_empty());
    }

    #[test]
    fn test_pause_hides_reminder_from_active_listing() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);
        let now = Utc::now();

        let med = store
            .add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), now)
            .unwrap();
        let reminder = store
            .create_reminder(Some(&alice), new_reminder(med.id, "08:00", "1111111"), now)
            .unwrap();

        store
            .set_reminder_active(Some(&alice), reminder.id, false, now)
            .unwrap();
        assert!(store.load().unwrap().active_reminders_for(1).is_empty());

        store
            .set_reminder_active(Some(&alice), reminder.id, true, now)
            .unwrap();
        assert_eq!(store.load().unwrap().active_reminders_for(1).len(), 1);
    }

    #[test]
    fn test_deleting_medicine_removes_its_reminders() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);
        let now = Utc::now();

        let a = store
            .add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), now)
            .unwrap();
        let b = store
            .add_medicine(Some(&alice), new_medicine("B", "2025-01-01"), now)
            .unwrap();
        store
            .create_reminder(Some(&alice), new_reminder(a.id, "08:00", "1111111"), now)
            .unwrap();
        store
            .create_reminder(Some(&alice), new_reminder(a.id, "20:00", "1111111"), now)
            .unwrap();
        store
            .create_reminder(Some(&alice), new_reminder(b.id, "12:00", "1000000"), now)
            .unwrap();

        assert_eq!(store.delete_medicine(Some(&alice), a.id).unwrap(), 2);

        let db = store.load().unwrap();
        assert_eq!(db.reminders.len(), 1);
        assert_eq!(db.reminders[0].medicine_id, b.id);
    }

    #[test]
    fn test_corrupted_store_is_an_error() {
        let (_dir, store) = test_store();
        std::fs::write(store.path(), "{ invalid json }").unwrap();

        assert!(matches!(store.load(), Err(Error::Store(_))));

        let alice = Session::new(1);
        let result = store.add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), Utc::now());
        assert!(result.is_err());

        // Original bytes preserved for manual recovery
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "{ invalid json }"
        );
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let (_dir, store) = test_store();
        let result: Result<()> =
            store.update(|_| Err(Error::Other("boom".into())));
        assert!(result.is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let (dir, store) = test_store();
        let alice = Session::new(1);
        store
            .add_medicine(Some(&alice), new_medicine("A", "2025-01-01"), Utc::now())
            .unwrap();

        let extras: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != STORE_FILE && !name.ends_with(".lock"))
            .collect();
        assert!(extras.is_empty(), "Unexpected files: {:?}", extras);
    }

    #[test]
    fn test_ids_continue_after_document_without_counters() {
        let (_dir, store) = test_store();
        let alice = Session::new(1);

        store
            .add_medicine(Some(&alice), new_medicine("Aspirin", "2025-01-01"), Utc::now())
            .unwrap();
        let med = store
            .add_medicine(Some(&alice), new_medicine("Ibuprofen", "2025-01-01"), Utc::now())
            .unwrap();
        store
            .create_reminder(Some(&alice), new_reminder(med.id, "08:00", "1111111"), Utc::now())
            .unwrap();

        // Strip the counters, as an older or hand-edited document would
        let mut doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let object = doc.as_object_mut().unwrap();
        object.remove("last_medicine_id");
        object.remove("last_reminder_id");
        std::fs::write(store.path(), doc.to_string()).unwrap();

        let added = store
            .add_medicine(Some(&alice), new_medicine("Naproxen", "2025-01-01"), Utc::now())
            .unwrap();
        assert_eq!(added.id, 3);
        let reminder = store
            .create_reminder(Some(&alice), new_reminder(med.id, "20:00", "1111111"), Utc::now())
            .unwrap();
        assert_eq!(reminder.id, 2);
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_records() {
        let (_dir, store) = test_store();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let session = Session::new(1);
                    store
                        .add_medicine(
                            Some(&session),
                            new_medicine(&format!("Med {i}"), "2025-01-01"),
                            Utc::now(),
                        )
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let db = store.load().unwrap();
        assert_eq!(db.medicines.len(), 8);
        let mut ids: Vec<_> = db.medicines.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    }
}
