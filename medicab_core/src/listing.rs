//! Listings handed to the presentation layer.
//!
//! Each listing checks the session, loads one snapshot from the store,
//! fixes "today"/"now" once for the whole response, and enriches every
//! record with its computed fields.

use crate::dose_log::DoseLog;
use crate::recurrence::{format_active_days, is_overdue, next_occurrence};
use crate::session::{self, Session};
use crate::store::{Database, Store};
use crate::{Language, MedicineView, ReminderView, Result, UserId};
use chrono::{DateTime, NaiveDate, TimeZone};
use std::collections::HashSet;

/// Medicine views for `user`, nearest expiry first
pub fn medicine_views(db: &Database, user: UserId, today: NaiveDate) -> Vec<MedicineView> {
    let mut medicines: Vec<_> = db.medicines_for(user).collect();
    medicines.sort_by_key(|m| (m.expiry_date, m.id));

    medicines
        .into_iter()
        .map(|m| MedicineView::new(m, today))
        .collect()
}

/// Active reminder views for `user`, earliest time of day first
pub fn reminder_views<Tz: TimeZone>(
    db: &Database,
    user: UserId,
    now: &DateTime<Tz>,
    taken_today: &HashSet<u64>,
    language: Language,
) -> Vec<ReminderView> {
    let today = now.date_naive();

    let mut rows = db.active_reminders_for(user);
    rows.sort_by_key(|(r, _)| (r.time_of_day, r.id));

    rows.into_iter()
        .map(|(reminder, medicine)| ReminderView {
            id: reminder.id,
            medicine_id: reminder.medicine_id,
            time_of_day: reminder.time_of_day,
            days_of_week: reminder.days_of_week,
            is_active: reminder.is_active,
            notification_sent_today: reminder.notification_sent_today,
            last_notification_at: reminder.last_notification_at,
            created_at: reminder.created_at,
            updated_at: reminder.updated_at,
            medicine: MedicineView::new(medicine, today),
            days_label: format_active_days(reminder.days_of_week, language),
            next_reminder_time: next_occurrence(reminder.time_of_day, reminder.days_of_week, now)
                .map(|t| t.fixed_offset()),
            is_overdue: is_overdue(
                reminder.time_of_day,
                reminder.days_of_week,
                now,
                taken_today.contains(&reminder.id),
            ),
        })
        .collect()
}

/// List the caller's medicines with expiry status as of `today`
pub fn list_medicines(
    store: &Store,
    session: Option<&Session>,
    today: NaiveDate,
) -> Result<Vec<MedicineView>> {
    let user = session::require(session)?.user_id;
    let db = store.load()?;

    let views = medicine_views(&db, user, today);
    tracing::debug!("Listed {} medicines for user {} on {}", views.len(), user, today);
    Ok(views)
}

/// List the caller's active reminders with their next occurrence after `now`
pub fn list_reminders<Tz: TimeZone>(
    store: &Store,
    log: &DoseLog,
    session: Option<&Session>,
    now: &DateTime<Tz>,
    language: Language,
) -> Result<Vec<ReminderView>> {
    let user = session::require(session)?.user_id;
    let db = store.load()?;
    let taken_today = log.taken_on(now.date_naive())?;

    let views = reminder_views(&db, user, now, &taken_today, language);
    tracing::debug!("Listed {} reminders for user {}", views.len(), user);
    Ok(views)
}
