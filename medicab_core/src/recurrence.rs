//! Weekly recurrence for dose reminders.
//!
//! A schedule is a wall-clock [`TimeOfDay`] plus a Monday-first [`DayMask`].
//! Every function here takes the reference instant from the caller and is
//! evaluated in that instant's timezone.

use crate::{DayMask, Language, TimeOfDay};
use chrono::{DateTime, Datelike, Duration, TimeZone};

const DAY_NAMES_ID: [&str; 7] = ["Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu", "Minggu"];
const DAY_SHORT_ID: [&str; 7] = ["Sen", "Sel", "Rab", "Kam", "Jum", "Sab", "Min"];
const DAY_NAMES_EN: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
const DAY_SHORT_EN: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Days scanned when searching for the next occurrence: today plus two
/// weeks. A slot that just passed today is found next week, and a slot that
/// falls into a DST gap is found the week after.
const SEARCH_DAYS: i64 = 15;

/// Find the first instant strictly after `now` at which the schedule fires
///
/// Returns None only when the mask has no active day. A wall-clock time that
/// does not exist on a candidate date (DST gap) skips that date; an ambiguous
/// one resolves to the earlier instant.
pub fn next_occurrence<Tz: TimeZone>(
    time: TimeOfDay,
    mask: DayMask,
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    if mask.is_empty() {
        return None;
    }

    let tz = now.timezone();
    let today = now.date_naive();

    (0..SEARCH_DAYS).find_map(|offset| {
        let date = today + Duration::days(offset);
        if !mask.is_active(date.weekday()) {
            return None;
        }

        let candidate = tz
            .from_local_datetime(&date.and_time(time.to_naive_time()))
            .earliest()?;
        (candidate > *now).then_some(candidate)
    })
}

/// Whether today's slot has already passed without the dose being taken
pub fn is_overdue<Tz: TimeZone>(
    time: TimeOfDay,
    mask: DayMask,
    now: &DateTime<Tz>,
    taken_today: bool,
) -> bool {
    !taken_today
        && mask.is_active(now.date_naive().weekday())
        && now.naive_local().time() > time.to_naive_time()
}

/// Full day name for a Monday-first index
pub fn day_name(index: usize, language: Language) -> Option<&'static str> {
    match language {
        Language::Id => DAY_NAMES_ID.get(index).copied(),
        Language::En => DAY_NAMES_EN.get(index).copied(),
    }
}

/// Short day name for a Monday-first index
pub fn day_short_name(index: usize, language: Language) -> Option<&'static str> {
    match language {
        Language::Id => DAY_SHORT_ID.get(index).copied(),
        Language::En => DAY_SHORT_EN.get(index).copied(),
    }
}

/// Short names of the active days, Monday first
pub fn active_day_names(mask: DayMask, language: Language) -> Vec<&'static str> {
    mask.days()
        .iter()
        .enumerate()
        .filter(|&(_, &active)| active)
        .filter_map(|(index, _)| day_short_name(index, language))
        .collect()
}

/// Render a day mask as a display label
pub fn format_active_days(mask: DayMask, language: Language) -> String {
    let (every_day, none, weekdays) = match language {
        Language::Id => ("Setiap hari", "Tidak ada", "Hari kerja"),
        Language::En => ("Every day", "None", "Weekdays"),
    };

    if mask == DayMask::EVERY_DAY {
        every_day.to_string()
    } else if mask.is_empty() {
        none.to_string()
    } else if mask == DayMask::WEEKDAYS {
        weekdays.to_string()
    } else {
        active_day_names(mask, language).join(", ")
    }
}

/// Serialize a Monday-first day selection to its flag string
pub fn mask_from_selection(selected_days: [bool; 7]) -> String {
    DayMask::from_selection(selected_days).to_string()
}
