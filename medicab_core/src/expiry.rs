//! Expiry classification for medicines.
//!
//! Status is a pure function of the stored expiry date and a caller-supplied
//! "today". Dates carry no time component, so comparisons are date-only.

use crate::{ExpiryStatus, Medicine, MedicineView};
use chrono::NaiveDate;

/// Days before expiry during which a medicine counts as expiring (inclusive)
pub const EXPIRY_WINDOW_DAYS: i64 = 30;

/// Result of classifying one expiry date
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryClassification {
    pub status: ExpiryStatus,
    /// Signed whole days from today to the expiry date
    pub days_until_expiry: i64,
}

impl ExpiryStatus {
    /// Map a signed day count onto a status
    ///
    /// - negative → expired
    /// - 0..=30 → expiring
    /// - otherwise → safe
    pub fn from_days(days_until_expiry: i64) -> Self {
        if days_until_expiry < 0 {
            ExpiryStatus::Expired
        } else if days_until_expiry <= EXPIRY_WINDOW_DAYS {
            ExpiryStatus::Expiring
        } else {
            ExpiryStatus::Safe
        }
    }
}

/// Classify an expiry date against `today`
pub fn classify(expiry_date: NaiveDate, today: NaiveDate) -> ExpiryClassification {
    let days_until_expiry = expiry_date.signed_duration_since(today).num_days();
    ExpiryClassification {
        status: ExpiryStatus::from_days(days_until_expiry),
        days_until_expiry,
    }
}

impl MedicineView {
    /// Build the view of a medicine as seen on `today`
    pub fn new(medicine: &Medicine, today: NaiveDate) -> Self {
        let ExpiryClassification {
            status,
            days_until_expiry,
        } = classify(medicine.expiry_date, today);

        MedicineView {
            id: medicine.id,
            name: medicine.name.clone(),
            dosage: medicine.dosage.clone(),
            frequency: medicine.frequency.clone(),
            expiry_date: medicine.expiry_date,
            stock: medicine.stock,
            notes: medicine.notes.clone(),
            created_at: medicine.created_at,
            updated_at: medicine.updated_at,
            status,
            days_until_expiry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_boundaries() {
        let today = date(2024, 1, 15);

        let at = |offset: i64| classify(today + Duration::days(offset), today);

        assert_eq!(at(31).status, ExpiryStatus::Safe);
        assert_eq!(at(30).status, ExpiryStatus::Expiring);
        assert_eq!(at(1).status, ExpiryStatus::Expiring);
        assert_eq!(at(0).status, ExpiryStatus::Expiring);
        assert_eq!(at(-1).status, ExpiryStatus::Expired);
    }

    #[test]
    fn test_days_until_expiry_is_signed() {
        let today = date(2024, 3, 1);
        assert_eq!(classify(date(2024, 3, 16), today).days_until_expiry, 15);
        assert_eq!(classify(date(2024, 3, 1), today).days_until_expiry, 0);
        assert_eq!(classify(date(2024, 2, 20), today).days_until_expiry, -10);
    }

    #[test]
    fn test_leap_day_counts_as_a_day() {
        let today = date(2024, 2, 28);
        assert_eq!(classify(date(2024, 3, 1), today).days_until_expiry, 2);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let today = date(2025, 6, 30);
        let expiry = date(2025, 7, 20);
        assert_eq!(classify(expiry, today), classify(expiry, today));
    }

    #[test]
    fn test_medicine_view_carries_classification() {
        let now = Utc::now();
        let medicine = Medicine {
            id: 4,
            user_id: 1,
            name: "Paracetamol".into(),
            dosage: Some("500mg".into()),
            frequency: None,
            expiry_date: date(2024, 1, 30),
            stock: 10,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let view = MedicineView::new(&medicine, date(2024, 1, 15));
        assert_eq!(view.status, ExpiryStatus::Expiring);
        assert_eq!(view.days_until_expiry, 15);
        assert_eq!(view.name, "Paracetamol");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "expiring");
        assert_eq!(json["daysUntilExpiry"], 15);
        assert!(json.get("user_id").is_none());
    }
}
