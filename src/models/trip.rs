use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// A stored tripsheet row. Wire names are camelCase, matching what the
/// booking client has always sent and displayed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TripEntry {
    pub id: i64,
    pub guest_name: String,
    pub guest_number: String,
    pub vehicle_name: String,
    pub vehicle_number: String,
    pub driver_name: String,
    pub reporting: String,
    pub agency: String,
    pub date: NaiveDate,
    pub starting_km: i64,
    pub closing_km: i64,
    pub total_km: i64,
    pub starting_time: String,
    pub closing_time: String,
    pub total_hours: String,
    pub toll_fee: f64,
    pub parking_fee: f64,
    pub amount: f64,
    pub invoice_number: String,
}

/// Incoming payload for create and update. Everything is optional at the
/// serde level; required-ness lives in [`NewTripEntry::validate`] so that a
/// missing field yields one 400 naming every gap instead of a decode error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTripEntry {
    pub guest_name: String,
    pub guest_number: String,
    pub vehicle_name: String,
    pub vehicle_number: String,
    pub driver_name: String,
    pub reporting: String,
    pub agency: String,
    pub date: Option<NaiveDate>,
    pub starting_km: i64,
    pub closing_km: i64,
    pub starting_time: String,
    pub closing_time: String,
    pub toll_fee: f64,
    pub parking_fee: f64,
    pub amount: f64,
    pub invoice_number: String,
}

impl Default for NewTripEntry {
    fn default() -> Self {
        Self {
            guest_name: String::new(),
            guest_number: String::new(),
            vehicle_name: String::new(),
            vehicle_number: String::new(),
            driver_name: String::new(),
            reporting: String::new(),
            agency: String::new(),
            date: None,
            starting_km: 0,
            closing_km: 0,
            starting_time: MIDNIGHT.into(),
            closing_time: MIDNIGHT.into(),
            toll_fee: 0.0,
            parking_fee: 0.0,
            amount: 0.0,
            invoice_number: String::new(),
        }
    }
}

const MIDNIGHT: &str = "00:00";

/// The canonical required set. Both the create and update paths check this
/// one table, so the contract cannot drift between call sites.
const REQUIRED_FIELDS: &[(&str, fn(&NewTripEntry) -> bool)] = &[
    ("guestName", |e| !e.guest_name.trim().is_empty()),
    ("guestNumber", |e| !e.guest_number.trim().is_empty()),
    ("vehicleName", |e| !e.vehicle_name.trim().is_empty()),
    ("vehicleNumber", |e| !e.vehicle_number.trim().is_empty()),
    ("driverName", |e| !e.driver_name.trim().is_empty()),
    ("reporting", |e| !e.reporting.trim().is_empty()),
    ("agency", |e| !e.agency.trim().is_empty()),
    ("date", |e| e.date.is_some()),
    ("invoiceNumber", |e| !e.invoice_number.trim().is_empty()),
];

impl NewTripEntry {
    pub fn validate(&self) -> Result<(), AppError> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .filter(|(_, present)| !present(self))
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Clock readings with no value count as midnight, the historical
    /// schema default.
    pub fn starting_time_or_default(&self) -> &str {
        normalize_time(&self.starting_time)
    }

    pub fn closing_time_or_default(&self) -> &str {
        normalize_time(&self.closing_time)
    }
}

fn normalize_time(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        MIDNIGHT
    } else {
        trimmed
    }
}

/// Reversed odometer readings clamp to zero; rollover is not modeled.
pub fn total_km(starting_km: i64, closing_km: i64) -> i64 {
    (closing_km - starting_km).max(0)
}

/// Elapsed wall-clock time between two `HH:MM` readings, wrapping past
/// midnight when the trip ends on the next day.
pub fn total_hours(starting_time: &str, closing_time: &str) -> Result<String, AppError> {
    let start = minutes_of_day(starting_time)?;
    let end = minutes_of_day(closing_time)?;
    let mut elapsed = end - start;
    if elapsed < 0 {
        elapsed += 24 * 60;
    }
    Ok(format!("{:02}:{:02}", elapsed / 60, elapsed % 60))
}

fn minutes_of_day(raw: &str) -> Result<i32, AppError> {
    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| AppError::Validation(format!("invalid time '{raw}', expected HH:MM")))?;
    Ok((time.hour() * 60 + time.minute()) as i32)
}
