use chrono::NaiveDate;
use tracing::debug;

use crate::{
    db::DbPool,
    error::AppError,
    models::trip::{self, NewTripEntry, TripEntry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Listing filter: exact agency match and an inclusive date range, ordered
/// by (date, starting time). No pagination; volumes are a few entries a day.
#[derive(Debug, Clone, Default)]
pub struct TripFilter {
    pub agency: Option<String>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub order: SortOrder,
}

const TRIP_COLUMNS: &str = "id, guest_name, guest_number, vehicle_name, vehicle_number, \
     driver_name, reporting, agency, date, starting_km, closing_km, total_km, \
     starting_time, closing_time, total_hours, toll_fee, parking_fee, amount, invoice_number";

#[derive(Clone)]
pub struct TripRepository {
    db: DbPool,
}

impl TripRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Validates, computes the derived distance/time fields from the raw
    /// readings, and persists. Client-supplied totals are ignored.
    pub async fn create(&self, input: &NewTripEntry) -> Result<TripEntry, AppError> {
        input.validate()?;
        let derived = Derived::compute(input)?;

        let entry = sqlx::query_as::<_, TripEntry>(&format!(
            "INSERT INTO trip_entries (guest_name, guest_number, vehicle_name, vehicle_number, \
                 driver_name, reporting, agency, date, starting_km, closing_km, total_km, \
                 starting_time, closing_time, total_hours, toll_fee, parking_fee, amount, \
                 invoice_number) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {TRIP_COLUMNS}"
        ))
        .bind(input.guest_name.trim())
        .bind(input.guest_number.trim())
        .bind(input.vehicle_name.trim())
        .bind(input.vehicle_number.trim())
        .bind(input.driver_name.trim())
        .bind(input.reporting.trim())
        .bind(input.agency.trim())
        .bind(derived.date)
        .bind(input.starting_km)
        .bind(input.closing_km)
        .bind(derived.total_km)
        .bind(&derived.starting_time)
        .bind(&derived.closing_time)
        .bind(&derived.total_hours)
        .bind(input.toll_fee)
        .bind(input.parking_fee)
        .bind(input.amount)
        .bind(input.invoice_number.trim())
        .fetch_one(&self.db)
        .await
        .map_err(|err| duplicate_invoice(err, &input.invoice_number))?;

        debug!("stored trip entry {} ({})", entry.id, entry.invoice_number);
        Ok(entry)
    }

    pub async fn list(&self, filter: &TripFilter) -> Result<Vec<TripEntry>, AppError> {
        let mut sql = format!("SELECT {TRIP_COLUMNS} FROM trip_entries WHERE 1=1");
        if filter.agency.is_some() {
            sql.push_str(" AND agency = ?");
        }
        if filter.date_range.is_some() {
            sql.push_str(" AND date >= ? AND date <= ?");
        }
        sql.push_str(match filter.order {
            SortOrder::Ascending => " ORDER BY date ASC, starting_time ASC",
            SortOrder::Descending => " ORDER BY date DESC, starting_time DESC",
        });

        let mut query = sqlx::query_as::<_, TripEntry>(&sql);
        if let Some(agency) = &filter.agency {
            query = query.bind(agency);
        }
        if let Some((start, end)) = filter.date_range {
            query = query.bind(start).bind(end);
        }

        Ok(query.fetch_all(&self.db).await?)
    }

    /// Same validation and derived-field rules as `create`. The stored
    /// invoice number wins: it is assigned once and immutable thereafter,
    /// so the UPDATE never touches that column.
    pub async fn update(&self, id: i64, input: &NewTripEntry) -> Result<TripEntry, AppError> {
        input.validate()?;
        let derived = Derived::compute(input)?;

        let entry = sqlx::query_as::<_, TripEntry>(&format!(
            "UPDATE trip_entries SET guest_name = ?, guest_number = ?, vehicle_name = ?, \
                 vehicle_number = ?, driver_name = ?, reporting = ?, agency = ?, date = ?, \
                 starting_km = ?, closing_km = ?, total_km = ?, starting_time = ?, \
                 closing_time = ?, total_hours = ?, toll_fee = ?, parking_fee = ?, amount = ? \
             WHERE id = ? \
             RETURNING {TRIP_COLUMNS}"
        ))
        .bind(input.guest_name.trim())
        .bind(input.guest_number.trim())
        .bind(input.vehicle_name.trim())
        .bind(input.vehicle_number.trim())
        .bind(input.driver_name.trim())
        .bind(input.reporting.trim())
        .bind(input.agency.trim())
        .bind(derived.date)
        .bind(input.starting_km)
        .bind(input.closing_km)
        .bind(derived.total_km)
        .bind(&derived.starting_time)
        .bind(&derived.closing_time)
        .bind(&derived.total_hours)
        .bind(input.toll_fee)
        .bind(input.parking_fee)
        .bind(input.amount)
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(entry)
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM trip_entries WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

struct Derived {
    date: NaiveDate,
    total_km: i64,
    starting_time: String,
    closing_time: String,
    total_hours: String,
}

impl Derived {
    fn compute(input: &NewTripEntry) -> Result<Self, AppError> {
        let date = input
            .date
            .ok_or_else(|| AppError::Validation("missing required fields: date".into()))?;
        let starting_time = input.starting_time_or_default().to_string();
        let closing_time = input.closing_time_or_default().to_string();
        let total_hours = trip::total_hours(&starting_time, &closing_time)?;
        Ok(Self {
            date,
            total_km: trip::total_km(input.starting_km, input.closing_km),
            starting_time,
            closing_time,
            total_hours,
        })
    }
}

fn duplicate_invoice(err: sqlx::Error, invoice_number: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::Duplicate(
            format!("invoice number {} already exists", invoice_number.trim()),
        ),
        _ => AppError::Database(err),
    }
}
