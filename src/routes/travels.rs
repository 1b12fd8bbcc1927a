use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::trip::{NewTripEntry, TripEntry},
    services::trips::{SortOrder, TripFilter},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/:id", put(update_entry).delete(delete_entry))
        .route("/invoice/current", get(invoice_current))
        .route("/invoice/next", post(invoice_next))
}

/// Query string of the listing page: `?agency=KTC&startDate=2025-01-01&`
/// `endDate=2025-01-31&sort=desc`. Dates are `YYYY-MM-DD`.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ListQuery {
    agency: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    sort: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<TripFilter, AppError> {
        let date_range = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "startDate and endDate must be provided together".into(),
                ))
            }
        };
        let order = match self.sort.as_deref() {
            Some("desc") => SortOrder::Descending,
            _ => SortOrder::Ascending,
        };
        Ok(TripFilter {
            agency: self.agency.filter(|a| !a.trim().is_empty()),
            date_range,
            order,
        })
    }
}

async fn list_entries(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TripEntry>>, AppError> {
    let filter = query.into_filter()?;
    let entries = state.trips.list(&filter).await?;
    Ok(Json(entries))
}

async fn create_entry(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Json(input): Json<NewTripEntry>,
) -> Result<(StatusCode, Json<TripEntry>), AppError> {
    let entry = state.trips.create(&input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_entry(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<NewTripEntry>,
) -> Result<Json<TripEntry>, AppError> {
    let entry = state.trips.update(id, &input).await?;
    Ok(Json(entry))
}

async fn delete_entry(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.trips.delete(id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn invoice_current(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let (current, formatted) = state.invoices.peek_current().await?;
    Ok(Json(json!({
        "currentNumber": current,
        "formattedInvoice": formatted,
    })))
}

async fn invoice_next(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let (next, formatted) = state.invoices.allocate_next().await?;
    Ok(Json(json!({
        "nextNumber": next,
        "formattedInvoice": formatted,
    })))
}
