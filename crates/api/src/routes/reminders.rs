//! Reminder routes: dated notes attached to a customer.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crm_common::error::AppError;
use crm_common::types::{Page, Pagination, Reminder, ReminderWithCustomer};
use crm_engine::reminder::{CreateReminderParams, ReminderService, UpdateReminderParams};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/customers/reminders", get(reminders_by_date))
        .route("/api/customers/{id}/reminders", post(add_reminder))
        .route(
            "/api/customers/{id}/reminders/{reminder_id}",
            put(update_reminder).delete(delete_reminder),
        )
}

#[derive(Debug, Deserialize)]
pub struct ByDateQuery {
    /// Calendar day (`YYYY-MM-DD`); defaults to today (UTC)
    pub date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /api/customers/:id/reminders
async fn add_reminder(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(customer_id): Path<Uuid>,
    Json(params): Json<CreateReminderParams>,
) -> Result<Json<Reminder>, AppError> {
    Ok(Json(
        ReminderService::add(&state.pool, customer_id, &params).await?,
    ))
}

/// PUT /api/customers/:id/reminders/:reminder_id
async fn update_reminder(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((customer_id, reminder_id)): Path<(Uuid, Uuid)>,
    Json(params): Json<UpdateReminderParams>,
) -> Result<Json<Reminder>, AppError> {
    Ok(Json(
        ReminderService::update(&state.pool, customer_id, reminder_id, &params).await?,
    ))
}

/// DELETE /api/customers/:id/reminders/:reminder_id
async fn delete_reminder(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((customer_id, reminder_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    ReminderService::delete(&state.pool, customer_id, reminder_id).await?;
    Ok(Json(json!({ "message": "Reminder deleted" })))
}

/// GET /api/customers/reminders?date&page&limit: Reminders due on a day.
async fn reminders_by_date(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ByDateQuery>,
) -> Result<Json<Page<ReminderWithCustomer>>, AppError> {
    let pagination = Pagination::new(query.page, query.limit)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let page = ReminderService::list_by_date(&state.pool, date, pagination).await?;
    Ok(Json(page))
}
