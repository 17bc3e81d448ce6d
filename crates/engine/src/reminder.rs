//! Reminder service: dated notes owned by a customer.
//!
//! Reminders are addressed by `(customer_id, reminder_id)` and mutated with
//! single-row statements; the parent customer row is never rewritten.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crm_common::error::AppError;
use crm_common::types::{Page, Pagination, Reminder, ReminderWithCustomer};

pub struct ReminderService;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReminderParams {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub about: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReminderParams {
    pub date: Option<DateTime<Utc>>,
    pub about: Option<String>,
}

impl ReminderService {
    /// Attach a new reminder to a customer.
    pub async fn add(
        pool: &PgPool,
        customer_id: Uuid,
        params: &CreateReminderParams,
    ) -> Result<Reminder, AppError> {
        let about = about_text(&params.about)?;

        let reminder: Reminder = sqlx::query_as(
            r#"
            INSERT INTO reminders (id, customer_id, date, about)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (SELECT 1 FROM customers WHERE id = $2)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(customer_id)
        .bind(params.date)
        .bind(about)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", customer_id)))?;

        tracing::info!(
            customer_id = %customer_id,
            reminder_id = %reminder.id,
            "Reminder added"
        );

        Ok(reminder)
    }

    /// Update a reminder's date and/or text.
    pub async fn update(
        pool: &PgPool,
        customer_id: Uuid,
        reminder_id: Uuid,
        params: &UpdateReminderParams,
    ) -> Result<Reminder, AppError> {
        let about = params.about.as_deref().map(about_text).transpose()?;

        let reminder: Reminder = sqlx::query_as(
            r#"
            UPDATE reminders SET
                date = COALESCE($3, date),
                about = COALESCE($4, about)
            WHERE id = $1 AND customer_id = $2
            RETURNING *
            "#,
        )
        .bind(reminder_id)
        .bind(customer_id)
        .bind(params.date)
        .bind(about)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| not_found(customer_id, reminder_id))?;

        Ok(reminder)
    }

    pub async fn delete(pool: &PgPool, customer_id: Uuid, reminder_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1 AND customer_id = $2")
            .bind(reminder_id)
            .bind(customer_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(customer_id, reminder_id));
        }

        tracing::info!(
            customer_id = %customer_id,
            reminder_id = %reminder_id,
            "Reminder deleted"
        );
        Ok(())
    }

    /// Reminders falling on `date` (UTC calendar day), with customer contact details.
    pub async fn list_by_date(
        pool: &PgPool,
        date: NaiveDate,
        pagination: Pagination,
    ) -> Result<Page<ReminderWithCustomer>, AppError> {
        let (start, end) = day_bounds(date)?;

        let reminders: Vec<ReminderWithCustomer> = sqlx::query_as(
            r#"
            SELECT r.id, r.customer_id, r.date, r.about,
                   c.name AS customer_name, c.mobile AS customer_mobile
            FROM reminders r
            JOIN customers c ON c.id = r.customer_id
            WHERE r.date >= $1 AND r.date < $2
            ORDER BY r.date, r.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM reminders WHERE date >= $1 AND date < $2")
                .bind(start)
                .bind(end)
                .fetch_one(pool)
                .await?;

        Ok(Page::new(reminders, total, pagination.page, pagination.limit))
    }
}

fn about_text(about: &str) -> Result<&str, AppError> {
    let about = about.trim();
    if about.is_empty() {
        return Err(AppError::Validation("about is required".to_string()));
    }
    Ok(about)
}

fn not_found(customer_id: Uuid, reminder_id: Uuid) -> AppError {
    AppError::NotFound(format!(
        "Reminder {} not found for customer {}",
        reminder_id, customer_id
    ))
}

/// Half-open `[start, end)` UTC range covering one calendar day.
fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start
        .checked_add_signed(TimeDelta::days(1))
        .ok_or_else(|| AppError::Validation(format!("date {} out of range", date)))?;
    Ok((start, end))
}
