//! Customer service: CRUD, listing and follow-up queries over the customer store.
//!
//! Customers own their purchases and reminders; both live in child tables with
//! `ON DELETE CASCADE`, so deleting a customer removes them too.

use std::collections::HashMap;

use chrono::{DateTime, Months, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crm_common::error::AppError;
use crm_common::types::{Customer, CustomerRow, Page, Pagination, Purchase, Reminder, UsedArea};
use crm_notifier::Recipient;

/// Service layer for customer operations.
pub struct CustomerService;

/// District selector that targets every customer.
pub const ALL_DISTRICTS: &str = "all";

/// A purchase as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseParams {
    pub name: String,
    pub price: f64,
    pub date: DateTime<Utc>,
}

/// Parameters for creating a customer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCustomerParams {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub taluk: Option<String>,
    pub gram: Option<String>,
    pub village: Option<String>,
    #[serde(default)]
    pub purchases: Vec<PurchaseParams>,
}

/// Parameters for a partial customer update.
///
/// Omitted fields are left unchanged. `purchases`, when present, replaces the
/// whole purchase list. `lastContacted` is only refreshed when
/// `markContacted` is set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerParams {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub taluk: Option<String>,
    pub gram: Option<String>,
    pub village: Option<String>,
    pub purchases: Option<Vec<PurchaseParams>>,
    #[serde(default)]
    pub mark_contacted: bool,
}

// Shared WHERE clause for the paged listing. $1 is a LIKE pattern.
const LIST_FILTER: &str = r#"
    c.name ILIKE $1
    OR c.email ILIKE $1
    OR c.mobile ILIKE $1
    OR c.taluk ILIKE $1
    OR c.address ILIKE $1
    OR EXISTS (SELECT 1 FROM purchases p WHERE p.customer_id = c.id AND p.name ILIKE $1)
"#;

impl CustomerService {
    /// Create a customer together with its purchases.
    pub async fn create(pool: &PgPool, params: &CreateCustomerParams) -> Result<Customer, AppError> {
        let name = required("name", &params.name)?;
        let mobile = required("mobile", &params.mobile)?;
        validate_purchases(&params.purchases)?;

        let id = Uuid::new_v4();
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO customers
                (id, name, email, mobile, address, state, district, taluk, gram, village, last_contacted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(optional(&params.email))
        .bind(mobile)
        .bind(optional(&params.address))
        .bind(optional(&params.state))
        .bind(optional(&params.district))
        .bind(optional(&params.taluk))
        .bind(optional(&params.gram))
        .bind(optional(&params.village))
        .execute(&mut *tx)
        .await?;

        insert_purchases(&mut tx, id, &params.purchases).await?;
        tx.commit().await?;

        tracing::info!(customer_id = %id, "Customer created");

        Self::get(pool, id).await
    }

    /// Get a single customer with purchases and reminders.
    pub async fn get(pool: &PgPool, customer_id: Uuid) -> Result<Customer, AppError> {
        let row: CustomerRow = sqlx::query_as("SELECT * FROM customers WHERE id = $1")
            .bind(customer_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| not_found(customer_id))?;

        let mut customers = attach_children(pool, vec![row]).await?;
        customers
            .pop()
            .ok_or_else(|| AppError::Internal("customer vanished while loading".to_string()))
    }

    /// Page through customers, newest first, optionally filtered by a
    /// case-insensitive substring.
    pub async fn list(
        pool: &PgPool,
        pagination: Pagination,
        search: &str,
    ) -> Result<Page<Customer>, AppError> {
        let pattern = like_pattern(search);

        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            "SELECT c.* FROM customers c WHERE {} ORDER BY c.created_at DESC, c.id LIMIT $2 OFFSET $3",
            LIST_FILTER
        ))
        .bind(&pattern)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM customers c WHERE {}",
            LIST_FILTER
        ))
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

        let customers = attach_children(pool, rows).await?;
        Ok(Page::new(customers, total, pagination.page, pagination.limit))
    }

    /// Update customer fields.
    pub async fn update(
        pool: &PgPool,
        customer_id: Uuid,
        params: &UpdateCustomerParams,
    ) -> Result<Customer, AppError> {
        let name = params.name.as_deref().map(|n| required("name", n)).transpose()?;
        let mobile = params
            .mobile
            .as_deref()
            .map(|m| required("mobile", m))
            .transpose()?;
        if let Some(purchases) = &params.purchases {
            validate_purchases(purchases)?;
        }

        let mut tx = pool.begin().await?;

        let updated: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE customers SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                mobile = COALESCE($4, mobile),
                address = COALESCE($5, address),
                state = COALESCE($6, state),
                district = COALESCE($7, district),
                taluk = COALESCE($8, taluk),
                gram = COALESCE($9, gram),
                village = COALESCE($10, village),
                last_contacted = CASE WHEN $11 THEN NOW() ELSE last_contacted END
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(customer_id)
        .bind(name)
        .bind(optional(&params.email))
        .bind(mobile)
        .bind(optional(&params.address))
        .bind(optional(&params.state))
        .bind(optional(&params.district))
        .bind(optional(&params.taluk))
        .bind(optional(&params.gram))
        .bind(optional(&params.village))
        .bind(params.mark_contacted)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Err(not_found(customer_id));
        }

        if let Some(purchases) = &params.purchases {
            sqlx::query("DELETE FROM purchases WHERE customer_id = $1")
                .bind(customer_id)
                .execute(&mut *tx)
                .await?;
            insert_purchases(&mut tx, customer_id, purchases).await?;
        }

        tx.commit().await?;

        tracing::info!(
            customer_id = %customer_id,
            mark_contacted = params.mark_contacted,
            "Customer updated"
        );

        Self::get(pool, customer_id).await
    }

    /// Stamp `last_contacted = now`.
    pub async fn mark_contacted(pool: &PgPool, customer_id: Uuid) -> Result<Customer, AppError> {
        let result = sqlx::query("UPDATE customers SET last_contacted = NOW() WHERE id = $1")
            .bind(customer_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(customer_id));
        }

        tracing::debug!(customer_id = %customer_id, "Customer marked as contacted");
        Self::get(pool, customer_id).await
    }

    /// Delete a customer. Purchases and reminders cascade.
    pub async fn delete(pool: &PgPool, customer_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(customer_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(customer_id));
        }

        tracing::info!(customer_id = %customer_id, "Customer deleted");
        Ok(())
    }

    /// Distinct (district, taluk, gram) tuples in use.
    pub async fn used_areas(pool: &PgPool) -> Result<Vec<UsedArea>, AppError> {
        let areas: Vec<UsedArea> = sqlx::query_as(
            r#"
            SELECT DISTINCT district, taluk, gram AS village
            FROM customers
            ORDER BY district, taluk, village
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(areas)
    }

    /// Customers not contacted within the last `window_months` months.
    pub async fn followups(pool: &PgPool, window_months: u32) -> Result<Vec<Customer>, AppError> {
        let cutoff = followup_cutoff(Utc::now(), window_months)?;

        let rows: Vec<CustomerRow> = sqlx::query_as(
            "SELECT * FROM customers WHERE last_contacted <= $1 ORDER BY last_contacted ASC",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

        attach_children(pool, rows).await
    }

    /// Follow-ups matching a case-insensitive substring across contact,
    /// geography and purchase fields.
    pub async fn search_followups(
        pool: &PgPool,
        query: &str,
        window_months: u32,
    ) -> Result<Vec<Customer>, AppError> {
        let cutoff = followup_cutoff(Utc::now(), window_months)?;
        let pattern = like_pattern(query);

        let rows: Vec<CustomerRow> = sqlx::query_as(
            r#"
            SELECT c.* FROM customers c
            WHERE c.last_contacted <= $1
              AND (
                c.name ILIKE $2
                OR c.mobile ILIKE $2
                OR c.email ILIKE $2
                OR c.district ILIKE $2
                OR c.taluk ILIKE $2
                OR c.gram ILIKE $2
                OR EXISTS (SELECT 1 FROM purchases p WHERE p.customer_id = c.id AND p.name ILIKE $2)
              )
            ORDER BY c.last_contacted ASC
            "#,
        )
        .bind(cutoff)
        .bind(&pattern)
        .fetch_all(pool)
        .await?;

        attach_children(pool, rows).await
    }

    /// Resolve broadcast recipients: every customer for `"all"`, otherwise
    /// customers whose district matches exactly.
    pub async fn recipients_for_district(
        pool: &PgPool,
        district: &str,
    ) -> Result<Vec<Recipient>, AppError> {
        let mobiles: Vec<(String,)> = if district == ALL_DISTRICTS {
            sqlx::query_as("SELECT mobile FROM customers ORDER BY created_at, id")
                .fetch_all(pool)
                .await?
        } else {
            sqlx::query_as("SELECT mobile FROM customers WHERE district = $1 ORDER BY created_at, id")
                .bind(district)
                .fetch_all(pool)
                .await?
        };

        tracing::debug!(district, count = mobiles.len(), "Resolved broadcast recipients");

        Ok(mobiles
            .into_iter()
            .map(|(mobile,)| Recipient::new(mobile))
            .collect())
    }
}

/// Load purchases and reminders for a batch of rows, preserving row order.
async fn attach_children(pool: &PgPool, rows: Vec<CustomerRow>) -> Result<Vec<Customer>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let purchases: Vec<Purchase> = sqlx::query_as(
        "SELECT * FROM purchases WHERE customer_id = ANY($1) ORDER BY date, id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let reminders: Vec<Reminder> = sqlx::query_as(
        "SELECT * FROM reminders WHERE customer_id = ANY($1) ORDER BY date, id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut purchases_by_customer: HashMap<Uuid, Vec<Purchase>> = HashMap::new();
    for purchase in purchases {
        purchases_by_customer
            .entry(purchase.customer_id)
            .or_default()
            .push(purchase);
    }

    let mut reminders_by_customer: HashMap<Uuid, Vec<Reminder>> = HashMap::new();
    for reminder in reminders {
        reminders_by_customer
            .entry(reminder.customer_id)
            .or_default()
            .push(reminder);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let purchases = purchases_by_customer.remove(&row.id).unwrap_or_default();
            let reminders = reminders_by_customer.remove(&row.id).unwrap_or_default();
            row.into_customer(purchases, reminders)
        })
        .collect())
}

async fn insert_purchases(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
    purchases: &[PurchaseParams],
) -> Result<(), AppError> {
    for purchase in purchases {
        sqlx::query(
            "INSERT INTO purchases (id, customer_id, name, price, date) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(customer_id)
        .bind(purchase.name.trim())
        .bind(purchase.price)
        .bind(purchase.date)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn validate_purchases(purchases: &[PurchaseParams]) -> Result<(), AppError> {
    for purchase in purchases {
        required("purchase name", &purchase.name)?;
        if !purchase.price.is_finite() || purchase.price <= 0.0 {
            return Err(AppError::Validation(format!(
                "purchase '{}' must have a positive price",
                purchase.name.trim()
            )));
        }
    }
    Ok(())
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value)
}

/// Trim an optional text field, treating blank as absent.
fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn not_found(customer_id: Uuid) -> AppError {
    AppError::NotFound(format!("Customer {} not found", customer_id))
}

/// Build an ILIKE pattern matching `needle` literally anywhere in the field.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Last-contacted timestamps at or before this instant are due for follow-up.
pub fn followup_cutoff(now: DateTime<Utc>, window_months: u32) -> Result<DateTime<Utc>, AppError> {
    now.checked_sub_months(Months::new(window_months))
        .ok_or_else(|| AppError::Internal("follow-up window out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ram"), "%ram%");
        assert_eq!(like_pattern("  ram "), "%ram%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn test_followup_cutoff_three_months() {
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap();
        let cutoff = followup_cutoff(now, 3).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Asha ").unwrap(), "Asha");
        assert!(matches!(required("mobile", "   "), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(optional(&Some(" Pune ".to_string())), Some("Pune"));
        assert_eq!(optional(&Some("  ".to_string())), None);
        assert_eq!(optional(&None), None);
    }

    #[test]
    fn test_purchase_price_must_be_positive() {
        let purchase = |price| PurchaseParams {
            name: "Seed drill".to_string(),
            price,
            date: Utc::now(),
        };

        assert!(validate_purchases(&[purchase(1200.0)]).is_ok());
        assert!(validate_purchases(&[purchase(0.0)]).is_err());
        assert!(validate_purchases(&[purchase(-5.0)]).is_err());
        assert!(validate_purchases(&[purchase(f64::NAN)]).is_err());
    }

    #[test]
    fn test_update_params_default_does_not_touch_last_contacted() {
        let params: UpdateCustomerParams =
            serde_json::from_value(serde_json::json!({"address": "Ward 4"})).unwrap();
        assert!(!params.mark_contacted);
        assert_eq!(params.address.as_deref(), Some("Ward 4"));
        assert!(params.purchases.is_none());

        let params: UpdateCustomerParams =
            serde_json::from_value(serde_json::json!({"markContacted": true})).unwrap();
        assert!(params.mark_contacted);
    }
}
