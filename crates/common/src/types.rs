use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer with its owned purchases and reminders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub mobile: String,
    pub address: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub taluk: Option<String>,
    pub gram: Option<String>,
    pub village: Option<String>,
    pub purchases: Vec<Purchase>,
    pub last_contacted: DateTime<Utc>,
    pub reminders: Vec<Reminder>,
    pub created_at: DateTime<Utc>,
}

/// Flat `customers` table row, before purchases and reminders are attached.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub mobile: String,
    pub address: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub taluk: Option<String>,
    pub gram: Option<String>,
    pub village: Option<String>,
    pub last_contacted: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CustomerRow {
    pub fn into_customer(self, purchases: Vec<Purchase>, reminders: Vec<Reminder>) -> Customer {
        Customer {
            id: self.id,
            name: self.name,
            email: self.email,
            mobile: self.mobile,
            address: self.address,
            state: self.state,
            district: self.district,
            taluk: self.taluk,
            gram: self.gram,
            village: self.village,
            purchases,
            last_contacted: self.last_contacted,
            reminders,
            created_at: self.created_at,
        }
    }
}

/// A product bought by a customer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub customer_id: Uuid,
    pub name: String,
    pub price: f64,
    pub date: DateTime<Utc>,
}

/// A dated follow-up note attached to a customer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub date: DateTime<Utc>,
    pub about: String,
}

/// A reminder joined with the contact details of its customer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReminderWithCustomer {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub date: DateTime<Utc>,
    pub about: String,
    pub customer_name: String,
    pub customer_mobile: String,
}

/// A distinct geography tuple in use by at least one customer.
///
/// `village` carries the customer's gram value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsedArea {
    pub district: Option<String>,
    pub taluk: Option<String>,
    pub village: Option<String>,
}

/// An operator account allowed to use the API.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            data,
            total,
            page,
            total_pages,
        }
    }
}

/// Validated page/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    /// Apply defaults (page 1, limit 10) and range checks.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Result<Self, crate::error::AppError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);

        if page < 1 {
            return Err(crate::error::AppError::Validation(
                "page must be at least 1".to_string(),
            ));
        }
        if !(1..=Self::MAX_LIMIT).contains(&limit) {
            return Err(crate::error::AppError::Validation(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        if (page - 1).checked_mul(limit).is_none() {
            return Err(crate::error::AppError::Validation(
                "page is out of range".to_string(),
            ));
        }

        Ok(Self { page, limit })
    }

    /// Row offset of the first item on this page. Bounded by `new`.
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}
