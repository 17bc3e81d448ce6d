//! Customer routes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crm_common::error::AppError;
use crm_common::types::{Customer, Page, Pagination, UsedArea};
use crm_engine::customer::{CreateCustomerParams, CustomerService, UpdateCustomerParams};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route("/api/customers/used-areas", get(used_areas))
        .route("/api/customers/followups", get(followups))
        .route("/api/customers/search", get(search_followups))
        .route(
            "/api/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/api/customers/{id}/contacted", patch(mark_contacted))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `{ message, data }` envelope for mutations.
#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub message: &'static str,
    pub data: Customer,
}

/// POST /api/customers: Create a customer.
async fn create_customer(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(params): Json<CreateCustomerParams>,
) -> Result<Json<CustomerResponse>, AppError> {
    let customer = CustomerService::create(&state.pool, &params).await?;
    Ok(Json(CustomerResponse {
        message: "Customer added",
        data: customer,
    }))
}

/// GET /api/customers: Paged listing with optional substring search.
async fn list_customers(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Customer>>, AppError> {
    let pagination = Pagination::new(query.page, query.limit)?;
    let page = CustomerService::list(&state.pool, pagination, &query.search).await?;
    Ok(Json(page))
}

/// GET /api/customers/:id
async fn get_customer(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    Ok(Json(CustomerService::get(&state.pool, id).await?))
}

/// PUT /api/customers/:id: Update fields; pass `markContacted: true` to also
/// count the edit as a contact.
async fn update_customer(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateCustomerParams>,
) -> Result<Json<CustomerResponse>, AppError> {
    let customer = CustomerService::update(&state.pool, id, &params).await?;
    Ok(Json(CustomerResponse {
        message: "Customer updated successfully",
        data: customer,
    }))
}

/// DELETE /api/customers/:id
async fn delete_customer(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    CustomerService::delete(&state.pool, id).await?;
    Ok(Json(json!({ "message": "Customer deleted successfully" })))
}

/// GET /api/customers/used-areas: Public, used to populate area pickers.
async fn used_areas(State(state): State<AppState>) -> Result<Json<Vec<UsedArea>>, AppError> {
    Ok(Json(CustomerService::used_areas(&state.pool).await?))
}

/// GET /api/customers/followups: Customers not contacted within the window.
async fn followups(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<Customer>>, AppError> {
    let customers =
        CustomerService::followups(&state.pool, state.config.followup_window_months).await?;
    Ok(Json(customers))
}

/// GET /api/customers/search?q=: Search within follow-ups.
async fn search_followups(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let customers = CustomerService::search_followups(
        &state.pool,
        &query.q,
        state.config.followup_window_months,
    )
    .await?;
    Ok(Json(customers))
}

/// PATCH /api/customers/:id/contacted: Stamp last contact as now.
async fn mark_contacted(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    Ok(Json(CustomerService::mark_contacted(&state.pool, id).await?))
}
