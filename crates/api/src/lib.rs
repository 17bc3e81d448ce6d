//! HTTP API for the field CRM.
//!
//! Endpoints:
//! - POST /api/auth/register, /api/auth/login: operator credentials and JWTs
//! - CRUD /api/customers: customer records with purchases
//! - GET  /api/customers/used-areas | followups | search: lookups
//! - PATCH /api/customers/{id}/contacted: stamp last contact
//! - CRUD /api/customers/{id}/reminders, GET /api/customers/reminders
//! - POST /api/customers/send-messages: SMS + WhatsApp broadcast

pub mod middleware;
pub mod routes;
pub mod state;
