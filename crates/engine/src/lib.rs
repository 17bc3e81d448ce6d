//! Customer store and supporting services for the CRM API.

pub mod cooldown;
pub mod customer;
pub mod reminder;
pub mod user;
