//! Notifier error types.
//!
//! Input rejection (`NoRecipients`, `EmptyBody`) is the only error `dispatch`
//! returns; every other variant describes a single delivery attempt and ends
//! up as a failure entry in the report.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("recipient list is empty")]
    NoRecipients,

    #[error("message body is empty")]
    EmptyBody,

    #[error("invalid mobile number '{0}'")]
    InvalidMobile(String),

    #[error("provider rejected message ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("messaging provider not configured")]
    NotConfigured,

    #[error("attempt aborted: {0}")]
    Aborted(String),
}
