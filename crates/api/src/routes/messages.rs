//! Broadcast route: SMS + WhatsApp to every customer in a district.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crm_common::error::AppError;
use crm_engine::customer::CustomerService;
use crm_notifier::{DispatchReport, NotifierError};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/customers/send-messages", post(send_messages))
}

/// Request body for a broadcast. Both fields are optional at the parsing
/// level so that missing values become 400s rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct SendMessagesRequest {
    /// Exact district name, or `"all"`
    pub district: Option<String>,
    pub message: Option<String>,
}

impl SendMessagesRequest {
    /// Returns `(district, message)` with the district trimmed.
    pub fn validate(&self) -> Result<(&str, &str), AppError> {
        let message = self
            .message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Message is required".to_string()))?;

        let district = self
            .district
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                AppError::Validation("District is required (use \"all\" for everyone)".to_string())
            })?;

        Ok((district, message))
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessagesResponse {
    pub message: &'static str,
    pub district: String,
    pub report: DispatchReport,
}

/// POST /api/customers/send-messages: Resolve recipients and broadcast.
///
/// A batch where every delivery failed still returns 200; the report tells
/// the operator which deliveries need follow-up.
async fn send_messages(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<SendMessagesRequest>,
) -> Result<Json<SendMessagesResponse>, AppError> {
    let (district, message) = req.validate()?;

    tracing::info!(district, message_len = message.len(), "Broadcast requested");

    let recipients = CustomerService::recipients_for_district(&state.pool, district).await?;
    if recipients.is_empty() {
        return Err(AppError::NotFound(
            "No customers found for the specified district".to_string(),
        ));
    }

    let mut redis = state.redis.clone();
    if !state.cooldown.try_acquire(&mut redis, district, message).await? {
        return Err(AppError::RateLimited(format!(
            "The same message was just sent to '{}'; try again later",
            district
        )));
    }

    let report = match state.dispatcher.dispatch(&recipients, message).await {
        Ok(report) => report,
        Err(e) => {
            if let Err(release_err) = state.cooldown.release(&mut redis, district, message).await {
                tracing::warn!(error = %release_err, district, "Failed to release broadcast cooldown");
            }
            return Err(dispatch_error(e));
        }
    };

    if report.delivered == 0 {
        tracing::error!(
            district,
            failed = report.failed,
            "Broadcast delivered nothing"
        );
    } else if report.failed > 0 {
        tracing::warn!(
            district,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast partially failed"
        );
    }

    Ok(Json(SendMessagesResponse {
        message: "Messages dispatched",
        district: district.to_string(),
        report,
    }))
}

fn dispatch_error(e: NotifierError) -> AppError {
    match e {
        NotifierError::NoRecipients | NotifierError::EmptyBody => {
            AppError::Validation(e.to_string())
        }
        other => AppError::Provider(other.to_string()),
    }
}
