//! Shared application state for the Axum API server.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use crm_common::config::AppConfig;
use crm_engine::cooldown::BroadcastCooldown;
use crm_notifier::{
    DisabledProvider, Dispatcher, DispatcherConfig, MessagingProvider, TwilioProvider,
};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub config: AppConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub cooldown: BroadcastCooldown,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        redis: ConnectionManager,
        config: AppConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let cooldown = BroadcastCooldown::new(config.broadcast_cooldown_seconds);
        Self {
            pool,
            redis,
            config,
            dispatcher,
            cooldown,
        }
    }
}

/// Build the broadcast dispatcher from configuration.
///
/// Without Twilio credentials the dispatcher still runs, but every attempt is
/// reported as failed.
pub fn build_dispatcher(config: &AppConfig) -> anyhow::Result<Dispatcher> {
    let attempt_timeout = Duration::from_secs(config.dispatch_attempt_timeout_secs);

    let (provider, sms_from, whatsapp_from): (Arc<dyn MessagingProvider>, String, String) =
        match &config.twilio {
            Some(twilio) => {
                let provider = TwilioProvider::new(
                    &twilio.api_base,
                    &twilio.account_sid,
                    &twilio.auth_token,
                    attempt_timeout,
                )?;
                tracing::info!(api_base = %twilio.api_base, "Twilio messaging provider configured");
                (
                    Arc::new(provider),
                    twilio.sms_from.clone(),
                    twilio.whatsapp_from.clone(),
                )
            }
            None => {
                tracing::warn!(
                    "Twilio credentials not set; broadcasts will report every attempt as failed"
                );
                (Arc::new(DisabledProvider), String::new(), String::new())
            }
        };

    Ok(Dispatcher::new(
        provider,
        DispatcherConfig {
            country_code: config.country_code.clone(),
            sms_from,
            whatsapp_from,
            max_concurrency: config.dispatch_max_concurrency,
            attempt_timeout,
        },
    ))
}
