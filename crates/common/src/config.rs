use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string
    pub redis_url: String,

    /// Port the HTTP API binds to (default: 3000)
    pub api_port: u16,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Twilio credentials and sender addresses; `None` disables delivery
    pub twilio: Option<TwilioConfig>,

    /// Country code prefixed to local mobile numbers (default: +91)
    pub country_code: String,

    /// Ceiling on simultaneous outbound delivery attempts (default: 16)
    pub dispatch_max_concurrency: usize,

    /// Per-attempt provider timeout in seconds (default: 15)
    pub dispatch_attempt_timeout_secs: u64,

    /// Per-district broadcast lock in seconds, 0 disables (default: 60)
    pub broadcast_cooldown_seconds: u64,

    /// Months without contact before a customer is due for follow-up (default: 3)
    pub followup_window_months: u32,
}

/// Twilio account settings used by the messaging provider.
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number for plain SMS
    pub sms_from: String,
    /// Sender number for WhatsApp, with or without the `whatsapp:` prefix
    pub whatsapp_from: String,
    /// API base URL, overridable for testing
    pub api_base: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            api_port: parse_var("API_PORT", "3000")?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: jwt_expiry(parse_var("JWT_EXPIRY_HOURS", "24")?)?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
            twilio: TwilioConfig::from_env(),
            country_code: std::env::var("COUNTRY_CODE").unwrap_or_else(|_| "+91".to_string()),
            dispatch_max_concurrency: parse_var("DISPATCH_MAX_CONCURRENCY", "16")?,
            dispatch_attempt_timeout_secs: parse_var("DISPATCH_ATTEMPT_TIMEOUT_SECS", "15")?,
            broadcast_cooldown_seconds: parse_var("BROADCAST_COOLDOWN_SECONDS", "60")?,
            followup_window_months: parse_var("FOLLOWUP_WINDOW_MONTHS", "3")?,
        })
    }
}

impl TwilioConfig {
    /// Returns `None` unless SID, token and both sender addresses are all set.
    fn from_env() -> Option<Self> {
        Some(Self {
            account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok()?,
            auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok()?,
            sms_from: std::env::var("TWILIO_SMS_FROM").ok()?,
            whatsapp_from: std::env::var("TWILIO_WHATSAPP_FROM").ok()?,
            api_base: std::env::var("TWILIO_API_BASE")
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
        })
    }
}

/// Upper bound on token lifetime: ten years.
const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365 * 10;

fn jwt_expiry(hours: u64) -> anyhow::Result<u64> {
    if !(1..=MAX_JWT_EXPIRY_HOURS).contains(&hours) {
        anyhow::bail!(
            "JWT_EXPIRY_HOURS must be between 1 and {}",
            MAX_JWT_EXPIRY_HOURS
        );
    }
    Ok(hours)
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> anyhow::Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            )
        })
}
