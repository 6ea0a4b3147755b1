use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Redis connection string (delivery claim locks)
    pub redis_url: String,

    /// Listen address for the API server (default: 0.0.0.0:3000)
    pub api_bind_addr: String,

    /// JWT secret for admin authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Shared secret expected from the cron trigger
    pub cron_secret: Option<String>,

    /// Accept the hosting platform's cron header as authorization
    pub cron_trust_platform_header: bool,

    /// Feature flag for the email retry mechanism (default: off)
    pub email_retry_enabled: bool,

    /// Deliveries scanned per retry pass (default: 20)
    pub email_retry_batch_size: u32,

    /// Attempt ceiling after which a delivery is abandoned (default: 10)
    pub email_retry_max_attempts: u32,

    /// Backoff base in seconds (default: 60)
    pub email_retry_base_seconds: u64,

    /// Backoff cap in seconds (default: 3600)
    pub email_retry_cap_seconds: u64,

    /// Tick of the in-process retry worker in seconds (default: 300)
    pub worker_interval_seconds: u64,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Resend API base URL
    pub resend_api_url: String,

    /// Email sender address
    pub email_from: String,

    /// Store name shown in emails
    pub store_name: String,

    /// Public storefront URL used for order links
    pub store_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            api_bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: parse_var("JWT_EXPIRY_HOURS", "24")?,
            cron_secret: non_empty_var("CRON_SECRET"),
            cron_trust_platform_header: flag_var("CRON_TRUST_PLATFORM_HEADER")?,
            email_retry_enabled: flag_var("EMAIL_RETRY_ENABLED")?,
            email_retry_batch_size: parse_var("EMAIL_RETRY_BATCH_SIZE", "20")?,
            email_retry_max_attempts: parse_var("EMAIL_RETRY_MAX_ATTEMPTS", "10")?,
            email_retry_base_seconds: parse_var("EMAIL_RETRY_BASE_SECONDS", "60")?,
            email_retry_cap_seconds: parse_var("EMAIL_RETRY_CAP_SECONDS", "3600")?,
            worker_interval_seconds: parse_var("WORKER_INTERVAL_SECONDS", "300")?,
            resend_api_key: non_empty_var("RESEND_API_KEY"),
            resend_api_url: std::env::var("RESEND_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "orders@localhost".to_string()),
            store_name: std::env::var("STORE_NAME").unwrap_or_else(|_| "Printshop".to_string()),
            store_url: std::env::var("STORE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> anyhow::Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            )
        })
}

fn flag_var(name: &str) -> anyhow::Result<bool> {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value)
            .ok_or_else(|| anyhow::anyhow!("{} must be a boolean (true/false)", name)),
        Err(_) => Ok(false),
    }
}

/// Parse a boolean environment value. An empty value counts as unset (false).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
