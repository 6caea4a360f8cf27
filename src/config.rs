use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Falls back to `username` when unset.
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Signs both emailed links and session tokens. Must survive restarts.
    pub secret_key: String,
    /// Scheme and host that emailed links point at, without a trailing slash.
    pub public_base_url: String,
    pub link_max_age_secs: i64,
    pub host: String,
    pub port: u16,
    pub session: SessionConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let secret_key = std::env::var("SECRET_KEY")?;
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = parse_env("APP_PORT").unwrap_or(8080);
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let session = SessionConfig {
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "accountd".into()),
            audience: std::env::var("SESSION_AUDIENCE").unwrap_or_else(|_| "accountd-users".into()),
            ttl_minutes: parse_env("SESSION_TTL_MINUTES").unwrap_or(60),
        };

        let mail = MailConfig {
            server: std::env::var("MAIL_SERVER").unwrap_or_else(|_| "smtp.gmail.com".into()),
            port: parse_env("MAIL_PORT").unwrap_or(587),
            use_tls: std::env::var("MAIL_USE_TLS")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "t"))
                .unwrap_or(true),
            username: std::env::var("MAIL_USERNAME").ok(),
            password: std::env::var("MAIL_PASSWORD").ok(),
            sender: std::env::var("MAIL_SENDER").ok(),
        };

        Ok(Self {
            database_url,
            secret_key,
            public_base_url,
            link_max_age_secs: link_max_age(std::env::var("LINK_MAX_AGE_SECS").ok())?,
            host,
            port,
            session,
            mail,
        })
    }
}

/// Seconds an emailed link stays valid; defaults to one hour.
fn link_max_age(raw: Option<String>) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(3600);
    };
    let secs: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("LINK_MAX_AGE_SECS is not an integer: {raw:?}"))?;
    anyhow::ensure!(secs > 0, "LINK_MAX_AGE_SECS must be positive, got {secs}");
    Ok(secs)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
