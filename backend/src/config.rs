//! Runtime configuration, read from command-line flags or the environment.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::{Parser, ValueEnum};
use thiserror::Error;

/// `Key::derive_from` needs at least this much input material.
pub const MIN_COOKIE_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid token lifetime `{0}`, expected a number of seconds or e.g. `30m`, `12h`, `1d`")]
    InvalidLifetime(String),
    #[error("token lifetime must be greater than zero")]
    ZeroLifetime,
    #[error("secret must not be empty")]
    EmptySecret,
    #[error("cookie secret must be at least 32 bytes long")]
    ShortCookieSecret,
    #[error("invalid client origin `{0}`")]
    InvalidOrigin(String),
}

/// Deployment environment. Only production turns on `Secure` cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

#[derive(Clone, Parser)]
#[command(name = "account-service", about = "Account registration and session API")]
pub struct Config {
    /// sqlx SQLite connection string, e.g. `sqlite://accounts.db`.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "JWT_SECRET", value_parser = parse_secret)]
    pub jwt_secret: String,

    /// Token lifetime: bare seconds or a number suffixed with s, m, h, d or w.
    #[arg(long, env = "JWT_LIFETIME", default_value = "1d", value_parser = parse_lifetime)]
    pub jwt_lifetime: Duration,

    /// Master secret for signing the session cookie.
    #[arg(long, env = "COOKIE_SECRET", value_parser = parse_cookie_secret)]
    pub cookie_secret: String,

    #[arg(long, env = "APP_ENV", value_enum, default_value_t = AppEnv::Development)]
    pub app_env: AppEnv,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: SocketAddr,

    /// Browser origin allowed to call the API with credentials.
    #[arg(long, env = "CLIENT_ORIGIN", value_parser = parse_origin)]
    pub client_origin: Option<HeaderValue>,

    /// Directory holding a built client bundle to serve next to the API.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_lifetime", &self.jwt_lifetime)
            .field("cookie_secret", &"<redacted>")
            .field("app_env", &self.app_env)
            .field("bind_addr", &self.bind_addr)
            .field("client_origin", &self.client_origin)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

/// Parse a token lifetime such as `3600`, `45m`, `12h` or `1d`.
pub fn parse_lifetime(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidLifetime(raw.to_owned());
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let scale = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return Err(invalid()),
    };
    let secs = amount.checked_mul(scale).ok_or_else(invalid)?;
    if secs == 0 {
        return Err(ConfigError::ZeroLifetime);
    }
    Ok(Duration::from_secs(secs))
}

fn parse_secret(raw: &str) -> Result<String, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::EmptySecret);
    }
    Ok(raw.to_owned())
}

fn parse_cookie_secret(raw: &str) -> Result<String, ConfigError> {
    if raw.len() < MIN_COOKIE_SECRET_LEN {
        return Err(ConfigError::ShortCookieSecret);
    }
    Ok(raw.to_owned())
}

fn parse_origin(raw: &str) -> Result<HeaderValue, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidOrigin(raw.to_owned()));
    }
    HeaderValue::from_str(trimmed).map_err(|_| ConfigError::InvalidOrigin(raw.to_owned()))
}
