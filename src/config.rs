use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::anyhow;
use tracing::{info, warn};

use crate::session::SignupGate;

pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub storage_dir: PathBuf,
    pub storage_public_url: String,
    pub gate: SignupGate,
    pub session_inactivity_minutes: i64,
}

impl Config {
    /// Reads the environment, after loading `.env` if there is one.
    pub fn load() -> anyhow::Result<Self> {
        if let Err(e) = dotenv::dotenv() {
            info!("no .env loaded: {e}");
        }

        Ok(Self {
            database_url: try_load("DATABASE_URL", "sqlite://classmates.db")?,
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:8080")?,
            storage_dir: try_load("STORAGE_DIR", "storage")?,
            storage_public_url: try_load("STORAGE_PUBLIC_URL", "/storage")?,
            gate: signup_gate(dotenv::var("ALLOWED_EMAILS").ok()),
            session_inactivity_minutes: try_load("SESSION_INACTIVITY_MINUTES", "10080")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    parse_or_default(key, dotenv::var(key).ok(), default)
}

/// Parse `value`, falling back to `default` when it is unset or invalid.
fn parse_or_default<T: FromStr>(
    key: &str,
    value: Option<String>,
    default: &str,
) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let Some(value) = value else {
        info!("{key} not set, using default: {default}");
        return parse_default(key, default);
    };

    value.parse().or_else(|e| {
        warn!("Invalid {key} value {value:?} ({e}), using default: {default}");
        parse_default(key, default)
    })
}

fn parse_default<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    default
        .parse()
        .map_err(|e| anyhow!("default {key} value {default:?} is invalid: {e}"))
}

/// `ALLOWED_EMAILS` is a comma separated list. Unset or empty leaves signup open.
fn signup_gate(list: Option<String>) -> SignupGate {
    let Some(list) = list else {
        return SignupGate::open();
    };

    let emails: Vec<&str> = list
        .split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .collect();

    if emails.is_empty() {
        warn!("ALLOWED_EMAILS is empty, signup is open to everyone");
        return SignupGate::open();
    }

    info!(count = emails.len(), "signup restricted to allowed emails");
    SignupGate::allow_list(emails)
}
