use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use courier_api::auth::ChallengePolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// Drop and recreate both tables before serving.
    pub reset_db: bool,
    pub generic_auth_errors: bool,
    pub challenge_policy: ChallengePolicy,
    /// Secret for decoy salts. Unset means a random key per process.
    pub decoy_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.into());

        let host = var("COURIER_HOST", "0.0.0.0");
        let port: u16 = var("COURIER_PORT", "3000")
            .parse()
            .context("COURIER_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            db_path: PathBuf::from(var("COURIER_DB_PATH", "courier.db")),
            addr,
            reset_db: parse_bool("COURIER_RESET_DB", &var("COURIER_RESET_DB", "false"))?,
            generic_auth_errors: parse_bool(
                "COURIER_GENERIC_AUTH_ERRORS",
                &var("COURIER_GENERIC_AUTH_ERRORS", "true"),
            )?,
            challenge_policy: var("COURIER_CHALLENGE_POLICY", "single-use").parse()?,
            decoy_key: get("COURIER_DECOY_KEY").filter(|k| !k.is_empty()),
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false, got {:?}", key, value),
    }
}
