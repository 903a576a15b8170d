use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing::info;

use unihub_api::recommendations::TieBreak;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub tie_break: TieBreak,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("UNIHUB_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("UNIHUB_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let shuffle: bool = try_load("UNIHUB_SHUFFLE_TIES", "false")?;

        Ok(Self {
            host: try_load("UNIHUB_HOST", "0.0.0.0")?,
            port: try_load("UNIHUB_PORT", "3000")?,
            db_path: try_load("UNIHUB_DB_PATH", "unihub.db")?,
            jwt_secret,
            tie_break: if shuffle { TieBreak::Shuffle } else { TieBreak::UserId },
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value '{raw}'"))
}
