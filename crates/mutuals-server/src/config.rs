use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

use mutuals_db::DEFAULT_READER_POOL_SIZE;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub db_readers: usize,
    /// Usernames granted admin rights at startup.
    pub admins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("MUTUALS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MUTUALS_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let db_path: PathBuf = get("MUTUALS_DB_PATH").unwrap_or_else(|| "mutuals.db".into()).into();
        let host = get("MUTUALS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("MUTUALS_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("MUTUALS_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_readers = match get("MUTUALS_DB_READERS") {
            Some(raw) => raw.parse().context("MUTUALS_DB_READERS must be a number")?,
            None => DEFAULT_READER_POOL_SIZE,
        };

        let admins = get("MUTUALS_ADMINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            db_readers,
            admins,
        })
    }
}
