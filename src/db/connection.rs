//! Connection settings and pool creation with a bounded, fixed-delay retry

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub server: String,
    pub port: u16,
    pub database: String,
    /// Absent credentials fall back to the libpq environment (PGUSER, PGPASSWORD, .pgpass)
    pub username: Option<String>,
    pub password: Option<String>,
    pub driver: String,
    /// Seconds
    pub connection_timeout: u64,
    pub max_retries: u32,
    /// Seconds between connection attempts
    pub retry_delay: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 5432,
            database: "energy_factbook".to_string(),
            username: None,
            password: None,
            driver: "postgres".to_string(),
            connection_timeout: 30,
            max_retries: 3,
            retry_delay: 2,
        }
    }
}

impl DatabaseSettings {
    pub fn auth_mode(&self) -> &'static str {
        if self.username.is_some() && self.password.is_some() {
            "password"
        } else {
            "trusted"
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.server)
            .port(self.port)
            .database(&self.database);

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options = options.username(username).password(password);
        }
        options
    }
}

/// Run `op` up to `attempts` times with a fixed delay between attempts; returns the last error
pub async fn with_retry<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    "Database connection failed (attempt {}/{}): {}",
                    attempt, attempts, e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Open a connection pool, retrying per the settings
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool> {
    info!(
        "Connecting to {}:{}/{} ({} auth)",
        settings.server,
        settings.port,
        settings.database,
        settings.auth_mode()
    );

    let options = settings.connect_options();
    let pool = with_retry(
        settings.max_retries,
        Duration::from_secs(settings.retry_delay),
        || {
            PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(settings.connection_timeout))
                .connect_with(options.clone())
        },
    )
    .await
    .context("Failed to connect to database")?;

    info!("✅ Database connected");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_auth_mode() {
        let mut settings = DatabaseSettings::default();
        assert_eq!(settings.auth_mode(), "trusted");

        settings.username = Some("etl".to_string());
        assert_eq!(settings.auth_mode(), "trusted");

        settings.password = Some("secret".to_string());
        assert_eq!(settings.auth_mode(), "password");
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = with_retry(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("connection refused".to_string()) }
        })
        .await;

        assert_eq!(result, Err("connection refused".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = with_retry(5, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 2 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
