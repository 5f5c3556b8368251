pub mod config;
pub mod migrate;
pub mod operations;

mod health_monitor;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::db::config::{DbConfig, DbConfigError};
use crate::db::health_monitor::{HealthCheckResult, HealthCheckSnapshot, HealthTracker};
use crate::db::migrate::MigrationError;

#[derive(Clone)]
pub struct DatabaseProxy {
    config: DbConfig,
    pool: PgPool,
    health: Arc<RwLock<HealthTracker>>,
}

impl DatabaseProxy {
    pub async fn from_env() -> Result<Arc<Self>, DbInitError> {
        let config = DbConfig::from_env()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(DbInitError::Sqlx)?;

        let auto_migrate = std::env::var("AUTO_MIGRATE")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        if auto_migrate {
            migrate::run_migrations(&pool).await?;
        }

        let proxy = Arc::new(Self {
            health: Arc::new(RwLock::new(HealthTracker::new(config.health_check.clone()))),
            config,
            pool,
        });

        proxy.start_health_monitor();

        Ok(proxy)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> &str {
        &self.config.url
    }

    pub async fn health_status(&self) -> HealthCheckSnapshot {
        let tracker = self.health.read().await;
        tracker.snapshot()
    }
}

impl DatabaseProxy {
    fn start_health_monitor(self: &Arc<Self>) {
        let proxy = Arc::clone(self);
        tokio::spawn(async move {
            proxy.health_monitor_loop().await;
        });
    }

    async fn health_monitor_loop(self: Arc<Self>) {
        let interval = self.config.health_check.interval;

        loop {
            let start = tokio::time::Instant::now();
            let result = self.check_health().await;
            {
                let mut tracker = self.health.write().await;
                tracker.process(result);
            }

            let elapsed = start.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
    }

    async fn check_health(&self) -> HealthCheckResult {
        let timeout = self.config.health_check.timeout;
        let pool = self.pool.clone();

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(&pool)).await;

        match result {
            Ok(Ok(_)) => HealthCheckResult::healthy(started.elapsed()),
            Ok(Err(err)) => HealthCheckResult::unhealthy(err.to_string()),
            Err(_) => HealthCheckResult::unhealthy("timeout".to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error(transparent)]
    Config(#[from] DbConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}
