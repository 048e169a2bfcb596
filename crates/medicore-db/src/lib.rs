//! MediCore Database Layer
//!
//! Persistence for accounts and their refresh sessions.
//!
//! # Backends
//!
//! - **PostgreSQL**: `accounts` and `account_sessions` tables, see [`AccountRepo`]
//! - **Memory**: process-local maps for development mode and tests, see [`MemoryStore`]
//!
//! Both implement [`AccountStore`]; everything above this crate talks to the
//! trait only.

pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod repos;
pub mod store;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use models::*;
pub use repos::*;
pub use store::{AccountStore, SessionCheck};

/// PostgreSQL connection pool
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.postgres_url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        Ok(Self { pg })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    pub async fn health_check(&self) -> HealthStatus {
        let postgres = sqlx::query("SELECT 1").fetch_one(&self.pg).await.is_ok();
        HealthStatus {
            postgres,
            healthy: postgres,
        }
    }

    pub fn account_repo(&self) -> AccountRepo {
        AccountRepo::new(self.pg.clone())
    }
}

/// Health status of the database connection
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub postgres: bool,
    pub healthy: bool,
}
