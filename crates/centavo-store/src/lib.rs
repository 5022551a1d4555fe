//! Centavo Store - PostgreSQL persistence
//!
//! This crate provides:
//! - Session lookup for bearer-token authentication
//! - Read-only spending aggregates used as AI context
//! - Atomic replacement of a user's tips and weekly meal plans
//! - Transactional persistence of scanned receipts
//! - The append-only token usage ledger
//!
//! Every multi-statement write runs inside a single transaction.

pub mod error;
pub mod meal_plans;
pub mod receipts;
pub mod sessions;
pub mod spending;
pub mod tips;
pub mod token_usage;

pub use error::StoreError;
pub use receipts::SavedReceipt;
pub use sessions::SessionCheck;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Handle to the database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        info!("Connected to database");
        Ok(Self { pool })
    }

    /// Create a pool that opens connections on first use.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}
