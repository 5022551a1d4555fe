use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Stored value is invalid: {0}")]
    Corrupt(String),
}

impl From<centavo_core::UnknownVariant> for StoreError {
    fn from(err: centavo_core::UnknownVariant) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}
