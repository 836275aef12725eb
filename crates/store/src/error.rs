use thiserror::Error;

/// Errors that can occur when interacting with the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same key already exists in the table.
    #[error("Duplicate key in {table}: {key}")]
    DuplicateKey { table: String, key: String },

    /// A stored or supplied value is not a JSON object.
    #[error("Record {key} in {table} is not a JSON object")]
    NotARecord { table: String, key: String },

    /// The session was already committed, rolled back or closed.
    #[error("Session is closed")]
    SessionClosed,

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
