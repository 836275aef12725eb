use async_trait::async_trait;
use serde_json::Value;

use crate::{Record, Result};

/// A source of transactional sessions.
///
/// The store itself is shared between concurrent callers; every unit of work
/// opens its own [`Session`] and never hands it to anyone else.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a new session with its own transaction.
    async fn begin(&self) -> Result<Box<dyn Session>>;
}

/// A single transaction against the store.
///
/// Writes made through a session are only visible to that session until
/// [`Session::commit`] succeeds. A session that is dropped or closed without
/// committing is rolled back. After `commit`, `rollback` or `close` every
/// further call fails with [`StoreError::SessionClosed`](crate::StoreError::SessionClosed).
#[async_trait]
pub trait Session: Send {
    /// Fetches a record by its key.
    ///
    /// Returns None if the table has no record with that key.
    async fn get(&mut self, table: &str, key: &str) -> Result<Option<Record>>;

    /// Finds the first record (in key order) whose `field` equals `value`.
    ///
    /// Returns the record's key together with the record.
    async fn find_by(
        &mut self,
        table: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<(String, Record)>>;

    /// Inserts a new record.
    ///
    /// Fails with `DuplicateKey` if the key is already taken, either at call
    /// time or when the session commits.
    async fn insert(&mut self, table: &str, key: &str, record: Record) -> Result<()>;

    /// Writes a record, replacing any existing one with the same key.
    async fn put(&mut self, table: &str, key: &str, record: Record) -> Result<()>;

    /// Upserts a record by merging the fields of `patch` over the existing one.
    ///
    /// Inserts `patch` as-is when no record exists. Returns the merged record.
    async fn merge(&mut self, table: &str, key: &str, patch: Record) -> Result<Record>;

    /// Deletes a record. Returns whether a record was removed.
    async fn delete(&mut self, table: &str, key: &str) -> Result<bool>;

    /// Durably applies every write made in this session.
    async fn commit(&mut self) -> Result<()>;

    /// Discards every write made in this session.
    async fn rollback(&mut self) -> Result<()>;

    /// Releases the session, rolling back if it is still open.
    ///
    /// Closing an already finished session is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Returns whether the session can still be used.
    fn is_open(&self) -> bool;
}
