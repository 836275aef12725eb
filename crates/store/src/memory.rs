use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::record::ensure_record;
use crate::{Record, Result, Session, Store, StoreError, merge_fields};

type Tables = HashMap<String, BTreeMap<String, Record>>;

/// In-memory record store.
///
/// Tables live behind a shared lock; sessions stage their writes locally and
/// apply them in one step on commit, so uncommitted writes are never visible
/// to other sessions.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed records in a table.
    pub async fn record_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Returns a committed record, bypassing any session.
    pub async fn committed(&self, table: &str, key: &str) -> Option<Record> {
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Session>> {
        Ok(Box::new(InMemorySession {
            tables: Arc::clone(&self.tables),
            staged: BTreeMap::new(),
            open: true,
        }))
    }
}

#[derive(Debug, Clone)]
enum Staged {
    Insert(Record),
    Put(Record),
    Delete,
}

impl Staged {
    fn record(&self) -> Option<&Record> {
        match self {
            Staged::Insert(record) | Staged::Put(record) => Some(record),
            Staged::Delete => None,
        }
    }
}

/// A session over an [`InMemoryStore`].
pub struct InMemorySession {
    tables: Arc<RwLock<Tables>>,
    staged: BTreeMap<(String, String), Staged>,
    open: bool,
}

impl InMemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::SessionClosed)
        }
    }

    fn staged_key(table: &str, key: &str) -> (String, String) {
        (table.to_string(), key.to_string())
    }

    async fn current(&self, table: &str, key: &str) -> Option<Record> {
        if let Some(staged) = self.staged.get(&Self::staged_key(table, key)) {
            return staged.record().cloned();
        }
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
    }

    fn stage(&mut self, table: &str, key: &str, staged: Staged) {
        let slot = Self::staged_key(table, key);
        // An insert followed by a put in the same session is still an insert;
        // an insert replacing a row this session deleted overwrites it.
        let staged = match (self.staged.get(&slot), staged) {
            (Some(Staged::Insert(_)), Staged::Put(record)) => Staged::Insert(record),
            (Some(Staged::Delete), Staged::Insert(record)) => Staged::Put(record),
            (_, staged) => staged,
        };
        self.staged.insert(slot, staged);
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn get(&mut self, table: &str, key: &str) -> Result<Option<Record>> {
        self.ensure_open()?;
        Ok(self.current(table, key).await)
    }

    async fn find_by(
        &mut self,
        table: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<(String, Record)>> {
        self.ensure_open()?;

        let mut visible: BTreeMap<String, Record> = self
            .tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default();

        for ((staged_table, key), staged) in &self.staged {
            if staged_table != table {
                continue;
            }
            match staged.record() {
                Some(record) => {
                    visible.insert(key.clone(), record.clone());
                }
                None => {
                    visible.remove(key);
                }
            }
        }

        Ok(visible
            .into_iter()
            .find(|(_, record)| record.get(field) == Some(value)))
    }

    async fn insert(&mut self, table: &str, key: &str, record: Record) -> Result<()> {
        self.ensure_open()?;
        ensure_record(table, key, &record)?;

        if self.current(table, key).await.is_some() {
            return Err(StoreError::DuplicateKey {
                table: table.to_string(),
                key: key.to_string(),
            });
        }

        self.stage(table, key, Staged::Insert(record));
        Ok(())
    }

    async fn put(&mut self, table: &str, key: &str, record: Record) -> Result<()> {
        self.ensure_open()?;
        ensure_record(table, key, &record)?;
        self.stage(table, key, Staged::Put(record));
        Ok(())
    }

    async fn merge(&mut self, table: &str, key: &str, patch: Record) -> Result<Record> {
        self.ensure_open()?;
        ensure_record(table, key, &patch)?;

        let merged = match self.current(table, key).await {
            Some(mut existing) => {
                merge_fields(table, key, &mut existing, &patch)?;
                existing
            }
            None => patch,
        };

        self.stage(table, key, Staged::Put(merged.clone()));
        Ok(merged)
    }

    async fn delete(&mut self, table: &str, key: &str) -> Result<bool> {
        self.ensure_open()?;
        let existed = self.current(table, key).await.is_some();
        if existed {
            self.stage(table, key, Staged::Delete);
        }
        Ok(existed)
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.open = false;

        let staged = std::mem::take(&mut self.staged);
        let mut tables = self.tables.write().await;

        // Inserts are re-checked under the write lock so a concurrent commit of
        // the same key fails the whole session instead of being overwritten.
        for ((table, key), change) in &staged {
            if matches!(change, Staged::Insert(_))
                && tables.get(table).is_some_and(|rows| rows.contains_key(key))
            {
                return Err(StoreError::DuplicateKey {
                    table: table.clone(),
                    key: key.clone(),
                });
            }
        }

        let writes = staged.len();
        for ((table, key), change) in staged {
            let rows = tables.entry(table).or_default();
            match change {
                Staged::Insert(record) | Staged::Put(record) => {
                    rows.insert(key, record);
                }
                Staged::Delete => {
                    rows.remove(&key);
                }
            }
        }

        tracing::debug!(writes, "in-memory session committed");
        metrics::counter!("store_commits_total", "backend" => "memory").increment(1);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.open = false;
        self.staged.clear();
        metrics::counter!("store_rollbacks_total", "backend" => "memory").increment(1);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.rollback().await?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
