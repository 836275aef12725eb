//! Repositories over the record store.
//!
//! A [`Repository`] is a short-lived view pairing the per-scope state of one
//! aggregate type with the session of the enclosing unit of work. Every
//! aggregate it returns is tracked, so events recorded on it later are
//! harvested by `UnitOfWork::collect_new_events`. Writes are buffered and
//! flushed to the session when the scope commits.

use std::collections::HashMap;

use common::UserId;
use domain::{Aggregate, Changeset, Upsert, User};
use serde_json::{Map, Value};
use store::{Record, Session, merge_fields};

use crate::error::RepositoryError;
use crate::seen::SeenTracker;

type Result<T> = std::result::Result<T, RepositoryError>;

/// What a tracked aggregate needs at flush time.
#[derive(Debug, Clone)]
enum Entry {
    /// Created in this scope; inserted on flush.
    Added,
    /// Read from the store; written back only if it differs from the snapshot.
    Loaded(Record),
    /// Removed in this scope; deleted on flush if it was ever stored.
    Removed { stored: bool },
}

/// Per-scope state of one aggregate type.
pub(crate) struct RepositoryState<A: Aggregate> {
    seen: SeenTracker<A>,
    entries: HashMap<A::Key, Entry>,
}

impl<A: Aggregate> RepositoryState<A> {
    pub(crate) fn new() -> Self {
        Self {
            seen: SeenTracker::new(),
            entries: HashMap::new(),
        }
    }

    fn track(&mut self, aggregate: A, entry: Entry) -> &mut A {
        self.entries.insert(aggregate.key(), entry);
        self.seen.add(aggregate)
    }

    /// Drains the pending events of every tracked aggregate, in tracking order.
    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<A::Event>) {
        for aggregate in self.seen.get_all_mut() {
            out.extend(aggregate.drain_events());
        }
    }

    /// Writes the buffered changes of this scope to `session`.
    pub(crate) async fn flush(&self, session: &mut dyn Session) -> Result<()> {
        let table = A::aggregate_type();

        for aggregate in self.seen.get_all() {
            let key = aggregate.key();
            let Some(entry) = self.entries.get(&key) else {
                continue;
            };
            let key = key.to_string();

            match entry {
                Entry::Added => {
                    session
                        .insert(table, &key, serde_json::to_value(aggregate)?)
                        .await?;
                }
                Entry::Loaded(snapshot) => {
                    let record = serde_json::to_value(aggregate)?;
                    if record != *snapshot {
                        session.put(table, &key, record).await?;
                    }
                }
                Entry::Removed { stored: true } => {
                    session.delete(table, &key).await?;
                }
                Entry::Removed { stored: false } => {}
            }
        }

        Ok(())
    }
}

/// Collection-like access to the aggregates of one type within a scope.
pub struct Repository<'a, A: Aggregate> {
    state: &'a mut RepositoryState<A>,
    session: &'a mut dyn Session,
}

impl<'a, A: Aggregate> Repository<'a, A> {
    pub(crate) fn new(state: &'a mut RepositoryState<A>, session: &'a mut dyn Session) -> Self {
        Self { state, session }
    }

    /// Registers a new aggregate for insertion and tracks it.
    ///
    /// Fails if an aggregate with the same key is already tracked in this
    /// scope. A collision with an already stored record is reported by the
    /// store when the scope commits.
    pub fn add(&mut self, aggregate: A) -> Result<&mut A> {
        let key = aggregate.key();
        match self.state.entries.get(&key) {
            Some(Entry::Removed { .. }) => Err(RepositoryError::Removed {
                aggregate_type: A::aggregate_type(),
                key: key.to_string(),
            }),
            Some(_) => Err(RepositoryError::DuplicateKey {
                aggregate_type: A::aggregate_type(),
                key: key.to_string(),
            }),
            None => Ok(self.state.track(aggregate, Entry::Added)),
        }
    }

    /// Fetches an aggregate by its natural key.
    ///
    /// Returns the tracked instance if there is one, otherwise loads it from
    /// the session and tracks it. Returns None if it does not exist or was
    /// removed in this scope.
    pub async fn get(&mut self, key: &A::Key) -> Result<Option<&mut A>> {
        match self.state.entries.get(key) {
            Some(Entry::Removed { .. }) => return Ok(None),
            Some(_) => return Ok(self.state.seen.get_mut(key)),
            None => {}
        }

        let table = A::aggregate_type();
        let Some(record) = self.session.get(table, &key.to_string()).await? else {
            return Ok(None);
        };
        let aggregate: A = serde_json::from_value(record.clone())?;

        Ok(Some(self.state.track(aggregate, Entry::Loaded(record))))
    }

    /// Finds the first aggregate whose top-level `field` equals `value`.
    ///
    /// Tracked aggregates are searched before the store.
    pub async fn find_by(&mut self, field: &str, value: &Value) -> Result<Option<&mut A>> {
        let mut tracked = None;
        for aggregate in self.state.seen.get_all() {
            let key = aggregate.key();
            if matches!(self.state.entries.get(&key), Some(Entry::Removed { .. })) {
                continue;
            }
            if serde_json::to_value(aggregate)?.get(field) == Some(value) {
                tracked = Some(key);
                break;
            }
        }
        if let Some(key) = tracked {
            return Ok(self.state.seen.get_mut(&key));
        }

        let table = A::aggregate_type();
        let Some((_, record)) = self.session.find_by(table, field, value).await? else {
            return Ok(None);
        };
        let aggregate: A = serde_json::from_value(record.clone())?;
        let key = aggregate.key();

        match self.state.entries.get(&key) {
            // The tracked instance no longer matches or was removed.
            Some(_) => Ok(None),
            None => Ok(Some(self.state.track(aggregate, Entry::Loaded(record)))),
        }
    }

    /// Removes an aggregate. Returns whether it existed.
    ///
    /// The removed aggregate stays tracked so events recorded on it are
    /// still harvested.
    pub async fn remove(&mut self, key: &A::Key) -> Result<bool> {
        if self.get(key).await?.is_none() {
            return Ok(false);
        }

        let stored = !matches!(self.state.entries.get(key), Some(Entry::Added));
        self.state
            .entries
            .insert(key.clone(), Entry::Removed { stored });
        Ok(true)
    }

    /// Returns every aggregate tracked in this scope, in tracking order.
    pub fn get_seen(&self) -> &[A] {
        self.state.seen.get_all()
    }
}

impl<A: Upsert> Repository<'_, A> {
    /// Upserts an aggregate by its natural key.
    ///
    /// Only the fields present in `changes` are overwritten; every other
    /// field keeps its current value, and so do the aggregate's pending
    /// events. Applying the same changes twice gives the same result.
    pub async fn add_or_update(&mut self, changes: A::Changes) -> Result<&mut A> {
        let table = A::aggregate_type();
        let key = changes.key();
        let key_str = key.to_string();
        let patch = serde_json::to_value(&changes)?;
        let incomplete = |source| RepositoryError::IncompleteRecord {
            aggregate_type: table,
            key: key_str.clone(),
            source,
        };

        match self.state.entries.get(&key) {
            Some(Entry::Removed { .. }) => {
                return Err(RepositoryError::Removed {
                    aggregate_type: table,
                    key: key_str.clone(),
                });
            }
            Some(_) => {
                let Some(current) = self.state.seen.get_mut(&key) else {
                    return Err(RepositoryError::DuplicateKey {
                        aggregate_type: table,
                        key: key_str.clone(),
                    });
                };
                let mut record = serde_json::to_value(&*current)?;
                merge_fields(table, &key_str, &mut record, &patch)?;

                let mut merged: A = serde_json::from_value(record).map_err(incomplete)?;
                std::mem::swap(merged.events_mut(), current.events_mut());
                *current = merged;
                return Ok(current);
            }
            None => {}
        }

        // Validate the merged result before handing the patch to the store.
        let stored = self.session.get(table, &key_str).await?;
        let mut record = stored.unwrap_or_else(|| Value::Object(Map::new()));
        merge_fields(table, &key_str, &mut record, &patch)?;
        serde_json::from_value::<A>(record).map_err(incomplete)?;

        let record = self.session.merge(table, &key_str, patch).await?;
        let aggregate: A = serde_json::from_value(record.clone()).map_err(incomplete)?;

        Ok(self.state.track(aggregate, Entry::Loaded(record)))
    }
}

impl Repository<'_, User> {
    /// Fetches a user by surrogate id.
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<&mut User>> {
        self.find_by("id", &serde_json::to_value(id)?).await
    }
}
