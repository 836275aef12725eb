//! Core aggregate traits and the pending event queue.

use std::fmt;
use std::hash::Hash;

use serde::{Serialize, de::DeserializeOwned};

/// Events recorded by an aggregate that have not been dispatched yet.
///
/// Only the aggregate's own business methods record into the queue.
/// Infrastructure reads it through [`Aggregate::events`] and empties it
/// through [`Aggregate::drain_events`]; draining hands out every event once.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQueue<E>(Vec<E>);

impl<E> EventQueue<E> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an event at the back of the queue.
    pub fn record(&mut self, event: E) {
        self.0.push(event);
    }

    /// Returns the pending events, oldest first.
    pub fn pending(&self) -> &[E] {
        &self.0
    }

    /// Returns the number of pending events.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes and returns every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.0)
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for aggregates persisted through a repository.
///
/// An aggregate is identified by a natural business key (an email address, a
/// build string, a CVE id) and records events as a side effect of its
/// business rules. The aggregate does not know who consumes those events.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The natural key of the aggregate.
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// The type of events this aggregate records.
    type Event: Send + 'static;

    /// Returns the aggregate type name.
    ///
    /// Used as the table name in the record store.
    fn aggregate_type() -> &'static str;

    /// Returns the natural key of this aggregate.
    fn key(&self) -> Self::Key;

    /// Returns the events recorded but not yet drained.
    fn events(&self) -> &EventQueue<Self::Event>;

    /// Returns the event queue for draining or carrying it over.
    fn events_mut(&mut self) -> &mut EventQueue<Self::Event>;

    /// Removes and returns every pending event, oldest first.
    fn drain_events(&mut self) -> Vec<Self::Event> {
        self.events_mut().drain()
    }
}

/// A partial set of field values for an aggregate, keyed by its natural key.
///
/// Serializes to a JSON object containing only the fields that are set, so
/// applying it overwrites those fields and leaves every other field alone.
pub trait Changeset<A: Aggregate>: Serialize + Send + Sync {
    /// Returns the natural key of the aggregate this changeset targets.
    fn key(&self) -> A::Key;
}

/// Aggregates that support merge-style upserts.
pub trait Upsert: Aggregate {
    /// The changeset type accepted by `add_or_update`.
    type Changes: Changeset<Self>;
}
