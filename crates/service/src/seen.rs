//! Identity map of the aggregates touched in one unit of work scope.

use std::collections::HashMap;

use domain::Aggregate;

/// Aggregates fetched or added during one scope, keyed by natural key.
///
/// Iteration follows insertion order. Adding a key that is already tracked
/// is a no-op and the first instance stays.
pub struct SeenTracker<A: Aggregate> {
    items: Vec<A>,
    index: HashMap<A::Key, usize>,
}

impl<A: Aggregate> SeenTracker<A> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Tracks an aggregate and returns the tracked instance for its key.
    pub fn add(&mut self, item: A) -> &mut A {
        let key = item.key();
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.items.push(item);
                let position = self.items.len() - 1;
                self.index.insert(key, position);
                position
            }
        };
        &mut self.items[position]
    }

    pub fn contains(&self, key: &A::Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &A::Key) -> Option<&A> {
        self.index.get(key).map(|&position| &self.items[position])
    }

    pub fn get_mut(&mut self, key: &A::Key) -> Option<&mut A> {
        self.index
            .get(key)
            .copied()
            .map(move |position| &mut self.items[position])
    }

    /// Returns every tracked aggregate in insertion order.
    pub fn get_all(&self) -> &[A] {
        &self.items
    }

    pub fn get_all_mut(&mut self) -> &mut [A] {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<A: Aggregate> Default for SeenTracker<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use domain::{Aggregate, Manufacturer};

    use super::*;

    #[test]
    fn duplicate_add_keeps_first_instance() {
        let mut seen = SeenTracker::new();
        seen.add(Manufacturer::new("Apple"));
        seen.add(Manufacturer::new("Samsung"));
        seen.add(Manufacturer::new("Apple"));

        assert_eq!(seen.len(), 2);
        let names: Vec<_> = seen.get_all().iter().map(|m| m.key()).collect();
        assert_eq!(names, vec!["Apple", "Samsung"]);
    }

    #[test]
    fn membership_is_by_key() {
        let mut seen = SeenTracker::new();
        seen.add(Manufacturer::new("Apple"));

        assert!(seen.contains(&"Apple".to_string()));
        assert!(!seen.contains(&"Google".to_string()));
        assert_eq!(seen.get(&"Apple".to_string()).map(|m| m.name()), Some("Apple"));
    }
}
