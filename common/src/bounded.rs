//! Bounded, order-preserving, duplicate-free id collections.
//!
//! Entities and relations carry `sourceChunkIds`, capped at `max-source-ids`
//! (default 50) with FIFO eviction. This invariant is checked on every
//! mutating operation rather than assumed, since it is explicitly called out
//! as a testable property.

use std::collections::VecDeque;
use uuid::Uuid;

/// A capacity-bounded, duplicate-free, insertion-ordered set of chunk ids.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct BoundedIdSet {
    ids: VecDeque<Uuid>,
    capacity: usize,
}

impl BoundedIdSet {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Inserts `id` if it is not already present, evicting the oldest entry
    /// when the collection is at capacity. Returns `true` if the id was newly
    /// inserted.
    pub fn push(&mut self, id: Uuid) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        if self.ids.len() >= self.capacity {
            self.ids.pop_front();
        }
        self.ids.push_back(id);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uuid> {
        self.ids.iter()
    }

    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    /// Merges `other` into `self`, preserving insertion order and the bound.
    pub fn extend(&mut self, other: &BoundedIdSet) {
        for id in &other.ids {
            self.push(*id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_capacity_with_fifo_eviction() {
        let mut set = BoundedIdSet::new(3);
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            set.push(*id);
        }
        assert_eq!(set.len(), 3);
        assert!(!set.contains(&ids[0]));
        assert!(!set.contains(&ids[1]));
        assert!(set.contains(&ids[4]));
    }

    #[test]
    fn never_stores_duplicates() {
        let mut set = BoundedIdSet::new(50);
        let id = Uuid::new_v4();
        assert!(set.push(id));
        assert!(!set.push(id));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn extend_preserves_bound() {
        let mut a = BoundedIdSet::new(2);
        a.push(Uuid::new_v4());
        let mut b = BoundedIdSet::new(2);
        b.push(Uuid::new_v4());
        b.push(Uuid::new_v4());
        b.push(Uuid::new_v4());
        a.extend(&b);
        assert_eq!(a.len(), 2);
    }
}
