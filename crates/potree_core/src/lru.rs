//! Recency cache over resident nodes with a point-count budget.
//!
//! Every touch stamps the entry with a fresh, strictly increasing counter.
//! Eviction walks stamps oldest first, so touch order alone decides who goes:
//! a node touched this frame always outlives one that was not.
//!
//! ```text
//! order (BTreeMap<stamp, key>)     entries (HashMap<key, entry>)
//! ┌────┬─────┐                     ┌─────┬───────────────────┐
//! │  4 │  B  │  ◄─ least recent    │  A  │ stamp 7, 300 pts  │
//! │  6 │  C  │                     │  B  │ stamp 4, 200 pts  │
//! │  7 │  A  │  ◄─ most recent     │  C  │ stamp 6, 100 pts  │
//! └────┴─────┘                     └─────┴───────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::point_cloud::NodeKey;

/// One tracked resident node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheEntry {
  pub key: NodeKey,
  pub num_points: u64,
  stamp: u64,
}

/// LRU of resident nodes enforcing a soft point budget.
#[derive(Debug)]
pub struct RecencyCache {
  point_budget: u64,
  num_points: u64,
  entries: HashMap<NodeKey, CacheEntry>,
  order: BTreeMap<u64, NodeKey>,
  next_stamp: u64,
}

impl RecencyCache {
  pub fn new(point_budget: u64) -> Self {
    Self {
      point_budget,
      num_points: 0,
      entries: HashMap::new(),
      order: BTreeMap::new(),
      next_stamp: 0,
    }
  }

  /// Mark `key` most recently used, inserting it if new.
  pub fn touch(&mut self, key: NodeKey, num_points: u64) {
    let stamp = self.next_stamp;
    self.next_stamp += 1;

    match self.entries.get_mut(&key) {
      Some(entry) => {
        self.order.remove(&entry.stamp);
        self.num_points = self.num_points - entry.num_points + num_points;
        entry.num_points = num_points;
        entry.stamp = stamp;
      }
      None => {
        self.entries.insert(
          key,
          CacheEntry {
            key,
            num_points,
            stamp,
          },
        );
        self.num_points += num_points;
      }
    }

    self.order.insert(stamp, key);
  }

  pub fn remove(&mut self, key: &NodeKey) -> Option<CacheEntry> {
    let entry = self.entries.remove(key)?;
    self.order.remove(&entry.stamp);
    self.num_points -= entry.num_points;
    Some(entry)
  }

  pub fn contains(&self, key: &NodeKey) -> bool {
    self.entries.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Points held by all tracked entries.
  pub fn num_points(&self) -> u64 {
    self.num_points
  }

  pub fn point_budget(&self) -> u64 {
    self.point_budget
  }

  /// Change the budget. Callers run [`free_memory`](Self::free_memory) next.
  pub fn set_point_budget(&mut self, point_budget: u64) {
    self.point_budget = point_budget;
  }

  pub fn least_recent(&self) -> Option<NodeKey> {
    self.order.values().next().copied()
  }

  /// Keys from least to most recently used.
  pub fn keys_by_recency(&self) -> impl Iterator<Item = NodeKey> + '_ {
    self.order.values().copied()
  }

  /// Evict least-recently-used entries until the budget holds.
  ///
  /// `evict` demotes the given node and returns every key it released (the
  /// node and any resident descendants); those leave the cache too. Returns
  /// the number of entries removed.
  pub fn free_memory<F>(&mut self, mut evict: F) -> usize
  where
    F: FnMut(NodeKey) -> Vec<NodeKey>,
  {
    let mut removed = 0;

    while self.num_points > self.point_budget {
      let Some(key) = self.least_recent() else {
        break;
      };

      let released = evict(key);
      if self.remove(&key).is_some() {
        removed += 1;
      }
      for other in released {
        if self.remove(&other).is_some() {
          removed += 1;
        }
      }
    }

    removed
  }
}

#[cfg(test)]
#[path = "lru_test.rs"]
mod lru_test;
