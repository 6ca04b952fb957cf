//! Binary min-heap ordered by a caller-supplied score.
//!
//! `pop` always yields the item with the numerically smallest score. The
//! scheduler scores queue items with `1 / weight` so the heaviest node comes
//! out first.
//!
//! ```text
//!            [0]
//!          /     \
//!       [1]       [2]        parent(n) = (n + 1) / 2 - 1
//!      /   \     /   \       children(n) = 2n + 1, 2n + 2
//!    [3]  [4]  [5]  [6]
//! ```

/// Binary heap over a dynamic array.
///
/// Scores are recomputed on every comparison, so the score function should be
/// cheap and must not change for an item while it is queued.
pub struct BinaryHeap<T, F>
where
  F: Fn(&T) -> f64,
{
  content: Vec<T>,
  score: F,
}

impl<T, F> BinaryHeap<T, F>
where
  F: Fn(&T) -> f64,
{
  /// Create an empty heap ordered by `score`.
  pub fn new(score: F) -> Self {
    Self {
      content: Vec::new(),
      score,
    }
  }

  /// Create an empty heap with room for `capacity` items.
  pub fn with_capacity(capacity: usize, score: F) -> Self {
    Self {
      content: Vec::with_capacity(capacity),
      score,
    }
  }

  /// Insert an item. O(log n).
  pub fn push(&mut self, item: T) {
    self.content.push(item);
    self.bubble_up(self.content.len() - 1);
  }

  /// Remove and return the lowest-scored item. O(log n).
  ///
  /// Returns `None` when the heap is empty.
  pub fn pop(&mut self) -> Option<T> {
    if self.content.is_empty() {
      return None;
    }

    let last = self.content.len() - 1;
    self.content.swap(0, last);
    let result = self.content.pop();
    if !self.content.is_empty() {
      self.sink_down(0);
    }
    result
  }

  /// Lowest-scored item without removing it.
  pub fn peek(&self) -> Option<&T> {
    self.content.first()
  }

  /// Remove the first item equal to `item`. O(n).
  ///
  /// Linear scan; meant for rare explicit cancellation, not the hot path.
  pub fn remove(&mut self, item: &T) -> Option<T>
  where
    T: PartialEq,
  {
    let index = self.content.iter().position(|candidate| candidate == item)?;
    let removed = self.content.swap_remove(index);
    if index < self.content.len() {
      self.bubble_up(index);
      self.sink_down(index);
    }
    Some(removed)
  }

  /// Number of queued items.
  pub fn size(&self) -> usize {
    self.content.len()
  }

  /// Alias of [`size`](Self::size).
  pub fn len(&self) -> usize {
    self.content.len()
  }

  pub fn is_empty(&self) -> bool {
    self.content.is_empty()
  }

  /// Drop every queued item, keeping the allocation.
  pub fn clear(&mut self) {
    self.content.clear();
  }

  fn bubble_up(&mut self, mut n: usize) {
    let score = (self.score)(&self.content[n]);
    while n > 0 {
      let parent = (n + 1) / 2 - 1;
      if score >= (self.score)(&self.content[parent]) {
        break;
      }
      self.content.swap(parent, n);
      n = parent;
    }
  }

  fn sink_down(&mut self, mut n: usize) {
    let length = self.content.len();
    let element_score = (self.score)(&self.content[n]);

    loop {
      let child2 = (n + 1) * 2;
      let child1 = child2 - 1;
      let mut swap = None;
      let mut best = element_score;

      if child1 < length {
        let child1_score = (self.score)(&self.content[child1]);
        if child1_score < best {
          swap = Some(child1);
          best = child1_score;
        }
      }
      if child2 < length {
        let child2_score = (self.score)(&self.content[child2]);
        if child2_score < best {
          swap = Some(child2);
        }
      }

      match swap {
        Some(index) => {
          self.content.swap(n, index);
          n = index;
        }
        None => break,
      }
    }
  }
}

#[cfg(test)]
#[path = "heap_test.rs"]
mod heap_test;
