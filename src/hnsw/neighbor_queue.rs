//! Priority queue helpers for HNSW search — f32 distances need an
//! explicit total order before they can live in a BinaryHeap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate during graph search: internal slot plus query distance.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub distance: f32,
    pub slot: usize,
}

impl Neighbor {
    pub fn new(slot: usize, distance: f32) -> Self {
        Self { distance, slot }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.slot == other.slot
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Distance-major ordering with slot tie-break, so heap behavior is
// deterministic even for equal distances.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

/// Reverses Neighbor ordering to build a min-heap on BinaryHeap.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Reversed(Neighbor);

impl PartialOrd for Reversed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reversed {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

/// Max-heap of neighbors: furthest on top. The bounded result set during
/// layer search.
#[derive(Debug, Default)]
pub struct MaxHeap {
    heap: BinaryHeap<Neighbor>,
}

impl MaxHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, n: Neighbor) {
        self.heap.push(n);
    }

    pub fn peek(&self) -> Option<&Neighbor> {
        self.heap.peek()
    }

    pub fn pop(&mut self) -> Option<Neighbor> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a Vec sorted ascending by distance.
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        let mut v: Vec<Neighbor> = self.heap.into_vec();
        v.sort();
        v
    }
}

/// Min-heap of neighbors: closest on top. The candidate frontier.
#[derive(Debug, Default)]
pub struct MinHeap {
    heap: BinaryHeap<Reversed>,
}

impl MinHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, n: Neighbor) {
        self.heap.push(Reversed(n));
    }

    pub fn pop(&mut self) -> Option<Neighbor> {
        self.heap.pop().map(|r| r.0)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_heap_pops_furthest_first() {
        let mut heap = MaxHeap::new();
        heap.push(Neighbor::new(0, 3.0));
        heap.push(Neighbor::new(1, 1.0));
        heap.push(Neighbor::new(2, 2.0));

        assert_eq!(heap.pop().unwrap().distance, 3.0);
        assert_eq!(heap.pop().unwrap().distance, 2.0);
        assert_eq!(heap.pop().unwrap().distance, 1.0);
    }

    #[test]
    fn test_min_heap_pops_closest_first() {
        let mut heap = MinHeap::new();
        heap.push(Neighbor::new(0, 3.0));
        heap.push(Neighbor::new(1, 1.0));
        heap.push(Neighbor::new(2, 2.0));

        assert_eq!(heap.pop().unwrap().distance, 1.0);
        assert_eq!(heap.pop().unwrap().distance, 2.0);
        assert_eq!(heap.pop().unwrap().distance, 3.0);
    }

    #[test]
    fn test_equal_distances_tie_break_on_slot() {
        let mut heap = MinHeap::new();
        heap.push(Neighbor::new(9, 1.0));
        heap.push(Neighbor::new(2, 1.0));

        assert_eq!(heap.pop().unwrap().slot, 2);
        assert_eq!(heap.pop().unwrap().slot, 9);
    }

    #[test]
    fn test_into_sorted_vec_ascending() {
        let mut heap = MaxHeap::new();
        for (slot, d) in [(0, 5.0), (1, 1.0), (2, 3.0), (3, 2.0)] {
            heap.push(Neighbor::new(slot, d));
        }
        let sorted = heap.into_sorted_vec();
        for pair in sorted.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }
}
