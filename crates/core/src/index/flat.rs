//! Flat vector arena with exact top-k search.

use crate::index::distance::{norm, DistanceMetric};
use ordered_float::OrderedFloat;
use std::collections::{BinaryHeap, HashMap};

/// One search hit: position-independent id plus cosine distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub distance: f32,
}

/// A result entry: max-heap by distance so the worst hit is popped first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    slot: usize,
}

/// Exact-search index. Vectors live contiguously in `vectors`, `dimension`
/// floats per slot; `ids[slot]` and `norms[slot]` are parallel arrays.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    vectors: Vec<f32>,
    norms: Vec<f32>,
    ids: Vec<String>,
    slots: HashMap<String, usize>,
}

impl FlatIndex {
    /// Empty index for `dimension`-length vectors.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            vectors: Vec::new(),
            norms: Vec::new(),
            ids: Vec::new(),
            slots: HashMap::new(),
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` has a vector in the index.
    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Insert or replace the vector for `id`.
    ///
    /// The caller guarantees `vector.len() == dimension`.
    pub fn upsert(&mut self, id: &str, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dimension);
        let n = norm(vector);
        match self.slots.get(id) {
            Some(&slot) => {
                let base = slot * self.dimension;
                self.vectors[base..base + self.dimension].copy_from_slice(vector);
                self.norms[slot] = n;
            }
            None => {
                let slot = self.ids.len();
                self.vectors.extend_from_slice(vector);
                self.norms.push(n);
                self.ids.push(id.to_string());
                self.slots.insert(id.to_string(), slot);
            }
        }
    }

    /// Remove `id`, moving the last slot into its place. Returns `true` if present.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        let last = self.ids.len() - 1;
        if slot != last {
            let dim = self.dimension;
            self.vectors
                .copy_within(last * dim..(last + 1) * dim, slot * dim);
            self.norms[slot] = self.norms[last];
            self.ids.swap(slot, last);
            self.slots.insert(self.ids[slot].clone(), slot);
        }
        self.vectors.truncate(last * self.dimension);
        self.norms.truncate(last);
        self.ids.truncate(last);
        true
    }

    /// The stored vector for `id`.
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        let slot = *self.slots.get(id)?;
        let base = slot * self.dimension;
        Some(&self.vectors[base..base + self.dimension])
    }

    /// Up to `k` nearest neighbors whose distance is at most `max_distance`,
    /// sorted by ascending distance.
    pub fn search(&self, query: &[f32], k: usize, max_distance: f32) -> Vec<Neighbor> {
        if k == 0 || self.is_empty() || query.len() != self.dimension {
            return Vec::new();
        }
        let query_norm = norm(query);

        let mut heap: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(k + 1);
        for (slot, stored) in self.vectors.chunks_exact(self.dimension).enumerate() {
            let distance =
                self.metric
                    .distance_prenorm(query, query_norm, stored, self.norms[slot]);
            if distance > max_distance {
                continue;
            }
            heap.push(ResultEntry {
                distance: OrderedFloat(distance),
                slot,
            });
            if heap.len() > k {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|e| Neighbor {
                id: self.ids[e.slot].clone(),
                distance: e.distance.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(vectors: &[(&str, [f32; 4])]) -> FlatIndex {
        let mut idx = FlatIndex::new(4, DistanceMetric::Cosine);
        for (id, v) in vectors {
            idx.upsert(id, v);
        }
        idx
    }

    #[test]
    fn test_search_orders_by_distance() {
        let idx = index_with(&[
            ("far", [0.0, 0.0, 1.0, 0.0]),
            ("near", [1.0, 0.1, 0.0, 0.0]),
            ("exact", [1.0, 0.0, 0.0, 0.0]),
        ]);
        let hits = idx.search(&[1.0, 0.0, 0.0, 0.0], 3, 2.0);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near", "far"]);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_search_respects_k() {
        let idx = index_with(&[
            ("a", [1.0, 0.0, 0.0, 0.0]),
            ("b", [0.9, 0.1, 0.0, 0.0]),
            ("c", [0.8, 0.2, 0.0, 0.0]),
        ]);
        let hits = idx.search(&[1.0, 0.0, 0.0, 0.0], 2, 2.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
    }

    #[test]
    fn test_search_respects_max_distance() {
        let idx = index_with(&[("a", [1.0, 0.0, 0.0, 0.0]), ("b", [0.0, 1.0, 0.0, 0.0])]);
        let hits = idx.search(&[1.0, 0.0, 0.0, 0.0], 10, 0.5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn test_search_empty_index() {
        let idx = FlatIndex::new(4, DistanceMetric::Cosine);
        assert!(idx.search(&[1.0, 0.0, 0.0, 0.0], 5, 2.0).is_empty());
    }

    #[test]
    fn test_search_wrong_dimension_returns_nothing() {
        let idx = index_with(&[("a", [1.0, 0.0, 0.0, 0.0])]);
        assert!(idx.search(&[1.0, 0.0], 5, 2.0).is_empty());
    }

    #[test]
    fn test_upsert_replaces() {
        let mut idx = index_with(&[("a", [1.0, 0.0, 0.0, 0.0])]);
        idx.upsert("a", &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get("a").unwrap(), &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_remove_moves_last_slot() {
        let mut idx = index_with(&[
            ("a", [1.0, 0.0, 0.0, 0.0]),
            ("b", [0.0, 1.0, 0.0, 0.0]),
            ("c", [0.0, 0.0, 1.0, 0.0]),
        ]);
        assert!(idx.remove("a"));
        assert!(!idx.remove("a"));
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.get("c").unwrap(), &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(idx.get("b").unwrap(), &[0.0, 1.0, 0.0, 0.0]);
        let hits = idx.search(&[0.0, 0.0, 1.0, 0.0], 1, 2.0);
        assert_eq!(hits[0].id, "c");
    }

    #[test]
    fn test_remove_last() {
        let mut idx = index_with(&[("a", [1.0, 0.0, 0.0, 0.0])]);
        assert!(idx.remove("a"));
        assert!(idx.is_empty());
        assert!(idx.get("a").is_none());
        assert!(idx.search(&[1.0, 0.0, 0.0, 0.0], 5, 2.0).is_empty());
    }
}
