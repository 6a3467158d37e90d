//! `HashRecord` — the opaque node payload stored in the graph arena.

use std::collections::BTreeSet;

use crate::metric::DistanceMetric;

/// A single indexed fingerprint. Lives in `GraphCore`'s arena addressed by
/// a stable arena index; `page_id` is the separate, stable identifier used
/// for persistence and external lookups.
#[derive(Debug, Clone)]
pub struct HashRecord {
    id: String,
    metric: DistanceMetric,
    page_id: u32,
    layer: Option<usize>,
    neighbors: Vec<BTreeSet<usize>>,
}

impl HashRecord {
    /// A new, unplaced record. `set_layer` must be called before any
    /// neighbor can be attached.
    pub fn new(id: impl Into<String>, metric: DistanceMetric, page_id: u32) -> Self {
        Self {
            id: id.into(),
            metric,
            page_id,
            layer: None,
            neighbors: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn page_id(&self) -> u32 {
        self.page_id
    }

    pub fn layer(&self) -> Option<usize> {
        self.layer
    }

    /// Single-assignment. A second call with a different value is a
    /// programming error.
    pub fn set_layer(&mut self, layer: usize) {
        match self.layer {
            None => {
                self.layer = Some(layer);
                self.neighbors = vec![BTreeSet::new(); layer + 1];
            }
            Some(existing) => assert_eq!(
                existing, layer,
                "layer is immutable after first insert: {existing} != {layer}"
            ),
        }
    }

    /// Neighbors at layer `L`, or an empty set if `L` is absent. The
    /// returned reference stays valid until the next mutating call.
    pub fn neighbors_at(&self, layer: usize) -> &BTreeSet<usize> {
        static EMPTY: BTreeSet<usize> = BTreeSet::new();
        self.neighbors.get(layer).unwrap_or(&EMPTY)
    }

    /// Idempotent; `L > layer` is a programming error.
    pub fn add_neighbor(&mut self, layer: usize, other: usize) {
        let max_layer = self
            .layer
            .expect("add_neighbor called before set_layer");
        assert!(
            layer <= max_layer,
            "layer {layer} exceeds record's assigned layer {max_layer}"
        );
        self.neighbors[layer].insert(other);
    }

    /// Idempotent; a no-op if `other` was never a neighbor at `layer`.
    pub fn remove_neighbor(&mut self, layer: usize, other: usize) {
        if let Some(set) = self.neighbors.get_mut(layer) {
            set.remove(&other);
        }
    }

    /// Replace the entire neighbor set at `layer`, used by the shrink step
    /// of insertion.
    pub fn set_neighbors_at(&mut self, layer: usize, neighbors: BTreeSet<usize>) {
        let max_layer = self
            .layer
            .expect("set_neighbors_at called before set_layer");
        assert!(
            layer <= max_layer,
            "layer {layer} exceeds record's assigned layer {max_layer}"
        );
        self.neighbors[layer] = neighbors;
    }

    /// Score against another record, delegating to the shared metric.
    pub fn score(&self, other: &HashRecord) -> f32 {
        self.metric.score(&self.id, &other.id)
    }

    /// Score against a raw hash string under this record's metric.
    pub fn score_hash(&self, other_hash: &str) -> f32 {
        self.metric.score(&self.id, other_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_at_absent_layer_is_empty() {
        let r = HashRecord::new("h1", DistanceMetric::Tlsh, 1);
        assert!(r.neighbors_at(3).is_empty());
    }

    #[test]
    fn set_layer_allocates_layers() {
        let mut r = HashRecord::new("h1", DistanceMetric::Tlsh, 1);
        r.set_layer(2);
        assert_eq!(r.layer(), Some(2));
        assert!(r.neighbors_at(0).is_empty());
        assert!(r.neighbors_at(2).is_empty());
    }

    #[test]
    #[should_panic(expected = "immutable")]
    fn set_layer_twice_with_different_value_panics() {
        let mut r = HashRecord::new("h1", DistanceMetric::Tlsh, 1);
        r.set_layer(2);
        r.set_layer(3);
    }

    #[test]
    fn set_layer_twice_with_same_value_is_fine() {
        let mut r = HashRecord::new("h1", DistanceMetric::Tlsh, 1);
        r.set_layer(2);
        r.set_layer(2);
        assert_eq!(r.layer(), Some(2));
    }

    #[test]
    fn add_neighbor_is_idempotent() {
        let mut r = HashRecord::new("h1", DistanceMetric::Tlsh, 1);
        r.set_layer(1);
        r.add_neighbor(0, 7);
        r.add_neighbor(0, 7);
        assert_eq!(r.neighbors_at(0).len(), 1);
    }

    #[test]
    fn remove_neighbor_is_idempotent() {
        let mut r = HashRecord::new("h1", DistanceMetric::Tlsh, 1);
        r.set_layer(1);
        r.add_neighbor(0, 7);
        r.remove_neighbor(0, 7);
        r.remove_neighbor(0, 7);
        assert!(r.neighbors_at(0).is_empty());
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn add_neighbor_above_layer_panics() {
        let mut r = HashRecord::new("h1", DistanceMetric::Tlsh, 1);
        r.set_layer(1);
        r.add_neighbor(5, 7);
    }
}
