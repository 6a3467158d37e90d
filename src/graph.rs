//! `GraphCore` — the layered proximity graph.
//!
//! Implements insertion, deletion and search from "Efficient and robust
//! approximate nearest neighbor search using Hierarchical Navigable Small
//! World graphs" (Malkov & Yashunin). Records live in an arena
//! (`Vec<Option<HashRecord>>`) addressed by a stable `usize` index;
//! `by_layer` partitions that arena by each record's own assigned layer,
//! used only to walk the graph for serialization.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ApoError, Result};
use crate::metric::DistanceMetric;
use crate::neighbor_queue::{MaxHeap, MinHeap, Neighbor};
use crate::record::HashRecord;

/// Construction and search-time parameters for a [`GraphCore`].
#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    /// Target edges per node per layer.
    pub m: usize,
    /// Hard cap per layer above 0.
    pub m_max: usize,
    /// Hard cap at layer 0.
    pub m_max0: usize,
    /// Search breadth used both during construction and (by default) at
    /// query time.
    pub ef: usize,
    /// Use heuristic neighbor selection (Algorithm 4) instead of simple
    /// nearest-first selection (Algorithm 3).
    pub heuristic: bool,
    /// When heuristic selection is active, extend the candidate set with
    /// the layer-neighbors of each candidate before selecting.
    pub extend_candidates: bool,
    /// When heuristic selection is active, pour discarded candidates back
    /// in nearest-first once the primary pass underfills `M`.
    pub keep_pruned_conns: bool,
    /// Flip probability applied to heuristic comparisons, in `[0, 1)`.
    /// `0.0` disables the perturbation.
    pub beer_factor: f32,
    pub metric: DistanceMetric,
}

impl GraphConfig {
    pub fn new(m: usize, ef: usize, m_max: usize, m_max0: usize, metric: DistanceMetric) -> Self {
        Self {
            m,
            m_max,
            m_max0,
            ef,
            heuristic: false,
            extend_candidates: true,
            keep_pruned_conns: true,
            beer_factor: 0.0,
            metric,
        }
    }

    fn cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m_max
        }
    }
}

/// The HNSW proximity graph over `HashRecord`s of a single [`DistanceMetric`].
#[derive(Debug)]
pub struct GraphCore {
    arena: Vec<Option<HashRecord>>,
    id_index: HashMap<String, usize>,
    by_layer: BTreeMap<usize, BTreeSet<usize>>,
    entry_point: Option<usize>,
    config: GraphConfig,
    ml: f64,
    rng: StdRng,
    count: usize,
}

/// A search or threshold result, grouped by score and ordered from
/// closest to farthest.
pub type GroupedResults = Vec<(f32, Vec<HashRecord>)>;

impl GraphCore {
    pub fn new(config: GraphConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Seeded constructor used by tests and by callers that need
    /// reproducible layer draws and `beer_factor` perturbation across a
    /// fixed seed + fixed insert order.
    pub fn with_seed(config: GraphConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GraphConfig, rng: StdRng) -> Self {
        let ml = 1.0 / (config.m as f64).ln();
        Self {
            arena: Vec::new(),
            id_index: HashMap::new(),
            by_layer: BTreeMap::new(),
            entry_point: None,
            config,
            ml,
            rng,
            count: 0,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn entry_point(&self) -> Option<&HashRecord> {
        self.entry_point.and_then(|idx| self.arena[idx].as_ref())
    }

    pub fn get(&self, idx: usize) -> Option<&HashRecord> {
        self.arena.get(idx).and_then(|o| o.as_ref())
    }

    pub fn find(&self, id: &str) -> Option<usize> {
        self.id_index.get(id).copied()
    }

    /// Every live record in the graph, in arena order. Used to rebuild the
    /// external prefix index after load.
    pub fn iter(&self) -> impl Iterator<Item = &HashRecord> {
        self.arena.iter().filter_map(|o| o.as_ref())
    }

    fn draw_layer(&mut self) -> usize {
        // U uniform on (0, 1]; `rng.gen::<f64>()` is [0, 1), so 1 - u lands
        // in (0, 1].
        let u = 1.0 - self.rng.gen::<f64>();
        (-u.ln() * self.ml).floor() as usize
    }

    fn push_record(&mut self, record: HashRecord) -> usize {
        let idx = self.arena.len();
        self.arena.push(Some(record));
        idx
    }

    fn register(&mut self, idx: usize, layer: usize, id: String) {
        self.id_index.insert(id, idx);
        self.by_layer.entry(layer).or_default().insert(idx);
        self.count += 1;
    }

    fn link(&mut self, a: usize, b: usize, layer: usize) {
        if let Some(rec) = self.arena[a].as_mut() {
            rec.add_neighbor(layer, b);
        }
        if let Some(rec) = self.arena[b].as_mut() {
            rec.add_neighbor(layer, a);
        }
    }

    fn unlink(&mut self, a: usize, b: usize, layer: usize) {
        if let Some(rec) = self.arena[a].as_mut() {
            rec.remove_neighbor(layer, b);
        }
        if let Some(rec) = self.arena[b].as_mut() {
            rec.remove_neighbor(layer, a);
        }
    }

    fn remove_edge_from(&mut self, owner: usize, other: usize, layer: usize) {
        if let Some(rec) = self.arena[owner].as_mut() {
            rec.remove_neighbor(layer, other);
        }
    }

    /// Algorithm 2: the `ef` elements closest to `query_hash` reachable
    /// from `eps` at `layer`.
    fn search_layer(&self, query_hash: &str, eps: &[usize], ef: usize, layer: usize) -> Vec<Neighbor> {
        let metric = self.config.metric;
        let mut visited: BTreeSet<usize> = eps.iter().copied().collect();
        let mut candidates = MinHeap::new();
        let mut results = MaxHeap::new();

        for &ep in eps {
            if let Some(rec) = self.get(ep) {
                let n = Neighbor::new(metric, ep, metric.score(query_hash, rec.id()));
                candidates.push(n);
                results.push_bounded(n, ef.max(1));
            }
        }

        while let Some(c) = candidates.pop() {
            if let Some(f) = results.peek() {
                if c.key > f.key {
                    break;
                }
            }
            let Some(rec) = self.get(c.id) else { continue };
            for &nb in rec.neighbors_at(layer) {
                if !visited.insert(nb) {
                    continue;
                }
                let Some(nb_rec) = self.get(nb) else { continue };
                let cand = Neighbor::new(metric, nb, metric.score(query_hash, nb_rec.id()));
                let furthest = results.peek().map(|f| f.key);
                let admit = furthest.map(|fk| cand.key < fk).unwrap_or(true) || results.len() < ef;
                if admit {
                    candidates.push(cand);
                    results.push_bounded(cand, ef.max(1));
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Algorithm 3: the `m` candidates nearest to `base_id`.
    fn select_neighbors_simple(&self, base_id: &str, candidates: &[usize], m: usize) -> Vec<usize> {
        let metric = self.config.metric;
        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .filter_map(|&idx| self.get(idx).map(|r| (idx, metric.score(base_id, r.id()))))
            .collect();
        scored.sort_by(|a, b| metric.closer(a.1, b.1));
        scored.truncate(m);
        scored.into_iter().map(|(idx, _)| idx).collect()
    }

    /// Algorithm 4: diversity-seeking neighbor selection.
    fn select_neighbors_heuristic(
        &mut self,
        base_id: &str,
        extend_layer: usize,
        candidates: &[usize],
        m: usize,
    ) -> Vec<usize> {
        let metric = self.config.metric;

        let mut working: Vec<usize> = candidates.to_vec();
        if self.config.extend_candidates {
            let mut seen: BTreeSet<usize> = working.iter().copied().collect();
            let mut extra = Vec::new();
            for &c in candidates {
                if let Some(rec) = self.get(c) {
                    for &n in rec.neighbors_at(extend_layer) {
                        if seen.insert(n) {
                            extra.push(n);
                        }
                    }
                }
            }
            working.extend(extra);
        }

        let mut scored: Vec<(usize, f32)> = working
            .into_iter()
            .filter_map(|idx| self.get(idx).map(|r| (idx, metric.score(base_id, r.id()))))
            .collect();
        scored.sort_by(|a, b| metric.closer(a.1, b.1));

        let mut result: Vec<(usize, f32)> = Vec::new();
        let mut discarded: Vec<(usize, f32)> = Vec::new();
        let mut iter = scored.into_iter();
        while result.len() < m {
            let Some((e_idx, e_score)) = iter.next() else { break };
            let accept = if result.is_empty() {
                true
            } else {
                let r_star_score = result[0].1;
                let mut closer = metric.closer(e_score, r_star_score) == Ordering::Less;
                if self.config.beer_factor > 0.0 && self.rng.gen::<f32>() < self.config.beer_factor {
                    closer = !closer;
                }
                closer
            };
            if accept {
                result.push((e_idx, e_score));
            } else {
                discarded.push((e_idx, e_score));
            }
        }

        if self.config.keep_pruned_conns {
            for item in discarded {
                if result.len() >= m {
                    break;
                }
                result.push(item);
            }
        }

        result.into_iter().map(|(idx, _)| idx).collect()
    }

    fn select_neighbors(&mut self, base_id: &str, layer: usize, candidates: &[usize], m: usize) -> Vec<usize> {
        if self.config.heuristic {
            self.select_neighbors_heuristic(base_id, layer, candidates, m)
        } else {
            self.select_neighbors_simple(base_id, candidates, m)
        }
    }

    /// Re-selects a neighbor's edge list down to its cap (the shrink step
    /// of insertion).
    fn shrink(&mut self, owner: usize, layer: usize, cap: usize) {
        let (owner_id, existing): (String, Vec<usize>) = match self.get(owner) {
            Some(rec) => (rec.id().to_string(), rec.neighbors_at(layer).iter().copied().collect()),
            None => return,
        };
        if existing.len() <= cap {
            return;
        }
        let kept = self.select_neighbors(&owner_id, layer, &existing, cap);
        let kept_set: BTreeSet<usize> = kept.into_iter().collect();
        for dropped in existing.iter().filter(|e| !kept_set.contains(e)) {
            self.remove_edge_from(*dropped, owner, layer);
        }
        if let Some(rec) = self.arena[owner].as_mut() {
            rec.set_neighbors_at(layer, kept_set);
        }
    }

    /// Algorithm 1: insert `record`, consuming it. Returns `Ok(true)` on
    /// success; `NodeAlreadyExists` if `record.id()` is already present.
    pub fn insert(&mut self, mut record: HashRecord) -> Result<bool> {
        if record.metric() != self.config.metric {
            return Err(ApoError::MetricMismatch {
                expected: self.config.metric.name().to_string(),
                actual: record.metric().name().to_string(),
            });
        }
        if self.id_index.contains_key(record.id()) {
            return Err(ApoError::NodeAlreadyExists {
                id: record.id().to_string(),
            });
        }

        let layer = self.draw_layer();
        record.set_layer(layer);
        let id = record.id().to_string();

        let Some(entry_idx) = self.entry_point else {
            let idx = self.push_record(record);
            self.entry_point = Some(idx);
            self.register(idx, layer, id.clone());
            tracing::debug!(id = %id, layer, "inserted as entry point of empty graph");
            return Ok(true);
        };

        let entry_layer = self.arena[entry_idx].as_ref().unwrap().layer().unwrap();
        let mut current = entry_idx;

        if entry_layer > layer {
            for l in (layer + 1..=entry_layer).rev() {
                if let Some(best) = self.search_layer(&id, &[current], 1, l).first() {
                    current = best.id;
                }
            }
        }

        let new_idx = self.push_record(record);
        let mut frontier = vec![current];
        let mut added_edges: Vec<(usize, usize, usize)> = Vec::new();
        let insert_from = layer.min(entry_layer);

        for l in (0..=insert_from).rev() {
            let cap = self.config.cap(l);
            let w = self.search_layer(&id, &frontier, self.config.ef, l);

            if w.iter().any(|n| n.id != new_idx && self.get(n.id).map(|r| r.id()) == Some(id.as_str())) {
                for (owner, lyr, other) in added_edges.into_iter().rev() {
                    self.unlink(owner, other, lyr);
                }
                self.arena[new_idx] = None;
                tracing::warn!(id = %id, "duplicate detected mid-sweep, rolled back");
                return Err(ApoError::NodeAlreadyExists { id });
            }

            let candidate_ids: Vec<usize> = w.iter().map(|n| n.id).collect();
            let chosen = self.select_neighbors(&id, l, &candidate_ids, self.config.m);

            for &n_idx in &chosen {
                self.link(new_idx, n_idx, l);
                added_edges.push((new_idx, l, n_idx));

                let degree = self.get(n_idx).map(|r| r.neighbors_at(l).len()).unwrap_or(0);
                if degree > cap {
                    self.shrink(n_idx, l, cap);
                }
            }

            frontier = candidate_ids;
        }

        self.register(new_idx, layer, id.clone());
        if layer > entry_layer {
            self.entry_point = Some(new_idx);
        }
        tracing::debug!(id = %id, layer, "inserted");
        Ok(true)
    }

    /// Delete by id, repairing bidirectionality but not re-shrinking
    /// survivors.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if self.entry_point.is_none() {
            return Err(ApoError::IndexEmpty);
        }
        let victim = self
            .id_index
            .get(id)
            .copied()
            .ok_or_else(|| ApoError::NodeNotFound { id: id.to_string() })?;

        let victim_layer = self.arena[victim].as_ref().unwrap().layer().unwrap();

        if self.entry_point == Some(victim) {
            self.entry_point = self.replacement_entry_point(victim, victim_layer);
        }

        let neighbor_layers: Vec<(usize, Vec<usize>)> = (0..=victim_layer)
            .map(|l| {
                let ns: Vec<usize> = self.arena[victim]
                    .as_ref()
                    .unwrap()
                    .neighbors_at(l)
                    .iter()
                    .copied()
                    .collect();
                (l, ns)
            })
            .collect();
        for (l, neighbors) in neighbor_layers {
            for n in neighbors {
                self.remove_edge_from(n, victim, l);
            }
        }

        if let Some(set) = self.by_layer.get_mut(&victim_layer) {
            set.remove(&victim);
        }
        self.id_index.remove(id);
        self.arena[victim] = None;
        self.count -= 1;
        tracing::debug!(id, "deleted");
        Ok(true)
    }

    /// Walk layers from the victim's layer downward, taking the nearest
    /// neighbor at the first layer where it has any.
    fn replacement_entry_point(&self, victim: usize, victim_layer: usize) -> Option<usize> {
        let metric = self.config.metric;
        let victim_id = self.arena[victim].as_ref().unwrap().id().to_string();
        for l in (0..=victim_layer).rev() {
            let neighbors: Vec<usize> = self.arena[victim]
                .as_ref()
                .unwrap()
                .neighbors_at(l)
                .iter()
                .copied()
                .collect();
            if neighbors.is_empty() {
                continue;
            }
            let scores: Vec<f32> = neighbors
                .iter()
                .map(|&n| metric.score(&victim_id, self.arena[n].as_ref().unwrap().id()))
                .collect();
            if let Some(i) = metric.nearest_index(&scores) {
                return Some(neighbors[i]);
            }
        }
        None
    }

    fn descend_to_layer_one(&self, query_hash: &str) -> Option<usize> {
        let entry = self.entry_point?;
        let top = self.arena[entry].as_ref().unwrap().layer().unwrap_or(0);
        let mut current = entry;
        for l in (1..=top).rev() {
            if let Some(best) = self.search_layer(query_hash, &[current], 1, l).first() {
                current = best.id;
            }
        }
        Some(current)
    }

    fn group_by_score(&self, mut neighbors: Vec<Neighbor>) -> GroupedResults {
        neighbors.sort_by(|a, b| a.cmp(b));
        let mut out: GroupedResults = Vec::new();
        for n in neighbors {
            let Some(rec) = self.get(n.id) else { continue };
            match out.last_mut() {
                Some((score, group)) if *score == n.score => group.push(rec.clone()),
                _ => out.push((n.score, vec![rec.clone()])),
            }
        }
        out
    }

    /// `ef == 0` means "use the graph's configured `ef`".
    pub fn knn_search(&self, query: &HashRecord, k: usize, ef: usize) -> Result<GroupedResults> {
        if query.metric() != self.config.metric {
            return Err(ApoError::MetricMismatch {
                expected: self.config.metric.name().to_string(),
                actual: query.metric().name().to_string(),
            });
        }
        if self.entry_point.is_none() {
            return Err(ApoError::IndexEmpty);
        }
        let ef = if ef == 0 { self.config.ef } else { ef };
        let current = self.descend_to_layer_one(query.id()).unwrap();
        let w = self.search_layer(query.id(), &[current], ef, 0);
        let candidate_ids: Vec<usize> = w.iter().map(|n| n.id).collect();
        let selected = self.select_neighbors_simple(query.id(), &candidate_ids, k);

        let metric = self.config.metric;
        let scored: Vec<Neighbor> = selected
            .into_iter()
            .filter_map(|idx| self.get(idx).map(|r| Neighbor::new(metric, idx, metric.score(query.id(), r.id()))))
            .collect();
        Ok(self.group_by_score(scored))
    }

    /// Begin with the knn frontier, then expand breadth-first at layer 0
    /// up to `n_hops`, keeping anything that satisfies `threshold`.
    pub fn threshold_search(&self, query: &HashRecord, threshold: f32, n_hops: usize) -> Result<GroupedResults> {
        if query.metric() != self.config.metric {
            return Err(ApoError::MetricMismatch {
                expected: self.config.metric.name().to_string(),
                actual: query.metric().name().to_string(),
            });
        }
        if self.entry_point.is_none() {
            return Err(ApoError::IndexEmpty);
        }
        let metric = self.config.metric;
        let satisfies = |score: f32| {
            if metric.is_spatial() {
                score <= threshold
            } else {
                score >= threshold
            }
        };

        let current = self.descend_to_layer_one(query.id()).unwrap();
        let frontier = self.search_layer(query.id(), &[current], self.config.ef, 0);

        let mut visited: BTreeSet<usize> = frontier.iter().map(|n| n.id).collect();
        visited.insert(current);

        let mut kept: Vec<Neighbor> = frontier.iter().filter(|n| satisfies(n.score)).copied().collect();
        let mut hop_frontier: Vec<usize> = frontier.iter().map(|n| n.id).collect();

        for _ in 0..n_hops {
            let mut next = Vec::new();
            for &id in &hop_frontier {
                let Some(rec) = self.get(id) else { continue };
                for &nb in rec.neighbors_at(0) {
                    if !visited.insert(nb) {
                        continue;
                    }
                    if let Some(nb_rec) = self.get(nb) {
                        let score = metric.score(query.id(), nb_rec.id());
                        if satisfies(score) {
                            kept.push(Neighbor::new(metric, nb, score));
                        }
                        next.push(nb);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            hop_frontier = next;
        }

        Ok(self.group_by_score(kept))
    }

    // --- persistence hooks (pub(crate): used only by `persistence`) ---

    pub(crate) fn entry_point_idx(&self) -> Option<usize> {
        self.entry_point
    }

    pub(crate) fn by_layer(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
        &self.by_layer
    }

    pub(crate) fn record_unchecked(&self, idx: usize) -> &HashRecord {
        self.arena[idx].as_ref().expect("dangling arena slot")
    }

    /// Place a record read from a snapshot at its recorded layer, without
    /// running the insertion algorithm. Neighbor edges are resolved
    /// separately, once every page-id is known, via
    /// [`Self::add_edge_one_sided`] (the loader's two-pass procedure).
    pub(crate) fn restore_record(&mut self, mut record: HashRecord, layer: usize, is_entry: bool) -> usize {
        record.set_layer(layer);
        let id = record.id().to_string();
        let idx = self.push_record(record);
        self.register(idx, layer, id);
        if is_entry {
            self.entry_point = Some(idx);
        }
        idx
    }

    /// Add one direction of an edge restored from a snapshot. The file
    /// format stores both directions explicitly, so the loader calls this
    /// once per `(owner, neighbor)` pair it reads rather than linking
    /// bidirectionally itself.
    pub(crate) fn add_edge_one_sided(&mut self, owner: usize, neighbor: usize, layer: usize) {
        if let Some(rec) = self.arena[owner].as_mut() {
            rec.add_neighbor(layer, neighbor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(metric: DistanceMetric) -> GraphConfig {
        GraphConfig::new(4, 8, 8, 16, metric)
    }

    fn tlsh(suffix: u8) -> String {
        format!("T1{:0>70}", suffix)
    }

    #[test]
    fn insert_single_becomes_entry_point() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 1);
        let r = HashRecord::new(tlsh(1), DistanceMetric::Tlsh, 1);
        assert!(g.insert(r).unwrap());
        assert_eq!(g.len(), 1);
        assert!(g.entry_point().is_some());
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 2);
        let id = tlsh(1);
        g.insert(HashRecord::new(id.clone(), DistanceMetric::Tlsh, 1)).unwrap();
        let err = g.insert(HashRecord::new(id, DistanceMetric::Tlsh, 2)).unwrap_err();
        assert!(matches!(err, ApoError::NodeAlreadyExists { .. }));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn metric_mismatch_is_rejected() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 3);
        let err = g
            .insert(HashRecord::new("3:abc:def", DistanceMetric::Ssdeep, 1))
            .unwrap_err();
        assert!(matches!(err, ApoError::MetricMismatch { .. }));
    }

    #[test]
    fn knn_search_on_empty_graph_fails() {
        let g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 4);
        let q = HashRecord::new(tlsh(1), DistanceMetric::Tlsh, 1);
        assert!(matches!(g.knn_search(&q, 1, 0), Err(ApoError::IndexEmpty)));
    }

    #[test]
    fn knn_search_finds_exact_match() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 5);
        let ids = [tlsh(1), tlsh(2), tlsh(3)];
        for id in &ids {
            g.insert(HashRecord::new(id.clone(), DistanceMetric::Tlsh, 1)).unwrap();
        }
        let query = HashRecord::new(ids[0].clone(), DistanceMetric::Tlsh, 99);
        let results = g.knn_search(&query, 2, 4).unwrap();
        let total: usize = results.iter().map(|(_, g)| g.len()).sum();
        assert_eq!(total, 2);
        assert_eq!(results[0].1[0].id(), ids[0]);
    }

    #[test]
    fn delete_of_entry_point_picks_replacement() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 6);
        let ids = [tlsh(1), tlsh(2), tlsh(3)];
        for id in &ids {
            g.insert(HashRecord::new(id.clone(), DistanceMetric::Tlsh, 1)).unwrap();
        }
        let entry_id = g.entry_point().unwrap().id().to_string();
        g.delete(&entry_id).unwrap();
        assert_eq!(g.len(), 2);
        assert!(g.entry_point().is_some());
        assert_ne!(g.entry_point().unwrap().id(), entry_id);
    }

    #[test]
    fn delete_unknown_id_fails() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 7);
        g.insert(HashRecord::new(tlsh(1), DistanceMetric::Tlsh, 1)).unwrap();
        assert!(matches!(g.delete(&tlsh(9)), Err(ApoError::NodeNotFound { .. })));
    }

    #[test]
    fn delete_on_empty_graph_fails() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 8);
        assert!(matches!(g.delete(&tlsh(1)), Err(ApoError::IndexEmpty)));
    }

    #[test]
    fn bidirectionality_holds_after_inserts() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 9);
        for i in 0..20u8 {
            g.insert(HashRecord::new(tlsh(i), DistanceMetric::Tlsh, i as u32)).unwrap();
        }
        for idx in 0..g.len() {
            let Some(rec) = g.get(idx) else { continue };
            let layer = rec.layer().unwrap();
            for l in 0..=layer {
                for &other in rec.neighbors_at(l) {
                    let other_rec = g.get(other).unwrap();
                    assert!(
                        other_rec.neighbors_at(l).contains(&idx),
                        "edge {idx}->{other} at L{l} is not bidirectional"
                    );
                }
            }
        }
    }

    #[test]
    fn degree_cap_holds_after_inserts() {
        let config = cfg(DistanceMetric::Tlsh);
        let mut g = GraphCore::with_seed(config, 10);
        for i in 0..40u8 {
            g.insert(HashRecord::new(tlsh(i), DistanceMetric::Tlsh, i as u32)).unwrap();
        }
        for idx in 0..g.len() {
            let Some(rec) = g.get(idx) else { continue };
            let layer = rec.layer().unwrap();
            for l in 0..=layer {
                let cap = if l == 0 { config.m_max0 } else { config.m_max };
                assert!(rec.neighbors_at(l).len() <= cap);
            }
        }
    }

    #[test]
    fn insert_then_delete_restores_bidirectionality() {
        let mut g = GraphCore::with_seed(cfg(DistanceMetric::Tlsh), 11);
        for i in 0..10u8 {
            g.insert(HashRecord::new(tlsh(i), DistanceMetric::Tlsh, i as u32)).unwrap();
        }
        let victim_id = tlsh(10);
        g.insert(HashRecord::new(victim_id.clone(), DistanceMetric::Tlsh, 10)).unwrap();
        g.delete(&victim_id).unwrap();

        for idx in 0..g.len() {
            let Some(rec) = g.get(idx) else { continue };
            assert_ne!(rec.id(), victim_id);
            let layer = rec.layer().unwrap();
            for l in 0..=layer {
                for &other in rec.neighbors_at(l) {
                    assert!(g.get(other).is_some());
                }
            }
        }
    }
}
