// src/index/hnsw.rs
//
// Hierarchical Navigable Small World graph over an arena of nodes.
// Edges are arena indices, never pointers, so the graph serializes
// directly and deletions can tombstone nodes in place. Tombstoned nodes
// stay traversable but are omitted from results and from neighbor
// selection for new inserts.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::VectorStore;

/// Hard cap on layer assignment; levels beyond this add nothing for any
/// realistic corpus size.
const MAX_LEVEL: usize = 16;

/// A (distance, node) pair with total ordering, largest distance first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub dist: f32,
    pub id: u32,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HnswNode {
    pub(crate) level: usize,
    /// Neighbor lists, one per layer `0..=level`.
    pub(crate) neighbors: Vec<Vec<u32>>,
    pub(crate) deleted: bool,
}

pub(crate) struct HnswGraph {
    m: usize,
    ef_construction: usize,
    /// `1 / ln(M)`, the exponential level-sampling scale.
    level_scale: f64,
    pub(crate) nodes: Vec<HnswNode>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) top_level: usize,
    rng: StdRng,
}

impl HnswGraph {
    pub(crate) fn new(m: usize, ef_construction: usize) -> Self {
        Self {
            m,
            ef_construction,
            level_scale: 1.0 / (m as f64).ln(),
            nodes: Vec::new(),
            entry_point: None,
            top_level: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Rebuild a graph from persisted parts.
    pub(crate) fn from_parts(
        m: usize,
        ef_construction: usize,
        nodes: Vec<HnswNode>,
        entry_point: Option<u32>,
        top_level: usize,
    ) -> Self {
        Self {
            m,
            ef_construction,
            level_scale: 1.0 / (m as f64).ln(),
            nodes,
            entry_point,
            top_level,
            rng: StdRng::from_entropy(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Largest neighbor list allowed on a layer. Layer 0 is denser.
    fn max_degree(&self, layer: usize) -> usize {
        if layer == 0 {
            2 * self.m
        } else {
            self.m
        }
    }

    /// Exponentially distributed layer for a new node.
    fn sample_level(&mut self) -> usize {
        let u: f64 = 1.0 - self.rng.gen::<f64>();
        ((-u.ln() * self.level_scale).floor() as usize).min(MAX_LEVEL)
    }

    /// Insert the node for `store`'s record `id`. Records must be
    /// appended to the store first; ids are assigned densely.
    pub(crate) fn insert(&mut self, id: u32, store: &VectorStore) {
        debug_assert_eq!(id as usize, self.nodes.len());

        let level = self.sample_level();
        self.nodes.push(HnswNode {
            level,
            neighbors: vec![Vec::new(); level + 1],
            deleted: false,
        });

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(id);
            self.top_level = level;
            return;
        };

        let query = store.values(id).to_vec();
        let mut best = Candidate {
            dist: store.distance(entry, &query),
            id: entry,
        };
        // Greedy descent through the layers above the new node's level.
        for layer in ((level + 1)..=self.top_level).rev() {
            best = self.greedy_closest(&query, best, layer, store);
        }

        let mut entry_set = vec![best];
        for layer in (0..=level.min(self.top_level)).rev() {
            let found = self.search_layer(&query, &entry_set, self.ef_construction, layer, store);

            let selected: Vec<u32> = found
                .iter()
                .filter(|c| c.id != id && !self.nodes[c.id as usize].deleted)
                .take(self.max_degree(layer))
                .map(|c| c.id)
                .collect();

            for &n in &selected {
                self.nodes[n as usize].neighbors[layer].push(id);
                if self.nodes[n as usize].neighbors[layer].len() > self.max_degree(layer) {
                    self.prune_neighbors(n, layer, store);
                }
            }
            self.nodes[id as usize].neighbors[layer] = selected;

            entry_set = found;
        }

        if level > self.top_level {
            self.top_level = level;
            self.entry_point = Some(id);
        }
    }

    /// K nearest live nodes to `query`, nearest first.
    pub(crate) fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        store: &VectorStore,
    ) -> Vec<Candidate> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut best = Candidate {
            dist: store.distance(entry, query),
            id: entry,
        };
        for layer in (1..=self.top_level).rev() {
            best = self.greedy_closest(query, best, layer, store);
        }

        let ef = ef_search.max(k);
        let mut found = self.search_layer(query, &[best], ef, 0, store);
        found.retain(|c| !self.nodes[c.id as usize].deleted);
        found.truncate(k);
        found
    }

    /// Tombstone a node. The entry point moves to the highest live node
    /// when the current one dies.
    pub(crate) fn mark_deleted(&mut self, id: u32) {
        self.nodes[id as usize].deleted = true;
        if self.entry_point == Some(id) {
            self.entry_point = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| !n.deleted)
                .max_by_key(|(_, n)| n.level)
                .map(|(i, _)| i as u32);
            self.top_level = self
                .entry_point
                .map(|e| self.nodes[e as usize].level)
                .unwrap_or(0);
        }
    }

    /// Hill-climb to the locally nearest node on one layer.
    fn greedy_closest(
        &self,
        query: &[f32],
        mut best: Candidate,
        layer: usize,
        store: &VectorStore,
    ) -> Candidate {
        loop {
            let mut improved = false;
            for &n in &self.nodes[best.id as usize].neighbors[layer] {
                let dist = store.distance(n, query);
                if dist < best.dist {
                    best = Candidate { dist, id: n };
                    improved = true;
                }
            }
            if !improved {
                return best;
            }
        }
    }

    /// Beam search on one layer with a dynamic candidate list of `ef`,
    /// returning up to `ef` nodes sorted nearest first. Tombstoned nodes
    /// participate in traversal and may appear in the result; callers
    /// filter them.
    fn search_layer(
        &self,
        query: &[f32],
        entries: &[Candidate],
        ef: usize,
        layer: usize,
        store: &VectorStore,
    ) -> Vec<Candidate> {
        let mut visited: HashSet<u32> = entries.iter().map(|c| c.id).collect();
        let mut candidates: BinaryHeap<Reverse<Candidate>> =
            entries.iter().map(|&c| Reverse(c)).collect();
        let mut results: BinaryHeap<Candidate> = entries.iter().copied().collect();
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = candidates.pop() {
            let worst = results.peek().map(|c| c.dist).unwrap_or(f32::INFINITY);
            if results.len() >= ef && current.dist > worst {
                break;
            }
            for &n in &self.nodes[current.id as usize].neighbors[layer] {
                if !visited.insert(n) {
                    continue;
                }
                let dist = store.distance(n, query);
                let worst = results.peek().map(|c| c.dist).unwrap_or(f32::INFINITY);
                if results.len() < ef || dist < worst {
                    let c = Candidate { dist, id: n };
                    candidates.push(Reverse(c));
                    results.push(c);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Shrink an overflowing neighbor list back to the layer's degree
    /// cap, keeping the nearest links by recomputed distance.
    fn prune_neighbors(&mut self, id: u32, layer: usize, store: &VectorStore) {
        let own = store.values(id).to_vec();
        let mut links: Vec<Candidate> = self.nodes[id as usize].neighbors[layer]
            .iter()
            .map(|&n| Candidate {
                dist: store.distance(n, &own),
                id: n,
            })
            .collect();
        links.sort();
        links.truncate(self.max_degree(layer));
        self.nodes[id as usize].neighbors[layer] = links.into_iter().map(|c| c.id).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::VectorRecord;

    fn store_of(points: &[(f32, f32)]) -> VectorStore {
        let mut store = VectorStore::new(2);
        for &(x, y) in points {
            store.push(VectorRecord {
                track_idx: 0,
                ref_time_s: 0.0,
                values: vec![x, y],
            });
        }
        store
    }

    fn build_graph(store: &VectorStore) -> HnswGraph {
        let mut graph = HnswGraph::new(8, 100);
        for id in 0..store.len() {
            graph.insert(id as u32, store);
        }
        graph
    }

    #[test]
    fn test_search_empty_graph() {
        let store = VectorStore::new(2);
        let graph = HnswGraph::new(8, 100);
        assert!(graph.search(&[0.0, 0.0], 5, 50, &store).is_empty());
    }

    #[test]
    fn test_single_node() {
        let store = store_of(&[(1.0, 1.0)]);
        let graph = build_graph(&store);
        let found = graph.search(&[0.9, 1.1], 3, 50, &store);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 0);
    }

    #[test]
    fn test_exact_nearest_on_grid() {
        // A 10x10 grid of points; with ef well above the corpus size the
        // beam search is effectively exhaustive.
        let points: Vec<(f32, f32)> = (0..10)
            .flat_map(|x| (0..10).map(move |y| (x as f32, y as f32)))
            .collect();
        let store = store_of(&points);
        let graph = build_graph(&store);

        let found = graph.search(&[3.2, 6.9], 4, 200, &store);
        assert_eq!(found.len(), 4);
        // Nearest grid point to (3.2, 6.9) is (3, 7), id 3*10+7.
        assert_eq!(found[0].id, 37);
        // Results come back nearest first.
        for pair in found.windows(2) {
            assert!(pair[0].dist <= pair[1].dist);
        }
    }

    #[test]
    fn test_self_lookup_zero_distance() {
        let points: Vec<(f32, f32)> = (0..50).map(|i| (i as f32 * 0.37, i as f32 * 0.11)).collect();
        let store = store_of(&points);
        let graph = build_graph(&store);

        for id in 0..points.len() as u32 {
            let found = graph.search(store.values(id), 1, 100, &store);
            assert_eq!(found[0].id, id, "self-lookup failed for {id}");
            assert!(found[0].dist <= 1e-6);
        }
    }

    #[test]
    fn test_deleted_nodes_are_not_returned() {
        let store = store_of(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let mut graph = build_graph(&store);

        graph.mark_deleted(1);
        let found = graph.search(&[1.0, 0.0], 3, 50, &store);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.id != 1));
    }

    #[test]
    fn test_entry_point_moves_off_deleted_node() {
        let store = store_of(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let mut graph = build_graph(&store);

        let entry = graph.entry_point.unwrap();
        graph.mark_deleted(entry);
        assert_ne!(graph.entry_point, Some(entry));
        assert!(!graph.search(&[0.5, 0.0], 2, 50, &store).is_empty());
    }

    #[test]
    fn test_degree_caps_hold() {
        let points: Vec<(f32, f32)> = (0..200)
            .map(|i| ((i % 17) as f32 * 0.3, (i % 13) as f32 * 0.7))
            .collect();
        let store = store_of(&points);
        let graph = build_graph(&store);

        for node in &graph.nodes {
            for (layer, links) in node.neighbors.iter().enumerate() {
                let cap = if layer == 0 { 16 } else { 8 };
                assert!(links.len() <= cap, "layer {layer} has {} links", links.len());
            }
        }
    }
}
