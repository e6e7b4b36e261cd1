use crate::index::{exact_top_k, rank_order, BackendKind, Hit, IndexSnapshot, NearestNeighborBackend};
use crate::{Error, Result};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::debug;

/// HNSW construction and search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Links per node on upper layers (layer 0 keeps twice as many)
    pub max_connections: usize,
    pub max_layers: usize,
    pub ef_construction: usize,
    /// Beam width at query time; raised to `k` when smaller
    pub ef_search: usize,
    /// Seed for level assignment, so rebuilding the same data yields the same graph
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            max_layers: 4,
            ef_construction: 200,
            ef_search: 64,
            seed: 0x5eed_1dea,
        }
    }
}

impl HnswParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_connections < 2 {
            return Err(Error::InvalidConfig(format!(
                "hnsw max_connections must be at least 2, got {}",
                self.max_connections
            )));
        }
        if self.max_layers == 0 {
            return Err(Error::InvalidConfig("hnsw max_layers must be positive".into()));
        }
        if self.ef_construction < self.max_connections {
            return Err(Error::InvalidConfig(format!(
                "hnsw ef_construction ({}) must be >= max_connections ({})",
                self.ef_construction, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Bit set for visited-node tracking, much faster than a HashSet for dense ids
struct VisitedSet {
    bits: Vec<u64>,
}

impl VisitedSet {
    #[inline]
    fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0; (capacity + 63) / 64],
        }
    }

    #[inline]
    fn clear(&mut self) {
        self.bits.fill(0);
    }

    /// Returns true when `idx` was not yet visited.
    #[inline]
    fn insert(&mut self, idx: usize) -> bool {
        let word = idx / 64;
        let mask = 1u64 << (idx % 64);
        let fresh = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        fresh
    }
}

/// Smaller is closer: the negated dot product of unit vectors.
type Dist = OrderedFloat<f32>;

/// HNSW graph over an [`IndexSnapshot`].
///
/// Built once, then searched through `&self` from any number of threads.
pub struct HnswBackend {
    snapshot: Arc<IndexSnapshot>,
    /// links[node][layer] -> neighbor positions
    links: Vec<Vec<Vec<u32>>>,
    entry_point: usize,
    top_layer: usize,
    params: HnswParams,
}

impl HnswBackend {
    pub fn build(snapshot: Arc<IndexSnapshot>, params: &HnswParams) -> Result<Self> {
        params.validate()?;
        let n = snapshot.len();
        if n == 0 {
            return Err(Error::EmptyIndex);
        }
        if n > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!("too many rows for hnsw: {}", n)));
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut graph = Self {
            snapshot,
            links: Vec::with_capacity(n),
            entry_point: 0,
            top_layer: 0,
            params: params.clone(),
        };
        let mut visited = VisitedSet::new(n);

        for node in 0..n {
            let level = graph.select_layer(&mut rng);
            graph.insert(node, level, &mut visited);
        }

        debug!(nodes = n, top_layer = graph.top_layer, "hnsw graph built");
        Ok(graph)
    }

    /// Exponential decay: each extra layer with probability 1/2
    #[inline]
    fn select_layer(&self, rng: &mut StdRng) -> usize {
        let mut layer = 0;
        while layer + 1 < self.params.max_layers && rng.random::<f32>() < 0.5 {
            layer += 1;
        }
        layer
    }

    #[inline]
    fn layer_capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.max_connections * 2
        } else {
            self.params.max_connections
        }
    }

    #[inline(always)]
    fn distance(&self, query: &[f32], node: usize) -> Dist {
        OrderedFloat(-self.snapshot.similarity(query, node))
    }

    #[inline(always)]
    fn distance_between(&self, a: usize, b: usize) -> Dist {
        self.distance(self.snapshot.row(a), b)
    }

    fn insert(&mut self, node: usize, level: usize, visited: &mut VisitedSet) {
        self.links.push(vec![Vec::new(); level + 1]);
        if node == 0 {
            self.entry_point = 0;
            self.top_layer = level;
            return;
        }

        let snapshot = self.snapshot.clone();
        let query = snapshot.row(node);

        let mut current = self.entry_point;
        for layer in (level + 1..=self.top_layer).rev() {
            current = self.greedy_closest(query, current, layer);
        }

        for layer in (0..=level.min(self.top_layer)).rev() {
            let candidates =
                self.search_layer(query, current, self.params.ef_construction, layer, visited);
            let cap = self.layer_capacity(layer);
            let neighbors: Vec<u32> = candidates
                .iter()
                .take(cap)
                .map(|(_, idx)| *idx as u32)
                .collect();

            for &neighbor in &neighbors {
                let neighbor = neighbor as usize;
                self.links[neighbor][layer].push(node as u32);
                if self.links[neighbor][layer].len() > cap {
                    self.prune(neighbor, layer, cap);
                }
            }
            self.links[node][layer] = neighbors;

            if let Some((_, closest)) = candidates.first() {
                current = *closest;
            }
        }

        if level > self.top_layer {
            self.top_layer = level;
            self.entry_point = node;
        }
    }

    /// Keep only the `cap` closest links of `node` on `layer`
    fn prune(&mut self, node: usize, layer: usize, cap: usize) {
        let mut scored: Vec<(Dist, u32)> = self.links[node][layer]
            .iter()
            .map(|&other| (self.distance_between(node, other as usize), other))
            .collect();
        scored.sort_unstable();
        scored.truncate(cap);
        self.links[node][layer] = scored.into_iter().map(|(_, idx)| idx).collect();
    }

    fn neighbors(&self, node: usize, layer: usize) -> &[u32] {
        self.links[node].get(layer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Single-best greedy descent used on the upper layers
    fn greedy_closest(&self, query: &[f32], start: usize, layer: usize) -> usize {
        let mut current = start;
        let mut best = self.distance(query, current);
        loop {
            let mut improved = false;
            for &neighbor in self.neighbors(current, layer) {
                let d = self.distance(query, neighbor as usize);
                if d < best {
                    best = d;
                    current = neighbor as usize;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Beam search on one layer; returns up to `ef` nodes sorted closest first.
    fn search_layer(
        &self,
        query: &[f32],
        entry: usize,
        ef: usize,
        layer: usize,
        visited: &mut VisitedSet,
    ) -> Vec<(Dist, usize)> {
        visited.clear();

        let entry_dist = self.distance(query, entry);
        let mut candidates: BinaryHeap<Reverse<(Dist, usize)>> = BinaryHeap::with_capacity(ef * 2);
        let mut results: BinaryHeap<(Dist, usize)> = BinaryHeap::with_capacity(ef + 1);
        candidates.push(Reverse((entry_dist, entry)));
        results.push((entry_dist, entry));
        visited.insert(entry);

        while let Some(Reverse((dist, current))) = candidates.pop() {
            let worst = results.peek().map(|(d, _)| *d).unwrap_or(dist);
            if results.len() >= ef && dist > worst {
                break;
            }

            for &neighbor in self.neighbors(current, layer) {
                let neighbor = neighbor as usize;
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = self.distance(query, neighbor);
                let worst = results.peek().map(|(w, _)| *w).unwrap_or(d);
                if results.len() < ef || d < worst {
                    candidates.push(Reverse((d, neighbor)));
                    results.push((d, neighbor));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out = results.into_vec();
        out.sort_unstable();
        out
    }
}

impl NearestNeighborBackend for HnswBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hnsw
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        let n = self.snapshot.len();
        if k >= n {
            return exact_top_k(&self.snapshot, query, k);
        }

        let mut current = self.entry_point;
        for layer in (1..=self.top_layer).rev() {
            current = self.greedy_closest(query, current, layer);
        }

        let mut visited = VisitedSet::new(n);
        let ef = self.params.ef_search.max(k);
        let mut hits: Vec<Hit> = self
            .search_layer(query, current, ef, 0, &mut visited)
            .into_iter()
            .map(|(dist, position)| Hit {
                position,
                similarity: -dist.into_inner(),
            })
            .collect();

        if hits.len() < k {
            // Graph walk starved (tiny or poorly connected graph)
            return exact_top_k(&self.snapshot, query, k);
        }
        hits.sort_unstable_by(rank_order);
        hits.truncate(k);
        hits
    }
}
