//! HNSW graph — layered small-world structure and its search algorithms.
//!
//! Follows "Efficient and robust approximate nearest neighbor search using
//! Hierarchical Navigable Small World graphs" (Malkov & Yashunin).

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{EmbedDbError, Result};
use crate::vector::Vector;

use super::neighbor_queue::{MaxHeap, MinHeap, Neighbor};

/// Construction and search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswParams {
    /// Max connections per node on layers above 0.
    pub m: usize,
    /// Max connections on layer 0 (typically 2 * m).
    pub m_max0: usize,
    /// Candidate budget during construction.
    pub ef_construction: usize,
    /// Candidate budget during search.
    pub ef_search: usize,
    /// Level generation factor: 1 / ln(m).
    pub ml: f64,
    /// Cap on the number of layers.
    pub max_layers: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        let m = 16;
        Self {
            m,
            m_max0: 2 * m,
            ef_construction: 200,
            ef_search: 50,
            ml: 1.0 / (m as f64).ln(),
            max_layers: 16,
        }
    }
}

impl HnswParams {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        Self {
            m,
            m_max0: 2 * m,
            ef_construction,
            ef_search,
            ml: 1.0 / (m as f64).ln(),
            max_layers: 16,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphNode {
    vector: Vector,
    /// neighbors[l] holds the neighbor slots at layer l.
    neighbors: Vec<Vec<usize>>,
    /// Highest layer this node participates in.
    level: usize,
}

/// Structural state of one node, with the vector stored separately
/// (the artifact keeps vectors in the segment file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub neighbors: Vec<Vec<usize>>,
    pub level: usize,
}

/// Serializable graph structure for index persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub params: HnswParams,
    pub entry_point: Option<usize>,
    pub max_level: usize,
    pub nodes: Vec<Option<NodeSnapshot>>,
}

/// The layered graph. Slots are dense internal handles; deleted slots stay
/// as tombstoned `None` entries and are never reused.
#[derive(Debug)]
pub struct HnswGraph {
    nodes: Vec<Option<GraphNode>>,
    entry_point: Option<usize>,
    max_level: usize,
    params: HnswParams,
    metric: DistanceMetric,
    rng: StdRng,
    /// Live (non-deleted) node count.
    count: usize,
}

impl HnswGraph {
    pub fn new(metric: DistanceMetric, params: HnswParams) -> Self {
        Self {
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
            params,
            metric,
            rng: StdRng::from_entropy(),
            count: 0,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get_vector(&self, slot: usize) -> Option<&Vector> {
        self.nodes.get(slot).and_then(|n| n.as_ref()).map(|n| &n.vector)
    }

    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen();
        let level = (-r.ln() * self.params.ml).floor() as usize;
        level.min(self.params.max_layers - 1)
    }

    fn distance_to(&self, query: &Vector, slot: usize) -> Result<f32> {
        let node = self.nodes[slot]
            .as_ref()
            .ok_or_else(|| EmbedDbError::Index(format!("Dangling slot {}", slot)))?;
        self.metric.distance(query, &node.vector)
    }

    /// Search one layer for the `ef` closest neighbors of `query`,
    /// starting from the given entry slots (Algorithm 2).
    fn search_layer(
        &self,
        query: &Vector,
        entry_slots: &[usize],
        ef: usize,
        layer: usize,
    ) -> Result<Vec<Neighbor>> {
        let mut visited = HashSet::new();
        let mut frontier = MinHeap::new();
        let mut results = MaxHeap::new();

        for &slot in entry_slots {
            let dist = self.distance_to(query, slot)?;
            visited.insert(slot);
            frontier.push(Neighbor::new(slot, dist));
            results.push(Neighbor::new(slot, dist));
        }

        while let Some(candidate) = frontier.pop() {
            let furthest = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);
            if candidate.distance > furthest {
                break;
            }

            let Some(node) = &self.nodes[candidate.slot] else {
                continue;
            };
            if layer >= node.neighbors.len() {
                continue;
            }
            for &next in &node.neighbors[layer] {
                if !visited.insert(next) {
                    continue;
                }
                // Tombstoned slots are skipped, not followed
                if self.nodes.get(next).and_then(|n| n.as_ref()).is_none() {
                    continue;
                }

                let dist = self.distance_to(query, next)?;
                let furthest = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);
                if dist < furthest || results.len() < ef {
                    frontier.push(Neighbor::new(next, dist));
                    results.push(Neighbor::new(next, dist));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        Ok(results.into_sorted_vec())
    }

    /// Trim a node's neighbor list at `layer` to its `m` closest.
    fn prune_neighbors(&mut self, slot: usize, layer: usize, m: usize) {
        let (neighbor_slots, node_vec) = {
            let Some(node) = &self.nodes[slot] else { return };
            if layer >= node.neighbors.len() {
                return;
            }
            (node.neighbors[layer].clone(), node.vector.clone())
        };

        let mut scored: Vec<(usize, f32)> = neighbor_slots
            .into_iter()
            .filter_map(|ns| {
                self.nodes.get(ns).and_then(|n| n.as_ref()).map(|n| {
                    let dist = self
                        .metric
                        .distance(&node_vec, &n.vector)
                        .unwrap_or(f32::MAX);
                    (ns, dist)
                })
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(m);

        if let Some(node) = &mut self.nodes[slot] {
            if layer < node.neighbors.len() {
                node.neighbors[layer] = scored.into_iter().map(|(ns, _)| ns).collect();
            }
        }
    }

    /// Insert a vector under a fresh slot (Algorithm 1). The caller owns
    /// slot allocation; reusing a live slot is a logic error.
    pub fn insert(&mut self, slot: usize, vector: Vector) -> Result<()> {
        let level = self.random_level();

        if slot >= self.nodes.len() {
            self.nodes.resize_with(slot + 1, || None);
        }
        self.nodes[slot] = Some(GraphNode {
            vector: vector.clone(),
            neighbors: vec![Vec::new(); level + 1],
            level,
        });
        self.count += 1;

        let entry_point = match self.entry_point {
            None => {
                self.entry_point = Some(slot);
                self.max_level = level;
                return Ok(());
            }
            Some(ep) => ep,
        };

        let mut ep_slot = entry_point;
        let current_max = self.max_level;

        // Greedy descent through the layers above this node's level
        if current_max > level {
            for l in (level + 1..=current_max).rev() {
                if let Some(n) = self.search_layer(&vector, &[ep_slot], 1, l)?.first() {
                    ep_slot = n.slot;
                }
            }
        }

        // Connect at every layer from min(level, current_max) down to 0
        for l in (0..=level.min(current_max)).rev() {
            let m = if l == 0 { self.params.m_max0 } else { self.params.m };

            let nearest =
                self.search_layer(&vector, &[ep_slot], self.params.ef_construction, l)?;
            let chosen: Vec<usize> = nearest.iter().take(m).map(|n| n.slot).collect();

            if let Some(node) = &mut self.nodes[slot] {
                if l < node.neighbors.len() {
                    node.neighbors[l] = chosen.clone();
                }
            }

            // Bidirectional links, pruning any neighbor that overflows
            for &ns in &chosen {
                let overflow = if let Some(neighbor) = &mut self.nodes[ns] {
                    if l < neighbor.neighbors.len() {
                        neighbor.neighbors[l].push(slot);
                        neighbor.neighbors[l].len() > m
                    } else {
                        false
                    }
                } else {
                    false
                };
                if overflow {
                    self.prune_neighbors(ns, l, m);
                }
            }

            if let Some(n) = nearest.first() {
                ep_slot = n.slot;
            }
        }

        if level > self.max_level {
            self.entry_point = Some(slot);
            self.max_level = level;
        }

        Ok(())
    }

    /// Tombstone a slot and unlink it from its neighbors.
    pub fn remove(&mut self, slot: usize) -> Result<()> {
        if slot >= self.nodes.len() || self.nodes[slot].is_none() {
            return Ok(());
        }

        if let Some(node) = self.nodes[slot].take() {
            for (layer, neighbors) in node.neighbors.iter().enumerate() {
                for &ns in neighbors {
                    if let Some(Some(neighbor)) = self.nodes.get_mut(ns) {
                        if layer < neighbor.neighbors.len() {
                            neighbor.neighbors[layer].retain(|&n| n != slot);
                        }
                    }
                }
            }
            self.count -= 1;

            if self.entry_point == Some(slot) {
                self.entry_point = self
                    .nodes
                    .iter()
                    .enumerate()
                    .filter_map(|(i, n)| n.as_ref().map(|n| (i, n.level)))
                    .max_by_key(|&(_, level)| level)
                    .map(|(i, _)| i);
                self.max_level = self
                    .entry_point
                    .and_then(|ep| self.nodes[ep].as_ref().map(|n| n.level))
                    .unwrap_or(0);
            }
        }

        Ok(())
    }

    /// k-nearest-neighbor search with an `ef` candidate budget
    /// (Algorithm 5). Results ascend by distance, slot tie-break.
    pub fn search_knn(&self, query: &Vector, k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        let Some(entry_point) = self.entry_point else {
            return Ok(vec![]);
        };

        let mut ep_slot = entry_point;
        for l in (1..=self.max_level).rev() {
            if let Some(n) = self.search_layer(query, &[ep_slot], 1, l)?.first() {
                ep_slot = n.slot;
            }
        }

        let mut results = self.search_layer(query, &[ep_slot], ef.max(k), 0)?;
        results.truncate(k);
        Ok(results)
    }

    /// Structural snapshot, without vectors.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            params: self.params.clone(),
            entry_point: self.entry_point,
            max_level: self.max_level,
            nodes: self
                .nodes
                .iter()
                .map(|n| {
                    n.as_ref().map(|n| NodeSnapshot {
                        neighbors: n.neighbors.clone(),
                        level: n.level,
                    })
                })
                .collect(),
        }
    }

    /// Rebuild a graph from a snapshot plus the per-slot vectors. `vectors`
    /// must line up with the snapshot's slot layout.
    pub fn from_snapshot(
        metric: DistanceMetric,
        snapshot: GraphSnapshot,
        mut vectors: Vec<Option<Vector>>,
    ) -> Result<Self> {
        if vectors.len() != snapshot.nodes.len() {
            return Err(EmbedDbError::Persistence(format!(
                "Graph snapshot has {} slots but {} vectors were supplied",
                snapshot.nodes.len(),
                vectors.len()
            )));
        }

        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        let mut count = 0;
        for (slot, structural) in snapshot.nodes.into_iter().enumerate() {
            match structural {
                Some(s) => {
                    let vector = vectors[slot].take().ok_or_else(|| {
                        EmbedDbError::Persistence(format!("Missing vector for slot {}", slot))
                    })?;
                    nodes.push(Some(GraphNode {
                        vector,
                        neighbors: s.neighbors,
                        level: s.level,
                    }));
                    count += 1;
                }
                None => nodes.push(None),
            }
        }

        Ok(Self {
            nodes,
            entry_point: snapshot.entry_point,
            max_level: snapshot.max_level,
            params: snapshot.params,
            metric,
            rng: StdRng::from_entropy(),
            count,
        })
    }
}
