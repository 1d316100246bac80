//! Union-Find Decoder
//!
//! Every defect starts as a singleton cluster with odd parity. In each round the growing clusters (odd and not
//! touching a boundary) expand their frontier edges by a common length in fixed-point weight units: an edge
//! between two growing clusters grows twice as fast, and an edge is absorbed once its growth reaches its weight.
//! Absorbing an edge to a virtual vertex marks the cluster as touching the boundary; absorbing any other edge
//! merges the clusters at its ends with a weighted union. When no cluster grows anymore, each cluster is peeled:
//! a spanning tree over its absorbed edges is traversed from the leaves, taking a tree edge whenever the subtree
//! below it has odd parity.
//!
//! Each cluster root keeps a list of its candidate frontier edges, extended by the neighbor edges of every vertex
//! that joins the cluster and pruned lazily when an edge turns out to be fully grown or internal.
//!
//! Erased edges start fully grown, so erased qubits join their neighbors into clusters before any growth.
//!

use super::decoder::{Correction, Decoder};
use super::decoding_graph::DecodingGraph;
use super::error::DecodeError;
use super::syndrome::SyndromePattern;
use super::union_find::*;
use super::util::*;
use crate::derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrowthPolicy {
    /// only the odd clusters with the fewest defects grow in each round
    SmallestFirst,
    /// all odd clusters grow in each round
    Uniform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnionFindDecoderConfig {
    #[serde(default = "union_find_decoder_default_configs::growth_policy")]
    pub growth_policy: GrowthPolicy,
    /// the number of growth rounds before giving up, by default the number of edges plus vertices
    #[serde(default = "union_find_decoder_default_configs::max_iterations")]
    pub max_iterations: Option<usize>,
}

impl Default for UnionFindDecoderConfig {
    fn default() -> Self {
        serde_json::from_value(json!({})).unwrap()
    }
}

pub mod union_find_decoder_default_configs {
    use super::*;
    pub fn growth_policy() -> GrowthPolicy {
        GrowthPolicy::SmallestFirst
    }
    pub fn max_iterations() -> Option<usize> {
        None
    }
}

/// the payload of a cluster root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    /// the number of vertices in the cluster
    pub set_size: usize,
    pub defect_count: usize,
    pub is_touching_boundary: bool,
}

impl ClusterNode {
    #[inline]
    pub fn is_odd(&self) -> bool {
        self.defect_count % 2 == 1
    }

    /// a valid cluster can be peeled into a correction on its own
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.is_odd() || self.is_touching_boundary
    }
}

impl UnionNodeTrait for ClusterNode {
    #[inline]
    fn union(left: &Self, right: &Self) -> (bool, Self) {
        let result = Self {
            set_size: left.set_size + right.set_size,
            defect_count: left.defect_count + right.defect_count,
            is_touching_boundary: left.is_touching_boundary || right.is_touching_boundary,
        };
        // if left size is larger, choose left (weighted union)
        (left.set_size >= right.set_size, result)
    }
    #[inline]
    fn clear(&mut self) {
        self.set_size = 1;
        self.defect_count = 0;
        self.is_touching_boundary = false;
    }
    #[inline]
    fn default() -> Self {
        Self {
            set_size: 1,
            defect_count: 0,
            is_touching_boundary: false,
        }
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct UnionFindDecoder {
    #[derivative(Debug = "ignore")]
    pub graph: Arc<DecodingGraph>,
    pub config: UnionFindDecoderConfig,
    #[derivative(Debug = "ignore")]
    union_find: UnionFindGeneric<ClusterNode>,
    /// accumulated growth of each edge, in the same unit as the full edge weight
    edge_growth: Vec<Weight>,
    is_defect: Vec<bool>,
    /// the vertices of each cluster, only maintained at roots
    #[derivative(Debug = "ignore")]
    cluster_vertices: Vec<Vec<VertexIndex>>,
    /// candidate frontier edges of each cluster, only maintained at roots
    #[derivative(Debug = "ignore")]
    cluster_boundary: Vec<Vec<EdgeIndex>>,
    /// roots of the clusters that contain at least one defect
    cluster_roots: BTreeSet<VertexIndex>,
    is_growing: Vec<bool>,
    /// the parent edge of each vertex in the peeling forest
    parent_edge: Vec<Option<EdgeIndex>>,
    visited: Vec<bool>,
}

impl UnionFindDecoder {
    pub fn new(graph: Arc<DecodingGraph>, config: UnionFindDecoderConfig) -> Self {
        let vertex_num = graph.vertex_num();
        let edge_num = graph.edge_num();
        debug!(
            "union-find decoder over {} vertices and {} edges, growth policy {:?}",
            vertex_num, edge_num, config.growth_policy
        );
        Self {
            union_find: UnionFindGeneric::new(vertex_num),
            edge_growth: vec![0; edge_num],
            is_defect: vec![false; vertex_num],
            cluster_vertices: vec![vec![]; vertex_num],
            cluster_boundary: vec![vec![]; vertex_num],
            cluster_roots: BTreeSet::new(),
            is_growing: vec![false; vertex_num],
            parent_edge: vec![None; vertex_num],
            visited: vec![false; vertex_num],
            graph,
            config,
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.config
            .max_iterations
            .unwrap_or(self.graph.edge_num() + self.graph.vertex_num())
    }

    fn clear(&mut self) {
        self.union_find.clear();
        self.edge_growth.fill(0);
        self.is_defect.fill(false);
        for vertices in self.cluster_vertices.iter_mut() {
            vertices.clear();
        }
        for boundary in self.cluster_boundary.iter_mut() {
            boundary.clear();
        }
        self.cluster_roots.clear();
    }

    #[inline]
    fn is_fully_grown(&self, edge_index: EdgeIndex) -> bool {
        self.edge_growth[edge_index] >= self.graph.weight(edge_index)
    }

    /// the roots that grow in this round
    fn growing_roots(&mut self) -> Vec<VertexIndex> {
        let odd_roots: Vec<VertexIndex> = self
            .cluster_roots
            .iter()
            .copied()
            .filter(|&root| {
                let node = &self.union_find.payload[root];
                node.is_odd() && !node.is_touching_boundary
            })
            .collect();
        match self.config.growth_policy {
            GrowthPolicy::Uniform => odd_roots,
            GrowthPolicy::SmallestFirst => {
                let smallest = odd_roots
                    .iter()
                    .map(|&root| self.union_find.payload[root].defect_count)
                    .min()
                    .unwrap_or(0);
                odd_roots
                    .into_iter()
                    .filter(|&root| self.union_find.payload[root].defect_count == smallest)
                    .collect()
            }
        }
    }

    /// start tracking the singleton cluster of a vertex that was never part of a cluster
    fn join_cluster(&mut self, vertex_index: VertexIndex) {
        let root = self.union_find.find(vertex_index);
        if self.cluster_vertices[root].is_empty() {
            self.cluster_vertices[root].push(root);
            self.cluster_boundary[root].extend(self.graph.vertices[root].neighbor_edges.iter().copied());
        }
    }

    /// merge the clusters of two real vertices, keeping the vertex lists, the boundary lists and the set of
    /// defect clusters up to date
    fn merge(&mut self, a: VertexIndex, b: VertexIndex) {
        self.join_cluster(a);
        self.join_cluster(b);
        if let Some((parent, child)) = self.union_find.union(a, b) {
            let child_vertices = std::mem::take(&mut self.cluster_vertices[child]);
            self.cluster_vertices[parent].extend(child_vertices);
            let child_boundary = std::mem::take(&mut self.cluster_boundary[child]);
            self.cluster_boundary[parent].extend(child_boundary);
            if self.cluster_roots.remove(&child) || self.union_find.payload[parent].defect_count > 0 {
                self.cluster_roots.insert(parent);
            }
        }
    }

    /// a fully grown edge either merges two clusters or lets a cluster touch the boundary
    fn absorb_edge(&mut self, edge_index: EdgeIndex) {
        let (a, b) = self.graph.edges[edge_index].vertices;
        match (self.graph.is_virtual(a), self.graph.is_virtual(b)) {
            (false, false) => self.merge(a, b),
            (false, true) => self.union_find.get_mut(a).is_touching_boundary = true,
            (true, false) => self.union_find.get_mut(b).is_touching_boundary = true,
            (true, true) => {}
        }
    }

    /// reduce the boundary list of a cluster to the not yet fully grown edges leaving it
    fn prune_boundary(&mut self, root: VertexIndex) -> &[EdgeIndex] {
        let (graph, edge_growth, union_find) = (&self.graph, &self.edge_growth, &mut self.union_find);
        let boundary = &mut self.cluster_boundary[root];
        boundary.retain(|&edge_index| {
            let (a, b) = graph.edges[edge_index].vertices;
            edge_growth[edge_index] < graph.weight(edge_index) && union_find.find(a) != union_find.find(b)
        });
        boundary.sort_unstable();
        boundary.dedup();
        boundary
    }

    /// grow clusters until every cluster is valid
    fn grow_clusters(&mut self) -> Result<(), DecodeError> {
        let max_iterations = self.max_iterations();
        let mut iteration = 0;
        loop {
            let growing_roots = self.growing_roots();
            if growing_roots.is_empty() {
                return Ok(());
            }
            iteration += 1;
            if iteration > max_iterations {
                return Err(DecodeError::ClusterGrowthExceeded {
                    max_iterations,
                    remaining: growing_roots.len(),
                });
            }
            for &root in growing_roots.iter() {
                self.is_growing[root] = true;
            }
            // frontier edges with their growth rate
            let mut frontier = BTreeSet::new();
            for &root in growing_roots.iter() {
                frontier.extend(self.prune_boundary(root).iter().copied());
            }
            let mut growing_edges = Vec::with_capacity(frontier.len());
            let mut length = Weight::MAX;
            for edge_index in frontier {
                let (a, b) = self.graph.edges[edge_index].vertices;
                let (root_a, root_b) = (self.union_find.find(a), self.union_find.find(b));
                if root_a == root_b {
                    continue; // internal edge
                }
                let rate = self.is_growing[root_a] as Weight + self.is_growing[root_b] as Weight;
                let remaining = self.graph.weight(edge_index) - self.edge_growth[edge_index];
                length = length.min((remaining + rate - 1) / rate);
                growing_edges.push((edge_index, rate));
            }
            for &root in growing_roots.iter() {
                self.is_growing[root] = false;
            }
            if growing_edges.is_empty() {
                return Err(DecodeError::ClusterGrowthExceeded {
                    max_iterations,
                    remaining: growing_roots.len(),
                });
            }
            let length = length.max(1);
            trace!(
                "iteration {}: {} growing clusters, {} frontier edges, length {}",
                iteration,
                growing_roots.len(),
                growing_edges.len(),
                length
            );
            let mut grown_edges = vec![];
            for (edge_index, rate) in growing_edges {
                let weight = self.graph.weight(edge_index);
                self.edge_growth[edge_index] = (self.edge_growth[edge_index] + rate * length).min(weight);
                if self.edge_growth[edge_index] == weight {
                    grown_edges.push(edge_index);
                }
            }
            for edge_index in grown_edges {
                self.absorb_edge(edge_index);
            }
        }
    }

    /// peel a valid cluster into correction edges
    fn peel_cluster(&mut self, root: VertexIndex, correction: &mut BTreeSet<EdgeIndex>) {
        let vertices = self.cluster_vertices[root].clone();
        let vertices = if vertices.is_empty() { vec![root] } else { vertices };
        // the tree root is a virtual vertex for clusters touching the boundary
        let mut tree_root = None;
        if self.union_find.payload[root].is_touching_boundary {
            'search: for &vertex_index in vertices.iter() {
                for &edge_index in self.graph.vertices[vertex_index].neighbor_edges.iter() {
                    let peer = self.graph.peer_of(edge_index, vertex_index);
                    if self.graph.is_virtual(peer) && self.is_fully_grown(edge_index) {
                        tree_root = Some(peer);
                        self.visited[vertex_index] = true;
                        self.parent_edge[vertex_index] = Some(edge_index);
                        break 'search;
                    }
                }
            }
        }
        let first = match tree_root {
            Some(_) => vertices
                .iter()
                .copied()
                .find(|&vertex_index| self.visited[vertex_index])
                .expect("the vertex next to the boundary is visited"),
            None => *vertices.iter().min().expect("clusters are never empty"),
        };
        self.visited[first] = true;
        let mut order = vec![first];
        let mut queue = VecDeque::from([first]);
        while let Some(vertex_index) = queue.pop_front() {
            for &edge_index in self.graph.vertices[vertex_index].neighbor_edges.iter() {
                let peer = self.graph.peer_of(edge_index, vertex_index);
                if self.graph.is_virtual(peer) || self.visited[peer] || !self.is_fully_grown(edge_index) {
                    continue;
                }
                if self.union_find.find(peer) != root {
                    continue;
                }
                self.visited[peer] = true;
                self.parent_edge[peer] = Some(edge_index);
                order.push(peer);
                queue.push_back(peer);
            }
        }
        debug_assert_eq!(order.len(), vertices.len(), "a cluster is connected through its absorbed edges");
        // peel from the leaves
        let mut parity: Vec<(VertexIndex, bool)> = order.iter().map(|&v| (v, self.is_defect[v])).collect();
        let position: HashMap<VertexIndex, usize> =
            order.iter().enumerate().map(|(idx, &v)| (v, idx)).collect();
        for idx in (0..order.len()).rev() {
            let (vertex_index, is_odd) = parity[idx];
            if let Some(edge_index) = self.parent_edge[vertex_index] {
                if is_odd {
                    correction.insert(edge_index);
                    let parent = self.graph.peer_of(edge_index, vertex_index);
                    if let Some(&parent_idx) = position.get(&parent) {
                        parity[parent_idx].1 ^= true;
                    }
                }
            } else {
                debug_assert!(!is_odd || tree_root.is_some(), "a cluster without boundary has even parity");
            }
        }
        for &vertex_index in order.iter() {
            self.visited[vertex_index] = false;
            self.parent_edge[vertex_index] = None;
        }
    }
}

impl Decoder for UnionFindDecoder {
    fn decode(&mut self, syndrome_pattern: &SyndromePattern) -> Result<Correction, DecodeError> {
        self.clear();
        for defect in syndrome_pattern.defects.iter() {
            let vertex_index = self.graph.defect_vertex(defect);
            debug_assert!(!self.graph.is_virtual(vertex_index), "virtual vertices cannot be defects");
            self.is_defect[vertex_index] = true;
            self.union_find.payload[vertex_index].defect_count = 1;
            self.join_cluster(vertex_index);
            self.cluster_roots.insert(vertex_index);
        }
        for edge_index in self.graph.erasure_edges(syndrome_pattern) {
            self.edge_growth[edge_index] = self.graph.weight(edge_index);
            self.absorb_edge(edge_index);
        }
        self.grow_clusters()?;
        let mut correction = BTreeSet::new();
        let roots: Vec<VertexIndex> = self.cluster_roots.iter().copied().collect();
        for root in roots {
            debug_assert!(self.union_find.payload[root].is_valid());
            self.peel_cluster(root, &mut correction);
        }
        Ok(Correction::from_edges(&self.graph, correction.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{BoundaryCondition, CodeVariant, FailureCriterion, Lattice};
    use crate::decoding_graph::WeightFunction;
    use crate::noise::{ErrorPattern, NoiseModel};
    use crate::pauli::Pauli;
    use crate::rand_xoshiro::rand_core::SeedableRng;
    use proptest::prelude::*;

    fn build_graph(d: usize, variant: CodeVariant, boundary: BoundaryCondition, noisy_measurements: usize) -> (Lattice, Arc<DecodingGraph>) {
        let lattice = Lattice::build(d, variant, boundary).unwrap();
        let noise_model = NoiseModel::new(0.1, 10.).unwrap().with_noisy_measurements(noisy_measurements);
        let graph = DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 500).unwrap();
        (lattice, Arc::new(graph))
    }

    #[test]
    fn union_find_decoder_cluster_node_1() {  // cargo test union_find_decoder_cluster_node_1 -- --nocapture
        let mut uf = UnionFindGeneric::<ClusterNode>::new(4);
        uf.payload[0].defect_count = 1;
        uf.payload[3].defect_count = 1;
        uf.payload[3].is_touching_boundary = true;
        assert!(!uf.get_mut(0).is_valid());
        uf.union(0, 1);
        assert!(uf.get_mut(1).is_odd());
        uf.union(1, 3);
        let node = uf.get_mut(3).clone();
        assert_eq!(node.set_size, 3);
        assert_eq!(node.defect_count, 2);
        assert!(node.is_touching_boundary && node.is_valid());
    }

    #[test]
    fn union_find_decoder_single_error_1() {  // cargo test union_find_decoder_single_error_1 -- --nocapture
        let (lattice, graph) = build_graph(5, CodeVariant::Css, BoundaryCondition::Planar, 0);
        let mut decoder = UnionFindDecoder::new(graph.clone(), UnionFindDecoderConfig::default());
        for data_index in 0..lattice.data_num() {
            for error in [Pauli::X, Pauli::Y, Pauli::Z] {
                let mut errors = vec![Pauli::I; lattice.data_num()];
                errors[data_index] = error;
                let error_pattern = ErrorPattern::from_data_errors(errors.clone(), lattice.stabilizer_num());
                let syndrome_pattern = crate::syndrome::extract(&lattice, &error_pattern);
                let correction = decoder.decode(&syndrome_pattern).unwrap();
                correction.apply_to(&mut errors);
                assert!(lattice.syndrome_of(&errors).is_empty());
                assert!(!lattice.logical_failure(&errors, FailureCriterion::All));
            }
        }
    }

    #[test]
    fn union_find_decoder_growth_bound_1() {  // cargo test union_find_decoder_growth_bound_1 -- --nocapture
        let (_lattice, graph) = build_graph(3, CodeVariant::Css, BoundaryCondition::Planar, 0);
        let config: UnionFindDecoderConfig = serde_json::from_value(json!({"max_iterations": 0})).unwrap();
        let mut decoder = UnionFindDecoder::new(graph.clone(), config);
        let edge_index = graph.edges.iter().position(|edge| !graph.is_virtual(edge.vertices.0) && !graph.is_virtual(edge.vertices.1)).unwrap();
        let syndrome_pattern = graph.syndrome_of(&[edge_index]);
        assert!(matches!(
            decoder.decode(&syndrome_pattern),
            Err(DecodeError::ClusterGrowthExceeded { max_iterations: 0, remaining: 2 })
        ));
        // an empty syndrome never grows
        assert!(decoder.decode(&SyndromePattern::new_empty(1)).unwrap().edges.is_empty());
    }

    #[test]
    fn union_find_decoder_toric_1() {  // cargo test union_find_decoder_toric_1 -- --nocapture
        let (_lattice, graph) = build_graph(5, CodeVariant::Xzzx, BoundaryCondition::Toric, 2);
        let config: UnionFindDecoderConfig = serde_json::from_value(json!({"growth_policy": "uniform"})).unwrap();
        let mut decoder = UnionFindDecoder::new(graph.clone(), config);
        let mut rng = DeterministicRng::seed_from_u64(9);
        for _ in 0..20 {
            let subgraph = graph.generate_random_errors(&mut rng);
            let syndrome_pattern = graph.syndrome_of(&subgraph);
            let correction = decoder.decode(&syndrome_pattern).unwrap();
            assert_eq!(graph.syndrome_of(&correction.edges), syndrome_pattern);
        }
    }

    #[test]
    fn union_find_decoder_erasure_1() {  // cargo test union_find_decoder_erasure_1 -- --nocapture
        let (lattice, graph) = build_graph(5, CodeVariant::Css, BoundaryCondition::Planar, 0);
        let mut decoder = UnionFindDecoder::new(graph.clone(), UnionFindDecoderConfig::default());
        let mut errors = vec![Pauli::I; lattice.data_num()];
        let chain: Vec<DataIndex> = [3, 5, 7].iter().map(|&i| lattice.data_index(i, 5).unwrap()).collect();
        for &data_index in chain.iter() {
            errors[data_index] = Pauli::Z;
        }
        let mut error_pattern = ErrorPattern::from_data_errors(errors.clone(), lattice.stabilizer_num());
        error_pattern.erasures = chain.iter().map(|&data_index| (0, data_index)).collect();
        let syndrome_pattern = crate::syndrome::extract(&lattice, &error_pattern);
        assert_eq!(syndrome_pattern.len(), 2);
        // the erased chain already joins both defects into an even cluster
        decoder.decode(&syndrome_pattern).unwrap().apply_to(&mut errors);
        assert!(errors.iter().all(|error| error.is_identity()));
        // erasures without any defect produce no correction
        let mut error_pattern = ErrorPattern::from_data_errors(vec![Pauli::I; lattice.data_num()], lattice.stabilizer_num());
        error_pattern.erasures = chain.iter().map(|&data_index| (0, data_index)).collect();
        let syndrome_pattern = crate::syndrome::extract(&lattice, &error_pattern);
        assert!(decoder.decode(&syndrome_pattern).unwrap().edges.is_empty());
    }

    #[test]
    fn union_find_decoder_cluster_boundary_1() {  // cargo test union_find_decoder_cluster_boundary_1 -- --nocapture
        let (_lattice, graph) = build_graph(7, CodeVariant::Css, BoundaryCondition::Planar, 2);
        let mut decoder = UnionFindDecoder::new(graph.clone(), UnionFindDecoderConfig::default());
        let mut rng = DeterministicRng::seed_from_u64(17);
        for _ in 0..20 {
            let subgraph = graph.generate_random_errors(&mut rng);
            decoder.decode(&graph.syndrome_of(&subgraph)).unwrap();
            let roots: Vec<VertexIndex> = decoder.cluster_roots.iter().copied().collect();
            for root in roots {
                // scanning every vertex of the cluster finds the same frontier as the maintained list
                let mut scanned = BTreeSet::new();
                for vertex_index in decoder.cluster_vertices[root].clone() {
                    for &edge_index in graph.vertices[vertex_index].neighbor_edges.iter() {
                        let (a, b) = graph.edges[edge_index].vertices;
                        if !decoder.is_fully_grown(edge_index) && decoder.union_find.find(a) != decoder.union_find.find(b) {
                            scanned.insert(edge_index);
                        }
                    }
                }
                let maintained: BTreeSet<EdgeIndex> = decoder.prune_boundary(root).iter().copied().collect();
                assert_eq!(maintained, scanned);
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn union_find_decoder_syndrome_consistency_1(seed in any::<u64>(), d in prop::sample::select(vec![3usize, 5, 7]), noisy_measurements in 0..3usize, xzzx in any::<bool>()) {
            let variant = if xzzx { CodeVariant::Xzzx } else { CodeVariant::Css };
            let (_lattice, graph) = build_graph(d, variant, BoundaryCondition::Planar, noisy_measurements);
            let mut decoder = UnionFindDecoder::new(graph.clone(), UnionFindDecoderConfig::default());
            let subgraph = graph.generate_random_errors(&mut DeterministicRng::seed_from_u64(seed));
            let syndrome_pattern = graph.syndrome_of(&subgraph);
            let correction = decoder.decode(&syndrome_pattern).unwrap();
            prop_assert_eq!(&graph.syndrome_of(&correction.edges), &syndrome_pattern);
            prop_assert_eq!(&decoder.decode(&syndrome_pattern).unwrap(), &correction);
        }
    }
}
