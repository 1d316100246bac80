//! Decoding Graph
//!
//! The space-time decoding graph shared by both decoders.
//! Every vertex is a stabilizer position in a measurement layer, including the virtual positions on the planar boundary;
//! vertex `t * stabilizer_num + s` is stabilizer `s` in layer `t`, so vertex indices follow the `(t, i, j)` order.
//! Every edge is an independent error mechanism that flips its two vertices: a Pauli component (X or Z) on a data
//! qubit in some layer, or a measurement error between two consecutive layers.
//!
//! The X and Z components of a data qubit always flip stabilizers of a single type, so the graph decouples into
//! two halves, one per stabilizer type.
//!

use super::code::{Lattice, StabilizerType};
use super::error::ConfigError;
use super::noise::NoiseModel;
use super::pauli::Pauli;
use super::syndrome::{Defect, SyndromePattern};
use super::util::*;
use crate::derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// edges with zero probability are kept with this multiple of `max_half_weight`, so the graph stays connected
pub const IMPOSSIBLE_WEIGHT_FACTOR: Weight = 64;

/// Vertex corresponds to a stabilizer measurement bit
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct CodeVertex {
    pub position: Position,
    pub stabilizer_index: StabilizerIndex,
    pub stabilizer_type: StabilizerType,
    /// neighbor edges helps to set find individual edge
    #[derivative(Debug = "ignore")]
    pub neighbor_edges: Vec<EdgeIndex>,
    /// virtual vertex won't report measurement results
    pub is_virtual: bool,
}

/// the error mechanism behind an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// a Pauli component, `X` or `Z`, on a data qubit right before the measurement of `layer`
    Data {
        layer: usize,
        data_index: DataIndex,
        component: Pauli,
    },
    /// a flipped outcome of a stabilizer in `layer`
    Measurement { layer: usize, stabilizer_index: StabilizerIndex },
}

/// Edge flips the measurement result of two vertices
#[derive(Debug, Clone)]
pub struct CodeEdge {
    /// the two vertices incident to this edge
    pub vertices: (VertexIndex, VertexIndex),
    /// probability of flipping the results of these two vertices
    pub p: f64,
    /// the integer weight of this edge
    pub half_weight: Weight,
    pub kind: EdgeKind,
}

impl CodeEdge {
    pub fn new(a: VertexIndex, b: VertexIndex, p: f64, kind: EdgeKind) -> Self {
        Self {
            vertices: (a, b),
            p,
            half_weight: 0,
            kind,
        }
    }

    pub fn is_impossible(&self) -> bool {
        self.p <= 0.
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightFunction {
    /// `ln((1-p)/p)`, the log-likelihood ratio of an error against no error
    LogOdds,
    /// `ln(1/p)`
    LogInverse,
    /// every possible edge weighs the same
    Uniform,
}

impl Default for WeightFunction {
    fn default() -> Self {
        Self::LogOdds
    }
}

/// (pre-scaled) weight of an edge with error probability `p`, which is clamped to at most 50%
pub fn weight_of_p(p: f64, weight_function: WeightFunction) -> f64 {
    assert!(p > 0. && p <= 1., "p must be a positive probability");
    let p = p.min(0.5);
    match weight_function {
        WeightFunction::LogOdds => ((1. - p) / p).ln(),
        WeightFunction::LogInverse => (1. / p).ln(),
        WeightFunction::Uniform => 1.,
    }
}

#[derive(Debug, Clone)]
pub struct DecodingGraph {
    pub vertices: Vec<CodeVertex>,
    pub edges: Vec<CodeEdge>,
    pub stabilizer_num: usize,
    pub layer_num: usize,
    pub data_num: usize,
    pub max_half_weight: Weight,
    /// `data_edges[t][q]` holds the X and Z component edges of data qubit `q` in layer `t`; empty for layers without data errors
    pub data_edges: Vec<Vec<[EdgeIndex; 2]>>,
}

impl DecodingGraph {
    pub fn build(
        lattice: &Lattice,
        noise_model: &NoiseModel,
        weight_function: WeightFunction,
        max_half_weight: Weight,
    ) -> Result<Self, ConfigError> {
        noise_model.validate()?;
        if max_half_weight <= 0 {
            return Err(ConfigError::InvalidMaxHalfWeight(max_half_weight));
        }
        let stabilizer_num = lattice.stabilizer_num();
        let layer_num = noise_model.layer_num();
        let probabilities = noise_model.pauli_probabilities();
        let mut edges = Vec::new();
        let mut data_edges = vec![vec![]; layer_num];
        for t in 0..layer_num {
            let bias = t * stabilizer_num;
            if noise_model.has_data_errors(t) {
                for (data_index, [x_flips, z_flips]) in lattice.flipped_by.iter().enumerate() {
                    data_edges[t].push([edges.len(), edges.len() + 1]);
                    for (component, flips, p) in [
                        (Pauli::X, x_flips, probabilities.x_component()),
                        (Pauli::Z, z_flips, probabilities.z_component()),
                    ] {
                        let kind = EdgeKind::Data {
                            layer: t,
                            data_index,
                            component,
                        };
                        edges.push(CodeEdge::new(bias + flips[0], bias + flips[1], p, kind));
                    }
                }
            }
            // inter-layer connection
            if t + 1 < layer_num {
                let pm = noise_model.measurement_error_at(t);
                for stabilizer_index in lattice.real_stabilizers() {
                    let kind = EdgeKind::Measurement { layer: t, stabilizer_index };
                    edges.push(CodeEdge::new(bias + stabilizer_index, bias + stabilizer_num + stabilizer_index, pm, kind));
                }
            }
        }
        let mut graph = Self {
            vertices: Vec::new(),
            edges,
            stabilizer_num,
            layer_num,
            data_num: lattice.data_num(),
            max_half_weight,
            data_edges,
        };
        graph.fill_vertices(lattice);
        graph.compute_weights(weight_function);
        debug!(
            "decoding graph: {} vertices, {} edges, {} layers",
            graph.vertex_num(),
            graph.edge_num(),
            layer_num
        );
        Ok(graph)
    }

    fn fill_vertices(&mut self, lattice: &Lattice) {
        let vertex_num = self.layer_num * self.stabilizer_num;
        self.vertices.clear();
        self.vertices.reserve(vertex_num);
        for t in 0..self.layer_num {
            for (stabilizer_index, stabilizer) in lattice.stabilizers.iter().enumerate() {
                self.vertices.push(CodeVertex {
                    position: Position::new(t, stabilizer.i, stabilizer.j),
                    stabilizer_index,
                    stabilizer_type: stabilizer.stabilizer_type,
                    neighbor_edges: Vec::new(),
                    is_virtual: stabilizer.is_virtual,
                });
            }
        }
        for (edge_idx, edge) in self.edges.iter().enumerate() {
            self.vertices[edge.vertices.0].neighbor_edges.push(edge_idx);
            self.vertices[edge.vertices.1].neighbor_edges.push(edge_idx);
        }
    }

    /// computes integer weights from probabilities, scaled such that the maximum half weight of a possible edge is
    /// `max_half_weight` and the minimum is 1
    fn compute_weights(&mut self, weight_function: WeightFunction) {
        let mut max_weight = 0.;
        for edge in self.edges.iter().filter(|edge| !edge.is_impossible()) {
            let weight = weight_of_p(edge.p, weight_function);
            if weight > max_weight {
                max_weight = weight;
            }
        }
        let max_half_weight = self.max_half_weight;
        for edge in self.edges.iter_mut() {
            edge.half_weight = if edge.is_impossible() {
                max_half_weight * IMPOSSIBLE_WEIGHT_FACTOR
            } else if max_weight > 0. {
                let weight = weight_of_p(edge.p, weight_function);
                let half_weight: Weight = ((max_half_weight as f64) * weight / max_weight).round() as Weight;
                half_weight.max(1)
            } else {
                1
            };
        }
    }

    pub fn vertex_num(&self) -> VertexNum {
        self.vertices.len()
    }

    pub fn edge_num(&self) -> usize {
        self.edges.len()
    }

    pub fn is_virtual(&self, vertex_index: VertexIndex) -> bool {
        self.vertices[vertex_index].is_virtual
    }

    /// the full (not halved) weight of an edge
    pub fn weight(&self, edge_index: EdgeIndex) -> Weight {
        self.edges[edge_index].half_weight * 2
    }

    pub fn vertex_index(&self, t: usize, stabilizer_index: StabilizerIndex) -> VertexIndex {
        t * self.stabilizer_num + stabilizer_index
    }

    pub fn defect_vertex(&self, defect: &Defect) -> VertexIndex {
        self.vertex_index(defect.position.t, defect.stabilizer_index)
    }

    /// defect vertices of a syndrome, in increasing order
    pub fn defect_vertices(&self, syndrome_pattern: &SyndromePattern) -> Vec<VertexIndex> {
        syndrome_pattern.defects.iter().map(|defect| self.defect_vertex(defect)).collect()
    }

    /// the edges of the erased data qubits of a syndrome: both Pauli components of each erased qubit
    pub fn erasure_edges(&self, syndrome_pattern: &SyndromePattern) -> Vec<EdgeIndex> {
        let mut erasure_edges = Vec::with_capacity(2 * syndrome_pattern.erasures.len());
        for &(t, data_index) in syndrome_pattern.erasures.iter() {
            let component_edges = self.data_edges[t]
                .get(data_index)
                .expect("erasures only happen in layers with data errors");
            erasure_edges.extend(component_edges.iter());
        }
        erasure_edges
    }

    /// the opposite vertex of an edge
    pub fn peer_of(&self, edge_index: EdgeIndex, vertex_index: VertexIndex) -> VertexIndex {
        let (a, b) = self.edges[edge_index].vertices;
        if a == vertex_index {
            b
        } else {
            a
        }
    }

    /// generate standard interface to instantiate a matching solver
    pub fn get_initializer(&self) -> SolverInitializer {
        let mut weighted_edges = Vec::with_capacity(self.edges.len());
        for edge in self.edges.iter() {
            weighted_edges.push((edge.vertices.0, edge.vertices.1, edge.half_weight * 2));
        }
        let mut virtual_vertices = Vec::new();
        for (vertex_idx, vertex) in self.vertices.iter().enumerate() {
            if vertex.is_virtual {
                virtual_vertices.push(vertex_idx);
            }
        }
        SolverInitializer::new(self.vertex_num(), weighted_edges, virtual_vertices)
    }

    /// the syndrome generated by the errors on a subgraph
    pub fn syndrome_of(&self, subgraph: &[EdgeIndex]) -> SyndromePattern {
        let mut defect_vertices = BTreeSet::new();
        for &edge_index in subgraph.iter() {
            let (left, right) = self.edges[edge_index].vertices;
            for vertex_index in [left, right] {
                if !defect_vertices.remove(&vertex_index) {
                    defect_vertices.insert(vertex_index);
                }
            }
        }
        let defects = defect_vertices
            .into_iter()
            .filter(|&vertex_index| !self.is_virtual(vertex_index))
            .map(|vertex_index| {
                let vertex = &self.vertices[vertex_index];
                Defect {
                    position: vertex.position,
                    stabilizer_index: vertex.stabilizer_index,
                    stabilizer_type: vertex.stabilizer_type,
                }
            })
            .collect();
        SyndromePattern {
            defects,
            layer_num: self.layer_num,
            erasures: vec![],
        }
    }

    /// sample each edge independently with its own probability
    pub fn generate_random_errors<R: F64Rng>(&self, rng: &mut R) -> Vec<EdgeIndex> {
        let mut subgraph = vec![];
        for (edge_index, edge) in self.edges.iter().enumerate() {
            if rng.next_f64() < edge.p {
                subgraph.push(edge_index);
            }
        }
        subgraph
    }

    /// sanity check to avoid duplicate edges that are hard to debug
    pub fn sanity_check(&self) -> Result<(), String> {
        if self.vertices.is_empty() || self.edges.is_empty() {
            return Err("empty graph".to_string());
        }
        let mut existing_edges = HashMap::<(VertexIndex, VertexIndex), EdgeIndex>::with_capacity(self.edges.len() * 2);
        for (edge_idx, edge) in self.edges.iter().enumerate() {
            let (v1, v2) = edge.vertices;
            if v1 == v2 {
                return Err(format!("edge {} is a self loop on vertex {}", edge_idx, v1));
            }
            if self.vertices[v1].stabilizer_type != self.vertices[v2].stabilizer_type {
                return Err(format!("edge {} connects stabilizers of different types", edge_idx));
            }
            let unique_edge = if v1 < v2 { (v1, v2) } else { (v2, v1) };
            if let Some(previous_idx) = existing_edges.get(&unique_edge) {
                return Err(format!(
                    "duplicate edge {} and {} with incident vertices {} and {}",
                    previous_idx, edge_idx, v1, v2
                ));
            }
            existing_edges.insert(unique_edge, edge_idx);
        }
        for (vertex_idx, vertex) in self.vertices.iter().enumerate() {
            if !vertex.is_virtual && vertex.neighbor_edges.is_empty() {
                return Err(format!("vertex {} do not have any neighbor edges", vertex_idx));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{BoundaryCondition, CodeVariant};
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn decoding_graph_code_capacity_1() {  // cargo test decoding_graph_code_capacity_1 -- --nocapture
        let lattice = Lattice::build(5, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let noise_model = NoiseModel::new(0.1, 0.5).unwrap();
        let graph = DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 500).unwrap();
        graph.sanity_check().unwrap();
        assert_eq!(graph.vertex_num(), lattice.stabilizer_num());
        assert_eq!(graph.edge_num(), 2 * lattice.data_num());
        // depolarizing noise weighs X and Z components equally
        assert!(graph.edges.iter().all(|edge| edge.half_weight == 500));
    }

    #[test]
    fn decoding_graph_phenomenological_1() {  // cargo test decoding_graph_phenomenological_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Xzzx, BoundaryCondition::Planar).unwrap();
        let noise_model = NoiseModel::new(0.05, 10.).unwrap().with_noisy_measurements(3);
        let graph = DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 1000).unwrap();
        graph.sanity_check().unwrap();
        let real_num = lattice.real_stabilizers().count();
        assert_eq!(graph.vertex_num(), 4 * lattice.stabilizer_num());
        assert_eq!(graph.edge_num(), 3 * 2 * lattice.data_num() + 3 * real_num);
        let max_half_weight = graph.edges.iter().map(|edge| edge.half_weight).max().unwrap();
        assert_eq!(max_half_weight, 1000);
        // the likely Z component is cheaper than the unlikely X component
        let weight_of = |component: Pauli| {
            graph
                .edges
                .iter()
                .find(|edge| matches!(edge.kind, EdgeKind::Data { component: c, .. } if c == component))
                .unwrap()
                .half_weight
        };
        assert!(weight_of(Pauli::Z) < weight_of(Pauli::X));
    }

    #[test]
    fn decoding_graph_impossible_edges_1() {  // cargo test decoding_graph_impossible_edges_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let noise_model = NoiseModel::new(0.1, f64::INFINITY)
            .unwrap()
            .with_noisy_measurements(2)
            .with_shallow_error_on_bottom(true);
        let graph = DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 100).unwrap();
        for edge in graph.edges.iter() {
            match edge.kind {
                EdgeKind::Data { component: Pauli::X, .. } | EdgeKind::Measurement { layer: 0, .. } => {
                    assert!(edge.is_impossible());
                    assert_eq!(edge.half_weight, 100 * IMPOSSIBLE_WEIGHT_FACTOR);
                }
                _ => assert!(edge.half_weight <= 100),
            }
        }
        assert!(matches!(
            DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 0),
            Err(ConfigError::InvalidMaxHalfWeight(0))
        ));
    }

    #[test]
    fn decoding_graph_syndrome_of_1() {  // cargo test decoding_graph_syndrome_of_1 -- --nocapture
        let lattice = Lattice::build(5, CodeVariant::Css, BoundaryCondition::Toric).unwrap();
        let noise_model = NoiseModel::new(0.1, 1.).unwrap().with_noisy_measurements(2);
        let graph = DecodingGraph::build(&lattice, &noise_model, WeightFunction::Uniform, 500).unwrap();
        graph.sanity_check().unwrap();
        let mut rng = DeterministicRng::seed_from_u64(3);
        let subgraph = graph.generate_random_errors(&mut rng);
        let syndrome_pattern = graph.syndrome_of(&subgraph);
        // count the flips of every vertex by hand
        let mut flips = vec![0usize; graph.vertex_num()];
        for &edge_index in subgraph.iter() {
            let (a, b) = graph.edges[edge_index].vertices;
            flips[a] += 1;
            flips[b] += 1;
        }
        let expected: Vec<VertexIndex> = (0..graph.vertex_num())
            .filter(|&vertex_index| flips[vertex_index] % 2 == 1 && !graph.is_virtual(vertex_index))
            .collect();
        assert_eq!(graph.defect_vertices(&syndrome_pattern), expected);
    }

    #[test]
    fn decoding_graph_erasure_edges_1() {  // cargo test decoding_graph_erasure_edges_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let noise_model = NoiseModel::new(0.1, 0.5).unwrap().with_noisy_measurements(2);
        let graph = DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 500).unwrap();
        assert_eq!(graph.data_edges.len(), 3);
        assert!(graph.data_edges[2].is_empty());
        let mut syndrome_pattern = SyndromePattern::new_empty(3);
        syndrome_pattern.erasures = vec![(0, 2), (1, 4)];
        let erasure_edges = graph.erasure_edges(&syndrome_pattern);
        assert_eq!(erasure_edges.len(), 4);
        for (edge_index, (t, data_index, component)) in
            erasure_edges.into_iter().zip([(0, 2, Pauli::X), (0, 2, Pauli::Z), (1, 4, Pauli::X), (1, 4, Pauli::Z)])
        {
            assert_eq!(
                graph.edges[edge_index].kind,
                EdgeKind::Data {
                    layer: t,
                    data_index,
                    component
                }
            );
        }
    }
}
