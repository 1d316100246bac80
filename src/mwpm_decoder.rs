//! Minimum-Weight Perfect Matching Decoder
//!
//! Defects of each stabilizer type are matched independently. For every defect, a single Dijkstra run over the
//! decoding graph gives the distance to every other defect and to its closest virtual vertex (its boundary).
//! Each defect then gets a private copy in a doubled graph: the copy connects to its own defect with the boundary
//! weight, and the copies are fully connected with zero weight, so that a perfect matching always exists and any
//! defect may fall back to the boundary. Without any virtual vertex (toric codes) the copies are left out.
//!
//! Ties between optimal matchings are resolved deterministically: defects enter the matching in space-time
//! `(t, i, j)` order, the closest boundary is the first one found with strictly smaller weight in vertex order,
//! and the blossom algorithm itself is deterministic.
//!
//! Erased edges are free during a single decoding call: their weight is set to 0 before the Dijkstra runs and
//! recovered right after.
//!

use super::blossom;
use super::complete_graph::*;
use super::decoder::{Correction, Decoder};
use super::decoding_graph::DecodingGraph;
use super::error::DecodeError;
use super::code::StabilizerType;
use super::syndrome::SyndromePattern;
use super::util::*;
use crate::derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingDecoderConfig {
    /// drop defect pairs whose distance is not shorter than matching both of them to the boundary
    #[serde(default = "matching_decoder_default_configs::use_reduced_graph")]
    pub use_reduced_graph: bool,
}

impl Default for MatchingDecoderConfig {
    fn default() -> Self {
        serde_json::from_value(json!({})).unwrap()
    }
}

pub mod matching_decoder_default_configs {
    pub fn use_reduced_graph() -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedMatching {
    /// must be a defect vertex
    pub a: VertexIndex,
    /// a virtual vertex, or a defect vertex with `b > a`
    pub b: VertexIndex,
    /// the decoding graph edges along the path from `a` to `b`
    pub path: Vec<EdgeIndex>,
    /// the overall weight of this path
    pub weight: Weight,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct MatchingDecoder {
    #[derivative(Debug = "ignore")]
    pub graph: Arc<DecodingGraph>,
    pub config: MatchingDecoderConfig,
    /// Dijkstra state reused across decoding calls
    #[derivative(Debug = "ignore")]
    complete_graph: CompleteGraph,
}

impl MatchingDecoder {
    pub fn new(graph: Arc<DecodingGraph>, config: MatchingDecoderConfig) -> Self {
        let initializer = graph.get_initializer();
        let complete_graph = CompleteGraph::new(initializer.vertex_num, &initializer.weighted_edges);
        debug!(
            "matching decoder over {} vertices ({} virtual) and {} edges, reduced graph: {}",
            initializer.vertex_num,
            initializer.virtual_vertices.len(),
            initializer.weighted_edges.len(),
            config.use_reduced_graph
        );
        Self {
            graph,
            config,
            complete_graph,
        }
    }

    /// the matched pairs of a syndrome, each with its path in the decoding graph
    pub fn detailed_matching(&mut self, syndrome_pattern: &SyndromePattern) -> Result<Vec<DetailedMatching>, DecodeError> {
        let erasure_edges = self.graph.erasure_edges(syndrome_pattern);
        self.complete_graph.load_erasures(&erasure_edges);
        let details = self.match_all_types(syndrome_pattern);
        self.complete_graph.recover_erasures();
        details
    }

    fn match_all_types(&mut self, syndrome_pattern: &SyndromePattern) -> Result<Vec<DetailedMatching>, DecodeError> {
        let mut details = Vec::new();
        for stabilizer_type in [StabilizerType::X, StabilizerType::Z] {
            let defect_vertices: Vec<VertexIndex> = syndrome_pattern
                .of_type(stabilizer_type)
                .map(|defect| self.graph.defect_vertex(defect))
                .collect();
            details.extend(self.match_defects(&defect_vertices)?);
        }
        Ok(details)
    }

    /// match a set of defect vertices among each other and to the boundary
    fn match_defects(&mut self, defect_vertices: &[VertexIndex]) -> Result<Vec<DetailedMatching>, DecodeError> {
        let defect_num = defect_vertices.len();
        if defect_num == 0 {
            return Ok(vec![]);
        }
        let mapping_to_defect: HashMap<VertexIndex, usize> =
            defect_vertices.iter().enumerate().map(|(i, &vertex_index)| (vertex_index, i)).collect();
        let shortest_paths: Vec<ShortestPaths> = defect_vertices
            .iter()
            .map(|&vertex_index| self.complete_graph.all_edges(vertex_index))
            .collect();
        let mut boundaries = Vec::<Option<(VertexIndex, Weight)>>::with_capacity(defect_num);
        for paths in shortest_paths.iter() {
            let mut boundary: Option<(VertexIndex, Weight)> = None;
            for (&peer, &(_, weight)) in paths.iter() {
                if self.graph.is_virtual(peer) && boundary.map_or(true, |(_, best)| weight < best) {
                    boundary = Some((peer, weight));
                }
            }
            boundaries.push(boundary);
        }
        // for each defect with a boundary, add a corresponding virtual node to be matched
        let mut virtual_node = vec![None; defect_num];
        let mut node_num = defect_num;
        for (i, boundary) in boundaries.iter().enumerate() {
            if boundary.is_some() {
                virtual_node[i] = Some(node_num);
                node_num += 1;
            }
        }
        let mut weighted_edges = Vec::<(usize, usize, Weight)>::new();
        for i in 0..defect_num {
            if let (Some((_, weight)), Some(virtual_i)) = (boundaries[i], virtual_node[i]) {
                weighted_edges.push((i, virtual_i, weight));
            }
            for (peer, &(_, weight)) in shortest_paths[i].iter() {
                if let Some(&j) = mapping_to_defect.get(peer) {
                    if i >= j {
                        continue; // remove duplicated edges
                    }
                    if self.config.use_reduced_graph {
                        if let (Some((_, boundary_i)), Some((_, boundary_j))) = (boundaries[i], boundaries[j]) {
                            if weight >= boundary_i + boundary_j {
                                continue;
                            }
                        }
                    }
                    weighted_edges.push((i, j, weight));
                }
            }
            if let Some(virtual_i) = virtual_node[i] {
                for virtual_j in virtual_node[i + 1..].iter().flatten() {
                    // virtual boundaries are always fully connected with weight 0
                    weighted_edges.push((virtual_i, *virtual_j, 0));
                }
            }
        }
        trace!("matching {} defects with {} nodes and {} edges", defect_num, node_num, weighted_edges.len());
        let matchings = blossom::safe_minimum_weight_perfect_matching(node_num, &weighted_edges);
        let mut details = Vec::new();
        for i in 0..defect_num {
            let j = matchings[i];
            let a = defect_vertices[i];
            if j < defect_num {
                // match to another defect
                if i < j {
                    let b = defect_vertices[j];
                    details.push(DetailedMatching {
                        a,
                        b,
                        path: self.complete_graph.path_edges(a, b, &shortest_paths[i]),
                        weight: shortest_paths[i][&b].1,
                    });
                }
            } else if j != usize::MAX && Some(j) == virtual_node[i] {
                let (b, weight) = boundaries[i].expect("boundary must exist if match to virtual vertex");
                details.push(DetailedMatching {
                    a,
                    b,
                    path: self.complete_graph.path_edges(a, b, &shortest_paths[i]),
                    weight,
                });
            } else {
                return Err(DecodeError::UnmatchedDefect(a));
            }
        }
        Ok(details)
    }
}

impl Decoder for MatchingDecoder {
    fn decode(&mut self, syndrome_pattern: &SyndromePattern) -> Result<Correction, DecodeError> {
        let mut edges = BTreeSet::new();
        for detail in self.detailed_matching(syndrome_pattern)? {
            for edge_index in detail.path {
                // symmetric difference of all paths
                if !edges.remove(&edge_index) {
                    edges.insert(edge_index);
                }
            }
        }
        Ok(Correction::from_edges(&self.graph, edges.into_iter().collect()))
    }
}
