//! Decoder
//!
//! Common interface of the decoders: a decoder is bound to one decoding graph at construction and then turns
//! space-time syndromes into corrections, reusing its internal buffers across calls.
//!

use super::decoding_graph::{DecodingGraph, EdgeKind};
use super::error::{ConfigError, DecodeError};
use super::mwpm_decoder::MatchingDecoder;
use super::pauli::Pauli;
use super::syndrome::SyndromePattern;
use super::union_find_decoder::UnionFindDecoder;
use super::util::*;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub trait Decoder: Send {
    /// infer a correction whose syndrome equals the given one; identical inputs always give identical corrections
    fn decode(&mut self, syndrome_pattern: &SyndromePattern) -> Result<Correction, DecodeError>;
}

/// the inferred error, as edges of the decoding graph and as its projection onto the data qubits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// sorted edge indices; an edge appearing twice cancels out
    pub edges: Vec<EdgeIndex>,
    /// the Pauli operator to apply on each data qubit
    pub data: Vec<Pauli>,
}

impl Correction {
    /// project a set of decoding graph edges onto the data qubits; measurement edges do not touch data qubits
    pub fn from_edges(graph: &DecodingGraph, mut edges: Vec<EdgeIndex>) -> Self {
        edges.sort_unstable();
        let mut data = vec![Pauli::I; graph.data_num];
        for &edge_index in edges.iter() {
            if let EdgeKind::Data {
                data_index, component, ..
            } = graph.edges[edge_index].kind
            {
                data[data_index] = data[data_index].multiply(component);
            }
        }
        Self { edges, data }
    }

    /// the number of data qubits this correction flips
    pub fn weight(&self) -> usize {
        self.data.iter().filter(|pauli| !pauli.is_identity()).count()
    }

    pub fn apply_to(&self, errors: &mut [Pauli]) {
        debug_assert_eq!(errors.len(), self.data.len());
        for (error, correction) in errors.iter_mut().zip(self.data.iter()) {
            *error = error.multiply(*correction);
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecoderType {
    /// minimum-weight perfect matching decoder
    Mwpm,
    /// union-find decoder
    #[clap(name = "uf")]
    #[serde(rename = "uf")]
    UnionFind,
}

impl DecoderType {
    /// build a decoder bound to the given decoding graph; `decoder_config` is the decoder-specific JSON configuration
    pub fn build(&self, graph: Arc<DecodingGraph>, decoder_config: serde_json::Value) -> Result<Box<dyn Decoder>, ConfigError> {
        Ok(match self {
            Self::Mwpm => Box::new(MatchingDecoder::new(graph, serde_json::from_value(decoder_config)?)),
            Self::UnionFind => Box::new(UnionFindDecoder::new(graph, serde_json::from_value(decoder_config)?)),
        })
    }
}

impl std::fmt::Display for DecoderType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Mwpm => write!(f, "mwpm"),
            Self::UnionFind => write!(f, "uf"),
        }
    }
}
