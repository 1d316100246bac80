use super::rand_xoshiro;
use crate::rand_xoshiro::rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub type Weight = isize;
pub type EdgeIndex = usize;
pub type VertexIndex = usize; // the vertex index in the decoding graph
pub type VertexNum = VertexIndex;
pub type DataIndex = usize; // index of a data qubit in [`crate::code::Lattice::data_qubits`]
pub type StabilizerIndex = usize; // index of a stabilizer in [`crate::code::Lattice::stabilizers`]

/// position of a stabilizer measurement in space-time; ordering is lexicographic on `(t, i, j)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// measurement round
    pub t: usize,
    /// row on the lattice
    pub i: usize,
    /// column on the lattice
    pub j: usize,
}

impl Position {
    pub fn new(t: usize, i: usize, j: usize) -> Self {
        Self { t, i, j }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}][{}][{}]", self.t, self.i, self.j)
    }
}

/// the minimal description of a decoding graph that a matching algorithm needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverInitializer {
    /// the number of vertices
    pub vertex_num: VertexNum,
    /// weighted edges, where vertex indices are within the range [0, vertex_num)
    pub weighted_edges: Vec<(VertexIndex, VertexIndex, Weight)>,
    /// the virtual vertices
    pub virtual_vertices: Vec<VertexIndex>,
}

impl SolverInitializer {
    pub fn new(
        vertex_num: VertexNum,
        weighted_edges: Vec<(VertexIndex, VertexIndex, Weight)>,
        virtual_vertices: Vec<VertexIndex>,
    ) -> SolverInitializer {
        SolverInitializer {
            vertex_num,
            weighted_edges,
            virtual_vertices,
        }
    }
}

/// remember the original weights of the edges modified by erasures, so that they can be recovered afterwards
#[derive(Debug, Clone, Default)]
pub struct EdgeWeightModifier {
    /// `(edge index, original weight)` in the order of modification
    pub modified: Vec<(EdgeIndex, Weight)>,
}

impl EdgeWeightModifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_modified_edge(&mut self, edge_index: EdgeIndex, original_weight: Weight) {
        self.modified.push((edge_index, original_weight));
    }

    pub fn has_modified_edges(&self) -> bool {
        !self.modified.is_empty()
    }

    /// the most recently modified edge first, so that an edge modified twice recovers its very first weight last
    pub fn pop_modified_edge(&mut self) -> (EdgeIndex, Weight) {
        self.modified.pop().expect("no modified edges left")
    }
}

/// use Xoshiro256StarStar for deterministic random number generator
pub type DeterministicRng = rand_xoshiro::Xoshiro256StarStar;

pub trait F64Rng {
    fn next_f64(&mut self) -> f64;
}

impl F64Rng for DeterministicRng {
    fn next_f64(&mut self) -> f64 {
        f64::from_bits(0x3FF << 52 | self.next_u64() >> 12) - 1.
    }
}

/// record the decoding time of the trials run by a single worker
#[derive(Debug, Clone, Default)]
pub struct BenchmarkProfiler {
    /// the number of decoded syndrome patterns
    pub decoded: usize,
    /// summation of all decoding time
    pub sum_round_time: f64,
    /// defect count
    pub sum_defect: usize,
    /// noisy measurement round
    pub noisy_measurements: usize,
    /// the beginning of the current decoding procedure
    begin_time: Option<Instant>,
}

impl BenchmarkProfiler {
    pub fn new(noisy_measurements: usize) -> Self {
        Self {
            noisy_measurements,
            ..Default::default()
        }
    }

    /// record the beginning of a decoding procedure
    pub fn begin(&mut self) {
        debug_assert!(self.begin_time.is_none(), "make sure to call `begin` and `end` in pairs");
        self.begin_time = Some(Instant::now());
    }

    /// record the ending of a decoding procedure
    pub fn end(&mut self, defect_num: usize) {
        if let Some(begin_time) = self.begin_time.take() {
            self.sum_round_time += begin_time.elapsed().as_secs_f64();
            self.sum_defect += defect_num;
            self.decoded += 1;
        }
    }

    /// fold the records of another worker into this one
    pub fn merge(&mut self, other: &Self) {
        self.decoded += other.decoded;
        self.sum_round_time += other.sum_round_time;
        self.sum_defect += other.sum_defect;
    }

    /// average decoding time of a single trial
    pub fn time_per_trial(&self) -> f64 {
        if self.decoded == 0 {
            return 0.;
        }
        self.sum_round_time / (self.decoded as f64)
    }

    /// average decoding time of a single defect
    pub fn time_per_defect(&self) -> f64 {
        if self.sum_defect == 0 {
            return 0.;
        }
        self.sum_round_time / (self.sum_defect as f64)
    }

    /// print out a brief one-line statistics
    pub fn brief(&self) -> String {
        let total = self.time_per_trial();
        let per_round = total / (1. + self.noisy_measurements as f64);
        let per_defect = self.time_per_defect();
        format!("total: {total:.3e}, round: {per_round:.3e}, defect: {per_defect:.3e},")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn util_next_f64_range_1() {  // cargo test util_next_f64_range_1 -- --nocapture
        let mut rng = DeterministicRng::seed_from_u64(123);
        for _ in 0..10000 {
            let value = rng.next_f64();
            assert!((0. ..1.).contains(&value));
        }
    }

    #[test]
    fn util_edge_weight_modifier_1() {  // cargo test util_edge_weight_modifier_1 -- --nocapture
        let mut weights = vec![4, 6, 8];
        let mut modifier = EdgeWeightModifier::new();
        for (edge_index, target_weight) in [(1, 0), (2, 0), (1, 3)] {
            modifier.push_modified_edge(edge_index, weights[edge_index]);
            weights[edge_index] = target_weight;
        }
        assert_eq!(weights, vec![4, 3, 0]);
        while modifier.has_modified_edges() {
            let (edge_index, original_weight) = modifier.pop_modified_edge();
            weights[edge_index] = original_weight;
        }
        assert_eq!(weights, vec![4, 6, 8]);
    }

    #[test]
    fn util_benchmark_profiler_1() {  // cargo test util_benchmark_profiler_1 -- --nocapture
        let mut profiler = BenchmarkProfiler::new(2);
        profiler.begin();
        profiler.end(4);
        profiler.begin();
        profiler.end(0);
        assert_eq!(profiler.decoded, 2);
        assert_eq!(profiler.sum_defect, 4);
        let mut total = BenchmarkProfiler::new(2);
        total.merge(&profiler);
        assert_eq!(total.decoded, 2);
        println!("{}", total.brief());
    }
}
