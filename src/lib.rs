extern crate rand_xoshiro;
extern crate priority_queue;
extern crate parking_lot;
extern crate serde;
#[macro_use] extern crate serde_json;
extern crate chrono;
extern crate derivative;
extern crate rayon;
extern crate rand;
extern crate pbr;
extern crate clap;
#[macro_use] extern crate log;
extern crate thiserror;

pub mod util;
pub mod error;
pub mod pauli;
pub mod code;
pub mod noise;
pub mod syndrome;
pub mod decoding_graph;
pub mod complete_graph;
pub mod blossom;
pub mod union_find;
pub mod decoder;
pub mod mwpm_decoder;
pub mod union_find_decoder;
pub mod simulator;
pub mod benchmark;
pub mod cli;

use benchmark::*;
use error::SimulationError;

/// estimate the logical error rate of each configuration point with the given driver configuration
pub fn run_benchmark(config: BenchmarkConfig, points: &[BenchmarkPoint]) -> Result<Vec<ResultRow>, SimulationError> {
    let driver = BenchmarkDriver::new(config)?;
    driver.run(points)
}
