//! Trial Runner
//!
//! One Monte-Carlo trial: sample an error pattern, extract its syndrome, decode it, apply the correction and
//! compare the residual error against the logical operators.
//!

use super::code::{FailureCriterion, Lattice};
use super::decoder::{Correction, Decoder};
use super::error::SimulationError;
use super::noise::{self, ErrorPattern, NoiseModel};
use super::syndrome::{self, SyndromePattern};
use super::util::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialOutcome {
    Success,
    LogicalFailure,
}

impl TrialOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::LogicalFailure)
    }
}

/// classify the result of decoding: the correction must first clear every stabilizer, and only then
/// the residual error is checked against the logical operators
pub fn classify(
    lattice: &Lattice,
    error_pattern: &ErrorPattern,
    correction: &Correction,
    criterion: FailureCriterion,
) -> Result<TrialOutcome, SimulationError> {
    let mut residual = error_pattern.accumulated();
    correction.apply_to(&mut residual);
    let violated = lattice.syndrome_of(&residual);
    if !violated.is_empty() {
        return Err(SimulationError::InconsistentCorrection(violated.len()));
    }
    Ok(if lattice.logical_failure(&residual, criterion) {
        TrialOutcome::LogicalFailure
    } else {
        TrialOutcome::Success
    })
}

/// run a single code capacity trial with a decoder bound to a matching decoding graph
pub fn run_trial<R: F64Rng>(
    lattice: &Lattice,
    decoder: &mut dyn Decoder,
    p: f64,
    bias_eta: f64,
    rng: &mut R,
) -> Result<TrialOutcome, SimulationError> {
    let error_pattern = noise::sample(lattice, p, bias_eta, rng)?;
    let syndrome_pattern = syndrome::extract(lattice, &error_pattern);
    let correction = decoder.decode(&syndrome_pattern)?;
    classify(lattice, &error_pattern, &correction, FailureCriterion::All)
}

/// the per-worker state of a configuration point: a decoder with its private buffers and the decoding time records
pub struct TrialRunner {
    pub lattice: Arc<Lattice>,
    pub noise_model: NoiseModel,
    pub criterion: FailureCriterion,
    decoder: Box<dyn Decoder>,
    pub profiler: BenchmarkProfiler,
}

impl TrialRunner {
    pub fn new(lattice: Arc<Lattice>, noise_model: NoiseModel, criterion: FailureCriterion, decoder: Box<dyn Decoder>) -> Self {
        let profiler = BenchmarkProfiler::new(noise_model.noisy_measurements);
        Self {
            lattice,
            noise_model,
            criterion,
            decoder,
            profiler,
        }
    }

    /// decode a syndrome while recording the decoding time
    pub fn decode(&mut self, syndrome_pattern: &SyndromePattern) -> Result<Correction, SimulationError> {
        self.profiler.begin();
        let result = self.decoder.decode(syndrome_pattern);
        self.profiler.end(syndrome_pattern.len());
        Ok(result?)
    }

    pub fn run_trial<R: F64Rng>(&mut self, rng: &mut R) -> Result<TrialOutcome, SimulationError> {
        let error_pattern = self.noise_model.sample(&self.lattice, rng);
        let syndrome_pattern = syndrome::extract(&self.lattice, &error_pattern);
        let correction = self.decode(&syndrome_pattern)?;
        classify(&self.lattice, &error_pattern, &correction, self.criterion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{BoundaryCondition, CodeVariant};
    use crate::decoder::DecoderType;
    use crate::decoding_graph::{DecodingGraph, WeightFunction};
    use crate::pauli::Pauli;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    fn build_runner(
        d: usize,
        variant: CodeVariant,
        noise_model: NoiseModel,
        decoder_type: DecoderType,
        criterion: FailureCriterion,
    ) -> TrialRunner {
        let lattice = Arc::new(Lattice::build(d, variant, BoundaryCondition::Planar).unwrap());
        let graph = Arc::new(DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 500).unwrap());
        let decoder = decoder_type.build(graph, json!({})).unwrap();
        TrialRunner::new(lattice, noise_model, criterion, decoder)
    }

    fn failure_rate(runner: &mut TrialRunner, trials: usize, seed: u64) -> f64 {
        let mut rng = DeterministicRng::seed_from_u64(seed);
        let mut failures = 0;
        for _ in 0..trials {
            if runner.run_trial(&mut rng).unwrap().is_failure() {
                failures += 1;
            }
        }
        failures as f64 / trials as f64
    }

    #[test]
    fn simulator_zero_noise_1() {  // cargo test simulator_zero_noise_1 -- --nocapture
        for decoder_type in [DecoderType::Mwpm, DecoderType::UnionFind] {
            let noise_model = NoiseModel::new(0., 0.5).unwrap();
            let mut runner = build_runner(3, CodeVariant::Css, noise_model, decoder_type, FailureCriterion::All);
            assert_eq!(failure_rate(&mut runner, 100, 1), 0.);
            let noise_model = NoiseModel::new(0., 10.).unwrap().with_noisy_measurements(3);
            let mut runner = build_runner(3, CodeVariant::Xzzx, noise_model, decoder_type, FailureCriterion::All);
            assert_eq!(failure_rate(&mut runner, 100, 1), 0.);
        }
    }

    /// pure Z noise with certainty on the XZZX code leaves Z on every (odd, odd) qubit after decoding,
    /// which always anticommutes with the X logical operator
    #[test]
    fn simulator_pure_z_noise_baseline_1() {  // cargo test simulator_pure_z_noise_baseline_1 -- --nocapture
        for decoder_type in [DecoderType::Mwpm, DecoderType::UnionFind] {
            let noise_model = NoiseModel::new(1., f64::INFINITY).unwrap();
            let mut runner = build_runner(5, CodeVariant::Xzzx, noise_model, decoder_type, FailureCriterion::All);
            assert_eq!(failure_rate(&mut runner, 20, 7), 1.);
            let mut runner = build_runner(5, CodeVariant::Xzzx, noise_model, decoder_type, FailureCriterion::OnlyX);
            assert_eq!(failure_rate(&mut runner, 20, 7), 0.);
        }
    }

    #[test]
    fn simulator_free_function_1() {  // cargo test simulator_free_function_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let noise_model = NoiseModel::new(0.05, 0.5).unwrap();
        let graph = Arc::new(DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 500).unwrap());
        let mut decoder = DecoderType::Mwpm.build(graph, json!({})).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(3);
        for _ in 0..50 {
            run_trial(&lattice, decoder.as_mut(), 0.05, 0.5, &mut rng).unwrap();
        }
        assert!(matches!(
            run_trial(&lattice, decoder.as_mut(), 1.5, 0.5, &mut rng),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn simulator_inconsistent_correction_1() {  // cargo test simulator_inconsistent_correction_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let mut errors = vec![Pauli::I; lattice.data_num()];
        errors[4] = Pauli::X;
        let error_pattern = ErrorPattern::from_data_errors(errors, lattice.stabilizer_num());
        let correction = Correction {
            edges: vec![],
            data: vec![Pauli::I; lattice.data_num()],
        };
        assert!(matches!(
            classify(&lattice, &error_pattern, &correction, FailureCriterion::All),
            Err(SimulationError::InconsistentCorrection(2))
        ));
    }

    #[test]
    fn simulator_decoder_ordering_1() {  // cargo test simulator_decoder_ordering_1 -- --nocapture
        let trials = 4000;
        let noise_model = NoiseModel::new(0.08, 0.5).unwrap();
        let mut mwpm = build_runner(5, CodeVariant::Css, noise_model, DecoderType::Mwpm, FailureCriterion::All);
        let mut uf = build_runner(5, CodeVariant::Css, noise_model, DecoderType::UnionFind, FailureCriterion::All);
        let mwpm_rate = failure_rate(&mut mwpm, trials, 11);
        let uf_rate = failure_rate(&mut uf, trials, 11);
        println!("mwpm: {mwpm_rate}, uf: {uf_rate}");
        // allow three standard deviations of statistical noise
        let sigma = (mwpm_rate * (1. - mwpm_rate) / trials as f64).sqrt();
        assert!(uf_rate + 3. * sigma >= mwpm_rate);
        assert_eq!(mwpm.profiler.decoded, trials);
    }

    #[test]
    fn simulator_distance_monotonicity_1() {  // cargo test simulator_distance_monotonicity_1 -- --nocapture
        let trials = 4000;
        let noise_model = NoiseModel::new(0.03, 0.5).unwrap();
        let mut small = build_runner(3, CodeVariant::Css, noise_model, DecoderType::Mwpm, FailureCriterion::All);
        let mut large = build_runner(5, CodeVariant::Css, noise_model, DecoderType::Mwpm, FailureCriterion::All);
        let small_rate = failure_rate(&mut small, trials, 5);
        let large_rate = failure_rate(&mut large, trials, 5);
        println!("d=3: {small_rate}, d=5: {large_rate}");
        assert!(large_rate < small_rate);
    }

    /// above the threshold, a larger code fails more often
    #[test]
    fn simulator_distance_monotonicity_2() {  // cargo test simulator_distance_monotonicity_2 -- --nocapture
        let trials = 2000;
        let noise_model = NoiseModel::new(0.2, 0.5).unwrap();
        let mut small = build_runner(3, CodeVariant::Css, noise_model, DecoderType::Mwpm, FailureCriterion::All);
        let mut large = build_runner(7, CodeVariant::Css, noise_model, DecoderType::Mwpm, FailureCriterion::All);
        let small_rate = failure_rate(&mut small, trials, 5);
        let large_rate = failure_rate(&mut large, trials, 5);
        println!("d=3: {small_rate}, d=7: {large_rate}");
        assert!(large_rate > small_rate);
    }
}
