//! Noise Model
//!
//! Biased Pauli noise on data qubits plus phenomenological measurement errors.
//! The bias ratio follows `η = pz / (px + py)` with `px = py`, so `η = 0.5` is depolarizing noise and `η = ∞` is pure Z noise.
//! A trial spans `noisy_measurements + 1` measurement layers: every layer but the last carries fresh data errors and a
//! noisy measurement, and the last layer is a perfect measurement that closes the space-time syndrome.
//! With `noisy_measurements = 0` there is a single perfect layer carrying data errors (code capacity noise).
//!
//! Erasures hit data qubits independently with probability `pe` in every layer that carries data errors. An erased
//! qubit is fully depolarized (each of I, X, Y, Z with probability 1/4) and its location is known to the decoder.
//!

use super::code::Lattice;
use super::error::ConfigError;
use super::pauli::Pauli;
use super::util::*;
use serde::{Deserialize, Serialize};

/// probabilities of each Pauli error on a single data qubit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauliProbabilities {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
}

impl PauliProbabilities {
    pub fn from_bias(p: f64, bias_eta: f64, no_y_error: bool) -> Self {
        let (px, py, pz) = if bias_eta.is_infinite() {
            (0., 0., p)
        } else {
            let px = p / (1. + bias_eta) / 2.;
            (px, px, p * bias_eta / (1. + bias_eta))
        };
        Self {
            px,
            py: if no_y_error { 0. } else { py },
            pz,
        }
    }

    pub fn total(&self) -> f64 {
        self.px + self.py + self.pz
    }

    /// probability that the X component of the error is present
    pub fn x_component(&self) -> f64 {
        self.px + self.py
    }

    /// probability that the Z component of the error is present
    pub fn z_component(&self) -> f64 {
        self.pz + self.py
    }

    fn sample(&self, random: f64) -> Pauli {
        if random < self.px {
            Pauli::X
        } else if random < self.px + self.py {
            Pauli::Y
        } else if random < self.total() {
            Pauli::Z
        } else {
            Pauli::I
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseModel {
    /// physical error rate of each data qubit in each layer
    pub p: f64,
    pub bias_eta: f64,
    /// number of noisy measurement rounds before the final perfect one
    pub noisy_measurements: usize,
    /// measurement error rate relative to `p`
    pub measurement_error_scale: f64,
    /// the bottom layer carries data errors but a perfect measurement
    pub shallow_error_on_bottom: bool,
    pub no_y_error: bool,
    /// erasure rate of each data qubit in each layer
    pub pe: f64,
}

impl NoiseModel {
    /// code capacity noise model
    pub fn new(p: f64, bias_eta: f64) -> Result<Self, ConfigError> {
        let noise_model = Self {
            p,
            bias_eta,
            noisy_measurements: 0,
            measurement_error_scale: 1.,
            shallow_error_on_bottom: false,
            no_y_error: false,
            pe: 0.,
        };
        noise_model.validate()?;
        Ok(noise_model)
    }

    pub fn with_noisy_measurements(mut self, noisy_measurements: usize) -> Self {
        self.noisy_measurements = noisy_measurements;
        self
    }

    pub fn with_measurement_error_scale(mut self, measurement_error_scale: f64) -> Self {
        self.measurement_error_scale = measurement_error_scale;
        self
    }

    pub fn with_shallow_error_on_bottom(mut self, shallow_error_on_bottom: bool) -> Self {
        self.shallow_error_on_bottom = shallow_error_on_bottom;
        self
    }

    pub fn with_no_y_error(mut self, no_y_error: bool) -> Self {
        self.no_y_error = no_y_error;
        self
    }

    pub fn with_erasure_rate(mut self, pe: f64) -> Self {
        self.pe = pe;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0. ..=1.).contains(&self.p) {
            return Err(ConfigError::InvalidProbability(self.p));
        }
        // also rejects NaN
        if !(self.bias_eta > 0.) {
            return Err(ConfigError::InvalidBias(self.bias_eta));
        }
        let pm = self.measurement_error_rate();
        if !(0. ..=1.).contains(&pm) {
            return Err(ConfigError::InvalidProbability(pm));
        }
        if !(0. ..=1.).contains(&self.pe) {
            return Err(ConfigError::InvalidErasureProbability(self.pe));
        }
        Ok(())
    }

    pub fn pauli_probabilities(&self) -> PauliProbabilities {
        PauliProbabilities::from_bias(self.p, self.bias_eta, self.no_y_error)
    }

    pub fn measurement_error_rate(&self) -> f64 {
        self.p * self.measurement_error_scale
    }

    /// the number of measurement layers in a trial
    pub fn layer_num(&self) -> usize {
        self.noisy_measurements + 1
    }

    /// whether layer `t` is preceded by fresh data errors
    pub fn has_data_errors(&self, t: usize) -> bool {
        t < self.noisy_measurements.max(1)
    }

    /// measurement error rate of layer `t`
    pub fn measurement_error_at(&self, t: usize) -> f64 {
        if t >= self.noisy_measurements || (t == 0 && self.shallow_error_on_bottom) {
            0.
        } else {
            self.measurement_error_rate()
        }
    }

    /// sample the errors of a whole trial; the random numbers are drawn layer by layer,
    /// first one per data qubit (two for an erased qubit) and then one per real stabilizer when the measurement is noisy;
    /// without erasures no random number is spent on them
    pub fn sample<R: F64Rng>(&self, lattice: &Lattice, rng: &mut R) -> ErrorPattern {
        let probabilities = self.pauli_probabilities();
        let layer_num = self.layer_num();
        let mut data_errors = Vec::with_capacity(layer_num);
        let mut measurement_errors = Vec::with_capacity(layer_num);
        let mut erasures = vec![];
        for t in 0..layer_num {
            let mut layer_errors = vec![Pauli::I; lattice.data_num()];
            if self.has_data_errors(t) {
                for (data_index, error) in layer_errors.iter_mut().enumerate() {
                    if self.pe > 0. && rng.next_f64() < self.pe {
                        erasures.push((t, data_index));
                        *error = ERASURE_PAULIS[((rng.next_f64() * 4.) as usize).min(3)];
                    } else {
                        *error = probabilities.sample(rng.next_f64());
                    }
                }
            }
            data_errors.push(layer_errors);
            let mut layer_flips = vec![false; lattice.stabilizer_num()];
            let pm = self.measurement_error_at(t);
            if pm > 0. {
                for stabilizer_index in lattice.real_stabilizers() {
                    layer_flips[stabilizer_index] = rng.next_f64() < pm;
                }
            }
            measurement_errors.push(layer_flips);
        }
        ErrorPattern {
            data_errors,
            measurement_errors,
            erasures,
        }
    }
}

/// an erased qubit suffers each of them with equal probability
const ERASURE_PAULIS: [Pauli; 4] = [Pauli::I, Pauli::X, Pauli::Y, Pauli::Z];

/// sample a code capacity error pattern
pub fn sample<R: F64Rng>(lattice: &Lattice, p: f64, bias_eta: f64, rng: &mut R) -> Result<ErrorPattern, ConfigError> {
    Ok(NoiseModel::new(p, bias_eta)?.sample(lattice, rng))
}

/// the errors of one trial, layer by layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPattern {
    /// `data_errors[t][q]` happens on data qubit `q` right before the measurement of layer `t`
    pub data_errors: Vec<Vec<Pauli>>,
    /// `measurement_errors[t][s]` flips the reported outcome of stabilizer `s` in layer `t`; always false for virtual ones
    pub measurement_errors: Vec<Vec<bool>>,
    /// `(t, q)` for every erasure of data qubit `q` right before the measurement of layer `t`, in increasing order
    #[serde(default)]
    pub erasures: Vec<(usize, DataIndex)>,
}

impl ErrorPattern {
    /// code capacity error pattern from explicit data errors
    pub fn from_data_errors(errors: Vec<Pauli>, stabilizer_num: usize) -> Self {
        Self {
            data_errors: vec![errors],
            measurement_errors: vec![vec![false; stabilizer_num]],
            erasures: vec![],
        }
    }

    pub fn layer_num(&self) -> usize {
        self.data_errors.len()
    }

    /// the total data error after all layers
    pub fn accumulated(&self) -> Vec<Pauli> {
        let mut accumulated = vec![Pauli::I; self.data_errors.first().map_or(0, |layer| layer.len())];
        for layer in self.data_errors.iter() {
            for (total, error) in accumulated.iter_mut().zip(layer.iter()) {
                *total = total.multiply(*error);
            }
        }
        accumulated
    }

    /// the number of non-trivial data and measurement errors
    pub fn error_count(&self) -> usize {
        let data = self.data_errors.iter().flatten().filter(|error| !error.is_identity()).count();
        let measurement = self.measurement_errors.iter().flatten().filter(|flip| **flip).count();
        data + measurement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{BoundaryCondition, CodeVariant};
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn noise_bias_convention_1() {  // cargo test noise_bias_convention_1 -- --nocapture
        let depolarizing = PauliProbabilities::from_bias(0.3, 0.5, false);
        assert!((depolarizing.px - 0.1).abs() < 1e-12);
        assert!((depolarizing.py - 0.1).abs() < 1e-12);
        assert!((depolarizing.pz - 0.1).abs() < 1e-12);
        let biased = PauliProbabilities::from_bias(0.11, 10., false);
        assert!((biased.pz / (biased.px + biased.py) - 10.).abs() < 1e-9);
        assert!((biased.total() - 0.11).abs() < 1e-12);
        let pure_z = PauliProbabilities::from_bias(0.2, f64::INFINITY, false);
        assert_eq!((pure_z.px, pure_z.py, pure_z.pz), (0., 0., 0.2));
        let no_y = PauliProbabilities::from_bias(0.3, 0.5, true);
        assert_eq!(no_y.py, 0.);
        assert!((no_y.x_component() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn noise_invalid_parameters_1() {  // cargo test noise_invalid_parameters_1 -- --nocapture
        assert!(matches!(NoiseModel::new(-0.1, 1.), Err(ConfigError::InvalidProbability(_))));
        assert!(matches!(NoiseModel::new(1.5, 1.), Err(ConfigError::InvalidProbability(_))));
        assert!(matches!(NoiseModel::new(0.1, 0.), Err(ConfigError::InvalidBias(_))));
        assert!(matches!(NoiseModel::new(0.1, f64::NAN), Err(ConfigError::InvalidBias(_))));
        assert!(NoiseModel::new(0.1, f64::INFINITY).is_ok());
        let too_noisy = NoiseModel::new(0.4, 1.).unwrap().with_measurement_error_scale(3.);
        assert!(matches!(too_noisy.validate(), Err(ConfigError::InvalidProbability(_))));
        let bad_erasure = NoiseModel::new(0.1, 1.).unwrap().with_erasure_rate(1.2);
        assert!(matches!(bad_erasure.validate(), Err(ConfigError::InvalidErasureProbability(_))));
    }

    #[test]
    fn noise_layers_1() {  // cargo test noise_layers_1 -- --nocapture
        let noise_model = NoiseModel::new(0.1, 1.).unwrap().with_noisy_measurements(3);
        assert_eq!(noise_model.layer_num(), 4);
        assert!((0..3).all(|t| noise_model.has_data_errors(t)));
        assert!(!noise_model.has_data_errors(3));
        assert_eq!(noise_model.measurement_error_at(0), 0.1);
        assert_eq!(noise_model.measurement_error_at(3), 0.);
        let shallow = noise_model.with_shallow_error_on_bottom(true);
        assert_eq!(shallow.measurement_error_at(0), 0.);
        assert_eq!(shallow.measurement_error_at(1), 0.1);
        let capacity = NoiseModel::new(0.1, 1.).unwrap();
        assert_eq!(capacity.layer_num(), 1);
        assert!(capacity.has_data_errors(0));
        assert_eq!(capacity.measurement_error_at(0), 0.);
    }

    #[test]
    fn noise_sample_reproducible_1() {  // cargo test noise_sample_reproducible_1 -- --nocapture
        let lattice = Lattice::build(5, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let noise_model = NoiseModel::new(0.2, 10.).unwrap().with_noisy_measurements(2);
        let mut rng_1 = DeterministicRng::seed_from_u64(7);
        let mut rng_2 = DeterministicRng::seed_from_u64(7);
        let pattern_1 = noise_model.sample(&lattice, &mut rng_1);
        let pattern_2 = noise_model.sample(&lattice, &mut rng_2);
        assert_eq!(pattern_1, pattern_2);
        assert_eq!(pattern_1.layer_num(), 3);
        assert!(pattern_1.data_errors[2].iter().all(|error| error.is_identity()));
        assert!(pattern_1.measurement_errors[2].iter().all(|flip| !flip));
        for (stabilizer_index, stabilizer) in lattice.stabilizers.iter().enumerate() {
            if stabilizer.is_virtual {
                assert!(pattern_1.measurement_errors.iter().all(|layer| !layer[stabilizer_index]));
            }
        }
    }

    #[test]
    fn noise_sample_extremes_1() {  // cargo test noise_sample_extremes_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Xzzx, BoundaryCondition::Planar).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(0);
        let silent = sample(&lattice, 0., 1., &mut rng).unwrap();
        assert_eq!(silent.error_count(), 0);
        let all_z = sample(&lattice, 1., f64::INFINITY, &mut rng).unwrap();
        assert!(all_z.accumulated().iter().all(|error| *error == Pauli::Z));
    }

    #[test]
    fn noise_erasure_1() {  // cargo test noise_erasure_1 -- --nocapture
        let lattice = Lattice::build(5, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        // without erasures the random stream is untouched
        let plain = NoiseModel::new(0.1, 0.5).unwrap();
        let zero_erasure = plain.with_erasure_rate(0.);
        let pattern_1 = plain.sample(&lattice, &mut DeterministicRng::seed_from_u64(2));
        let pattern_2 = zero_erasure.sample(&lattice, &mut DeterministicRng::seed_from_u64(2));
        assert_eq!(pattern_1, pattern_2);
        assert!(pattern_1.erasures.is_empty());
        // erasures only, on every data qubit of every noisy layer
        let erasure_only = NoiseModel::new(0., 0.5).unwrap().with_erasure_rate(1.).with_noisy_measurements(2);
        let mut rng = DeterministicRng::seed_from_u64(5);
        let mut counts = [0usize; 4];
        for _ in 0..50 {
            let pattern = erasure_only.sample(&lattice, &mut rng);
            assert_eq!(pattern.erasures.len(), 2 * lattice.data_num());
            assert!(pattern.erasures.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(pattern.erasures.iter().all(|&(t, _)| t < 2));
            for error in pattern.data_errors[..2].iter().flatten() {
                counts[ERASURE_PAULIS.iter().position(|pauli| pauli == error).unwrap()] += 1;
            }
        }
        // each Pauli shows up about a quarter of the time
        let total: usize = counts.iter().sum();
        for count in counts {
            assert!((count as f64 / total as f64 - 0.25).abs() < 0.03, "{counts:?}");
        }
    }
}
