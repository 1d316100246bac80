//! Syndrome Extractor
//!
//! A defect is reported whenever a real stabilizer's measured outcome differs from its outcome in the previous layer
//! (the virtual layer before the first measurement has all outcomes trivial), so a persistent data error is reported
//! once in the layer it appears rather than in every following layer.
//!
//! Erasure locations are heralded, so they are passed on to the decoder unchanged.
//!

use super::code::{Lattice, StabilizerType};
use super::noise::ErrorPattern;
use super::pauli::Pauli;
use super::util::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Defect {
    /// `(t, i, j)`, ordering defects lexicographically in space-time
    pub position: Position,
    pub stabilizer_index: StabilizerIndex,
    pub stabilizer_type: StabilizerType,
}

/// the space-time syndrome of one trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyndromePattern {
    /// sorted by position
    pub defects: Vec<Defect>,
    pub layer_num: usize,
    /// heralded erasures as `(t, data qubit)`
    #[serde(default)]
    pub erasures: Vec<(usize, DataIndex)>,
}

impl SyndromePattern {
    pub fn new_empty(layer_num: usize) -> Self {
        Self {
            defects: vec![],
            layer_num,
            erasures: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.defects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defects.is_empty()
    }

    /// the defects of a single stabilizer type, in position order
    pub fn of_type(&self, stabilizer_type: StabilizerType) -> impl Iterator<Item = &Defect> + '_ {
        self.defects.iter().filter(move |defect| defect.stabilizer_type == stabilizer_type)
    }
}

/// compute the space-time syndrome of an error pattern; pure function of its inputs
pub fn extract(lattice: &Lattice, error_pattern: &ErrorPattern) -> SyndromePattern {
    let layer_num = error_pattern.layer_num();
    let mut accumulated = vec![Pauli::I; lattice.data_num()];
    let mut previous = vec![false; lattice.stabilizer_num()];
    let mut defects = vec![];
    for t in 0..layer_num {
        for (total, error) in accumulated.iter_mut().zip(error_pattern.data_errors[t].iter()) {
            *total = total.multiply(*error);
        }
        for stabilizer_index in lattice.real_stabilizers() {
            let stabilizer = &lattice.stabilizers[stabilizer_index];
            let outcome = stabilizer.parity(&accumulated) ^ error_pattern.measurement_errors[t][stabilizer_index];
            if outcome != previous[stabilizer_index] {
                defects.push(Defect {
                    position: Position::new(t, stabilizer.i, stabilizer.j),
                    stabilizer_index,
                    stabilizer_type: stabilizer.stabilizer_type,
                });
            }
            previous[stabilizer_index] = outcome;
        }
    }
    SyndromePattern {
        defects,
        layer_num,
        erasures: error_pattern.erasures.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{BoundaryCondition, CodeVariant};
    use crate::noise::NoiseModel;
    use crate::rand_xoshiro::rand_core::SeedableRng;
    use proptest::prelude::*;

    #[test]
    fn syndrome_persistent_error_1() {  // cargo test syndrome_persistent_error_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let center = lattice.data_index(3, 3).unwrap();
        let mut error_pattern = ErrorPattern {
            data_errors: vec![vec![Pauli::I; lattice.data_num()]; 3],
            measurement_errors: vec![vec![false; lattice.stabilizer_num()]; 3],
            erasures: vec![],
        };
        error_pattern.data_errors[0][center] = Pauli::X;
        let syndrome = extract(&lattice, &error_pattern);
        let positions: Vec<_> = syndrome.defects.iter().map(|defect| defect.position).collect();
        assert_eq!(positions, vec![Position::new(0, 3, 2), Position::new(0, 3, 4)]);
        assert!(syndrome.defects.iter().all(|defect| defect.stabilizer_type == StabilizerType::Z));
    }

    #[test]
    fn syndrome_measurement_error_1() {  // cargo test syndrome_measurement_error_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let stabilizer_index = lattice.stabilizer_index(2, 3).unwrap();
        let mut error_pattern = ErrorPattern {
            data_errors: vec![vec![Pauli::I; lattice.data_num()]; 3],
            measurement_errors: vec![vec![false; lattice.stabilizer_num()]; 3],
            erasures: vec![],
        };
        error_pattern.measurement_errors[1][stabilizer_index] = true;
        let syndrome = extract(&lattice, &error_pattern);
        let positions: Vec<_> = syndrome.defects.iter().map(|defect| defect.position).collect();
        // a single measurement error shows up twice in time
        assert_eq!(positions, vec![Position::new(1, 2, 3), Position::new(2, 2, 3)]);
        assert_eq!(syndrome.of_type(StabilizerType::X).count(), 2);
        assert_eq!(syndrome.of_type(StabilizerType::Z).count(), 0);
    }

    #[test]
    fn syndrome_erasure_1() {  // cargo test syndrome_erasure_1 -- --nocapture
        let lattice = Lattice::build(3, CodeVariant::Css, BoundaryCondition::Planar).unwrap();
        let center = lattice.data_index(3, 3).unwrap();
        let mut error_pattern = ErrorPattern::from_data_errors(vec![Pauli::I; lattice.data_num()], lattice.stabilizer_num());
        error_pattern.erasures.push((0, center));
        // an erasure without an actual error leaves no defect but is still reported
        let syndrome = extract(&lattice, &error_pattern);
        assert!(syndrome.is_empty());
        assert_eq!(syndrome.erasures, vec![(0, center)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn syndrome_extract_deterministic_1(seed in any::<u64>(), p in 0.0..0.3f64) {
            let lattice = Lattice::build(5, CodeVariant::Xzzx, BoundaryCondition::Planar).unwrap();
            let noise_model = NoiseModel::new(p, 10.).unwrap().with_noisy_measurements(3);
            let error_pattern = noise_model.sample(&lattice, &mut DeterministicRng::seed_from_u64(seed));
            let syndrome_1 = extract(&lattice, &error_pattern);
            let syndrome_2 = extract(&lattice, &noise_model.sample(&lattice, &mut DeterministicRng::seed_from_u64(seed)));
            prop_assert_eq!(&syndrome_1, &syndrome_2);
            // the last layer is perfect, so the defect count of a stabilizer has the parity of its final outcome
            let final_syndrome = lattice.syndrome_of(&error_pattern.accumulated());
            for stabilizer_index in lattice.real_stabilizers() {
                let flips = syndrome_1.defects.iter().filter(|defect| defect.stabilizer_index == stabilizer_index).count();
                prop_assert_eq!(flips % 2 == 1, final_syndrome.contains(&stabilizer_index));
            }
            let mut sorted = syndrome_1.defects.clone();
            sorted.sort();
            prop_assert_eq!(sorted, syndrome_1.defects);
        }
    }
}
