//! Code Model
//!
//! Surface codes laid out on a grid of lattice sites `(i, j)`: data qubits sit on sites with `i + j` even,
//! Z-type stabilizers on (odd, even) sites and X-type stabilizers on (even, odd) sites.
//! A planar code of distance `d` spans `(2d+1) x (2d+1)` sites whose outermost ring only hosts virtual stabilizers,
//! so that every single-qubit Pauli component flips exactly two stabilizer positions (real or virtual).
//! A toric code spans `2d x 2d` sites with periodic boundaries.
//!
//! The XZZX variant conjugates every data qubit on an (even, even) site by a Hadamard gate, turning each stabilizer
//! into the `X Z Z X` pattern (up, left, right, down) while keeping the same decoding graph structure.
//!

use super::error::ConfigError;
use super::pauli::Pauli;
use super::util::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeVariant {
    /// CSS surface code: pure X-type and pure Z-type stabilizers
    Css,
    /// XZZX surface code
    Xzzx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryCondition {
    /// open boundaries with one logical qubit
    Planar,
    /// periodic boundaries with two logical qubits
    Toric,
}

/// the type of a stabilizer in the underlying CSS layout, which also labels the two decoupled halves of the decoding graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StabilizerType {
    X,
    Z,
}

impl StabilizerType {
    pub fn css_pauli(&self) -> Pauli {
        match self {
            Self::X => Pauli::X,
            Self::Z => Pauli::Z,
        }
    }
}

/// which logical errors count as a trial failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCriterion {
    /// any logical error
    All,
    /// only logical X errors, i.e. residuals anticommuting with a logical Z operator
    OnlyX,
    /// only logical Z errors, i.e. residuals anticommuting with a logical X operator
    OnlyZ,
}

impl Default for FailureCriterion {
    fn default() -> Self {
        Self::All
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQubit {
    pub i: usize,
    pub j: usize,
    /// conjugated by a Hadamard gate relative to the CSS layout
    pub hadamard: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizerCheck {
    pub i: usize,
    pub j: usize,
    pub stabilizer_type: StabilizerType,
    /// virtual stabilizers are never measured; they only terminate error chains at the code boundary
    pub is_virtual: bool,
    /// the data qubits this stabilizer acts on, with the Pauli operator applied to each
    pub support: Vec<(DataIndex, Pauli)>,
}

impl StabilizerCheck {
    /// the measurement outcome given the data errors, `true` meaning violated
    pub fn parity(&self, errors: &[Pauli]) -> bool {
        let mut parity = false;
        for &(data_index, pauli) in self.support.iter() {
            if errors[data_index].anticommutes_with(pauli) {
                parity = !parity;
            }
        }
        parity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalOperator {
    pub name: String,
    /// the type of the operator before the XZZX transformation, `X` or `Z`
    pub logical_type: StabilizerType,
    pub support: Vec<(DataIndex, Pauli)>,
}

impl LogicalOperator {
    pub fn anticommutes_with(&self, errors: &[Pauli]) -> bool {
        let mut parity = false;
        for &(data_index, pauli) in self.support.iter() {
            if errors[data_index].anticommutes_with(pauli) {
                parity = !parity;
            }
        }
        parity
    }
}

#[derive(Debug, Clone, Copy)]
enum Site {
    Data(DataIndex),
    Stabilizer(StabilizerIndex),
}

/// fixed topology of a code, shared read-only by every trial of a configuration point
#[derive(Debug, Clone)]
pub struct Lattice {
    pub distance: usize,
    pub variant: CodeVariant,
    pub boundary: BoundaryCondition,
    /// number of lattice sites along each dimension
    pub width: usize,
    /// data qubits in row-major order of their sites
    pub data_qubits: Vec<DataQubit>,
    /// real and virtual stabilizers in row-major order of their sites
    pub stabilizers: Vec<StabilizerCheck>,
    pub logical_operators: Vec<LogicalOperator>,
    /// `flipped_by[q] = [stabilizers flipped by an X on q, stabilizers flipped by a Z on q]`, including virtual ones
    pub flipped_by: Vec<[Vec<StabilizerIndex>; 2]>,
    sites: HashMap<(usize, usize), Site>,
}

impl Lattice {
    /// build the code topology; the distance must be odd and at least 3
    pub fn build(distance: usize, variant: CodeVariant, boundary: BoundaryCondition) -> Result<Self, ConfigError> {
        if distance < 3 || distance % 2 == 0 {
            return Err(ConfigError::InvalidDistance(distance));
        }
        let width = match boundary {
            BoundaryCondition::Planar => 2 * distance + 1,
            BoundaryCondition::Toric => 2 * distance,
        };
        let mut lattice = Self {
            distance,
            variant,
            boundary,
            width,
            data_qubits: vec![],
            stabilizers: vec![],
            logical_operators: vec![],
            flipped_by: vec![],
            sites: HashMap::new(),
        };
        for i in 0..width {
            for j in 0..width {
                if let Some(site) = lattice.create_site(i, j) {
                    lattice.sites.insert((i, j), site);
                }
            }
        }
        // stabilizer supports
        for stabilizer_index in 0..lattice.stabilizers.len() {
            let (i, j) = (lattice.stabilizers[stabilizer_index].i, lattice.stabilizers[stabilizer_index].j);
            let css_pauli = lattice.stabilizers[stabilizer_index].stabilizer_type.css_pauli();
            let mut support = vec![];
            for (di, dj) in [(-1, 0), (0, -1), (0, 1), (1, 0)] {
                if let Some(data_index) = lattice.shifted(i, j, di, dj).and_then(|(ni, nj)| lattice.data_index(ni, nj)) {
                    let pauli = if lattice.data_qubits[data_index].hadamard {
                        css_pauli.hadamard()
                    } else {
                        css_pauli
                    };
                    support.push((data_index, pauli));
                }
            }
            lattice.stabilizers[stabilizer_index].support = support;
        }
        // which stabilizer positions each Pauli component flips
        let mut flipped_by = vec![[vec![], vec![]]; lattice.data_qubits.len()];
        for (stabilizer_index, stabilizer) in lattice.stabilizers.iter().enumerate() {
            for &(data_index, pauli) in stabilizer.support.iter() {
                if Pauli::X.anticommutes_with(pauli) {
                    flipped_by[data_index][0].push(stabilizer_index);
                }
                if Pauli::Z.anticommutes_with(pauli) {
                    flipped_by[data_index][1].push(stabilizer_index);
                }
            }
        }
        lattice.flipped_by = flipped_by;
        lattice.logical_operators = lattice.build_logical_operators();
        Ok(lattice)
    }

    fn create_site(&mut self, i: usize, j: usize) -> Option<Site> {
        let is_data = (i + j) % 2 == 0;
        match self.boundary {
            BoundaryCondition::Toric => {
                if is_data {
                    Some(self.push_data(i, j))
                } else {
                    let stabilizer_type = if i % 2 == 1 { StabilizerType::Z } else { StabilizerType::X };
                    Some(self.push_stabilizer(i, j, stabilizer_type, false))
                }
            }
            BoundaryCondition::Planar => {
                let last = self.width - 1;
                let is_real = i > 0 && i < last && j > 0 && j < last;
                if is_data {
                    return if is_real { Some(self.push_data(i, j)) } else { None };
                }
                if i % 2 == 1 {
                    // Z-type positions: virtual on the left and right boundaries
                    Some(self.push_stabilizer(i, j, StabilizerType::Z, j == 0 || j == last))
                } else {
                    // X-type positions: virtual on the top and bottom boundaries
                    Some(self.push_stabilizer(i, j, StabilizerType::X, i == 0 || i == last))
                }
            }
        }
    }

    fn push_data(&mut self, i: usize, j: usize) -> Site {
        let hadamard = self.variant == CodeVariant::Xzzx && i % 2 == 0 && j % 2 == 0;
        self.data_qubits.push(DataQubit { i, j, hadamard });
        Site::Data(self.data_qubits.len() - 1)
    }

    fn push_stabilizer(&mut self, i: usize, j: usize, stabilizer_type: StabilizerType, is_virtual: bool) -> Site {
        self.stabilizers.push(StabilizerCheck {
            i,
            j,
            stabilizer_type,
            is_virtual,
            support: vec![],
        });
        Site::Stabilizer(self.stabilizers.len() - 1)
    }

    /// the site at offset `(di, dj)`, wrapping around for toric codes
    fn shifted(&self, i: usize, j: usize, di: isize, dj: isize) -> Option<(usize, usize)> {
        let width = self.width as isize;
        let (ni, nj) = (i as isize + di, j as isize + dj);
        match self.boundary {
            BoundaryCondition::Toric => Some((ni.rem_euclid(width) as usize, nj.rem_euclid(width) as usize)),
            BoundaryCondition::Planar => {
                if ni < 0 || nj < 0 || ni >= width || nj >= width {
                    None
                } else {
                    Some((ni as usize, nj as usize))
                }
            }
        }
    }

    fn build_logical_operators(&self) -> Vec<LogicalOperator> {
        let d = self.distance;
        // (name, type, sites) in the CSS layout
        let layouts: Vec<(&str, StabilizerType, Vec<(usize, usize)>)> = match self.boundary {
            BoundaryCondition::Planar => vec![
                ("X", StabilizerType::X, (0..d).map(|k| (1, 2 * k + 1)).collect()),
                ("Z", StabilizerType::Z, (0..d).map(|k| (2 * k + 1, 1)).collect()),
            ],
            BoundaryCondition::Toric => vec![
                ("X1", StabilizerType::X, (0..d).map(|k| (1, 2 * k + 1)).collect()),
                ("X2", StabilizerType::X, (0..d).map(|k| (2 * k, 0)).collect()),
                ("Z1", StabilizerType::Z, (0..d).map(|k| (2 * k + 1, 1)).collect()),
                ("Z2", StabilizerType::Z, (0..d).map(|k| (0, 2 * k)).collect()),
            ],
        };
        let mut logical_operators = Vec::with_capacity(layouts.len());
        for (name, logical_type, sites) in layouts {
            let mut support = Vec::with_capacity(sites.len());
            for (i, j) in sites {
                if let Some(data_index) = self.data_index(i, j) {
                    let css_pauli = logical_type.css_pauli();
                    let pauli = if self.data_qubits[data_index].hadamard {
                        css_pauli.hadamard()
                    } else {
                        css_pauli
                    };
                    support.push((data_index, pauli));
                }
            }
            logical_operators.push(LogicalOperator {
                name: name.to_string(),
                logical_type,
                support,
            });
        }
        logical_operators
    }

    pub fn data_num(&self) -> usize {
        self.data_qubits.len()
    }

    pub fn stabilizer_num(&self) -> usize {
        self.stabilizers.len()
    }

    pub fn data_index(&self, i: usize, j: usize) -> Option<DataIndex> {
        match self.sites.get(&(i, j)) {
            Some(Site::Data(data_index)) => Some(*data_index),
            _ => None,
        }
    }

    pub fn stabilizer_index(&self, i: usize, j: usize) -> Option<StabilizerIndex> {
        match self.sites.get(&(i, j)) {
            Some(Site::Stabilizer(stabilizer_index)) => Some(*stabilizer_index),
            _ => None,
        }
    }

    /// indices of the stabilizers that are actually measured
    pub fn real_stabilizers(&self) -> impl Iterator<Item = StabilizerIndex> + '_ {
        self.stabilizers
            .iter()
            .enumerate()
            .filter(|(_, stabilizer)| !stabilizer.is_virtual)
            .map(|(stabilizer_index, _)| stabilizer_index)
    }

    /// the violated real stabilizers of a single perfect measurement round
    pub fn syndrome_of(&self, errors: &[Pauli]) -> Vec<StabilizerIndex> {
        debug_assert_eq!(errors.len(), self.data_num());
        self.real_stabilizers()
            .filter(|&stabilizer_index| self.stabilizers[stabilizer_index].parity(errors))
            .collect()
    }

    /// whether a stabilizer-consistent residual error counts as a logical failure
    pub fn logical_failure(&self, residual: &[Pauli], criterion: FailureCriterion) -> bool {
        self.logical_operators.iter().any(|logical_operator| {
            let counted = match criterion {
                FailureCriterion::All => true,
                FailureCriterion::OnlyX => logical_operator.logical_type == StabilizerType::Z,
                FailureCriterion::OnlyZ => logical_operator.logical_type == StabilizerType::X,
            };
            counted && logical_operator.anticommutes_with(residual)
        })
    }

    /// sanity check to catch layout mistakes that are hard to debug
    pub fn sanity_check(&self) -> Result<(), String> {
        for (data_index, [x_flips, z_flips]) in self.flipped_by.iter().enumerate() {
            if x_flips.len() != 2 || z_flips.len() != 2 {
                return Err(format!(
                    "data qubit {} flips {} stabilizers with X and {} with Z, expecting 2 each",
                    data_index,
                    x_flips.len(),
                    z_flips.len()
                ));
            }
        }
        let real: Vec<&StabilizerCheck> = self.stabilizers.iter().filter(|stabilizer| !stabilizer.is_virtual).collect();
        for (a, stabilizer_a) in real.iter().enumerate() {
            for stabilizer_b in real.iter().skip(a + 1) {
                if anticommute(&stabilizer_a.support, &stabilizer_b.support) {
                    return Err(format!(
                        "stabilizers at ({}, {}) and ({}, {}) anticommute",
                        stabilizer_a.i, stabilizer_a.j, stabilizer_b.i, stabilizer_b.j
                    ));
                }
            }
        }
        for logical_operator in self.logical_operators.iter() {
            if logical_operator.support.len() != self.distance {
                return Err(format!("logical {} has weight {}", logical_operator.name, logical_operator.support.len()));
            }
            for stabilizer in real.iter() {
                if anticommute(&logical_operator.support, &stabilizer.support) {
                    return Err(format!(
                        "logical {} anticommutes with stabilizer at ({}, {})",
                        logical_operator.name, stabilizer.i, stabilizer.j
                    ));
                }
            }
        }
        // X̄k must anticommute with Z̄k and nothing else
        for (a, logical_a) in self.logical_operators.iter().enumerate() {
            for logical_b in self.logical_operators.iter().skip(a + 1) {
                let expected = logical_a.logical_type != logical_b.logical_type && logical_a.name[1..] == logical_b.name[1..];
                if anticommute(&logical_a.support, &logical_b.support) != expected {
                    return Err(format!("unexpected commutation between logical {} and {}", logical_a.name, logical_b.name));
                }
            }
        }
        Ok(())
    }
}

/// whether two Pauli strings given by their supports anticommute
fn anticommute(a: &[(DataIndex, Pauli)], b: &[(DataIndex, Pauli)]) -> bool {
    let mut parity = false;
    for &(data_a, pauli_a) in a.iter() {
        for &(data_b, pauli_b) in b.iter() {
            if data_a == data_b && pauli_a.anticommutes_with(pauli_b) {
                parity = !parity;
            }
        }
    }
    parity
}
