use serde::{Deserialize, Serialize};

/// single-qubit Pauli operator up to a global phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

impl Default for Pauli {
    fn default() -> Self {
        Self::I
    }
}

impl Pauli {
    pub fn from_components(has_x: bool, has_z: bool) -> Self {
        match (has_x, has_z) {
            (false, false) => Self::I,
            (true, false) => Self::X,
            (true, true) => Self::Y,
            (false, true) => Self::Z,
        }
    }

    #[inline]
    pub fn has_x(self) -> bool {
        matches!(self, Self::X | Self::Y)
    }

    #[inline]
    pub fn has_z(self) -> bool {
        matches!(self, Self::Z | Self::Y)
    }

    #[inline]
    pub fn is_identity(self) -> bool {
        self == Self::I
    }

    /// product of two Pauli operators, ignoring the phase
    #[inline]
    pub fn multiply(self, other: Self) -> Self {
        Self::from_components(self.has_x() ^ other.has_x(), self.has_z() ^ other.has_z())
    }

    #[inline]
    pub fn anticommutes_with(self, other: Self) -> bool {
        (self.has_x() && other.has_z()) ^ (self.has_z() && other.has_x())
    }

    /// conjugate by a Hadamard gate, which exchanges X and Z
    #[inline]
    pub fn hadamard(self) -> Self {
        Self::from_components(self.has_z(), self.has_x())
    }
}

impl std::fmt::Display for Pauli {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::I => "I",
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pauli_algebra_1() {  // cargo test pauli_algebra_1 -- --nocapture
        assert_eq!(Pauli::X.multiply(Pauli::Z), Pauli::Y);
        assert_eq!(Pauli::Y.multiply(Pauli::Y), Pauli::I);
        assert_eq!(Pauli::Y.multiply(Pauli::Z), Pauli::X);
        assert!(Pauli::X.anticommutes_with(Pauli::Z));
        assert!(Pauli::Y.anticommutes_with(Pauli::X));
        assert!(!Pauli::Y.anticommutes_with(Pauli::Y));
        assert!(!Pauli::I.anticommutes_with(Pauli::Z));
        assert_eq!(Pauli::X.hadamard(), Pauli::Z);
        assert_eq!(Pauli::Y.hadamard(), Pauli::Y);
    }
}
