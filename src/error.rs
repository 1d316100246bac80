//! Errors
//!
//! Configuration errors are detected before any trial runs; decode errors abort the configuration point
//! they occur in; statistical insufficiency is not an error and surfaces as a caveat on the result row.
//!

use super::util::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid code distance {0}: must be odd and at least 3")]
    InvalidDistance(usize),
    #[error("invalid probability {0}: must lie within [0, 1]")]
    InvalidProbability(f64),
    #[error("invalid erasure probability {0}: must lie within [0, 1]")]
    InvalidErasureProbability(f64),
    #[error("invalid bias ratio {0}: must be positive (`inf` for pure Z noise)")]
    InvalidBias(f64),
    #[error("invalid trial budget: min_trials {min_trials} exceeds max_trials {max_trials}, or max_trials is 0")]
    InvalidTrialBudget { min_trials: usize, max_trials: usize },
    #[error("invalid max_half_weight {0}: must be positive")]
    InvalidMaxHalfWeight(Weight),
    #[error("`{name}` has {actual} entries but {expected} are required")]
    MismatchedLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("cannot parse list `{value}`: {reason}")]
    InvalidList { value: String, reason: String },
    #[error("invalid decoder configuration: {0}")]
    InvalidDecoderConfig(#[from] serde_json::Error),
    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cluster growth exceeded {max_iterations} iterations with {remaining} odd cluster(s) left")]
    ClusterGrowthExceeded { max_iterations: usize, remaining: usize },
    #[error("defect at vertex {0} cannot be matched to any other defect or boundary")]
    UnmatchedDefect(VertexIndex),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("correction leaves {0} stabilizer(s) violated")]
    InconsistentCorrection(usize),
    #[error("cannot write runtime statistics: {0}")]
    Io(#[from] std::io::Error),
}

impl SimulationError {
    /// process exit status reported for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}
