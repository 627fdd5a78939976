use std::{error::Error, fmt};

/// The aggregator module's result type.
pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Aggregation client failures.
#[derive(Debug)]
pub enum AggregatorError {
    /// The native map or network interface could not be initialized.
    /// Fatal at agent startup, before any training step runs.
    MapInit { detail: String },
    /// A bounded spin policy ran out before the step completed.
    PollTimeout { step: u32, spins: u64 },
    /// A pushed or pulled buffer does not match the configured exchange size.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// The map's iteration counter drifted from the step being aggregated.
    IterationDrift { step: u32, iter: u32 },
}

impl fmt::Display for AggregatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatorError::MapInit { detail } => {
                write!(f, "aggregation map init failed: {detail}")
            }
            AggregatorError::PollTimeout { step, spins } => {
                write!(f, "step {step} not completed after {spins} spins")
            }
            AggregatorError::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "{what} length mismatch: got {got}, expected {expected}"),
            AggregatorError::IterationDrift { step, iter } => {
                write!(f, "map iteration {iter} does not match step {step}")
            }
        }
    }
}

impl Error for AggregatorError {}
