//! Error conditions raised by the orientation-field analysis engine.
//!
//! All variants are deterministic consequences of malformed input data and
//! carry enough context (pixel coordinates, labels, shapes) to locate the
//! problem. File-level helpers wrap these in [`anyhow::Error`] with context.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FabricError {
    /// Two operands cover pixel grids of different dimensions.
    #[error("shape mismatch: expected {expected:?} (rows, cols), found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// An analysis was requested over zero defined samples.
    #[error("no defined samples for {context}")]
    EmptySampleSet { context: String },

    /// Boundary healing made no progress across a full pass.
    #[error(
        "boundary healing did not converge after {passes} pass(es): \
         {remaining} undefined pixel(s) left, first at ({first_row}, {first_col})"
    )]
    HealingDidNotConverge {
        remaining: usize,
        passes: usize,
        first_row: usize,
        first_col: usize,
    },

    /// Spatial step is not a strictly positive finite number.
    #[error("invalid resolution {0}: spatial step must be positive and finite")]
    InvalidResolution(f64),

    /// Quality threshold outside [0, 100].
    #[error("quality threshold {0} is outside [0, 100]")]
    OutOfRangeQuality(f64),

    /// A profile sample fell on an undefined pixel under the failing policy.
    #[error("undefined orientation sampled at ({row}, {col})")]
    UndefinedSample { row: usize, col: usize },

    /// Density filter percentile outside [0, 100].
    #[error("density percentile {0} is outside [0, 100]")]
    InvalidPercentile(f64),

    /// A pixel coordinate does not fall inside the grid.
    #[error("pixel ({row}, {col}) is outside a {rows}x{cols} grid")]
    OutOfBounds {
        row: isize,
        col: isize,
        rows: usize,
        cols: usize,
    },

    /// A grain label was requested that no pixel carries.
    #[error("no pixel carries grain label {0}")]
    UnknownGrain(u32),
}

pub type Result<T> = std::result::Result<T, FabricError>;
