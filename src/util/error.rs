//! Error types for diffstereo.

use thiserror::Error;

/// Result alias for diffstereo operations.
pub type DiffStereoResult<T> = std::result::Result<T, DiffStereoError>;

/// Errors that can occur when building or querying the disparity problem.
#[derive(Debug, Error, PartialEq)]
pub enum DiffStereoError {
    /// A grid cell index lies outside the grid extent.
    #[error("cell ({row}, {column}) is outside a {rows}x{columns} grid")]
    OutOfRange {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
    /// The right image has no pixels.
    #[error("right image must not be empty, got {rows}x{columns}")]
    EmptyImage { rows: usize, columns: usize },
    /// The stereo pair disagrees on the number of rows.
    #[error(
        "images must have the same number of rows: left has {left_rows}, right has {right_rows}"
    )]
    RowCountMismatch { left_rows: usize, right_rows: usize },
    /// Disparities are non-negative, so the left image must cover the right one.
    #[error("left image must be at least as wide as the right: {left_columns} < {right_columns}")]
    LeftImageTooNarrow {
        left_columns: usize,
        right_columns: usize,
    },
    /// The smoothness multiplier must be non-negative.
    #[error("consistency weight must be non-negative, got {consistency}")]
    NegativeConsistency { consistency: f64 },
    /// Node coordinates or disparity do not fit the graph.
    #[error("node ({row}, {column}, {disparity}) does not fit the graph")]
    InvalidNode {
        row: usize,
        column: usize,
        disparity: usize,
    },
    /// A pixel cannot be connected with itself.
    #[error("a pixel cannot be connected with itself: ({row}, {column})")]
    SelfEdge { row: usize, column: usize },
    /// The disparity is not in the feasible set for the labeling mutation.
    #[error("disparity {disparity} is not available at pixel ({row}, {column})")]
    UnavailableDisparity {
        row: usize,
        column: usize,
        disparity: usize,
    },
    /// Labelings can only be assigned between instances over one graph.
    #[error("labelings over different disparity graphs cannot be assigned")]
    GraphMismatch,
}
