//! Disparity solvers.

use crate::grid::Color;
use crate::labeling::Labeling;
use crate::util::DiffStereoResult;

pub mod boolean;
pub mod brute;
pub mod diffusion;

pub use boolean::BooleanGraph;
pub use brute::BruteForceSolver;
pub use diffusion::DiffusionSolver;

/// A strategy that extracts a labeling from a disparity graph.
///
/// Implementors borrow the graph and own their intermediate state; the
/// returned labeling is defined over the same graph.
pub trait Solver<'a, T: Color> {
    /// Finds a labeling of the graph.
    fn find(&mut self) -> DiffStereoResult<Labeling<'a, T>>;
}
