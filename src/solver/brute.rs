//! Exhaustive search over feasible labelings.

use crate::graph::{DisparityGraph, DisparityNode};
use crate::grid::Color;
use crate::labeling::Labeling;
use crate::solver::Solver;
use crate::trace::solve_span;
use crate::util::DiffStereoResult;

/// Enumerates every feasible labeling and keeps the cheapest.
///
/// Exponential in the pixel count; meant as a ground-truth oracle for grids
/// small enough to enumerate.
pub struct BruteForceSolver<'a, T: Color> {
    graph: &'a DisparityGraph<'a, T>,
}

impl<'a, T: Color> BruteForceSolver<'a, T> {
    /// Creates a solver over the graph.
    pub fn new(graph: &'a DisparityGraph<'a, T>) -> Self {
        Self { graph }
    }

    /// Depth-first search over pixels in row-major order.
    ///
    /// At each pixel every currently-available disparity is tried; `best` is
    /// refreshed after each improving move, so the minimum survives even
    /// though sibling branches inherit the last tried disparity.
    fn search(
        &self,
        labeling: &mut Labeling<'a, T>,
        best: &mut Labeling<'a, T>,
        index: usize,
    ) -> DiffStereoResult<()> {
        if index == labeling.nodes().len() {
            return Ok(());
        }
        let pixel = labeling.nodes()[index];
        let disparities = labeling.node_disparities(pixel);
        for disparity in disparities {
            labeling.set_node(DisparityNode {
                row: pixel.row,
                column: pixel.column,
                disparity,
            })?;
            if labeling.penalty() < best.penalty() {
                best.assign(labeling)?;
            }
            self.search(labeling, best, index + 1)?;
        }
        Ok(())
    }
}

impl<'a, T: Color> Solver<'a, T> for BruteForceSolver<'a, T> {
    fn find(&mut self) -> DiffStereoResult<Labeling<'a, T>> {
        let _span = solve_span!("brute_force", self.graph);

        let mut labeling = Labeling::new(self.graph);
        let mut best = labeling.clone();
        self.search(&mut labeling, &mut best, 0)?;
        Ok(best)
    }
}
