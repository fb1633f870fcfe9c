//! The disparity graph: an immutable relational view over a stereo pair.
//!
//! Nodes are `(pixel, disparity)` candidates for pixels of the right image.
//! Edges connect candidates of 4-adjacent pixels whose disparities respect
//! the row ordering constraint. The graph never materializes its nodes or
//! edges; it enumerates feasible labels and scores nodes and edges on demand.

use std::ops::Range;

use crate::grid::{Color, ColorGrid};
use crate::util::{DiffStereoError, DiffStereoResult};

/// A candidate labeling of one right-image pixel.
///
/// The disparity is the horizontal offset of the corresponding left-image
/// pixel: right pixel `(row, column)` matches left pixel
/// `(row, column + disparity)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisparityNode {
    /// Row of the right-image pixel.
    pub row: usize,
    /// Column of the right-image pixel.
    pub column: usize,
    /// Horizontal offset into the left image.
    pub disparity: usize,
}

impl DisparityNode {
    /// Row-major pixel order, ignoring the disparity.
    pub(crate) fn pixel_precedes(&self, other: &DisparityNode) -> bool {
        (self.row, self.column) < (other.row, other.column)
    }
}

/// The energy-minimization problem for one rectified pair.
///
/// Borrows both grids immutably; solvers in turn borrow the graph. The
/// `consistency` multiplier weights the squared disparity-difference term of
/// every edge penalty.
pub struct DisparityGraph<'a, T: Color> {
    left: &'a ColorGrid<T>,
    right: &'a ColorGrid<T>,
    consistency: f64,
}

impl<'a, T: Color> DisparityGraph<'a, T> {
    /// Builds a graph with the default consistency weight of 1.
    pub fn new(left: &'a ColorGrid<T>, right: &'a ColorGrid<T>) -> DiffStereoResult<Self> {
        Self::with_consistency(left, right, 1.0)
    }

    /// Builds a graph with an explicit consistency weight.
    ///
    /// The pair must share its row count, the left image must be at least as
    /// wide as the right one, and the weight must be non-negative.
    pub fn with_consistency(
        left: &'a ColorGrid<T>,
        right: &'a ColorGrid<T>,
        consistency: f64,
    ) -> DiffStereoResult<Self> {
        if right.rows() == 0 || right.columns() == 0 {
            return Err(DiffStereoError::EmptyImage {
                rows: right.rows(),
                columns: right.columns(),
            });
        }
        if left.rows() != right.rows() {
            return Err(DiffStereoError::RowCountMismatch {
                left_rows: left.rows(),
                right_rows: right.rows(),
            });
        }
        if left.columns() < right.columns() {
            return Err(DiffStereoError::LeftImageTooNarrow {
                left_columns: left.columns(),
                right_columns: right.columns(),
            });
        }
        if consistency < 0.0 {
            return Err(DiffStereoError::NegativeConsistency { consistency });
        }
        Ok(Self {
            left,
            right,
            consistency,
        })
    }

    /// Returns the number of pixel rows.
    pub fn rows(&self) -> usize {
        self.right.rows()
    }

    /// Returns the number of pixel columns of the right image.
    pub fn columns(&self) -> usize {
        self.right.columns()
    }

    /// Returns the consistency weight.
    pub fn consistency(&self) -> f64 {
        self.consistency
    }

    /// Validates that the node fits the graph.
    ///
    /// The pixel must lie inside the right image and the disparity must not
    /// point past the last column of the left image.
    pub fn check_node(&self, node: DisparityNode) -> DiffStereoResult<()> {
        if node.row >= self.rows()
            || node.column >= self.columns()
            || node.column + node.disparity >= self.left.columns()
        {
            return Err(DiffStereoError::InvalidNode {
                row: node.row,
                column: node.column,
                disparity: node.disparity,
            });
        }
        Ok(())
    }

    /// All pixels in row-major order, each as a node with disparity zero.
    pub fn available_nodes(&self) -> impl Iterator<Item = DisparityNode> {
        let rows = self.rows();
        let columns = self.columns();
        (0..rows).flat_map(move |row| {
            (0..columns).map(move |column| DisparityNode {
                row,
                column,
                disparity: 0,
            })
        })
    }

    /// In-grid 4-neighbors of the node's pixel, with disparity set to zero.
    ///
    /// Forward neighbors (east, then south) come first; with `directed` set
    /// only those are returned, otherwise west and north follow.
    pub fn node_neighbors(&self, node: DisparityNode, directed: bool) -> Vec<DisparityNode> {
        let mut neighbors = Vec::with_capacity(4);
        if node.column + 1 < self.columns() {
            neighbors.push(DisparityNode {
                row: node.row,
                column: node.column + 1,
                disparity: 0,
            });
        }
        if node.row + 1 < self.rows() {
            neighbors.push(DisparityNode {
                row: node.row + 1,
                column: node.column,
                disparity: 0,
            });
        }
        if !directed {
            if node.column > 0 {
                neighbors.push(DisparityNode {
                    row: node.row,
                    column: node.column - 1,
                    disparity: 0,
                });
            }
            if node.row > 0 {
                neighbors.push(DisparityNode {
                    row: node.row - 1,
                    column: node.column,
                    disparity: 0,
                });
            }
        }
        neighbors
    }

    /// Feasible disparities at the node's pixel.
    pub fn node_disparities(&self, node: DisparityNode) -> Range<usize> {
        debug_assert!(node.column < self.columns());
        0..self.left.columns() - node.column
    }

    /// Feasible disparities of `neighbor` given the disparity of `node`.
    ///
    /// Vertical neighbors are unconstrained beyond the image bound. Along a
    /// row the projection `column + disparity` may not decrease toward the
    /// east: a pixel's disparity exceeds its eastern neighbor's by at most
    /// one, while eastward jumps are free.
    pub fn neighbor_disparities(
        &self,
        node: DisparityNode,
        neighbor: DisparityNode,
    ) -> Range<usize> {
        debug_assert!(
            node.row.abs_diff(neighbor.row) + node.column.abs_diff(neighbor.column) == 1
        );
        let bound = self.left.columns() - neighbor.column;
        if node.row != neighbor.row {
            return 0..bound;
        }
        if neighbor.column > node.column {
            node.disparity.saturating_sub(1).min(bound)..bound
        } else {
            0..(node.disparity + 2).min(bound)
        }
    }

    /// Inclusive lower bound of `neighbor_disparities`.
    pub fn min_neighbor_disparity(&self, node: DisparityNode, neighbor: DisparityNode) -> usize {
        self.neighbor_disparities(node, neighbor).start
    }

    /// Exclusive upper bound of `neighbor_disparities`.
    pub fn max_neighbor_disparity(&self, node: DisparityNode, neighbor: DisparityNode) -> usize {
        self.neighbor_disparities(node, neighbor).end
    }

    /// Checks whether the two nodes are connected by an edge.
    ///
    /// Fails when the nodes share a pixel or do not fit the graph. Returns
    /// `false` for non-adjacent pixels and for adjacent ones whose
    /// disparities break the ordering constraint.
    pub fn edge_exists(
        &self,
        node_a: DisparityNode,
        node_b: DisparityNode,
    ) -> DiffStereoResult<bool> {
        self.check_pair(node_a, node_b)?;
        Ok(self.edge_exists_checked(node_a, node_b))
    }

    pub(crate) fn edge_exists_checked(&self, node_a: DisparityNode, node_b: DisparityNode) -> bool {
        let row_gap = node_a.row.abs_diff(node_b.row);
        let column_gap = node_a.column.abs_diff(node_b.column);
        if row_gap + column_gap != 1 {
            return false;
        }
        if row_gap == 1 {
            return true;
        }
        let (west, east) = if node_a.column < node_b.column {
            (node_a, node_b)
        } else {
            (node_b, node_a)
        };
        west.disparity <= east.disparity + 1
    }

    /// Photoconsistency penalty of a single node.
    ///
    /// The squared color distance between the right pixel and the left pixel
    /// the disparity points at.
    pub fn node_penalty(&self, node: DisparityNode) -> DiffStereoResult<f64> {
        self.check_node(node)?;
        Ok(self.node_penalty_checked(node))
    }

    pub(crate) fn node_penalty_checked(&self, node: DisparityNode) -> f64 {
        self.right
            .at(node.row, node.column)
            .distance_sq(self.left.at(node.row, node.column + node.disparity))
    }

    /// Penalty of the edge between two nodes, infinite for non-edges.
    ///
    /// For an existing edge the penalty spreads each endpoint's
    /// photoconsistency over its neighbor count and adds the weighted squared
    /// disparity difference.
    pub fn penalty(&self, node_a: DisparityNode, node_b: DisparityNode) -> DiffStereoResult<f64> {
        self.check_pair(node_a, node_b)?;
        Ok(self.penalty_checked(node_a, node_b))
    }

    pub(crate) fn penalty_checked(&self, node_a: DisparityNode, node_b: DisparityNode) -> f64 {
        if !self.edge_exists_checked(node_a, node_b) {
            return f64::INFINITY;
        }
        let nodes_penalty = self.node_penalty_checked(node_a) / self.degree(node_a)
            + self.node_penalty_checked(node_b) / self.degree(node_b);
        let difference = node_a.disparity as f64 - node_b.disparity as f64;
        nodes_penalty + self.consistency * difference * difference
    }

    fn check_pair(&self, node_a: DisparityNode, node_b: DisparityNode) -> DiffStereoResult<()> {
        if node_a.row == node_b.row && node_a.column == node_b.column {
            return Err(DiffStereoError::SelfEdge {
                row: node_a.row,
                column: node_a.column,
            });
        }
        self.check_node(node_a)?;
        self.check_node(node_b)
    }

    /// Count of in-grid 4-neighbors: 2 in corners, 3 on borders, 4 inside.
    fn degree(&self, node: DisparityNode) -> f64 {
        let count = (node.row > 0) as usize
            + (node.row + 1 < self.rows()) as usize
            + (node.column > 0) as usize
            + (node.column + 1 < self.columns()) as usize;
        count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::{DisparityGraph, DisparityNode};
    use crate::grid::ColorGrid;

    fn node(row: usize, column: usize, disparity: usize) -> DisparityNode {
        DisparityNode {
            row,
            column,
            disparity,
        }
    }

    #[test]
    fn neighbors_keep_forward_then_backward_order() {
        let left = ColorGrid::<u8>::new(3, 3);
        let right = ColorGrid::<u8>::new(3, 3);
        let graph = DisparityGraph::new(&left, &right).unwrap();

        let all = graph.node_neighbors(node(1, 1, 0), false);
        assert_eq!(
            all,
            vec![node(1, 2, 0), node(2, 1, 0), node(1, 0, 0), node(0, 1, 0)]
        );

        let forward = graph.node_neighbors(node(1, 1, 0), true);
        assert_eq!(forward, vec![node(1, 2, 0), node(2, 1, 0)]);

        let corner = graph.node_neighbors(node(2, 2, 0), false);
        assert_eq!(corner, vec![node(2, 1, 0), node(1, 2, 0)]);
    }

    #[test]
    fn neighbor_disparities_follow_the_ordering_constraint() {
        let left = ColorGrid::<u8>::new(2, 8);
        let right = ColorGrid::<u8>::new(2, 5);
        let graph = DisparityGraph::new(&left, &right).unwrap();

        // Vertical neighbors see the full feasible range.
        assert_eq!(graph.neighbor_disparities(node(0, 2, 3), node(1, 2, 0)), 0..6);
        // An eastern neighbor may fall one step below the node but is free
        // to jump up to the image bound.
        assert_eq!(graph.neighbor_disparities(node(0, 2, 3), node(0, 3, 0)), 2..5);
        assert_eq!(graph.neighbor_disparities(node(0, 2, 1), node(0, 3, 0)), 0..5);
        // A western neighbor is capped one step above the node.
        assert_eq!(graph.neighbor_disparities(node(0, 2, 0), node(0, 1, 0)), 0..2);
        assert_eq!(graph.neighbor_disparities(node(0, 2, 2), node(0, 1, 0)), 0..4);
        assert_eq!(graph.min_neighbor_disparity(node(0, 2, 3), node(0, 3, 0)), 2);
        assert_eq!(graph.max_neighbor_disparity(node(0, 2, 3), node(0, 3, 0)), 5);
    }

    #[test]
    fn disparities_are_clipped_by_the_left_image() {
        let left = ColorGrid::<u8>::new(2, 6);
        let right = ColorGrid::<u8>::new(2, 5);
        let graph = DisparityGraph::new(&left, &right).unwrap();

        assert_eq!(graph.node_disparities(node(0, 0, 0)), 0..6);
        assert_eq!(graph.node_disparities(node(0, 4, 0)), 0..2);
        // A neighbor near the right border clips the one-step window.
        assert_eq!(graph.neighbor_disparities(node(0, 3, 2), node(0, 4, 0)), 1..2);
    }
}
