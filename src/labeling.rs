//! A disparity assignment with a cached total energy.
//!
//! A labeling stores one chosen node per right-image pixel. Mutations go
//! through a feasibility check against the current assignments of the
//! pixel's neighbors, so every labeling reachable through `set_node` has a
//! finite energy. The cached energy is dropped on every mutation and rebuilt
//! lazily from the directed (east and south) neighbor pairs.

use std::cell::Cell;

use crate::graph::{DisparityGraph, DisparityNode};
use crate::grid::Color;
use crate::util::{DiffStereoError, DiffStereoResult};

/// One chosen disparity per pixel, with a cached total penalty.
#[derive(Clone)]
pub struct Labeling<'a, T: Color> {
    graph: &'a DisparityGraph<'a, T>,
    nodes: Vec<DisparityNode>,
    penalty: Cell<f64>,
}

impl<'a, T: Color> Labeling<'a, T> {
    /// Creates the all-zero labeling over the graph.
    pub fn new(graph: &'a DisparityGraph<'a, T>) -> Self {
        Self {
            graph,
            nodes: graph.available_nodes().collect(),
            penalty: Cell::new(f64::INFINITY),
        }
    }

    /// Returns the graph this labeling is defined over.
    pub fn graph(&self) -> &'a DisparityGraph<'a, T> {
        self.graph
    }

    /// The stored nodes in row-major pixel order.
    pub fn nodes(&self) -> &[DisparityNode] {
        &self.nodes
    }

    /// The currently-assigned disparity at the node's pixel.
    pub fn disparity(&self, node: DisparityNode) -> usize {
        self.nodes[self.node_index(node)].disparity
    }

    /// The labeled neighbors of the node's pixel.
    ///
    /// Disparity fields carry the current assignment. Forward neighbors
    /// (east, south) come first; with `directed` set only those are
    /// returned.
    pub fn neighbors(&self, node: DisparityNode, directed: bool) -> Vec<DisparityNode> {
        self.graph
            .node_neighbors(node, directed)
            .into_iter()
            .map(|neighbor| self.nodes[self.node_index(neighbor)])
            .collect()
    }

    /// Disparities the node's pixel may take given its current neighbors.
    ///
    /// The intersection of every neighbor's allowed window; empty for a
    /// pixel without neighbors.
    pub fn node_disparities(&self, node: DisparityNode) -> std::ops::Range<usize> {
        let neighbors = self.neighbors(node, false);
        let Some((first, rest)) = neighbors.split_first() else {
            return 0..0;
        };
        let mut range = self.graph.neighbor_disparities(*first, node);
        for neighbor in rest {
            let other = self.graph.neighbor_disparities(*neighbor, node);
            range.start = range.start.max(other.start);
            range.end = range.end.min(other.end);
        }
        range.start.min(range.end)..range.end
    }

    /// Assigns the node's disparity to its pixel.
    ///
    /// Fails when the node does not fit the graph or the disparity is not
    /// currently available; the labeling is untouched on failure.
    pub fn set_node(&mut self, node: DisparityNode) -> DiffStereoResult<()> {
        self.graph.check_node(node)?;
        if !self.node_disparities(node).contains(&node.disparity) {
            return Err(DiffStereoError::UnavailableDisparity {
                row: node.row,
                column: node.column,
                disparity: node.disparity,
            });
        }
        let index = self.node_index(node);
        self.nodes[index] = node;
        self.penalty.set(f64::INFINITY);
        Ok(())
    }

    /// Assigns the node's disparity without the availability check.
    ///
    /// The node must still fit the graph. Callers restore feasibility before
    /// reading `penalty`.
    pub fn set_node_force(&mut self, node: DisparityNode) -> DiffStereoResult<()> {
        self.graph.check_node(node)?;
        let index = self.node_index(node);
        self.nodes[index] = node;
        self.penalty.set(f64::INFINITY);
        Ok(())
    }

    /// Total energy: the sum of edge penalties over all 4-neighbor pairs.
    ///
    /// Each unordered pair is counted once by walking only the directed
    /// (east, south) neighbors. Cached until the next mutation.
    pub fn penalty(&self) -> f64 {
        let cached = self.penalty.get();
        if cached.is_finite() {
            return cached;
        }
        let mut total = 0.0;
        for node in &self.nodes {
            for neighbor in self.neighbors(*node, true) {
                total += self.graph.penalty_checked(*node, neighbor);
            }
        }
        debug_assert!(total.is_finite());
        self.penalty.set(total);
        total
    }

    /// Copies another labeling's assignment into this one.
    ///
    /// Both labelings must be defined over the same graph instance.
    pub fn assign(&mut self, other: &Self) -> DiffStereoResult<()> {
        if !std::ptr::eq(self.graph, other.graph) {
            return Err(DiffStereoError::GraphMismatch);
        }
        self.nodes.clone_from(&other.nodes);
        self.penalty.set(other.penalty.get());
        Ok(())
    }

    fn node_index(&self, node: DisparityNode) -> usize {
        debug_assert!(node.row < self.graph.rows() && node.column < self.graph.columns());
        node.row * self.graph.columns() + node.column
    }
}
