//! Availability mask over nodes and edges of a disparity graph.
//!
//! The boolean graph answers one question for the diffusion solver: after
//! dropping every edge whose reparameterized weight is off the local
//! minimum, does an arc-consistent labeling survive? Each edge bit is stored
//! once, for the direction from the row-major smaller pixel to the larger
//! one; lookups from the other side swap the endpoints.
//!
//! Bits live in flat buffers. Per-pixel disparity counts are ragged, so node
//! indices go through a precomputed offset table; edge indices stride by the
//! global maximum disparity count and the four neighbor slots.

use crate::graph::{DisparityGraph, DisparityNode};
use crate::grid::Color;

const NEIGHBOR_SLOTS: usize = 4;

/// Node and edge availability bits for one disparity graph.
pub struct BooleanGraph<'a, T: Color> {
    graph: &'a DisparityGraph<'a, T>,
    pixels: Vec<DisparityNode>,
    offsets: Vec<usize>,
    max_disparities: usize,
    node_bits: Vec<bool>,
    edge_bits: Vec<bool>,
}

impl<'a, T: Color> BooleanGraph<'a, T> {
    /// Allocates availability storage for every feasible node and edge.
    pub fn new(graph: &'a DisparityGraph<'a, T>) -> Self {
        let pixels: Vec<DisparityNode> = graph.available_nodes().collect();
        let mut offsets = Vec::with_capacity(pixels.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for pixel in &pixels {
            total += graph.node_disparities(*pixel).len();
            offsets.push(total);
        }
        let max_disparities = pixels
            .iter()
            .map(|pixel| graph.node_disparities(*pixel).len())
            .max()
            .unwrap_or(0);
        Self {
            graph,
            pixels,
            offsets,
            max_disparities,
            node_bits: vec![true; total],
            edge_bits: vec![true; total * NEIGHBOR_SLOTS * max_disparities],
        }
    }

    /// Marks every node and every edge as available again.
    pub fn reset(&mut self) {
        self.node_bits.fill(true);
        self.edge_bits.fill(true);
    }

    /// Availability of a single node.
    pub fn node_available(&self, node: DisparityNode) -> bool {
        self.node_bits[self.node_index(node)]
    }

    /// Availability of the edge between two nodes, looked up from either side.
    pub fn edge_available(&self, node: DisparityNode, neighbor: DisparityNode) -> bool {
        if node.pixel_precedes(&neighbor) {
            self.edge_bits[self.edge_index(node, neighbor)]
        } else {
            self.edge_available(neighbor, node)
        }
    }

    /// Marks the edge between two nodes as unavailable.
    pub fn remove_edge(&mut self, node: DisparityNode, neighbor: DisparityNode) {
        if node.pixel_precedes(&neighbor) {
            let index = self.edge_index(node, neighbor);
            self.edge_bits[index] = false;
        } else {
            self.remove_edge(neighbor, node);
        }
    }

    /// Marks a node and every edge incident to it as unavailable.
    pub fn remove_node(&mut self, node: DisparityNode) {
        let index = self.node_index(node);
        self.node_bits[index] = false;
        for neighbor in self.graph.node_neighbors(node, false) {
            for disparity in self.graph.neighbor_disparities(node, neighbor) {
                self.remove_edge(node, DisparityNode { disparity, ..neighbor });
            }
        }
    }

    /// Culls to a fixpoint and reports whether any labeling survives.
    ///
    /// Runs deletion iterations until nothing changes, then checks whether
    /// at least one node is still available.
    pub fn is_finished(&mut self) -> bool {
        while self.deletion_iteration() {}
        self.node_bits.iter().any(|&bit| bit)
    }

    /// One pass of arc-consistency culling.
    ///
    /// A node dies as soon as one of its neighbors offers no surviving edge.
    /// If no support is seen anywhere in the scan, everything is purged and
    /// the pass reports no change so the caller stops iterating.
    fn deletion_iteration(&mut self) -> bool {
        let mut changed = false;
        let mut graph_exists = false;
        for pixel_index in 0..self.pixels.len() {
            let pixel = self.pixels[pixel_index];
            for disparity in self.graph.node_disparities(pixel) {
                let node = DisparityNode { disparity, ..pixel };
                if !self.node_available(node) {
                    continue;
                }
                for neighbor in self.graph.node_neighbors(node, false) {
                    let mut supported = false;
                    for neighbor_disparity in self.graph.neighbor_disparities(node, neighbor) {
                        let candidate = DisparityNode {
                            disparity: neighbor_disparity,
                            ..neighbor
                        };
                        if self.edge_available(node, candidate) {
                            supported = true;
                            break;
                        }
                    }
                    if supported {
                        graph_exists = true;
                    } else {
                        changed = true;
                        self.remove_node(node);
                    }
                }
            }
        }

        if !graph_exists {
            for pixel_index in 0..self.pixels.len() {
                let pixel = self.pixels[pixel_index];
                for disparity in self.graph.node_disparities(pixel) {
                    self.remove_node(DisparityNode { disparity, ..pixel });
                }
            }
            changed = false;
        }

        changed
    }

    fn node_index(&self, node: DisparityNode) -> usize {
        let pixel = node.row * self.graph.columns() + node.column;
        let base = self.offsets[pixel];
        debug_assert!(base + node.disparity < self.offsets[pixel + 1]);
        base + node.disparity
    }

    /// Index of the canonical (forward) direction bit; `node` must precede
    /// `neighbor` in pixel order.
    fn edge_index(&self, node: DisparityNode, neighbor: DisparityNode) -> usize {
        debug_assert!(node.pixel_precedes(&neighbor));
        debug_assert!(neighbor.disparity < self.max_disparities);
        let slot = 2 * (neighbor.row - node.row) + neighbor.column - node.column - 1;
        (self.node_index(node) * NEIGHBOR_SLOTS + slot) * self.max_disparities
            + neighbor.disparity
    }
}
