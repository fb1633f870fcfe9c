//! Min-sum diffusion over the disparity graph.
//!
//! Diffusion repeatedly reparameterizes the problem: for every node it
//! equalizes the minimal outgoing reparameterized edge weight toward each
//! neighbor by moving potential between the node's slots. Reparameterization
//! never changes the total energy of any labeling; it only concentrates the
//! minimum so that near-optimal edges become recognizable. After each
//! iteration a boolean graph keeps only edges within a small threshold of
//! each local minimum and checks whether an arc-consistent labeling
//! survives; once it does, the labeling is read off the surviving nodes.
//!
//! Nodes are processed in two checkerboard sweeps. Same-colored pixels share
//! no edge, so their updates touch disjoint potential slots and read only
//! slots the sweep never writes; the optional `rayon` path exploits exactly
//! that, computing fresh per-pixel potential blocks in parallel and merging
//! them serially.

use crate::graph::{DisparityGraph, DisparityNode};
use crate::grid::Color;
use crate::labeling::Labeling;
use crate::solver::{BooleanGraph, Solver};
use crate::trace::{round_event, solve_span};
use crate::util::DiffStereoResult;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const NEIGHBOR_SLOTS: usize = 4;
const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Below this pixel count a parallel sweep costs more than it saves.
#[cfg(feature = "rayon")]
const PARALLEL_PIXEL_THRESHOLD: usize = 64;

/// Iterative diffusion solver.
///
/// Owns its labeling, availability mask, and passed potentials; borrows the
/// graph. `find` runs until threshold feasibility or the iteration cap,
/// whichever comes first.
pub struct DiffusionSolver<'a, T: Color> {
    graph: &'a DisparityGraph<'a, T>,
    labeling: Labeling<'a, T>,
    boolean_graph: BooleanGraph<'a, T>,
    potentials: PassedPotentials,
    max_iterations: usize,
}

impl<'a, T: Color> DiffusionSolver<'a, T> {
    /// Creates a solver over the graph with the default iteration cap.
    pub fn new(graph: &'a DisparityGraph<'a, T>) -> Self {
        Self {
            graph,
            labeling: Labeling::new(graph),
            boolean_graph: BooleanGraph::new(graph),
            potentials: PassedPotentials::new(graph),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Caps the number of diffusion iterations.
    ///
    /// Threshold feasibility is not guaranteed to arrive in bounded time on
    /// arbitrary inputs; past the cap `find` returns a best-effort labeling.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Rebuilds the availability mask for the current potentials.
    ///
    /// Every edge whose reparameterized weight is more than `threshold`
    /// above the cheapest edge leaving the same node toward the same
    /// neighbor is dropped; the boolean graph then reports whether an
    /// arc-consistent labeling survives.
    fn is_finished(&mut self, threshold: f64) -> bool {
        self.boolean_graph.reset();
        for pixel_index in 0..self.labeling.nodes().len() {
            let pixel = self.labeling.nodes()[pixel_index];
            for neighbor in self.graph.node_neighbors(pixel, true) {
                let mut min_penalty = f64::INFINITY;
                for disparity in self.graph.node_disparities(pixel) {
                    let node = DisparityNode { disparity, ..pixel };
                    let best = min_edge_penalty(self.graph, &self.potentials, node, neighbor);
                    if best < min_penalty {
                        min_penalty = best;
                    }
                }
                min_penalty += threshold;
                for disparity in self.graph.node_disparities(pixel) {
                    let node = DisparityNode { disparity, ..pixel };
                    for neighbor_disparity in self.graph.neighbor_disparities(node, neighbor) {
                        let candidate = DisparityNode {
                            disparity: neighbor_disparity,
                            ..neighbor
                        };
                        let weight = passed_penalty(&self.potentials, &node, &candidate)
                            + self.graph.penalty_checked(node, candidate);
                        if weight > min_penalty {
                            self.boolean_graph.remove_edge(node, candidate);
                        }
                    }
                }
            }
        }
        self.boolean_graph.is_finished()
    }

    /// One diffusion iteration: both checkerboard sweeps.
    fn iteration(&mut self) {
        self.sweep(0);
        self.sweep(1);
    }

    #[cfg(not(feature = "rayon"))]
    fn sweep(&mut self, parity: usize) {
        self.sweep_serial(parity);
    }

    #[cfg(feature = "rayon")]
    fn sweep(&mut self, parity: usize) {
        let pixel_count = self.labeling.nodes().len();
        if pixel_count < PARALLEL_PIXEL_THRESHOLD {
            self.sweep_serial(parity);
            return;
        }
        let graph = self.graph;
        let potentials = &self.potentials;
        let columns = graph.columns();
        let updated: Vec<(usize, Vec<f64>)> = (0..pixel_count)
            .into_par_iter()
            .filter(|&pixel_index| {
                let row = pixel_index / columns;
                let column = pixel_index % columns;
                (row ^ column) & 1 == parity
            })
            .map(|pixel_index| (pixel_index, updated_block(graph, potentials, pixel_index)))
            .collect();
        for (pixel_index, block) in updated {
            self.potentials.set_block(pixel_index, &block);
        }
    }

    fn sweep_serial(&mut self, parity: usize) {
        for pixel_index in 0..self.labeling.nodes().len() {
            let pixel = self.labeling.nodes()[pixel_index];
            if (pixel.row ^ pixel.column) & 1 != parity {
                continue;
            }
            for disparity in self.graph.node_disparities(pixel) {
                process_node(
                    self.graph,
                    &mut self.potentials,
                    DisparityNode { disparity, ..pixel },
                );
            }
        }
    }

    /// Commits the first surviving disparity of every pixel.
    fn best_labeling(&mut self) -> DiffStereoResult<Labeling<'a, T>> {
        for pixel_index in 0..self.labeling.nodes().len() {
            let pixel = self.labeling.nodes()[pixel_index];
            let chosen = self
                .graph
                .node_disparities(pixel)
                .map(|disparity| DisparityNode { disparity, ..pixel })
                .find(|node| self.boolean_graph.node_available(*node))
                .expect("every pixel keeps a surviving disparity after culling");
            self.labeling.set_node_force(chosen)?;
        }
        Ok(self.labeling.clone())
    }
}

impl<'a, T: Color> Solver<'a, T> for DiffusionSolver<'a, T> {
    fn find(&mut self) -> DiffStereoResult<Labeling<'a, T>> {
        let _span = solve_span!("diffusion", self.graph);

        self.potentials.reset();
        let threshold = 1.0 / (8.0 * (self.graph.rows() * self.graph.columns()) as f64);
        let mut rounds = 0usize;
        while !self.is_finished(threshold) {
            if rounds >= self.max_iterations {
                // Restore availability so every pixel keeps a label to read.
                self.boolean_graph.reset();
                round_event!(capped_after = rounds);
                break;
            }
            self.iteration();
            rounds += 1;
            round_event!(round = rounds);
        }
        self.best_labeling()
    }
}

/// Potentials passed between a node and its four neighbor directions.
///
/// One `f64` per `(pixel, disparity, slot)`, flat with per-pixel offsets.
/// The sum of the two facing slots is the reparameterized component of the
/// edge between two nodes.
struct PassedPotentials {
    columns: usize,
    offsets: Vec<usize>,
    data: Vec<f64>,
}

impl PassedPotentials {
    fn new<T: Color>(graph: &DisparityGraph<'_, T>) -> Self {
        let mut offsets = Vec::with_capacity(graph.rows() * graph.columns() + 1);
        let mut total = 0;
        offsets.push(0);
        for pixel in graph.available_nodes() {
            total += graph.node_disparities(pixel).len();
            offsets.push(total);
        }
        Self {
            columns: graph.columns(),
            offsets,
            data: vec![0.0; total * NEIGHBOR_SLOTS],
        }
    }

    fn reset(&mut self) {
        self.data.fill(0.0);
    }

    fn get(&self, node: &DisparityNode, slot: usize) -> f64 {
        self.data[self.index(node, slot)]
    }

    fn add(&mut self, node: &DisparityNode, slot: usize, change: f64) {
        let index = self.index(node, slot);
        self.data[index] += change;
    }

    fn index(&self, node: &DisparityNode, slot: usize) -> usize {
        let pixel = node.row * self.columns + node.column;
        let base = self.offsets[pixel];
        debug_assert!(base + node.disparity < self.offsets[pixel + 1]);
        (base + node.disparity) * NEIGHBOR_SLOTS + slot
    }

    #[cfg(feature = "rayon")]
    fn block(&self, pixel_index: usize) -> &[f64] {
        &self.data[self.pixel_range(pixel_index)]
    }

    #[cfg(feature = "rayon")]
    fn set_block(&mut self, pixel_index: usize, block: &[f64]) {
        let range = self.pixel_range(pixel_index);
        self.data[range].copy_from_slice(block);
    }

    #[cfg(feature = "rayon")]
    fn pixel_range(&self, pixel_index: usize) -> std::ops::Range<usize> {
        self.offsets[pixel_index] * NEIGHBOR_SLOTS..self.offsets[pixel_index + 1] * NEIGHBOR_SLOTS
    }
}

/// Potential slot on `node` that faces `neighbor`.
///
/// Slots are west 0, north 1, east 2, south 3; the two nodes of an edge face
/// each other through complementary slots.
fn slot_toward(node: &DisparityNode, neighbor: &DisparityNode) -> usize {
    debug_assert!(node.row != neighbor.row || node.column != neighbor.column);
    if neighbor.row <= node.row && neighbor.column <= node.column {
        2 * (node.row - neighbor.row) + (node.column - neighbor.column) - 1
    } else {
        2 * (neighbor.row - node.row) + (neighbor.column - node.column) + 1
    }
}

/// Reparameterized component of the edge between two nodes.
fn passed_penalty(
    potentials: &PassedPotentials,
    node: &DisparityNode,
    neighbor: &DisparityNode,
) -> f64 {
    potentials.get(node, slot_toward(node, neighbor))
        + potentials.get(neighbor, slot_toward(neighbor, node))
}

/// Cheapest reparameterized edge from `node` (at its disparity) toward any
/// feasible disparity of `neighbor`. Always finite for a feasible node.
fn min_edge_penalty<T: Color>(
    graph: &DisparityGraph<'_, T>,
    potentials: &PassedPotentials,
    node: DisparityNode,
    neighbor: DisparityNode,
) -> f64 {
    let mut min_penalty = f64::INFINITY;
    for disparity in graph.neighbor_disparities(node, neighbor) {
        let candidate = DisparityNode { disparity, ..neighbor };
        let penalty =
            passed_penalty(potentials, &node, &candidate) + graph.penalty_checked(node, candidate);
        if penalty < min_penalty {
            min_penalty = penalty;
        }
    }
    assert!(
        min_penalty.is_finite(),
        "reparameterized edge weights must stay finite"
    );
    min_penalty
}

/// Diffusion step for one node at one disparity.
///
/// Pulls the cheapest edge weight toward every neighbor out of the node's
/// slots, then pushes the average back, so the minimal outgoing weight in
/// every direction becomes that average.
fn process_node<T: Color>(
    graph: &DisparityGraph<'_, T>,
    potentials: &mut PassedPotentials,
    node: DisparityNode,
) {
    let neighbors = graph.node_neighbors(node, false);
    let share = neighbors.len() as f64;
    let mut node_sum = 0.0;
    for neighbor in &neighbors {
        let best = min_edge_penalty(graph, potentials, node, *neighbor);
        node_sum += best / share;
        potentials.add(&node, slot_toward(&node, neighbor), -best);
    }
    for neighbor in &neighbors {
        potentials.add(&node, slot_toward(&node, neighbor), node_sum);
    }
}

/// Post-sweep potential block of one pixel, computed against the pre-sweep
/// state. Same-colored pixels never read each other's slots, so blocks of a
/// whole sweep can be computed independently and merged afterwards.
#[cfg(feature = "rayon")]
fn updated_block<T: Color>(
    graph: &DisparityGraph<'_, T>,
    potentials: &PassedPotentials,
    pixel_index: usize,
) -> Vec<f64> {
    let pixel = DisparityNode {
        row: pixel_index / graph.columns(),
        column: pixel_index % graph.columns(),
        disparity: 0,
    };
    let mut block = potentials.block(pixel_index).to_vec();
    let neighbors = graph.node_neighbors(pixel, false);
    let share = neighbors.len() as f64;
    for disparity in graph.node_disparities(pixel) {
        let node = DisparityNode { disparity, ..pixel };
        let mut node_sum = 0.0;
        let mut bests = [0.0f64; NEIGHBOR_SLOTS];
        for (index, neighbor) in neighbors.iter().enumerate() {
            let best = min_edge_penalty(graph, potentials, node, *neighbor);
            bests[index] = best;
            node_sum += best / share;
        }
        for (index, neighbor) in neighbors.iter().enumerate() {
            let slot = slot_toward(&node, neighbor);
            block[disparity * NEIGHBOR_SLOTS + slot] += node_sum - bests[index];
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::{slot_toward, PassedPotentials};
    use crate::graph::{DisparityGraph, DisparityNode};
    use crate::grid::ColorGrid;

    fn node(row: usize, column: usize, disparity: usize) -> DisparityNode {
        DisparityNode {
            row,
            column,
            disparity,
        }
    }

    #[test]
    fn slots_face_each_other() {
        let center = node(1, 1, 0);
        let east = node(1, 2, 0);
        let south = node(2, 1, 0);
        let west = node(1, 0, 0);
        let north = node(0, 1, 0);

        assert_eq!(slot_toward(&center, &east), 2);
        assert_eq!(slot_toward(&east, &center), 0);
        assert_eq!(slot_toward(&center, &south), 3);
        assert_eq!(slot_toward(&south, &center), 1);
        assert_eq!(slot_toward(&center, &west), 0);
        assert_eq!(slot_toward(&center, &north), 1);
    }

    #[test]
    fn potentials_start_at_zero_and_accumulate() {
        let left = ColorGrid::<u8>::new(2, 3);
        let right = ColorGrid::<u8>::new(2, 2);
        let graph = DisparityGraph::new(&left, &right).unwrap();
        let mut potentials = PassedPotentials::new(&graph);

        let probe = node(1, 1, 1);
        assert_eq!(potentials.get(&probe, 0), 0.0);
        potentials.add(&probe, 0, 2.5);
        potentials.add(&probe, 0, -1.0);
        assert_eq!(potentials.get(&probe, 0), 1.5);
        potentials.reset();
        assert_eq!(potentials.get(&probe, 0), 0.0);
    }
}
