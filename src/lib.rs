//! DiffStereo computes dense stereo disparity for a rectified image pair.
//!
//! Every pixel of the right image receives a non-negative horizontal offset
//! toward its counterpart in the left image. The assignment approximately
//! minimizes a pairwise energy (photoconsistency plus squared
//! disparity-difference smoothness) under the row ordering constraint, using
//! min-sum diffusion with an arc-consistency termination check. A
//! brute-force solver doubles as a ground-truth oracle for tiny instances.
//!
//! Image decoding, CLIs, and visualization are out of scope: the crate takes
//! two [`ColorGrid`]s, builds a [`DisparityGraph`], and hands back a
//! [`Labeling`] through the [`Solver`] interface.

pub mod graph;
pub mod grid;
pub mod labeling;
pub mod solver;
pub mod util;

mod trace;

pub use graph::{DisparityGraph, DisparityNode};
pub use grid::{Color, ColorGrid};
pub use labeling::Labeling;
pub use solver::{BooleanGraph, BruteForceSolver, DiffusionSolver, Solver};
pub use util::{DiffStereoError, DiffStereoResult};
