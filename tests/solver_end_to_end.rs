use diffstereo::{
    BruteForceSolver, ColorGrid, DiffusionSolver, DisparityGraph, DisparityNode, Labeling, Solver,
};

fn node(row: usize, column: usize, disparity: usize) -> DisparityNode {
    DisparityNode {
        row,
        column,
        disparity,
    }
}

fn solve<'a, T: diffstereo::Color>(solver: &mut dyn Solver<'a, T>) -> Labeling<'a, T> {
    solver.find().unwrap()
}

#[test]
fn zero_grids_solve_to_the_trivial_labeling() {
    let left = ColorGrid::<u8>::new(3, 3);
    let right = ColorGrid::<u8>::new(3, 3);
    let graph = DisparityGraph::new(&left, &right).unwrap();

    let mut brute = BruteForceSolver::new(&graph);
    let mut diffusion = DiffusionSolver::new(&graph);

    for labeling in [solve(&mut brute), solve(&mut diffusion)] {
        assert_eq!(labeling.penalty(), 0.0);
        for row in 0..3 {
            for column in 0..3 {
                assert_eq!(labeling.disparity(node(row, column, 0)), 0);
            }
        }
    }
}

#[test]
fn a_bright_dot_shifted_by_one_column_is_recovered() {
    let mut left = ColorGrid::<u8>::new(3, 3);
    let mut right = ColorGrid::<u8>::new(3, 3);
    right.set(1, 0, 0xFF).unwrap();
    left.set(1, 1, 0xFF).unwrap();
    let graph = DisparityGraph::new(&left, &right).unwrap();

    let mut brute = BruteForceSolver::new(&graph);
    let brute_labeling = brute.find().unwrap();
    assert_eq!(brute_labeling.penalty(), 3.0);
    assert_eq!(brute_labeling.disparity(node(1, 0, 0)), 1);

    let mut diffusion = DiffusionSolver::new(&graph);
    let labeling = diffusion.find().unwrap();
    assert_eq!(labeling.penalty(), 3.0);
    assert_eq!(labeling.disparity(node(1, 0, 0)), 1);
    // The last column cannot shift at all.
    for row in 0..3 {
        assert_eq!(labeling.disparity(node(row, 2, 0)), 0);
    }
}

/// Paints a 3x3 blob (0x80 ring, 0xFF center) around the given center cell.
fn paint_blob(grid: &mut ColorGrid<u8>, center_row: usize, center_column: usize) {
    for row in center_row - 1..=center_row + 1 {
        for column in center_column - 1..=center_column + 1 {
            grid.set(row, column, 0x80).unwrap();
        }
    }
    grid.set(center_row, center_column, 0xFF).unwrap();
}

#[test]
fn a_shifted_blob_costs_one_full_height_cut() {
    let mut right = ColorGrid::<u8>::new(5, 5);
    paint_blob(&mut right, 2, 2);

    // The blob sits one column to the right in the left image; the column it
    // vacated keeps the ring value so the background cannot shift along.
    let mut left = ColorGrid::<u8>::new(5, 6);
    paint_blob(&mut left, 2, 3);
    for row in 0..5 {
        left.set(row, 1, 0x80).unwrap();
    }

    let graph = DisparityGraph::new(&left, &right).unwrap();
    let mut diffusion = DiffusionSolver::new(&graph);
    let labeling = diffusion.find().unwrap();

    assert_eq!(labeling.penalty(), 5.0);
    assert_eq!(labeling.disparity(node(2, 1, 0)), 1);
}

#[test]
fn brute_force_matches_exhaustive_enumeration() {
    let mut right = ColorGrid::<u8>::new(2, 2);
    let mut left = ColorGrid::<u8>::new(2, 3);
    right.set(0, 0, 0xFF).unwrap();
    left.set(0, 1, 0xFF).unwrap();
    let graph = DisparityGraph::new(&left, &right).unwrap();

    // Enumerate every feasible labeling of the four pixels directly.
    let pixels = [node(0, 0, 0), node(0, 1, 0), node(1, 0, 0), node(1, 1, 0)];
    let mut best = f64::INFINITY;
    for d00 in graph.node_disparities(pixels[0]) {
        for d01 in graph.node_disparities(pixels[1]) {
            for d10 in graph.node_disparities(pixels[2]) {
                for d11 in graph.node_disparities(pixels[3]) {
                    let chosen = [
                        node(0, 0, d00),
                        node(0, 1, d01),
                        node(1, 0, d10),
                        node(1, 1, d11),
                    ];
                    let pairs = [(0, 1), (0, 2), (1, 3), (2, 3)];
                    if pairs
                        .iter()
                        .any(|&(a, b)| !graph.edge_exists(chosen[a], chosen[b]).unwrap())
                    {
                        continue;
                    }
                    let energy: f64 = pairs
                        .iter()
                        .map(|&(a, b)| graph.penalty(chosen[a], chosen[b]).unwrap())
                        .sum();
                    if energy < best {
                        best = energy;
                    }
                }
            }
        }
    }

    let mut brute = BruteForceSolver::new(&graph);
    let labeling = brute.find().unwrap();
    assert_eq!(labeling.penalty(), best);
    assert_eq!(best, 0.0);
    // The unique optimum shifts every pixel by one.
    for pixel in pixels {
        assert_eq!(labeling.disparity(pixel), 1);
    }
}

#[test]
fn both_solvers_agree_through_the_common_interface() {
    let mut left = ColorGrid::<u8>::new(3, 3);
    let mut right = ColorGrid::<u8>::new(3, 3);
    right.set(1, 0, 0xFF).unwrap();
    left.set(1, 1, 0xFF).unwrap();
    let graph = DisparityGraph::new(&left, &right).unwrap();

    let mut brute = BruteForceSolver::new(&graph);
    let mut diffusion = DiffusionSolver::new(&graph).with_max_iterations(200);
    let solvers: [&mut dyn Solver<'_, u8>; 2] = [&mut brute, &mut diffusion];

    let mut penalties = Vec::new();
    for solver in solvers {
        penalties.push(solve(solver).penalty());
    }
    assert_eq!(penalties[0], penalties[1]);
}
