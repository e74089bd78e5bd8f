//! End-to-end example: a dependency tree as an attention matrix.
//!
//! An arc scorer produces `scores[(h, m)]` for a four-word sentence. The
//! tree adjacency builder hands those scores to a solver and returns the
//! marginal adjacency, which a graph layer would use in place of softmax
//! attention. With the single-vertex `MapSolver` the result is the 0/1
//! adjacency of the best tree.

use ndarray::array;
use sparsemap_factors::{
    Factor, FallbackPolicy, FixedTree, MapSolver, SparseMapOptions, TreeAdjacency,
    TreeFactorTurbo,
};

fn main() {
    // Node 0 is the root; "saw" (2) is the natural head of the sentence.
    let scores = array![
        [0.0, 0.5, 4.0, 0.2, 0.1],
        [0.0, 0.0, 0.3, 0.1, 0.0],
        [0.0, 3.0, 0.0, 1.0, 2.5],
        [0.0, 0.2, 0.4, 0.0, 2.0],
        [0.0, 0.1, 0.3, 0.6, 0.0],
    ];

    let builder = TreeAdjacency::default();
    let adj = builder.make_adj(scores.view(), &mut MapSolver::new()).unwrap();
    println!("marginal adjacency (rows = heads, cols = modifiers):\n{adj}");

    // The same scores decoded with and without the projectivity constraint.
    let arcs = sparsemap_factors::adjacency::adj_to_arcs(scores.view()).unwrap();
    for projective in [false, true] {
        let factor = TreeFactorTurbo::complete(projective, 5).unwrap();
        let (tree, value) = factor.maximize(&arcs, &[]);
        println!("projective={projective}: heads {tree} value {value}");
    }

    // Past the cutoff the solver is skipped and a fixed tree comes back.
    let short_cutoff = TreeAdjacency::new(
        SparseMapOptions::default(),
        FallbackPolicy {
            max_length: Some(4),
            structure: FixedTree::LeftToRight,
        },
    )
    .unwrap();
    let adj = short_cutoff
        .make_adj(scores.view(), &mut MapSolver::new())
        .unwrap();
    println!("fallback adjacency:\n{adj}");
}
