//! Dependency trees as soft adjacency matrices.
//!
//! Tree layers upstream of this crate think in `n x n` matrices indexed
//! `adj[(head, modifier)]`, with node 0 the root. Factors think in flat arc
//! vectors in canonical order (`for m in 1..n, for h in 0..n, h != m`).
//! [`arcs_to_adj`] and [`adj_to_arcs`] convert between the two; the
//! diagonal and column 0 carry no arc and are zero.
//!
//! [`TreeAdjacency`] is the whole pipeline: scores in, sparse tree marginals
//! out, with sentences past the [`FallbackPolicy`] cutoff mapped to a
//! [`FixedTree`] without calling the solver.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{FallbackPolicy, Settings, SparseMapOptions};
use crate::index;
use crate::solver::{self, SparseMapSolver};
use crate::tree::TreeFactor;

/// Errors for adjacency construction.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Arc vector length does not match the matrix size.
    #[error("arc vector has {got} entries, expected {expected} for the matrix size")]
    ArcVectorLength {
        /// `(size - 1)^2`, one arc per ordered pair of a head and a word.
        expected: usize,
        /// Length received.
        got: usize,
    },
    /// Score matrices must be square.
    #[error("adjacency matrix must be square, got {rows}x{cols}")]
    NotSquare {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },
    /// A custom head list has the wrong number of words.
    #[error("custom tree has {got} heads, expected {expected}")]
    HeadsLength {
        /// Words in the sentence (root excluded).
        expected: usize,
        /// Heads supplied.
        got: usize,
    },
    /// Solver options failed validation.
    #[error("invalid solver options: {0}")]
    InvalidOptions(String),
    /// A custom head list is not a tree rooted at node 0.
    #[error("custom heads do not form a tree rooted at 0: {0:?}")]
    NotATree(Vec<usize>),
    /// Topology could not be built.
    #[error(transparent)]
    Index(#[from] index::Error),
    /// The solver failed.
    #[error(transparent)]
    Solver(#[from] solver::Error),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Scatter a canonical arc vector into an adjacency matrix.
pub fn arcs_to_adj(arcs: &[f64], size: usize) -> Result<Array2<f64>> {
    let words = size.saturating_sub(1);
    let expected = words * words;
    if arcs.len() != expected {
        return Err(Error::ArcVectorLength {
            expected,
            got: arcs.len(),
        });
    }
    let mut adj = Array2::zeros((size, size));
    let mut k = 0;
    for m in 1..size {
        for h in 0..size {
            if h != m {
                adj[(h, m)] = arcs[k];
                k += 1;
            }
        }
    }
    Ok(adj)
}

/// Gather the arc entries of an adjacency matrix in canonical order.
pub fn adj_to_arcs(adj: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
    let (rows, cols) = adj.dim();
    if rows != cols {
        return Err(Error::NotSquare { rows, cols });
    }
    let words = rows.saturating_sub(1);
    let mut arcs = Vec::with_capacity(words * words);
    for m in 1..rows {
        for h in 0..rows {
            if h != m {
                arcs.push(adj[(h, m)]);
            }
        }
    }
    Ok(arcs)
}

/// A tree that does not depend on the scores.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedTree {
    /// Every word attaches to the root.
    #[default]
    Flat,
    /// Word `k` attaches to word `k + 1`; the last word attaches to the root.
    LeftToRight,
    /// Explicit heads for words `1..n`, root excluded.
    Custom(Vec<usize>),
}

impl FixedTree {
    /// Head array over `length` nodes, `heads[0] == None`.
    pub fn heads(&self, length: usize) -> Result<Vec<Option<usize>>> {
        if length == 0 {
            return Err(index::Error::EmptyTree.into());
        }
        let words = length - 1;
        let mut heads = Vec::with_capacity(length);
        heads.push(None);
        match self {
            FixedTree::Flat => heads.extend((0..words).map(|_| Some(0))),
            FixedTree::LeftToRight => {
                heads.extend((1..words).map(|k| Some(k + 1)));
                if words > 0 {
                    heads.push(Some(0));
                }
            }
            FixedTree::Custom(custom) => {
                if custom.len() != words {
                    return Err(Error::HeadsLength {
                        expected: words,
                        got: custom.len(),
                    });
                }
                heads.extend(custom.iter().map(|&h| Some(h)));
                if !is_rooted_tree(&heads) {
                    return Err(Error::NotATree(custom.clone()));
                }
            }
        }
        Ok(heads)
    }
}

fn is_rooted_tree(heads: &[Option<usize>]) -> bool {
    let n = heads.len();
    (1..n).all(|start| {
        let mut node = start;
        for _ in 0..n {
            match heads[node] {
                Some(0) => return true,
                Some(h) if h < n && h != node => node = h,
                _ => return false,
            }
        }
        false
    })
}

/// 0/1 adjacency of a head array.
pub fn fixed_adjacency(heads: &[Option<usize>]) -> Array2<f64> {
    let n = heads.len();
    let mut adj = Array2::zeros((n, n));
    for (m, h) in heads.iter().enumerate().skip(1) {
        if let Some(h) = *h {
            adj[(h, m)] = 1.0;
        }
    }
    adj
}

/// Arc scores to sparse tree marginals, as an adjacency matrix.
///
/// Options are validated once, at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeAdjacency {
    options: SparseMapOptions,
    fallback: FallbackPolicy,
}

impl TreeAdjacency {
    /// Builder over explicit options and policy.
    pub fn new(options: SparseMapOptions, fallback: FallbackPolicy) -> Result<Self> {
        options
            .validate()
            .map_err(|e| Error::InvalidOptions(e.to_string()))?;
        Ok(Self { options, fallback })
    }

    /// Builder over loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.sparsemap.clone(), settings.fallback.clone())
    }

    /// Options handed to the solver.
    pub fn options(&self) -> &SparseMapOptions {
        &self.options
    }

    /// Large-sentence cutoff.
    pub fn fallback(&self) -> &FallbackPolicy {
        &self.fallback
    }

    /// Marginal adjacency for an `n x n` score matrix (`scores[(h, m)]`).
    ///
    /// Entries outside the canonical arc set (diagonal, column 0) are
    /// ignored on input and zero on output.
    pub fn make_adj<S: SparseMapSolver + ?Sized>(
        &self,
        scores: ArrayView2<'_, f64>,
        solver: &mut S,
    ) -> Result<Array2<f64>> {
        let arcs = adj_to_arcs(scores)?;
        let n = scores.nrows();
        if n == 0 {
            return Err(index::Error::EmptyTree.into());
        }
        if n == 1 {
            return Ok(Array2::zeros((1, 1)));
        }
        if self.fallback.applies(n) {
            info!(
                event = "tree_fallback",
                length = n,
                max_length = ?self.fallback.max_length,
                structure = ?self.fallback.structure,
            );
            return Ok(fixed_adjacency(&self.fallback.structure.heads(n)?));
        }

        let factor = TreeFactor::complete(n)?;
        let marginals = solver.solve(&factor, &arcs, &[], &self.options)?;
        debug!(event = "tree_adjacency", length = n, num_arcs = arcs.len());
        arcs_to_adj(&marginals.variables, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::Factor;
    use crate::solver::{MapSolver, Marginals};
    use ndarray::array;
    use proptest::prelude::*;

    struct MustNotSolve;

    impl SparseMapSolver for MustNotSolve {
        fn solve(
            &mut self,
            _: &dyn Factor,
            _: &[f64],
            _: &[f64],
            _: &SparseMapOptions,
        ) -> solver::Result<Marginals> {
            panic!("fallback must not reach the solver");
        }
    }

    #[test]
    fn arcs_follow_the_canonical_layout() {
        // 0->1, 2->1, 0->2, 1->2
        let adj = arcs_to_adj(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
        assert_eq!(
            adj,
            array![[0.0, 1.0, 3.0], [0.0, 0.0, 4.0], [0.0, 2.0, 0.0]]
        );
        assert_eq!(adj_to_arcs(adj.view()).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn layout_errors() {
        assert_eq!(
            arcs_to_adj(&[1.0], 3),
            Err(Error::ArcVectorLength { expected: 4, got: 1 })
        );
        assert_eq!(
            arcs_to_adj(&[0.0; 6], 3),
            Err(Error::ArcVectorLength { expected: 4, got: 6 })
        );
        let rect = Array2::<f64>::zeros((2, 3));
        assert_eq!(
            adj_to_arcs(rect.view()),
            Err(Error::NotSquare { rows: 2, cols: 3 })
        );
        assert_eq!(arcs_to_adj(&[], 1).unwrap(), Array2::<f64>::zeros((1, 1)));
    }

    #[test]
    fn arc_vectors_match_the_complete_topology() {
        for size in 1..7 {
            let arcs = index::complete_arcs(size);
            let values: Vec<f64> = (0..arcs.len()).map(|k| k as f64 + 1.0).collect();
            let adj = arcs_to_adj(&values, size).unwrap();
            for (k, &(h, m)) in arcs.iter().enumerate() {
                assert_eq!(adj[(h, m)], values[k]);
            }
            assert_eq!(adj_to_arcs(adj.view()).unwrap(), values);
        }
    }

    #[test]
    fn fixed_tree_heads() {
        assert_eq!(
            FixedTree::Flat.heads(4).unwrap(),
            vec![None, Some(0), Some(0), Some(0)]
        );
        assert_eq!(
            FixedTree::LeftToRight.heads(4).unwrap(),
            vec![None, Some(2), Some(3), Some(0)]
        );
        assert_eq!(FixedTree::LeftToRight.heads(1).unwrap(), vec![None]);
        assert_eq!(
            FixedTree::Custom(vec![2, 0]).heads(3).unwrap(),
            vec![None, Some(2), Some(0)]
        );
    }

    #[test]
    fn invalid_custom_trees_are_rejected() {
        assert_eq!(
            FixedTree::Custom(vec![0]).heads(3),
            Err(Error::HeadsLength { expected: 2, got: 1 })
        );
        assert_eq!(
            FixedTree::Custom(vec![2, 1]).heads(3),
            Err(Error::NotATree(vec![2, 1]))
        );
        assert_eq!(
            FixedTree::Custom(vec![1, 0]).heads(3),
            Err(Error::NotATree(vec![1, 0]))
        );
        assert_eq!(
            FixedTree::Flat.heads(0),
            Err(Error::Index(index::Error::EmptyTree))
        );
    }

    #[test]
    fn fixed_adjacency_marks_each_word_once() {
        let adj = fixed_adjacency(&FixedTree::LeftToRight.heads(4).unwrap());
        assert_eq!(adj.sum(), 3.0);
        assert_eq!(adj[(2, 1)], 1.0);
        assert_eq!(adj[(3, 2)], 1.0);
        assert_eq!(adj[(0, 3)], 1.0);
    }

    #[test]
    fn map_adjacency_is_the_argmax_tree() {
        let scores = array![
            [0.0, 5.0, 0.0, 0.0],
            [0.0, 0.0, 4.0, 0.0],
            [0.0, 0.0, 0.0, 3.0],
            [0.0, 1.0, 0.0, 0.0],
        ];
        let builder = TreeAdjacency::default();
        let adj = builder.make_adj(scores.view(), &mut MapSolver::new()).unwrap();
        assert_eq!(adj, fixed_adjacency(&[None, Some(0), Some(1), Some(2)]));
    }

    #[test]
    fn long_sentences_take_the_fallback() {
        let builder = TreeAdjacency::new(
            SparseMapOptions::default(),
            FallbackPolicy {
                max_length: Some(3),
                structure: FixedTree::LeftToRight,
            },
        )
        .unwrap();
        let scores = Array2::from_elem((4, 4), 1.0);
        let adj = builder.make_adj(scores.view(), &mut MustNotSolve).unwrap();
        assert_eq!(adj, fixed_adjacency(&FixedTree::LeftToRight.heads(4).unwrap()));

        // At the cutoff the solver still runs.
        let scores = Array2::from_elem((3, 3), 1.0);
        let adj = builder.make_adj(scores.view(), &mut MapSolver::new()).unwrap();
        assert_eq!(adj.sum(), 2.0);
    }

    #[test]
    fn invalid_options_are_rejected_at_construction() {
        let options = SparseMapOptions {
            eta: -1.0,
            ..SparseMapOptions::default()
        };
        let err = TreeAdjacency::new(options, FallbackPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)), "{err}");

        let settings = Settings::default();
        let builder = TreeAdjacency::from_settings(&settings).unwrap();
        assert_eq!(builder.options(), &settings.sparsemap);
        assert_eq!(builder.fallback(), &settings.fallback);
    }

    #[test]
    fn degenerate_sizes() {
        let builder = TreeAdjacency::default();
        let one = Array2::from_elem((1, 1), 7.0);
        assert_eq!(
            builder.make_adj(one.view(), &mut MustNotSolve).unwrap(),
            Array2::<f64>::zeros((1, 1))
        );
        let empty = Array2::<f64>::zeros((0, 0));
        assert_eq!(
            builder.make_adj(empty.view(), &mut MustNotSolve),
            Err(Error::Index(index::Error::EmptyTree))
        );
    }

    proptest! {
        #[test]
        fn map_adjacency_has_one_head_per_word(
            n in 2usize..8,
            raw in prop::collection::vec(-5.0f64..5.0, 64)
        ) {
            let scores = Array2::from_shape_fn((n, n), |(h, m)| raw[h * 8 + m]);
            let adj = TreeAdjacency::default()
                .make_adj(scores.view(), &mut MapSolver::new())
                .unwrap();
            for m in 0..n {
                let col: f64 = adj.column(m).sum();
                prop_assert_eq!(col, if m == 0 { 0.0 } else { 1.0 });
                prop_assert_eq!(adj[(m, m)], 0.0);
            }
        }
    }
}
