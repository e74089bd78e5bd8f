//! Tree oracle with a projectivity switch.
//!
//! Same parts and configurations as [`crate::tree::TreeFactor`]; `maximize`
//! runs [`eisner`] when the factor was built projective and
//! [`chu_liu_edmonds`] otherwise.

use tracing::{debug, trace};

use crate::chu_liu_edmonds::chu_liu_edmonds;
use crate::configuration::Configuration;
use crate::eisner::eisner;
use crate::factor::{assert_finite, assert_potentials, Factor};
use crate::index::{self, ArcIndex};
use crate::tree::{add_heads_posterior, count_common_heads, evaluate_heads, same_heads};

/// Dependency tree factor, projective or not.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeFactorTurbo {
    projective: bool,
    index: ArcIndex,
}

impl TreeFactorTurbo {
    /// Factor over `length` nodes (root included) restricted to `arcs`.
    ///
    /// With `projective` set, the arc set must admit at least one projective
    /// tree.
    pub fn new(projective: bool, length: usize, arcs: &[(usize, usize)]) -> index::Result<Self> {
        let index = ArcIndex::new(length, arcs)?;
        if projective && length > 1 {
            let zeros = vec![0.0; index.num_arcs()];
            let (_, value) = eisner(&index.score_matrix(&zeros), length);
            if value == f64::NEG_INFINITY {
                return Err(index::Error::NoProjectiveTree);
            }
        }
        debug!(
            length,
            num_arcs = index.num_arcs(),
            projective,
            "initialized turbo tree factor"
        );
        Ok(Self { projective, index })
    }

    /// Factor over the complete canonical arc set.
    pub fn complete(projective: bool, length: usize) -> index::Result<Self> {
        Self::new(projective, length, &index::complete_arcs(length))
    }

    /// Whether decoding is restricted to projective trees.
    pub fn projective(&self) -> bool {
        self.projective
    }

    /// Number of nodes, root included.
    pub fn length(&self) -> usize {
        self.index.length()
    }

    /// The arc index.
    pub fn arc_index(&self) -> &ArcIndex {
        &self.index
    }
}

impl Factor for TreeFactorTurbo {
    fn num_variables(&self) -> usize {
        self.index.num_arcs()
    }

    fn num_additionals(&self) -> usize {
        0
    }

    fn create_configuration(&self) -> Configuration {
        Configuration::Heads(vec![None; self.index.length()])
    }

    fn maximize(
        &self,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
    ) -> (Configuration, f64) {
        assert_potentials(self, variable_potentials, additional_potentials);
        let n = self.index.length();
        if n == 1 {
            return (self.create_configuration(), 0.0);
        }
        assert_finite("arc", variable_potentials);

        let scores = self.index.score_matrix(variable_potentials);
        let heads = if self.projective {
            eisner(&scores, n).0
        } else {
            chu_liu_edmonds(&scores, n)
        };
        let value = self.index.score_heads(variable_potentials, &heads);
        trace!(length = n, projective = self.projective, value, "decoded tree");
        (Configuration::Heads(heads), value)
    }

    fn evaluate(
        &self,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
        configuration: &Configuration,
    ) -> f64 {
        assert_potentials(self, variable_potentials, additional_potentials);
        evaluate_heads(&self.index, variable_potentials, configuration)
    }

    fn update_marginals_from_configuration(
        &self,
        configuration: &Configuration,
        weight: f64,
        variable_posteriors: &mut [f64],
        _additional_posteriors: &mut [f64],
    ) {
        add_heads_posterior(&self.index, configuration, weight, variable_posteriors);
    }

    fn count_common_values(&self, a: &Configuration, b: &Configuration) -> usize {
        count_common_heads(&self.index, a, b)
    }

    fn same_configuration(&self, a: &Configuration, b: &Configuration) -> bool {
        same_heads(&self.index, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eisner::is_projective;
    use crate::testing::{all_arborescences, is_arborescence};
    use crate::tree::TreeFactor;
    use proptest::prelude::*;

    #[test]
    fn single_node_returns_sentinel() {
        for projective in [false, true] {
            let factor = TreeFactorTurbo::complete(projective, 1).unwrap();
            let (c, value) = factor.maximize(&[], &[]);
            assert_eq!(c, Configuration::Heads(vec![None]));
            assert_eq!(value, 0.0);
        }
    }

    #[test]
    fn projective_flag_changes_the_decoder() {
        // Best tree 0->1, 0->2, 1->3 has crossing arcs.
        let length = 4;
        let mut pots = vec![0.0; 9];
        let nonproj = TreeFactorTurbo::complete(false, length).unwrap();
        for (h, m) in [(0, 1), (0, 2), (1, 3)] {
            pots[nonproj.arc_index().index(h, m)] = 10.0;
        }

        let (c, v) = nonproj.maximize(&pots, &[]);
        assert_eq!(c, Configuration::Heads(vec![None, Some(0), Some(0), Some(1)]));
        assert_eq!(v, 30.0);

        let proj = TreeFactorTurbo::complete(true, length).unwrap();
        let (c, pv) = proj.maximize(&pots, &[]);
        let heads = c.heads().unwrap();
        assert!(is_projective(heads));
        assert!(pv < v);
        assert_eq!(proj.evaluate(&pots, &[], &c), pv);
    }

    #[test]
    fn rejects_arc_sets_without_projective_trees() {
        // The only tree is 0->2, 2->1, 1->3, and 1->3 spans 2 without dominating it.
        let arcs = [(0, 2), (2, 1), (1, 3)];
        assert!(TreeFactorTurbo::new(false, 4, &arcs).is_ok());
        assert_eq!(
            TreeFactorTurbo::new(true, 4, &arcs),
            Err(index::Error::NoProjectiveTree)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn non_projective_mode_agrees_with_tree_factor(
            length in 2usize..8,
            raw in prop::collection::vec(-10.0f64..10.0, 49)
        ) {
            let turbo = TreeFactorTurbo::complete(false, length).unwrap();
            let tree = TreeFactor::complete(length).unwrap();
            let pots = &raw[..turbo.num_variables()];
            prop_assert_eq!(turbo.maximize(pots, &[]), tree.maximize(pots, &[]));
        }

        #[test]
        fn projective_mode_is_optimal_among_projective_trees(
            length in 2usize..8,
            raw in prop::collection::vec(-10.0f64..10.0, 36)
        ) {
            let factor = TreeFactorTurbo::complete(true, length).unwrap();
            let pots = &raw[..factor.num_variables()];
            let (c, value) = factor.maximize(pots, &[]);
            let heads = c.heads().unwrap();
            prop_assert!(is_arborescence(heads));
            prop_assert!(is_projective(heads));
            prop_assert_eq!(factor.evaluate(pots, &[], &c), value);

            let best = all_arborescences(length)
                .iter()
                .filter(|h| is_projective(h))
                .map(|h| factor.arc_index().score_heads(pots, h))
                .fold(f64::NEG_INFINITY, f64::max);
            prop_assert!((value - best).abs() < 1e-9);
        }
    }
}
