//! Maximum spanning arborescence oracle.
//!
//! Parts are arcs `h -> m`; a configuration is a head array rooted at node 0.
//! `maximize` runs [`chu_liu_edmonds`], so the returned tree is an exact
//! vertex of the arborescence polytope. Trees carry no additional potentials.

use tracing::{debug, trace};

use crate::chu_liu_edmonds::chu_liu_edmonds;
use crate::configuration::Configuration;
use crate::factor::{assert_finite, assert_potentials, Factor};
use crate::index::{self, ArcIndex};

/// Non-projective dependency tree factor.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeFactor {
    index: ArcIndex,
}

impl TreeFactor {
    /// Factor over `length` nodes (root included) restricted to `arcs`.
    ///
    /// Potential slot `k` scores `arcs[k]`.
    pub fn new(length: usize, arcs: &[(usize, usize)]) -> index::Result<Self> {
        let index = ArcIndex::new(length, arcs)?;
        debug!(length, num_arcs = index.num_arcs(), "initialized tree factor");
        Ok(Self { index })
    }

    /// Factor over the complete canonical arc set.
    pub fn complete(length: usize) -> index::Result<Self> {
        Self::new(length, &index::complete_arcs(length))
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

fn assert_heads<'a>(index: &ArcIndex, configuration: &'a Configuration) -> &'a [Option<usize>] {
    let heads = configuration.expect_heads();
    assert_eq!(
        heads.len(),
        index.length(),
        "configuration has {} nodes, expected {}",
        heads.len(),
        index.length()
    );
    heads
}

pub(crate) fn evaluate_heads(
    index: &ArcIndex,
    potentials: &[f64],
    configuration: &Configuration,
) -> f64 {
    index.score_heads(potentials, assert_heads(index, configuration))
}

pub(crate) fn add_heads_posterior(
    index: &ArcIndex,
    configuration: &Configuration,
    weight: f64,
    posteriors: &mut [f64],
) {
    let heads = assert_heads(index, configuration);
    for (m, h) in heads.iter().enumerate().skip(1) {
        match h {
            Some(h) => posteriors[index.index(*h, m)] += weight,
            None => panic!("node {m} has no head"),
        }
    }
}

pub(crate) fn count_common_heads(index: &ArcIndex, a: &Configuration, b: &Configuration) -> usize {
    let (a, b) = (assert_heads(index, a), assert_heads(index, b));
    a.iter()
        .zip(b)
        .skip(1)
        .filter(|(x, y)| x == y)
        .count()
}

pub(crate) fn same_heads(index: &ArcIndex, a: &Configuration, b: &Configuration) -> bool {
    let (a, b) = (assert_heads(index, a), assert_heads(index, b));
    a[1..] == b[1..]
}

impl Factor for TreeFactor {
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
        let heads = chu_liu_edmonds(&scores, n);
        let value = self.index.score_heads(variable_potentials, &heads);
        trace!(length = n, value, "chu-liu-edmonds");
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
