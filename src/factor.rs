//! The oracle contract shared by every structure family.
//!
//! An active-set SparseMAP solver only ever talks to a structure through this
//! trait: it asks for the best structure under some potentials, re-scores
//! structures it already holds, turns weighted structures into marginals, and
//! deduplicates them.
//!
//! Implementations must be deterministic and side-effect free: the same
//! potentials always yield the same configuration and value.

use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::index;
use crate::sequence::SequenceFactor;
use crate::tree::TreeFactor;
use crate::tree_turbo::TreeFactorTurbo;

/// Exact MAP oracle over one structure family.
pub trait Factor {
    /// Length of the variable potentials vector (one slot per arc or node-state).
    fn num_variables(&self) -> usize;

    /// Length of the additional potentials vector (one slot per transition).
    fn num_additionals(&self) -> usize;

    /// A blank configuration sized for this topology.
    fn create_configuration(&self) -> Configuration;

    /// Release a configuration. Dropping it has the same effect.
    fn delete_configuration(&self, configuration: Configuration) {
        drop(configuration);
    }

    /// Highest-scoring structure and its value.
    fn maximize(
        &self,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
    ) -> (Configuration, f64);

    /// Score of an arbitrary configuration.
    fn evaluate(
        &self,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
        configuration: &Configuration,
    ) -> f64;

    /// Add `weight` to the posterior slot of every part present in `configuration`.
    fn update_marginals_from_configuration(
        &self,
        configuration: &Configuration,
        weight: f64,
        variable_posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    );

    /// Number of elementary positions on which two configurations agree.
    fn count_common_values(&self, a: &Configuration, b: &Configuration) -> usize;

    /// Exact equality of two configurations.
    fn same_configuration(&self, a: &Configuration, b: &Configuration) -> bool;
}

pub(crate) fn assert_potentials(
    factor: &dyn Factor,
    variable_potentials: &[f64],
    additional_potentials: &[f64],
) {
    assert_eq!(
        variable_potentials.len(),
        factor.num_variables(),
        "variable potentials have length {}, expected {}",
        variable_potentials.len(),
        factor.num_variables()
    );
    assert_eq!(
        additional_potentials.len(),
        factor.num_additionals(),
        "additional potentials have length {}, expected {}",
        additional_potentials.len(),
        factor.num_additionals()
    );
}

pub(crate) fn assert_finite(kind: &str, potentials: &[f64]) {
    if let Some(k) = potentials.iter().position(|p| !p.is_finite()) {
        panic!("{kind} potential {k} is not finite: {}", potentials[k]);
    }
}

/// Declarative description of a factor topology.
///
/// ```
/// use sparsemap_factors::factor::{AnyFactor, Factor, FactorSpec};
///
/// let spec: FactorSpec = toml::from_str(r#"
///     type = "tree_turbo"
///     length = 4
///     projective = true
/// "#).unwrap();
/// let factor = AnyFactor::from_spec(&spec).unwrap();
/// assert_eq!(factor.num_variables(), 9);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactorSpec {
    /// Non-projective tree ([`TreeFactor`]).
    Tree {
        /// Number of nodes, root included.
        length: usize,
        /// Arc list in potential-slot order; the complete canonical set if absent.
        #[serde(default)]
        arcs: Option<Vec<(usize, usize)>>,
    },
    /// Tree with projective/non-projective dispatch ([`TreeFactorTurbo`]).
    TreeTurbo {
        /// Number of nodes, root included.
        length: usize,
        /// Restrict to projective trees.
        #[serde(default)]
        projective: bool,
        /// Arc list in potential-slot order; the complete canonical set if absent.
        #[serde(default)]
        arcs: Option<Vec<(usize, usize)>>,
    },
    /// Linear chain ([`SequenceFactor`]).
    Sequence {
        /// Number of states at each position.
        num_states: Vec<usize>,
    },
}

/// Closed set of structure families behind one [`Factor`] interface.
#[derive(Debug, Clone)]
pub enum AnyFactor {
    /// Non-projective tree.
    Tree(TreeFactor),
    /// Tree with projective/non-projective dispatch.
    TreeTurbo(TreeFactorTurbo),
    /// Linear chain.
    Sequence(SequenceFactor),
}

impl AnyFactor {
    /// Build and validate the factor described by `spec`.
    pub fn from_spec(spec: &FactorSpec) -> index::Result<Self> {
        let factor = match spec {
            FactorSpec::Tree { length, arcs } => match arcs {
                Some(arcs) => TreeFactor::new(*length, arcs)?,
                None => TreeFactor::complete(*length)?,
            }
            .into(),
            FactorSpec::TreeTurbo {
                length,
                projective,
                arcs,
            } => match arcs {
                Some(arcs) => TreeFactorTurbo::new(*projective, *length, arcs)?,
                None => TreeFactorTurbo::complete(*projective, *length)?,
            }
            .into(),
            FactorSpec::Sequence { num_states } => SequenceFactor::new(num_states)?.into(),
        };
        Ok(factor)
    }

    fn inner(&self) -> &dyn Factor {
        match self {
            AnyFactor::Tree(f) => f,
            AnyFactor::TreeTurbo(f) => f,
            AnyFactor::Sequence(f) => f,
        }
    }
}

impl From<TreeFactor> for AnyFactor {
    fn from(f: TreeFactor) -> Self {
        AnyFactor::Tree(f)
    }
}

impl From<TreeFactorTurbo> for AnyFactor {
    fn from(f: TreeFactorTurbo) -> Self {
        AnyFactor::TreeTurbo(f)
    }
}

impl From<SequenceFactor> for AnyFactor {
    fn from(f: SequenceFactor) -> Self {
        AnyFactor::Sequence(f)
    }
}

impl Factor for AnyFactor {
    fn num_variables(&self) -> usize {
        self.inner().num_variables()
    }

    fn num_additionals(&self) -> usize {
        self.inner().num_additionals()
    }

    fn create_configuration(&self) -> Configuration {
        self.inner().create_configuration()
    }

    fn maximize(
        &self,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
    ) -> (Configuration, f64) {
        self.inner()
            .maximize(variable_potentials, additional_potentials)
    }

    fn evaluate(
        &self,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
        configuration: &Configuration,
    ) -> f64 {
        self.inner()
            .evaluate(variable_potentials, additional_potentials, configuration)
    }

    fn update_marginals_from_configuration(
        &self,
        configuration: &Configuration,
        weight: f64,
        variable_posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    ) {
        self.inner().update_marginals_from_configuration(
            configuration,
            weight,
            variable_posteriors,
            additional_posteriors,
        )
    }

    fn count_common_values(&self, a: &Configuration, b: &Configuration) -> usize {
        self.inner().count_common_values(a, b)
    }

    fn same_configuration(&self, a: &Configuration, b: &Configuration) -> bool {
        self.inner().same_configuration(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults_to_complete_arcs() {
        let spec: FactorSpec = toml::from_str(
            r#"
            type = "tree"
            length = 3
            "#,
        )
        .unwrap();
        assert_eq!(
            spec,
            FactorSpec::Tree {
                length: 3,
                arcs: None
            }
        );
        let factor = AnyFactor::from_spec(&spec).unwrap();
        assert_eq!(factor.num_variables(), 4);
        assert_eq!(factor.num_additionals(), 0);
    }

    #[test]
    fn spec_accepts_explicit_arcs_and_sequences() {
        let spec: FactorSpec = toml::from_str(
            r#"
            type = "tree"
            length = 3
            arcs = [[0, 1], [1, 2]]
            "#,
        )
        .unwrap();
        let factor = AnyFactor::from_spec(&spec).unwrap();
        let (c, v) = factor.maximize(&[1.0, 2.0], &[]);
        assert_eq!(c, Configuration::Heads(vec![None, Some(0), Some(1)]));
        assert_eq!(v, 3.0);

        let spec = FactorSpec::Sequence {
            num_states: vec![2, 2],
        };
        let factor = AnyFactor::from_spec(&spec).unwrap();
        assert!(matches!(factor, AnyFactor::Sequence(_)));
        assert_eq!(factor.num_variables(), 4);
        assert_eq!(factor.num_additionals(), 8);
    }

    #[test]
    fn spec_surfaces_topology_errors() {
        let spec = FactorSpec::Tree {
            length: 3,
            arcs: Some(vec![(0, 1)]),
        };
        assert_eq!(
            AnyFactor::from_spec(&spec).unwrap_err(),
            index::Error::Unreachable { node: 2 }
        );
        let spec = FactorSpec::Sequence {
            num_states: vec![0],
        };
        assert!(AnyFactor::from_spec(&spec).is_err());
    }

    #[test]
    fn dispatch_is_transparent() {
        let tree = TreeFactor::complete(4).unwrap();
        let any = AnyFactor::from(tree.clone());
        let pots: Vec<f64> = (0..tree.num_variables()).map(|k| (k as f64 * 0.37).sin()).collect();
        assert_eq!(any.maximize(&pots, &[]), tree.maximize(&pots, &[]));
        let c = any.create_configuration();
        assert_eq!(c, Configuration::Heads(vec![None; 4]));
        any.delete_configuration(c);
    }
}
