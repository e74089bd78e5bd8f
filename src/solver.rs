//! The solver side of the oracle contract.
//!
//! A SparseMAP solver takes a factor and its potentials and returns sparse
//! marginals: a convex combination of a few structures, expressed as
//! per-part posteriors. The active-set quadratic program lives outside this
//! crate; [`SparseMapSolver`] is the seam it plugs into.
//!
//! [`MapSolver`] is the degenerate member of the family that keeps a single
//! vertex (the MAP structure) with weight one. It is what SparseMAP returns
//! when the regularizer vanishes, and it is enough to drive the adjacency
//! builders end to end.

use tracing::debug;

use crate::active_set::{self, ActiveSet};
use crate::config::SparseMapOptions;
use crate::factor::{assert_potentials, Factor};

/// Errors surfaced by a solve.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The options failed validation.
    #[error("invalid solver options: {0}")]
    InvalidOptions(String),
    /// The active set rejected a configuration.
    #[error(transparent)]
    ActiveSet(#[from] active_set::Error),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Posterior mass per part, laid out like the factor's potentials.
#[derive(Debug, Clone, PartialEq)]
pub struct Marginals {
    /// One entry per variable potential.
    pub variables: Vec<f64>,
    /// One entry per additional potential.
    pub additionals: Vec<f64>,
}

impl Marginals {
    /// Zero accumulators sized for `factor`.
    pub fn zeros(factor: &dyn Factor) -> Self {
        Self {
            variables: vec![0.0; factor.num_variables()],
            additionals: vec![0.0; factor.num_additionals()],
        }
    }
}

/// Something that turns potentials into sparse marginals.
pub trait SparseMapSolver {
    /// Solve for the marginals of `factor` under the given potentials.
    ///
    /// Implementations reject options that fail
    /// [`SparseMapOptions::validate`] with [`Error::InvalidOptions`].
    fn solve(
        &mut self,
        factor: &dyn Factor,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
        options: &SparseMapOptions,
    ) -> Result<Marginals>;
}

/// Single-vertex solver: the MAP structure with weight one.
#[derive(Debug, Clone, Default)]
pub struct MapSolver {
    active: Option<ActiveSet>,
}

impl MapSolver {
    /// Fresh solver with no retained state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Active set left behind by the last solve.
    pub fn active_set(&self) -> Option<&ActiveSet> {
        self.active.as_ref()
    }
}

impl SparseMapSolver for MapSolver {
    fn solve(
        &mut self,
        factor: &dyn Factor,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
        options: &SparseMapOptions,
    ) -> Result<Marginals> {
        assert_potentials(factor, variable_potentials, additional_potentials);
        options
            .validate()
            .map_err(|e| Error::InvalidOptions(e.to_string()))?;

        let mut active = match self.active.take() {
            Some(mut set) if set.capacity() == options.max_active_set_iter => {
                set.clear();
                set
            }
            _ => ActiveSet::with_capacity(options.max_active_set_iter),
        };

        let (configuration, value) = factor.maximize(variable_potentials, additional_potentials);
        active.insert(configuration, 1.0)?;
        let marginals = active.marginals(factor);

        debug!(
            event = "map_solve",
            num_variables = factor.num_variables(),
            num_additionals = factor.num_additionals(),
            value,
        );
        self.active = Some(active);
        Ok(marginals)
    }
}
