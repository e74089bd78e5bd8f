//! Exact MAP oracles for SparseMAP structured attention.
//!
//! SparseMAP replaces a softmax over structures with a sparse convex
//! combination of a few structures. The solver that finds that combination
//! only ever talks to a structure family through a [`Factor`]: find the best
//! structure under some potentials, score a given structure, and credit a
//! structure's parts with a weight. This crate provides those oracles for
//! three families:
//!
//! - [`TreeFactor`]: non-projective dependency trees (Chu–Liu–Edmonds).
//! - [`TreeFactorTurbo`]: the same trees, optionally restricted to projective
//!   ones (Eisner).
//! - [`SequenceFactor`]: label chains with start and stop transitions (Viterbi).
//!
//! Around them sit the pieces a tree or tagging layer needs: potential
//! layouts ([`index`]), an active-set arena ([`active_set`]), the solver seam
//! ([`solver`]), adjacency conversion with the large-sentence fallback
//! ([`adjacency`]) and TOML settings ([`config`]).
//!
//! Public invariants (must not change):
//! - Potentials and posteriors are flat `f64` slices in a fixed layout:
//!   arcs `for m in 1..n, for h in 0..n, h != m`; sequence transitions per
//!   position `0..=length` with singleton virtual states at both ends.
//! - Oracles are exact and deterministic; ties break towards the lowest index.
//! - Posterior updates only ever add into zero-initialised accumulators.

pub mod active_set;
pub mod adjacency;
pub mod chu_liu_edmonds;
pub mod config;
pub mod configuration;
pub mod eisner;
pub mod factor;
pub mod index;
pub mod sequence;
pub mod solver;
pub mod tree;
pub mod tree_turbo;

#[cfg(test)]
mod testing;

pub use adjacency::{FixedTree, TreeAdjacency};
pub use config::{FallbackPolicy, Settings, SparseMapOptions};
pub use configuration::Configuration;
pub use factor::{AnyFactor, Factor, FactorSpec};
pub use sequence::SequenceFactor;
pub use solver::{MapSolver, Marginals, SparseMapSolver};
pub use tree::TreeFactor;
pub use tree_turbo::TreeFactorTurbo;
