//! Solver settings and the large-sentence fallback policy.
//!
//! Settings load from TOML; any missing section or field takes its default.
//!
//! ```
//! use sparsemap_factors::adjacency::FixedTree;
//! use sparsemap_factors::config::Settings;
//!
//! let settings = Settings::from_toml_str(r#"
//!     [sparsemap]
//!     max_iter = 20
//!     residual_thr = 1e-4
//!
//!     [fallback]
//!     max_length = 200
//!     structure = "left_to_right"
//! "#).unwrap();
//!
//! assert_eq!(settings.sparsemap.max_iter, 20);
//! assert_eq!(settings.sparsemap.max_active_set_iter, 10);
//! assert_eq!(settings.fallback.structure, FixedTree::LeftToRight);
//! assert!(settings.fallback.applies(201));
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adjacency::FixedTree;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid TOML for [`Settings`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of its admissible range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Options forwarded to the active-set solver.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SparseMapOptions {
    /// Forward-pass iteration cap.
    pub max_iter: usize,
    /// Step size of the quadratic penalty.
    pub eta: f64,
    /// Whether the solver may rescale `eta` between iterations.
    pub adapt_eta: bool,
    /// Primal residual under which the forward pass stops.
    pub residual_thr: f64,
    /// Backward-pass iteration cap; 0 solves the backward system directly.
    pub max_iter_backward: usize,
    /// Absolute tolerance of the backward pass.
    pub atol_thr_backward: f64,
    /// Cap on live configurations per solve.
    pub max_active_set_iter: usize,
}

impl Default for SparseMapOptions {
    fn default() -> Self {
        Self {
            max_iter: 10,
            eta: 1.0,
            adapt_eta: false,
            residual_thr: 1e-6,
            max_iter_backward: 0,
            atol_thr_backward: 1e-6,
            max_active_set_iter: 10,
        }
    }
}

impl SparseMapOptions {
    /// Check every field against its admissible range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "eta must be positive and finite, got {}",
                self.eta
            )));
        }
        for (name, value) in [
            ("residual_thr", self.residual_thr),
            ("atol_thr_backward", self.atol_thr_backward),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.max_iter == 0 {
            return Err(ConfigError::Invalid("max_iter must be at least 1".into()));
        }
        if self.max_active_set_iter == 0 {
            return Err(ConfigError::Invalid(
                "max_active_set_iter must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Prefix used to name experiment artifacts after these options.
    pub fn file_stem(&self) -> String {
        format!(
            "sparsemap_max_iter_{}_thr_{}_bw_{}_atol_{}_",
            self.max_iter, self.residual_thr, self.max_iter_backward, self.atol_thr_backward
        )
    }
}

/// When to skip the solver and emit a fixed tree instead.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackPolicy {
    /// Largest node count (root included) still sent to the solver.
    /// `None` never falls back.
    pub max_length: Option<usize>,
    /// Structure emitted past the cutoff.
    pub structure: FixedTree,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            max_length: Some(385),
            structure: FixedTree::Flat,
        }
    }
}

impl FallbackPolicy {
    /// Policy that always runs the solver.
    pub fn disabled() -> Self {
        Self {
            max_length: None,
            ..Self::default()
        }
    }

    /// Whether a tree over `length` nodes takes the fallback.
    pub fn applies(&self, length: usize) -> bool {
        self.max_length.is_some_and(|max| length > max)
    }
}

/// Everything a tree or sequence layer needs to configure its solves.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Solver options.
    pub sparsemap: SparseMapOptions,
    /// Large-sentence fallback.
    pub fallback: FallbackPolicy,
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, contains invalid TOML, or
    /// holds out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads settings from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses settings from a TOML string and validates them.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the solver options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sparsemap.validate()
    }
}
