//! Owned representation of one concrete discrete structure.
//!
//! A configuration is what an oracle hands back from `maximize` and what the
//! active-set solver keeps around as a vertex of the marginal polytope. It is a
//! plain owned value: dropping it releases it, so there is no separate delete
//! call to forget.

use std::fmt;

/// One instantiation of a structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Configuration {
    /// Dependency tree as a head array over `length` nodes.
    ///
    /// `heads[0]` is the root slot and is always `None`; for `m >= 1`,
    /// `heads[m]` is the parent of node `m`. A blank configuration has every
    /// slot set to `None`.
    Heads(Vec<Option<usize>>),
    /// Label sequence: `states[i]` is the state at position `i`.
    States(Vec<usize>),
}

impl Configuration {
    /// Number of slots (nodes including the root, or sequence positions).
    pub fn len(&self) -> usize {
        match self {
            Configuration::Heads(h) => h.len(),
            Configuration::States(s) => s.len(),
        }
    }

    /// Whether the configuration has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Head array, if this is a tree configuration.
    pub fn heads(&self) -> Option<&[Option<usize>]> {
        match self {
            Configuration::Heads(h) => Some(h),
            Configuration::States(_) => None,
        }
    }

    /// State array, if this is a sequence configuration.
    pub fn states(&self) -> Option<&[usize]> {
        match self {
            Configuration::States(s) => Some(s),
            Configuration::Heads(_) => None,
        }
    }

    /// Head array; panics on a sequence configuration.
    pub(crate) fn expect_heads(&self) -> &[Option<usize>] {
        match self {
            Configuration::Heads(h) => h,
            Configuration::States(_) => panic!("expected a tree configuration, got a sequence"),
        }
    }

    /// State array; panics on a tree configuration.
    pub(crate) fn expect_states(&self) -> &[usize] {
        match self {
            Configuration::States(s) => s,
            Configuration::Heads(_) => panic!("expected a sequence configuration, got a tree"),
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Configuration::Heads(heads) => {
                for (k, h) in heads.iter().enumerate() {
                    if k > 0 {
                        f.write_str(" ")?;
                    }
                    match h {
                        Some(h) => write!(f, "{h}")?,
                        None => f.write_str("_")?,
                    }
                }
                Ok(())
            }
            Configuration::States(states) => {
                for (k, s) in states.iter().enumerate() {
                    if k > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{s}")?;
                }
                Ok(())
            }
        }
    }
}
