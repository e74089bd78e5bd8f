//! Arena of weighted configurations for one solve.
//!
//! The active-set solver holds a handful of vertices of the marginal polytope
//! at a time, each with a convex weight. Vertices enter when `maximize`
//! discovers them and leave when their weight drops to zero. The arena owns
//! them and hands out [`ConfigId`]s; ids carry a generation, so an id kept
//! past its eviction is rejected instead of aliasing a newer configuration.
//!
//! Capacity is fixed at construction (`max_active_set_iter`), which caps the
//! number of live configurations per solve.
//!
//! ```
//! use sparsemap_factors::active_set::ActiveSet;
//! use sparsemap_factors::factor::Factor;
//! use sparsemap_factors::tree::TreeFactor;
//!
//! let factor = TreeFactor::complete(3).unwrap();
//! let mut set = ActiveSet::with_capacity(4);
//!
//! let (a, _) = factor.maximize(&[1.0, 0.0, 0.0, 1.0], &[]);
//! let (b, _) = factor.maximize(&[0.0, 1.0, 1.0, 0.0], &[]);
//! let ia = set.insert(a, 0.5).unwrap();
//! set.insert(b, 0.5).unwrap();
//!
//! let m = set.marginals(&factor);
//! assert_eq!(m.variables, vec![0.5, 0.5, 0.5, 0.5]);
//!
//! set.remove(ia);
//! assert!(set.get(ia).is_none());
//! ```

use crate::configuration::Configuration;
use crate::factor::Factor;
use crate::solver::Marginals;

/// Errors for active-set bookkeeping.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Every slot is occupied.
    #[error("active set is full ({capacity} configurations)")]
    Full {
        /// The configured capacity.
        capacity: usize,
    },
    /// Weights are convex-combination coefficients.
    #[error("weight must be finite and non-negative, got {0}")]
    InvalidWeight(f64),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Handle to a configuration held by an [`ActiveSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigId {
    slot: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entry: Option<(Configuration, f64)>,
}

/// Bounded store of `(configuration, weight)` pairs.
#[derive(Debug, Clone)]
pub struct ActiveSet {
    slots: Vec<Slot>,
    free: Vec<usize>,
    capacity: usize,
    len: usize,
}

impl ActiveSet {
    /// Empty set holding at most `capacity` configurations.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            capacity,
            len: 0,
        }
    }

    /// Maximum number of live configurations.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live configurations.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no configuration is live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Take ownership of `configuration` with the given weight.
    pub fn insert(&mut self, configuration: Configuration, weight: f64) -> Result<ConfigId> {
        check_weight(weight)?;
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                self.slots.len() - 1
            }
            None => {
                return Err(Error::Full {
                    capacity: self.capacity,
                })
            }
        };
        let s = &mut self.slots[slot];
        s.entry = Some((configuration, weight));
        self.len += 1;
        Ok(ConfigId {
            slot,
            generation: s.generation,
        })
    }

    /// Evict a configuration, returning it with its last weight.
    ///
    /// Returns `None` for ids that were already evicted.
    pub fn remove(&mut self, id: ConfigId) -> Option<(Configuration, f64)> {
        let s = self.slots.get_mut(id.slot)?;
        if s.generation != id.generation {
            return None;
        }
        let entry = s.entry.take()?;
        s.generation = s.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.len -= 1;
        Some(entry)
    }

    /// The configuration and weight behind `id`, if still live.
    pub fn get(&self, id: ConfigId) -> Option<(&Configuration, f64)> {
        let s = self.slots.get(id.slot)?;
        if s.generation != id.generation {
            return None;
        }
        s.entry.as_ref().map(|(c, w)| (c, *w))
    }

    /// Replace the weight of a live configuration.
    ///
    /// Returns `Ok(false)` if `id` is stale.
    pub fn set_weight(&mut self, id: ConfigId, weight: f64) -> Result<bool> {
        check_weight(weight)?;
        let live = self
            .slots
            .get_mut(id.slot)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_mut());
        Ok(match live {
            Some(entry) => {
                entry.1 = weight;
                true
            }
            None => false,
        })
    }

    /// Live configurations with their ids and weights, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ConfigId, &Configuration, f64)> + '_ {
        self.slots.iter().enumerate().filter_map(|(slot, s)| {
            s.entry.as_ref().map(|(c, w)| {
                (
                    ConfigId {
                        slot,
                        generation: s.generation,
                    },
                    c,
                    *w,
                )
            })
        })
    }

    /// Id of a live configuration equal to `configuration` under `factor`.
    pub fn find(&self, factor: &dyn Factor, configuration: &Configuration) -> Option<ConfigId> {
        self.iter()
            .find(|(_, c, _)| factor.same_configuration(c, configuration))
            .map(|(id, _, _)| id)
    }

    /// Evict every configuration whose weight is exactly zero.
    pub fn prune(&mut self) -> usize {
        let dead: Vec<ConfigId> = self
            .iter()
            .filter(|(_, _, w)| *w == 0.0)
            .map(|(id, _, _)| id)
            .collect();
        for id in &dead {
            self.remove(*id);
        }
        dead.len()
    }

    /// Evict everything; all outstanding ids become stale.
    pub fn clear(&mut self) {
        for slot in 0..self.slots.len() {
            let s = &mut self.slots[slot];
            if s.entry.take().is_some() {
                s.generation = s.generation.wrapping_add(1);
                self.free.push(slot);
            }
        }
        self.len = 0;
    }

    /// Weighted sum of the posteriors of every live configuration.
    pub fn marginals(&self, factor: &dyn Factor) -> Marginals {
        let mut marginals = Marginals::zeros(factor);
        for (_, c, w) in self.iter() {
            factor.update_marginals_from_configuration(
                c,
                w,
                &mut marginals.variables,
                &mut marginals.additionals,
            );
        }
        marginals
    }
}

fn check_weight(weight: f64) -> Result<()> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidWeight(weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceFactor;

    fn states(s: &[usize]) -> Configuration {
        Configuration::States(s.to_vec())
    }

    #[test]
    fn capacity_bounds_live_configurations() {
        let mut set = ActiveSet::with_capacity(2);
        let a = set.insert(states(&[0]), 0.5).unwrap();
        set.insert(states(&[1]), 0.5).unwrap();
        assert_eq!(
            set.insert(states(&[0]), 0.1),
            Err(Error::Full { capacity: 2 })
        );
        assert_eq!(set.len(), 2);

        set.remove(a).unwrap();
        let c = set.insert(states(&[0]), 0.2).unwrap();
        assert_eq!(set.len(), 2);
        assert_ne!(a, c);
    }

    #[test]
    fn stale_ids_are_rejected() {
        let mut set = ActiveSet::with_capacity(1);
        let a = set.insert(states(&[0]), 1.0).unwrap();
        assert_eq!(set.remove(a), Some((states(&[0]), 1.0)));
        assert_eq!(set.remove(a), None);

        let b = set.insert(states(&[1]), 1.0).unwrap();
        assert!(set.get(a).is_none());
        assert_eq!(set.set_weight(a, 0.3), Ok(false));
        assert_eq!(set.get(b), Some((&states(&[1]), 1.0)));
    }

    #[test]
    fn rejects_invalid_weights() {
        let mut set = ActiveSet::with_capacity(1);
        assert_eq!(
            set.insert(states(&[0]), -0.5),
            Err(Error::InvalidWeight(-0.5))
        );
        assert!(set.insert(states(&[0]), f64::NAN).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn find_uses_factor_equality() {
        let factor = SequenceFactor::new(&[2, 2]).unwrap();
        let mut set = ActiveSet::with_capacity(3);
        set.insert(states(&[0, 1]), 0.25).unwrap();
        let b = set.insert(states(&[1, 1]), 0.75).unwrap();
        assert_eq!(set.find(&factor, &states(&[1, 1])), Some(b));
        assert_eq!(set.find(&factor, &states(&[0, 0])), None);
    }

    #[test]
    fn prune_and_clear() {
        let mut set = ActiveSet::with_capacity(3);
        let a = set.insert(states(&[0]), 0.0).unwrap();
        let b = set.insert(states(&[1]), 1.0).unwrap();
        assert_eq!(set.prune(), 1);
        assert!(set.get(a).is_none());
        assert_eq!(set.len(), 1);

        set.clear();
        assert!(set.is_empty());
        assert!(set.get(b).is_none());
        assert_eq!(set.iter().count(), 0);
    }

    #[test]
    fn marginals_are_weighted_sums() {
        let factor = SequenceFactor::new(&[2, 2]).unwrap();
        let idx = factor.sequence_index().clone();
        let mut set = ActiveSet::with_capacity(2);
        set.insert(states(&[0, 1]), 0.25).unwrap();
        set.insert(states(&[1, 1]), 0.75).unwrap();

        let m = set.marginals(&factor);
        assert_eq!(m.variables[idx.node_index(0, 0)], 0.25);
        assert_eq!(m.variables[idx.node_index(0, 1)], 0.75);
        assert_eq!(m.variables[idx.node_index(1, 1)], 1.0);
        assert_eq!(m.additionals[idx.edge_index(2, 1, 0)], 1.0);
        assert_eq!(m.additionals.iter().sum::<f64>(), 3.0);
    }
}
