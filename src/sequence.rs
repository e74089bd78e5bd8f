//! Linear-chain Viterbi oracle.
//!
//! Parts are node-states `(i, s)` (variable potentials) and transitions
//! `(i, prev, cur)` (additional potentials), including the transition out of a
//! virtual start state at `i = 0` and into a virtual stop state at
//! `i = length`. See [`SequenceIndex`] for the slot layout.

use tracing::{debug, trace};

use crate::configuration::Configuration;
use crate::factor::{assert_finite, assert_potentials, Factor};
use crate::index::{self, SequenceIndex};

/// Label sequence factor.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceFactor {
    index: SequenceIndex,
}

impl SequenceFactor {
    /// Factor over a chain with `num_states[i]` states at position `i`.
    pub fn new(num_states: &[usize]) -> index::Result<Self> {
        let index = SequenceIndex::new(num_states)?;
        debug!(
            length = index.length(),
            num_variables = index.num_variables(),
            num_additionals = index.num_additionals(),
            "initialized sequence factor"
        );
        Ok(Self { index })
    }

    /// Number of positions.
    pub fn length(&self) -> usize {
        self.index.length()
    }

    /// The node/transition index.
    pub fn sequence_index(&self) -> &SequenceIndex {
        &self.index
    }

    fn node_score(&self, variable_potentials: &[f64], position: usize, state: usize) -> f64 {
        variable_potentials[self.index.node_index(position, state)]
    }

    fn edge_score(
        &self,
        additional_potentials: &[f64],
        position: usize,
        previous: usize,
        current: usize,
    ) -> f64 {
        additional_potentials[self.index.edge_index(position, previous, current)]
    }

    fn states<'a>(&self, configuration: &'a Configuration) -> &'a [usize] {
        let states = configuration.expect_states();
        assert_eq!(
            states.len(),
            self.index.length(),
            "configuration has {} positions, expected {}",
            states.len(),
            self.index.length()
        );
        states
    }
}

impl Factor for SequenceFactor {
    fn num_variables(&self) -> usize {
        self.index.num_variables()
    }

    fn num_additionals(&self) -> usize {
        self.index.num_additionals()
    }

    fn create_configuration(&self) -> Configuration {
        Configuration::States(vec![0; self.index.length()])
    }

    fn maximize(
        &self,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
    ) -> (Configuration, f64) {
        assert_potentials(self, variable_potentials, additional_potentials);
        assert_finite("node", variable_potentials);
        assert_finite("transition", additional_potentials);
        let length = self.index.length();
        if length == 0 {
            let value = self.edge_score(additional_potentials, 0, 0, 0);
            return (Configuration::States(Vec::new()), value);
        }
        let num_states = self.index.num_states();

        // values[i][k]: best score of a prefix ending in state k at position i.
        let mut values: Vec<Vec<f64>> = Vec::with_capacity(length);
        let mut path: Vec<Vec<usize>> = Vec::with_capacity(length);

        values.push(
            (0..num_states[0])
                .map(|k| {
                    self.node_score(variable_potentials, 0, k)
                        + self.edge_score(additional_potentials, 0, 0, k)
                })
                .collect(),
        );
        path.push(vec![0; num_states[0]]);

        for i in 1..length {
            let mut row = Vec::with_capacity(num_states[i]);
            let mut back = Vec::with_capacity(num_states[i]);
            for k in 0..num_states[i] {
                let mut best: Option<(usize, f64)> = None;
                for (l, &prev) in values[i - 1].iter().enumerate() {
                    let v = prev + self.edge_score(additional_potentials, i, l, k);
                    if best.map_or(true, |(_, b)| v > b) {
                        best = Some((l, v));
                    }
                }
                let (l, v) = best.unwrap_or((0, f64::NEG_INFINITY));
                row.push(v + self.node_score(variable_potentials, i, k));
                back.push(l);
            }
            values.push(row);
            path.push(back);
        }

        let mut best: Option<(usize, f64)> = None;
        for (l, &prev) in values[length - 1].iter().enumerate() {
            let v = prev + self.edge_score(additional_potentials, length, l, 0);
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((l, v));
            }
        }
        let last = best.map_or(0, |(l, _)| l);

        let mut states = vec![0; length];
        states[length - 1] = last;
        for i in (1..length).rev() {
            states[i - 1] = path[i][states[i]];
        }

        // Re-scored so that the value agrees with `evaluate` to the last bit.
        let configuration = Configuration::States(states);
        let value = self.evaluate(variable_potentials, additional_potentials, &configuration);
        trace!(length, value, "viterbi");
        (configuration, value)
    }

    fn evaluate(
        &self,
        variable_potentials: &[f64],
        additional_potentials: &[f64],
        configuration: &Configuration,
    ) -> f64 {
        assert_potentials(self, variable_potentials, additional_potentials);
        let states = self.states(configuration);
        let mut value = 0.0;
        let mut previous = 0;
        for (i, &state) in states.iter().enumerate() {
            value += self.node_score(variable_potentials, i, state);
            value += self.edge_score(additional_potentials, i, previous, state);
            previous = state;
        }
        value + self.edge_score(additional_potentials, states.len(), previous, 0)
    }

    fn update_marginals_from_configuration(
        &self,
        configuration: &Configuration,
        weight: f64,
        variable_posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    ) {
        let states = self.states(configuration);
        let mut previous = 0;
        for (i, &state) in states.iter().enumerate() {
            variable_posteriors[self.index.node_index(i, state)] += weight;
            additional_posteriors[self.index.edge_index(i, previous, state)] += weight;
            previous = state;
        }
        additional_posteriors[self.index.edge_index(states.len(), previous, 0)] += weight;
    }

    fn count_common_values(&self, a: &Configuration, b: &Configuration) -> usize {
        let (a, b) = (self.states(a), self.states(b));
        a.iter().zip(b).filter(|(x, y)| x == y).count()
    }

    fn same_configuration(&self, a: &Configuration, b: &Configuration) -> bool {
        self.states(a) == self.states(b)
    }
}
