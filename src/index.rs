//! Index models: bijections between elementary parts and flat potential slots.
//!
//! Potentials arrive as flat `&[f64]` vectors produced by a neural scorer. The
//! index model fixes, once per topology, which slot holds which part:
//!
//! - trees: one slot per arc `(h, m)`, numbered by position in the arc list;
//! - sequences: node slots `offset_states[i] + state`, and transition slots
//!   `index_edges[i][prev][cur]` for `i` in `0..=length`, where position `0`
//!   has a single virtual start state and position `length` a single virtual
//!   stop state.
//!
//! Both tables are built by the constructors and never mutated afterwards.

/// Topology errors, reported when a factor is initialized.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A tree needs at least the root node.
    #[error("tree length must include the root node, got 0")]
    EmptyTree,
    /// Arc endpoint out of bounds.
    #[error("arc {arc_idx} ({head}->{modifier}) is out of bounds for length {length}")]
    ArcOutOfBounds {
        /// Position of the offending arc in the arc list.
        arc_idx: usize,
        /// Head endpoint.
        head: usize,
        /// Modifier endpoint.
        modifier: usize,
        /// Number of nodes, root included.
        length: usize,
    },
    /// Arcs from a node to itself are not parts of any arborescence.
    #[error("arc {arc_idx} is a self loop on node {node}")]
    SelfLoop {
        /// Position of the offending arc in the arc list.
        arc_idx: usize,
        /// The node.
        node: usize,
    },
    /// The root never has a head.
    #[error("arc {arc_idx} ({head}->0) points into the root")]
    ArcIntoRoot {
        /// Position of the offending arc in the arc list.
        arc_idx: usize,
        /// Head endpoint.
        head: usize,
    },
    /// The same `(h, m)` pair was listed twice.
    #[error("arc {arc_idx} ({head}->{modifier}) duplicates an earlier arc")]
    DuplicateArc {
        /// Position of the second occurrence.
        arc_idx: usize,
        /// Head endpoint.
        head: usize,
        /// Modifier endpoint.
        modifier: usize,
    },
    /// No spanning arborescence exists: the node cannot be reached from the root.
    #[error("node {node} is unreachable from the root")]
    Unreachable {
        /// First unreachable node.
        node: usize,
    },
    /// Projective decoding requested, but the arc set admits no projective tree.
    #[error("arc set admits no projective tree")]
    NoProjectiveTree,
    /// Every sequence position needs at least one state.
    #[error("position {position} has no states")]
    EmptyStateSpace {
        /// The offending position.
        position: usize,
    },
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical arc list for a complete digraph on `length` nodes.
///
/// Enumerates `for m in 1..length, for h in 0..length, h != m`: no self loops,
/// no arcs into the root. This is the layout the neural arc scorers emit.
pub fn complete_arcs(length: usize) -> Vec<(usize, usize)> {
    let mut arcs = Vec::with_capacity(length.saturating_sub(1) * length.saturating_sub(1));
    for m in 1..length {
        for h in 0..length {
            if h != m {
                arcs.push((h, m));
            }
        }
    }
    arcs
}

/// Arc index for a tree over `length` nodes (root included).
#[derive(Debug, Clone, PartialEq)]
pub struct ArcIndex {
    length: usize,
    arcs: Vec<(usize, usize)>,
    // index[h * length + m]
    index: Vec<Option<usize>>,
}

impl ArcIndex {
    /// Build the index for `arcs`, validating that a spanning arborescence
    /// rooted at node 0 exists.
    pub fn new(length: usize, arcs: &[(usize, usize)]) -> Result<Self> {
        if length == 0 {
            return Err(Error::EmptyTree);
        }
        let mut index = vec![None; length * length];
        for (k, &(head, modifier)) in arcs.iter().enumerate() {
            if head >= length || modifier >= length {
                return Err(Error::ArcOutOfBounds {
                    arc_idx: k,
                    head,
                    modifier,
                    length,
                });
            }
            if head == modifier {
                return Err(Error::SelfLoop {
                    arc_idx: k,
                    node: head,
                });
            }
            if modifier == 0 {
                return Err(Error::ArcIntoRoot { arc_idx: k, head });
            }
            let slot = &mut index[head * length + modifier];
            if slot.is_some() {
                return Err(Error::DuplicateArc {
                    arc_idx: k,
                    head,
                    modifier,
                });
            }
            *slot = Some(k);
        }

        let idx = Self {
            length,
            arcs: arcs.to_vec(),
            index,
        };
        idx.check_reachable()?;
        Ok(idx)
    }

    /// Index over the complete canonical arc set.
    pub fn complete(length: usize) -> Result<Self> {
        Self::new(length, &complete_arcs(length))
    }

    fn check_reachable(&self) -> Result<()> {
        let n = self.length;
        let mut seen = vec![false; n];
        seen[0] = true;
        let mut stack = vec![0];
        while let Some(h) = stack.pop() {
            for m in 1..n {
                if !seen[m] && self.index[h * n + m].is_some() {
                    seen[m] = true;
                    stack.push(m);
                }
            }
        }
        match seen.iter().position(|&s| !s) {
            Some(node) => Err(Error::Unreachable { node }),
            None => Ok(()),
        }
    }

    /// Number of nodes, root included.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of arcs, i.e. the length of the potentials vector.
    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// The arc list, in potential-slot order.
    pub fn arcs(&self) -> &[(usize, usize)] {
        &self.arcs
    }

    /// Slot of arc `h -> m`, if the arc is part of the topology.
    pub fn get(&self, head: usize, modifier: usize) -> Option<usize> {
        if head >= self.length || modifier >= self.length {
            return None;
        }
        self.index[head * self.length + modifier]
    }

    /// Slot of arc `h -> m`; panics if the arc is not part of the topology.
    pub fn index(&self, head: usize, modifier: usize) -> usize {
        match self.get(head, modifier) {
            Some(k) => k,
            None => panic!("arc {head}->{modifier} is not part of this topology"),
        }
    }

    /// Dense `length x length` score matrix (row = head, column = modifier)
    /// with `-inf` wherever no arc exists.
    pub(crate) fn score_matrix(&self, potentials: &[f64]) -> Vec<f64> {
        let mut scores = vec![f64::NEG_INFINITY; self.length * self.length];
        for (k, &(h, m)) in self.arcs.iter().enumerate() {
            scores[h * self.length + m] = potentials[k];
        }
        scores
    }

    /// Sum of arc potentials along a head array.
    pub(crate) fn score_heads(&self, potentials: &[f64], heads: &[Option<usize>]) -> f64 {
        let mut value = 0.0;
        for (m, h) in heads.iter().enumerate().skip(1) {
            let h = match h {
                Some(h) => *h,
                None => panic!("node {m} has no head"),
            };
            value += potentials[self.index(h, m)];
        }
        value
    }
}

/// Node and transition index for a linear chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceIndex {
    num_states: Vec<usize>,
    offset_states: Vec<usize>,
    // edge_offsets[i] is the first transition slot of position i; the block is
    // laid out previous-state major.
    edge_offsets: Vec<usize>,
    num_variables: usize,
    num_additionals: usize,
}

impl SequenceIndex {
    /// Build the index from per-position state counts.
    pub fn new(num_states: &[usize]) -> Result<Self> {
        if let Some(position) = num_states.iter().position(|&s| s == 0) {
            return Err(Error::EmptyStateSpace { position });
        }
        let length = num_states.len();

        let mut offset_states = Vec::with_capacity(length);
        let mut offset = 0;
        for &s in num_states {
            offset_states.push(offset);
            offset += s;
        }

        let mut edge_offsets = Vec::with_capacity(length + 1);
        let mut index = 0;
        for i in 0..=length {
            edge_offsets.push(index);
            let prev = if i > 0 { num_states[i - 1] } else { 1 };
            let cur = if i < length { num_states[i] } else { 1 };
            index += prev * cur;
        }

        Ok(Self {
            num_states: num_states.to_vec(),
            offset_states,
            edge_offsets,
            num_variables: offset,
            num_additionals: index,
        })
    }

    /// Number of positions (virtual start/stop excluded).
    pub fn length(&self) -> usize {
        self.num_states.len()
    }

    /// State counts per position.
    pub fn num_states(&self) -> &[usize] {
        &self.num_states
    }

    /// Length of the node potentials vector.
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /// Length of the transition potentials vector.
    pub fn num_additionals(&self) -> usize {
        self.num_additionals
    }

    /// Where position `i`'s node potentials begin.
    pub fn offset_states(&self, position: usize) -> usize {
        self.offset_states[position]
    }

    /// States available to the left of transition `position` (1 at the start).
    pub fn num_previous_states(&self, position: usize) -> usize {
        if position > 0 {
            self.num_states[position - 1]
        } else {
            1
        }
    }

    /// States available to the right of transition `position` (1 at the stop).
    pub fn num_current_states(&self, position: usize) -> usize {
        if position < self.num_states.len() {
            self.num_states[position]
        } else {
            1
        }
    }

    /// Slot of node `(position, state)`.
    pub fn node_index(&self, position: usize, state: usize) -> usize {
        assert!(
            state < self.num_states[position],
            "state {state} out of range at position {position} ({} states)",
            self.num_states[position]
        );
        self.offset_states[position] + state
    }

    /// Slot of the transition from `previous` (at `position - 1`) to `current`
    /// (at `position`), for `position` in `0..=length`.
    pub fn edge_index(&self, position: usize, previous: usize, current: usize) -> usize {
        let prev = self.num_previous_states(position);
        let cur = self.num_current_states(position);
        assert!(
            previous < prev && current < cur,
            "transition ({previous}->{current}) out of range at position {position}"
        );
        self.edge_offsets[position] + previous * cur + current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn complete_arcs_follow_modifier_major_order() {
        assert_eq!(
            complete_arcs(3),
            vec![(0, 1), (2, 1), (0, 2), (1, 2)]
        );
        assert!(complete_arcs(1).is_empty());
        assert!(complete_arcs(0).is_empty());
    }

    #[test]
    fn arc_index_is_a_bijection() {
        let idx = ArcIndex::complete(5).unwrap();
        assert_eq!(idx.num_arcs(), 16);
        let mut seen = HashSet::new();
        for m in 1..5 {
            for h in 0..5 {
                if h != m {
                    assert!(seen.insert(idx.index(h, m)));
                }
            }
        }
        assert_eq!(seen.len(), idx.num_arcs());
        assert!(seen.iter().all(|&k| k < idx.num_arcs()));
        assert_eq!(idx.get(1, 0), None);
        assert_eq!(idx.get(9, 1), None);
    }

    #[test]
    fn arc_index_rejects_bad_topologies() {
        assert_eq!(ArcIndex::new(0, &[]), Err(Error::EmptyTree));
        assert_eq!(
            ArcIndex::new(2, &[(0, 2)]),
            Err(Error::ArcOutOfBounds {
                arc_idx: 0,
                head: 0,
                modifier: 2,
                length: 2
            })
        );
        assert_eq!(
            ArcIndex::new(2, &[(1, 1)]),
            Err(Error::SelfLoop { arc_idx: 0, node: 1 })
        );
        assert_eq!(
            ArcIndex::new(2, &[(0, 1), (1, 0)]),
            Err(Error::ArcIntoRoot { arc_idx: 1, head: 1 })
        );
        assert_eq!(
            ArcIndex::new(2, &[(0, 1), (0, 1)]),
            Err(Error::DuplicateArc {
                arc_idx: 1,
                head: 0,
                modifier: 1
            })
        );
        // 2 and 3 only point at each other.
        assert_eq!(
            ArcIndex::new(4, &[(0, 1), (2, 3), (3, 2)]),
            Err(Error::Unreachable { node: 2 })
        );
    }

    #[test]
    fn root_only_tree_has_no_arcs() {
        let idx = ArcIndex::complete(1).unwrap();
        assert_eq!(idx.num_arcs(), 0);
        assert_eq!(idx.score_heads(&[], &[None]), 0.0);
    }

    #[test]
    #[should_panic(expected = "not part of this topology")]
    fn missing_arc_lookup_panics() {
        let idx = ArcIndex::new(3, &[(0, 1), (1, 2)]).unwrap();
        let _ = idx.index(0, 2);
    }

    #[test]
    fn sequence_index_covers_every_slot_once() {
        let idx = SequenceIndex::new(&[2, 3, 1]).unwrap();
        assert_eq!(idx.num_variables(), 6);
        // start->2, 2x3, 3x1, 1->stop
        assert_eq!(idx.num_additionals(), 2 + 6 + 3 + 1);

        let mut nodes = HashSet::new();
        for i in 0..idx.length() {
            for s in 0..idx.num_states()[i] {
                assert!(nodes.insert(idx.node_index(i, s)));
            }
        }
        assert_eq!(nodes, (0..idx.num_variables()).collect());

        let mut edges = HashSet::new();
        for i in 0..=idx.length() {
            for p in 0..idx.num_previous_states(i) {
                for c in 0..idx.num_current_states(i) {
                    assert!(edges.insert(idx.edge_index(i, p, c)));
                }
            }
        }
        assert_eq!(edges, (0..idx.num_additionals()).collect());
    }

    #[test]
    fn sequence_index_matches_reference_layout() {
        let idx = SequenceIndex::new(&[2, 2]).unwrap();
        assert_eq!(idx.offset_states(1), 2);
        assert_eq!(idx.edge_index(0, 0, 1), 1);
        assert_eq!(idx.edge_index(1, 0, 0), 2);
        assert_eq!(idx.edge_index(1, 1, 0), 4);
        assert_eq!(idx.edge_index(2, 1, 0), 7);
    }

    #[test]
    fn sequence_index_rejects_empty_positions() {
        assert_eq!(
            SequenceIndex::new(&[2, 0, 1]),
            Err(Error::EmptyStateSpace { position: 1 })
        );
        let empty = SequenceIndex::new(&[]).unwrap();
        assert_eq!(empty.num_variables(), 0);
        assert_eq!(empty.num_additionals(), 1);
    }
}
