//! Maximum spanning arborescence (Chu-Liu-Edmonds).
//!
//! Input is a dense row-major score matrix `scores[h * n + m]` for the arc
//! `h -> m`, with `-inf` marking arcs that do not exist. Node 0 is the root.
//!
//! The algorithm:
//! 1. every non-root vertex greedily picks its best incoming arc;
//! 2. if the picks form a tree, done;
//! 3. otherwise contract one cycle into its first vertex, re-scoring arcs that
//!    enter the cycle by `cycle_sum + s(u, c) - s(parent(c), c)` (Kübler et al.,
//!    2009, p. 47) and keeping the best arc leaving it, then recurse;
//! 4. on the way back, break the cycle at the vertex whose incoming arc was
//!    chosen and restore the original endpoints of arcs leaving it.
//!
//! Contraction bookkeeping is kept in plain index arrays: an `active` mask for
//! vertices swallowed by a supernode, and per-vertex replacement tables.
//!
//! Tie-breaking is deterministic: a strictly greater score is needed to
//! replace the current best, candidate heads are scanned in ascending index
//! order (the canonical arc enumeration order for each modifier), cycles are
//! searched from the lowest-index vertex, and contraction scans cycle members
//! in parent-pointer order starting from that vertex.

/// Parent of every vertex in the maximum spanning arborescence rooted at 0.
///
/// `result[0]` is always `None`. The score matrix must admit at least one
/// arborescence (every vertex reachable from the root through finite arcs).
pub fn chu_liu_edmonds(scores: &[f64], n: usize) -> Vec<Option<usize>> {
    assert_eq!(
        scores.len(),
        n * n,
        "score matrix has {} entries, expected {n}x{n}",
        scores.len()
    );
    if n <= 1 {
        return vec![None; n];
    }

    let mut scores = scores.to_vec();
    let mut active = vec![true; n];
    chu_liu_edmonds_(&mut scores, n, &mut active)
}

fn chu_liu_edmonds_(scores: &mut [f64], n: usize, active: &mut [bool]) -> Vec<Option<usize>> {
    let max_parents = find_max_parents(scores, n, active);

    let cycle = match find_cycle(&max_parents) {
        Some(cycle) => cycle,
        None => return max_parents,
    };

    let contraction = contract_cycle(scores, n, &max_parents, active, &cycle);
    let contracted = chu_liu_edmonds_(scores, n, active);
    expand_cycle(&max_parents, contracted, &cycle, &contraction)
}

/// Arc replacements made when a cycle was contracted into `cycle[0]`.
struct Contraction {
    // incoming[u] = c: the arc (u, supernode) stands for (u, c).
    incoming: Vec<Option<usize>>,
    // outgoing[w] = c: the arc (supernode, w) stands for (c, w).
    outgoing: Vec<Option<usize>>,
}

/// Best finite-scoring active parent of every active non-root vertex.
fn find_max_parents(scores: &[f64], n: usize, active: &[bool]) -> Vec<Option<usize>> {
    let mut max_parents = vec![None; n];
    for child in 1..n {
        if !active[child] {
            continue;
        }
        let mut best = f64::NEG_INFINITY;
        for parent in 0..n {
            if parent == child || !active[parent] {
                continue;
            }
            let s = scores[parent * n + child];
            if s > best {
                best = s;
                max_parents[child] = Some(parent);
            }
        }
    }
    max_parents
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unseen,
    OnPath,
    Done,
}

/// First cycle in a parent-pointer graph, listed in parent-pointer order.
fn find_cycle(parents: &[Option<usize>]) -> Option<Vec<usize>> {
    let mut mark = vec![Mark::Unseen; parents.len()];
    let mut path = Vec::new();

    for start in 0..parents.len() {
        if mark[start] != Mark::Unseen {
            continue;
        }
        path.clear();
        let mut vertex = start;
        loop {
            match mark[vertex] {
                Mark::Done => break,
                Mark::OnPath => {
                    let pos = path.iter().position(|&v| v == vertex).unwrap_or(0);
                    return Some(path[pos..].to_vec());
                }
                Mark::Unseen => {
                    mark[vertex] = Mark::OnPath;
                    path.push(vertex);
                    match parents[vertex] {
                        Some(parent) => vertex = parent,
                        None => break,
                    }
                }
            }
        }
        for &v in &path {
            mark[v] = Mark::Done;
        }
    }
    None
}

fn contract_cycle(
    scores: &mut [f64],
    n: usize,
    max_parents: &[Option<usize>],
    active: &mut [bool],
    cycle: &[usize],
) -> Contraction {
    let first_in_cycle = cycle[0];

    // Every cycle vertex has a parent, otherwise it would not be on a cycle.
    let parent_of = |c: usize| max_parents[c].unwrap_or(c);
    let cycle_sum: f64 = cycle.iter().map(|&c| scores[parent_of(c) * n + c]).sum();

    let mut in_cycle = vec![false; n];
    for &c in cycle {
        in_cycle[c] = true;
    }
    for &c in &cycle[1..] {
        active[c] = false;
    }

    let mut incoming = vec![None; n];
    let mut outgoing = vec![None; n];
    for vertex in 0..n {
        if !active[vertex] || in_cycle[vertex] {
            continue;
        }

        let mut best_incoming = f64::NEG_INFINITY;
        let mut best_outgoing = f64::NEG_INFINITY;
        for &c in cycle {
            let out = scores[c * n + vertex];
            if out > best_outgoing {
                best_outgoing = out;
                outgoing[vertex] = Some(c);
            }

            let into = scores[vertex * n + c];
            if into > f64::NEG_INFINITY {
                let s = cycle_sum + into - scores[parent_of(c) * n + c];
                if s > best_incoming {
                    best_incoming = s;
                    incoming[vertex] = Some(c);
                }
            }
        }

        scores[vertex * n + first_in_cycle] = best_incoming;
        scores[first_in_cycle * n + vertex] = best_outgoing;
    }

    Contraction { incoming, outgoing }
}

fn expand_cycle(
    max_parents: &[Option<usize>],
    mut mst: Vec<Option<usize>>,
    cycle: &[usize],
    contraction: &Contraction,
) -> Vec<Option<usize>> {
    let supernode = cycle[0];

    // The arc chosen into the supernode decides where the cycle is broken.
    let head = mst[supernode];
    let kicked_out = head.and_then(|h| contraction.incoming[h]);

    for &c in cycle {
        mst[c] = max_parents[c];
    }
    if let Some(v) = kicked_out {
        mst[v] = head;
    }

    for (w, replacement) in contraction.outgoing.iter().enumerate() {
        if let Some(c) = replacement {
            if mst[w] == Some(supernode) {
                mst[w] = Some(*c);
            }
        }
    }

    mst
}
