//! Brute-force references shared by the oracle tests.

/// Whether `heads` is a spanning arborescence rooted at node 0.
pub(crate) fn is_arborescence(heads: &[Option<usize>]) -> bool {
    if heads.first().copied().flatten().is_some() {
        return false;
    }
    (1..heads.len()).all(|m| reaches_root(heads, m))
}

fn reaches_root(heads: &[Option<usize>], mut node: usize) -> bool {
    for _ in 0..heads.len() {
        match heads[node] {
            Some(0) => return true,
            Some(h) if h < heads.len() && h != node => node = h,
            _ => return false,
        }
    }
    false
}

/// Every arborescence over `length` nodes rooted at 0.
pub(crate) fn all_arborescences(length: usize) -> Vec<Vec<Option<usize>>> {
    let words = length.saturating_sub(1);
    let total = length.pow(words as u32);
    let mut trees = Vec::new();
    for code in 0..total {
        let mut heads = vec![None; length];
        let mut c = code;
        for slot in heads.iter_mut().skip(1) {
            *slot = Some(c % length);
            c /= length;
        }
        if is_arborescence(&heads) {
            trees.push(heads);
        }
    }
    trees
}

/// Every state sequence over the given per-position state counts.
pub(crate) fn all_sequences(num_states: &[usize]) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::new()];
    for &s in num_states {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..s).map(move |k| {
                    let mut next = prefix.clone();
                    next.push(k);
                    next
                })
            })
            .collect();
    }
    out
}

#[test]
fn counts_match_cayley() {
    // Rooted labelled trees on n+1 nodes: (n+1)^(n-1).
    assert_eq!(all_arborescences(1).len(), 1);
    assert_eq!(all_arborescences(2).len(), 1);
    assert_eq!(all_arborescences(3).len(), 3);
    assert_eq!(all_arborescences(4).len(), 16);
    assert_eq!(all_arborescences(5).len(), 125);
    assert_eq!(all_sequences(&[2, 3]).len(), 6);
    assert_eq!(all_sequences(&[]), vec![Vec::<usize>::new()]);
}
