//! Maximum projective dependency tree (first-order Eisner, 1996).
//!
//! Same input convention as [`crate::chu_liu_edmonds`]: a dense row-major
//! matrix `scores[h * n + m]`, `-inf` for arcs that do not exist, node 0 the
//! root. The root may take several dependents. A tree is projective when no
//! two arcs cross when drawn above the token order, equivalently when every
//! word between a head and its dependent is a descendant of that head.
//!
//! O(n^3) time, O(n^2) space. Split points are scanned left to right and only
//! a strictly better score replaces the current best.

#[derive(Clone, Copy)]
enum Span {
    // head on the right end, span closed
    CompleteLeft,
    // head on the left end, span closed
    CompleteRight,
    // arc t -> s
    IncompleteLeft,
    // arc s -> t
    IncompleteRight,
}

struct Chart {
    n: usize,
    value: Vec<f64>,
    split: Vec<usize>,
}

impl Chart {
    fn new(n: usize) -> Self {
        Self {
            n,
            value: vec![f64::NEG_INFINITY; 4 * n * n],
            split: vec![0; 4 * n * n],
        }
    }

    fn at(&self, kind: Span, s: usize, t: usize) -> usize {
        (kind as usize * self.n + s) * self.n + t
    }

    fn get(&self, kind: Span, s: usize, t: usize) -> f64 {
        self.value[self.at(kind, s, t)]
    }

    fn set(&mut self, kind: Span, s: usize, t: usize, value: f64, split: usize) {
        let k = self.at(kind, s, t);
        self.value[k] = value;
        self.split[k] = split;
    }

    fn split(&self, kind: Span, s: usize, t: usize) -> usize {
        self.split[self.at(kind, s, t)]
    }
}

/// Heads and value of the best projective tree rooted at node 0.
///
/// The value is `-inf` when the finite arcs admit no projective tree; the
/// heads are then meaningless.
pub fn eisner(scores: &[f64], n: usize) -> (Vec<Option<usize>>, f64) {
    assert_eq!(
        scores.len(),
        n * n,
        "score matrix has {} entries, expected {n}x{n}",
        scores.len()
    );
    if n <= 1 {
        return (vec![None; n], 0.0);
    }

    let mut chart = Chart::new(n);
    for s in 0..n {
        chart.set(Span::CompleteLeft, s, s, 0.0, s);
        chart.set(Span::CompleteRight, s, s, 0.0, s);
    }

    for width in 1..n {
        for s in 0..n - width {
            let t = s + width;

            let mut best = f64::NEG_INFINITY;
            let mut arg = s;
            for r in s..t {
                let v = chart.get(Span::CompleteRight, s, r) + chart.get(Span::CompleteLeft, r + 1, t);
                if v > best {
                    best = v;
                    arg = r;
                }
            }
            chart.set(Span::IncompleteLeft, s, t, best + scores[t * n + s], arg);
            chart.set(Span::IncompleteRight, s, t, best + scores[s * n + t], arg);

            let mut best = f64::NEG_INFINITY;
            let mut arg = s;
            for r in s..t {
                let v = chart.get(Span::CompleteLeft, s, r) + chart.get(Span::IncompleteLeft, r, t);
                if v > best {
                    best = v;
                    arg = r;
                }
            }
            chart.set(Span::CompleteLeft, s, t, best, arg);

            let mut best = f64::NEG_INFINITY;
            let mut arg = t;
            for r in s + 1..=t {
                let v = chart.get(Span::IncompleteRight, s, r) + chart.get(Span::CompleteRight, r, t);
                if v > best {
                    best = v;
                    arg = r;
                }
            }
            chart.set(Span::CompleteRight, s, t, best, arg);
        }
    }

    let value = chart.get(Span::CompleteRight, 0, n - 1);
    let mut heads = vec![None; n];
    if value == f64::NEG_INFINITY {
        return (heads, value);
    }

    let mut stack = vec![(Span::CompleteRight, 0, n - 1)];
    while let Some((kind, s, t)) = stack.pop() {
        if s == t {
            continue;
        }
        let r = chart.split(kind, s, t);
        match kind {
            Span::IncompleteLeft => {
                heads[s] = Some(t);
                stack.push((Span::CompleteRight, s, r));
                stack.push((Span::CompleteLeft, r + 1, t));
            }
            Span::IncompleteRight => {
                heads[t] = Some(s);
                stack.push((Span::CompleteRight, s, r));
                stack.push((Span::CompleteLeft, r + 1, t));
            }
            Span::CompleteLeft => {
                stack.push((Span::CompleteLeft, s, r));
                stack.push((Span::IncompleteLeft, r, t));
            }
            Span::CompleteRight => {
                stack.push((Span::IncompleteRight, s, r));
                stack.push((Span::CompleteRight, r, t));
            }
        }
    }

    (heads, value)
}

/// Whether a head array (root at 0, `heads[0] == None`) is a projective tree.
pub fn is_projective(heads: &[Option<usize>]) -> bool {
    for (m, h) in heads.iter().enumerate().skip(1) {
        let h = match h {
            Some(h) => *h,
            None => return false,
        };
        let (lo, hi) = if h < m { (h, m) } else { (m, h) };
        for k in lo + 1..hi {
            if !dominates(heads, h, k) {
                return false;
            }
        }
    }
    true
}

fn dominates(heads: &[Option<usize>], ancestor: usize, mut node: usize) -> bool {
    // At most heads.len() steps, so a cycle cannot loop forever.
    for _ in 0..heads.len() {
        match heads[node] {
            Some(h) if h == ancestor => return true,
            Some(h) => node = h,
            None => return false,
        }
    }
    false
}
