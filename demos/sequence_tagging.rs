//! End-to-end example: Viterbi as the oracle of a tagging layer.
//!
//! A tagger scores three tags per token plus tag-to-tag transitions. The
//! factor is declared in TOML, built, and decoded; the posterior vectors
//! show where a weighted configuration puts its mass.

use sparsemap_factors::index::SequenceIndex;
use sparsemap_factors::{AnyFactor, Factor, FactorSpec, MapSolver, Settings, SparseMapSolver};

const TAGS: [&str; 3] = ["DET", "NOUN", "VERB"];

fn main() {
    let spec: FactorSpec = toml::from_str(
        r#"
        type = "sequence"
        num_states = [3, 3, 3]
        "#,
    )
    .unwrap();
    let factor = AnyFactor::from_spec(&spec).unwrap();
    let settings = Settings::from_toml_str("[sparsemap]\nmax_iter = 20").unwrap();

    // "the dog barks"
    let node = [
        2.0, 0.5, 0.1, //
        0.2, 1.5, 1.4, //
        0.1, 0.8, 1.0,
    ];
    // Transitions: start->tag, tag->tag (twice), tag->stop.
    let layout = SequenceIndex::new(&[3, 3, 3]).unwrap();
    let mut edges = vec![0.0; factor.num_additionals()];
    edges[layout.edge_index(1, 0, 1)] = 1.0; // DET -> NOUN
    edges[layout.edge_index(2, 1, 2)] = 1.0; // NOUN -> VERB

    let (tags, value) = factor.maximize(&node, &edges);
    let names: Vec<&str> = tags
        .states()
        .unwrap()
        .iter()
        .map(|&s| TAGS[s])
        .collect();
    println!("best tags {names:?} with score {value}");

    let marginals = MapSolver::new()
        .solve(&factor, &node, &edges, &settings.sparsemap)
        .unwrap();
    println!("node posteriors: {:?}", marginals.variables);
    println!("run name prefix: {}", settings.sparsemap.file_stem());
}
