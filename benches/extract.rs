use divan::{Bencher, black_box};
use std::sync::Arc;

use treedep::headfinder::english;
use treedep::penn::PennReader;
use treedep::relation::{RelationRegistry, english_demo};
use treedep::structure::{GrammaticalStructure, PunctFilter};

fn main() {
    divan::main();
}

const SAMPLE: &str = "\
(S (NP (DT The) (JJ quick) (NN fox)) (VP (VBD jumped) (PP (IN over) (NP (DT the) (JJ lazy) (NN dog)))) (. .))
(S (NP (NP (DT The) (NN president)) (PP (IN of) (NP (DT the) (NN company)))) (VP (VBD resigned) (NP (NN yesterday))))
(S (NP (NNS Dogs)) (VP (VP (VBP run)) (CC and) (VP (VBP play))) (. .))
(S (NP (DT The) (NN window)) (VP (VBD was) (VP (VBN broken) (PP (IN by) (NP (DT the) (NN storm))))))
";

/// Benchmark reading bracketed trees
#[divan::bench]
fn parse_penn(bencher: Bencher) {
    bencher.bench_local(|| {
        let reader = PennReader::from_str(black_box(SAMPLE));
        for result in reader {
            black_box(result.unwrap());
        }
    });
}

/// Benchmark the full extraction pipeline (percolation, arcs, typed deps)
#[divan::bench]
fn extract_dependencies(bencher: Bencher) {
    let trees: Vec<_> = PennReader::from_str(SAMPLE)
        .collect::<Result<_, _>>()
        .unwrap();
    let registry = Arc::new(RelationRegistry::with_builtins());
    let relations = english_demo(&registry);
    let hf = english();

    bencher.bench_local(|| {
        for tree in &trees {
            let gs = GrammaticalStructure::build(
                black_box(tree),
                &relations,
                &hf,
                Arc::clone(&registry),
                PunctFilter::Strip,
            );
            black_box(gs.typed_dependencies(false));
        }
    });
}
