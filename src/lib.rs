//! Treedep: labeled dependency extraction from constituency parses
//!
//! A toolkit for converting phrase-structure trees into typed
//! word-to-word dependency graphs, and for scoring such graphs against
//! gold annotations.

pub mod collapse; // Collapsing and correction passes
pub mod conllx; // CoNLL-X file parsing
pub mod dependency; // Typed dependencies and text forms
pub mod depsfile; // Predicate-form dependency file parsing
pub mod graph; // Tree graph with heads and relation arcs
pub mod headfinder; // Head-finding rule interpreter
pub mod penn; // Penn-Treebank bracket reading
pub mod relation; // Relation tags, registry, rule contract
pub mod scoring; // Corpus-level dependency scoring
pub mod structure; // Extraction orchestrator
pub mod tree; // Constituency tree arena

// Re-exports for convenience
pub use collapse::{DependencyCollapser, EnglishCollapser, Identity};
pub use dependency::{Token, TypedDependency};
pub use graph::TreeGraph;
pub use headfinder::{Direction, HeadFinder, HeadRule};
pub use penn::PennReader;
pub use relation::{RelationId, RelationRegistry, RelationRule, RelationSet};
pub use scoring::{DependencyScoring, Score};
pub use structure::{GrammaticalStructure, PunctFilter, get_roots, is_connected};
pub use tree::{NodeId, Tree, TreeLike};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// End to end: bracketed text in, scored dependencies out
    #[test]
    fn test_extract_and_score_pipeline() {
        let registry = Arc::new(RelationRegistry::with_builtins());
        let relations = relation::english_demo(&registry);
        let hf = headfinder::english();

        let tree = PennReader::from_str("(S (NP (DT the) (NN dog)) (VP (VBZ runs)))")
            .next()
            .unwrap()
            .unwrap();
        let gs = GrammaticalStructure::build(
            &tree,
            &relations,
            &hf,
            Arc::clone(&registry),
            PunctFilter::Strip,
        );
        let deps = gs.typed_dependencies(false);

        // round-trip through the predicate text form and score
        let text = dependency::to_predicate_string(&deps, &registry);
        let reparsed = depsfile::read_deps_str(&text, &registry).unwrap();
        let scorer = DependencyScoring::new(&[deps], &registry, false);
        let score = scorer.score(&reparsed, &registry).unwrap();
        assert_eq!(score.las(), 1.0);
        assert_eq!(score.uas(), 1.0);
    }
}
