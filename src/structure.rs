//! Grammatical structure extraction
//!
//! [`GrammaticalStructure`] orchestrates the whole pipeline for one
//! sentence: copy the tree into a graph, percolate heads, derive
//! word-pair dependencies, apply the relation rules as arcs, and
//! resolve arcs into typed dependencies. Everything is computed eagerly
//! at construction; the view methods hand out fresh vectors so basic
//! and collapsed views stay independently queryable.

use crate::collapse::DependencyCollapser;
use crate::dependency::{Token, TypedDependency, is_punctuation, sort_dependencies};
use crate::graph::TreeGraph;
use crate::headfinder::HeadFinder;
use crate::relation::{RelationId, RelationRegistry, RelationSet};
use crate::tree::{NodeId, Tree, TreeLike};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use thiserror::Error;

/// Whether dependencies on punctuation tokens are kept or dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunctFilter {
    Keep,
    Strip,
}

impl PunctFilter {
    pub fn accepts(self, word: &str) -> bool {
        match self {
            PunctFilter::Keep => true,
            PunctFilter::Strip => !is_punctuation(word),
        }
    }
}

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("no word with surface index {0} in this sentence")]
    UnknownIndex(usize),
    #[error("word {ancestor} does not govern word {node}, directly or transitively")]
    NotDominated { node: usize, ancestor: usize },
}

/// A head-percolated, relation-annotated analysis of one sentence
pub struct GrammaticalStructure {
    graph: TreeGraph,
    registry: Arc<RelationRegistry>,
    punct: PunctFilter,
    /// (governor head word, dependent head word) pairs from the tree
    word_pairs: Vec<(NodeId, NodeId)>,
    basic: Vec<TypedDependency>,
    with_extras: Vec<TypedDependency>,
}

impl GrammaticalStructure {
    /// Analyze `tree`: percolate heads with `hf`, apply `relations` in
    /// priority order, and cache the basic and extra typed-dependency
    /// sequences.
    pub fn build(
        tree: &Tree,
        relations: &RelationSet,
        hf: &HeadFinder,
        registry: Arc<RelationRegistry>,
        punct: PunctFilter,
    ) -> Self {
        let mut graph = TreeGraph::from_tree(tree);
        graph.percolate_heads(hf);
        if graph.nodes[graph.root].label.is_none() {
            graph.nodes[graph.root].label = Some("ROOT".to_string());
        }

        let keep = |w: &str| punct.accepts(w);
        let word_pairs = graph.word_pair_dependencies(&keep);
        for &(gov, dep) in &word_pairs {
            graph.nodes[dep].governor = Some(gov);
        }

        let root = graph.root;
        apply_relations(&mut graph, relations, root, root);

        let mut gs = Self {
            graph,
            registry,
            punct,
            word_pairs,
            basic: Vec::new(),
            with_extras: Vec::new(),
        };
        gs.basic = gs.derive(false, &|_| true);
        gs.with_extras = gs.derive(true, &|_| true);
        gs
    }

    pub fn graph(&self) -> &TreeGraph {
        &self.graph
    }

    pub fn registry(&self) -> &RelationRegistry {
        &self.registry
    }

    fn token(&self, leaf: NodeId) -> Token {
        Token::new(self.graph.word(leaf), self.graph.index(leaf))
    }

    /// Build one typed-dependency sequence from the recorded arcs
    fn derive(
        &self,
        include_extras: bool,
        extra_filter: &dyn Fn(RelationId) -> bool,
    ) -> Vec<TypedDependency> {
        let mut deps = Vec::with_capacity(self.word_pairs.len() + 1);
        for &(gov, dep) in &self.word_pairs {
            let reln = self.resolve_nodes(gov, dep);
            deps.push(TypedDependency::new(reln, self.token(gov), self.token(dep)));
        }
        self.add_root_dependency(&mut deps);
        if include_extras {
            self.add_tree_extras(&mut deps, extra_filter);
        }
        sort_dependencies(&mut deps, &self.registry);
        deps
    }

    /// Synthesize `root(ROOT-0, w)` for the sentence head. When the
    /// sequence has no root candidate (single-word sentences), fall
    /// back to the tree's head word, then to the first leaf.
    fn add_root_dependency(&self, deps: &mut Vec<TypedDependency>) {
        let roots = get_roots(deps);
        let root_token = match roots.first() {
            Some(dep) => Some(dep.gov.clone()),
            None => self
                .graph
                .head_word(self.graph.root)
                .or_else(|| {
                    let leaves = self.graph.leaves();
                    leaves
                        .first()
                        .map(|&l| self.graph.head_word(l).unwrap_or(l))
                })
                .map(|l| self.token(l)),
        };
        if let Some(token) = root_token
            && self.punct.accepts(&token.form)
        {
            deps.push(TypedDependency::new(
                self.registry.root_relation(),
                Token::root(),
                token,
            ));
        }
    }

    /// Second extraction pass: walk every phrasal node and inspect all
    /// of its relation-tagged arcs, not only those rooted at the top of
    /// its head chain. Dependencies found here may give a dependent a
    /// second governor, so they are marked extra.
    fn add_tree_extras(
        &self,
        deps: &mut Vec<TypedDependency>,
        extra_filter: &dyn Fn(RelationId) -> bool,
    ) {
        for node in 0..self.graph.nodes.len() {
            if !self.graph.is_phrasal(node) {
                continue;
            }
            let mut targets: Vec<NodeId> = self.graph.nodes[node]
                .arcs
                .values()
                .flatten()
                .copied()
                .collect();
            targets.sort_unstable();
            targets.dedup();
            for target in targets {
                let (Some(gov), Some(dep)) =
                    (self.graph.head_word(node), self.graph.head_word(target))
                else {
                    continue;
                };
                if gov == dep {
                    continue;
                }
                for reln in self.resolve_nodes_list(node, target) {
                    let mut td =
                        TypedDependency::new(reln, self.token(gov), self.token(dep));
                    td.extra = true;
                    if !deps.contains(&td)
                        && self.punct.accepts(&td.dep.form)
                        && extra_filter(reln)
                    {
                        deps.push(td);
                    }
                }
            }
        }
    }

    /// Resolve the single most specific relation between two nodes.
    ///
    /// Gathers the arc tags between the highest-same-head ancestors of
    /// the pair and keeps the most specific; defaults to the hierarchy
    /// root when no arc exists.
    fn resolve_nodes(&self, gov: NodeId, dep: NodeId) -> RelationId {
        let gov_h = self.graph.highest_node_with_same_head(gov);
        let dep_h = self.graph.highest_node_with_same_head(dep);
        let mut labels = self.graph.arc_labels_to(gov_h, dep_h);
        // deterministic iteration: most-specific-wins over name order
        labels.sort_by(|&a, &b| self.registry.name(a).cmp(self.registry.name(b)));
        let mut best = self.registry.dependent();
        for label in labels {
            if self.registry.is_ancestor(best, label) {
                best = label;
            }
        }
        best
    }

    /// List-valued resolution for the extra pass: keeps every mutually
    /// incomparable relation between the pair. Arcs to the raw
    /// dependent are merged in when it differs from its
    /// highest-same-head ancestor.
    fn resolve_nodes_list(&self, gov: NodeId, dep: NodeId) -> Vec<RelationId> {
        let gov_h = self.graph.highest_node_with_same_head(gov);
        let dep_h = self.graph.highest_node_with_same_head(dep);
        let mut labels = self.graph.arc_labels_to(gov_h, dep_h);
        if dep != dep_h {
            for extra in self.graph.arc_labels_to(gov_h, dep) {
                if !labels.contains(&extra) {
                    labels.push(extra);
                }
            }
        }
        labels.sort_by(|&a, &b| self.registry.name(a).cmp(self.registry.name(b)));

        let mut list: Vec<RelationId> = Vec::new();
        for reln in labels {
            let mut dominated = false;
            list.retain(|&existing| {
                if self.registry.is_ancestor(existing, reln) && existing != reln {
                    // the new relation specializes this entry
                    false
                } else {
                    if self.registry.is_ancestor(reln, existing) {
                        dominated = true;
                    }
                    true
                }
            });
            if !dominated && !list.contains(&reln) {
                list.push(reln);
            }
        }
        list
    }

    /// Most specific relation between two words, by surface index
    pub fn relation_between(&self, gov_index: usize, dep_index: usize) -> Option<RelationId> {
        let gov = self.graph.leaf_by_index(gov_index)?;
        let dep = self.graph.leaf_by_index(dep_index)?;
        Some(self.resolve_nodes(gov, dep))
    }

    /// The basic (tree-shaped) typed dependencies, or the sequence with
    /// extras when `include_extras` is set.
    pub fn typed_dependencies(&self, include_extras: bool) -> Vec<TypedDependency> {
        if include_extras {
            self.with_extras.clone()
        } else {
            self.basic.clone()
        }
    }

    /// Typed dependencies with a language correction pass applied
    pub fn typed_dependencies_with(
        &self,
        collapser: &dyn DependencyCollapser,
        include_extras: bool,
    ) -> Vec<TypedDependency> {
        let mut deps = self.typed_dependencies(include_extras);
        collapser.correct(&self.registry, &mut deps);
        sort_dependencies(&mut deps, &self.registry);
        deps
    }

    /// General collapsing pipeline. Extras are recomputed here rather
    /// than copied from the cached sequence so the collapser's veto
    /// hook applies to them.
    pub fn collapsed_dependencies(
        &self,
        collapser: &dyn DependencyCollapser,
        cc_process: bool,
        include_extras: bool,
    ) -> Vec<TypedDependency> {
        let mut deps = self.basic.clone();
        if include_extras {
            self.add_tree_extras(&mut deps, &|reln| collapser.keep_extra(&self.registry, reln));
        }
        collapser.collapse(&self.registry, &mut deps, cc_process);
        sort_dependencies(&mut deps, &self.registry);
        deps
    }

    /// Tree-preserving collapsing pipeline
    pub fn collapsed_tree_dependencies(
        &self,
        collapser: &dyn DependencyCollapser,
    ) -> Vec<TypedDependency> {
        let mut deps = self.basic.clone();
        collapser.collapse_tree(&self.registry, &mut deps);
        sort_dependencies(&mut deps, &self.registry);
        deps
    }

    /// Relation labels on the path from `node_index` up to
    /// `ancestor_index`, one entry per hop; incomparable labels on one
    /// hop are joined with `+`.
    pub fn dependency_path(
        &self,
        node_index: usize,
        ancestor_index: usize,
    ) -> Result<Vec<String>, StructureError> {
        let mut node = self
            .graph
            .leaf_by_index(node_index)
            .ok_or(StructureError::UnknownIndex(node_index))?;
        let target = self
            .graph
            .leaf_by_index(ancestor_index)
            .ok_or(StructureError::UnknownIndex(ancestor_index))?;
        let mut path = Vec::new();
        let not_dominated = || StructureError::NotDominated {
            node: node_index,
            ancestor: ancestor_index,
        };
        let mut hops = 0;
        while node != target {
            let Some(gov) = self.graph.nodes[node].governor else {
                return Err(not_dominated());
            };
            let labels = self.resolve_nodes_list(gov, node);
            let joined = labels
                .iter()
                .map(|&r| self.registry.name(r))
                .collect::<Vec<_>>()
                .join("+");
            path.push(joined);
            node = gov;
            hops += 1;
            if hops > self.graph.nodes.len() {
                return Err(not_dominated());
            }
        }
        Ok(path)
    }
}

/// Apply the relation rules at `node` and recursively below it,
/// recording arcs on the highest ancestor sharing the node's head.
fn apply_relations(graph: &mut TreeGraph, relations: &RelationSet, node: NodeId, root: NodeId) {
    if !graph.is_phrasal(node) {
        return;
    }
    let t_high = graph.highest_node_with_same_head(node);
    let mut arcs = Vec::new();
    for (reln, rule) in relations.iter() {
        if rule.is_applicable(graph, node) {
            for target in rule.related_nodes(graph, node, root) {
                arcs.push((reln, target));
            }
        }
    }
    for (reln, target) in arcs {
        graph.add_arc(t_high, reln, target);
    }
    for i in 0..graph.nodes[node].children.len() {
        let kid = graph.nodes[node].children[i];
        apply_relations(graph, relations, kid, root);
    }
}

/// Dependencies whose governor never appears as a dependent elsewhere
/// in the sequence (one entry per distinct such governor).
pub fn get_roots(deps: &[TypedDependency]) -> Vec<TypedDependency> {
    let dependents: FxHashSet<&Token> = deps.iter().map(|d| &d.dep).collect();
    let mut seen_govs: FxHashSet<&Token> = FxHashSet::default();
    let mut roots = Vec::new();
    for dep in deps {
        if !dependents.contains(&dep.gov) && seen_govs.insert(&dep.gov) {
            roots.push(dep.clone());
        }
    }
    roots
}

/// A dependency sequence is connected iff it has at most one root
pub fn is_connected(deps: &[TypedDependency]) -> bool {
    get_roots(deps).len() <= 1
}
