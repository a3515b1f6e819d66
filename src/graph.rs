//! Dependency-annotated tree graph
//!
//! A [`TreeGraph`] is a structural copy of a [`Tree`] whose nodes also
//! carry a parent back-reference, the id of their lexical head word,
//! the id of their governing word, and a multimap of relation-tagged
//! arcs. The copy is populated by two passes (head percolation, then
//! relation application) and read-only afterwards. All references are
//! arena indices, so the graph atop the tree needs no ownership cycles.

use crate::headfinder::HeadFinder;
use crate::relation::RelationId;
use crate::tree::{NodeId, Tree, TreeLike};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

/// A node of the graph: tree structure plus dependency annotations
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub label: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// 1-based surface position for leaves, 0 for internal nodes
    pub index: usize,
    /// the leaf carrying this subtree's lexical head, set by percolation
    pub head_word: Option<NodeId>,
    /// for head-word leaves: the head word governing this one
    pub governor: Option<NodeId>,
    /// relation-tagged arcs to dependent nodes
    pub arcs: FxHashMap<RelationId, Vec<NodeId>>,
}

/// Tree plus arcs for one sentence
#[derive(Debug, Clone)]
pub struct TreeGraph {
    pub nodes: Vec<GraphNode>,
    pub root: NodeId,
}

impl TreeLike for TreeGraph {
    fn label(&self, node: NodeId) -> Option<&str> {
        self.nodes[node].label.as_deref()
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }
}

impl TreeGraph {
    /// Structurally copy `tree`, assigning fresh pre-order ids and
    /// 1-based leaf indices.
    pub fn from_tree(tree: &Tree) -> Self {
        let mut graph = Self {
            nodes: Vec::with_capacity(tree.nodes.len()),
            root: 0,
        };
        graph.copy_node(tree, tree.root, None);
        let leaves = graph.leaves();
        for (i, leaf) in leaves.into_iter().enumerate() {
            graph.nodes[leaf].index = i + 1;
        }
        graph
    }

    fn copy_node(&mut self, tree: &Tree, from: NodeId, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            label: tree.nodes[from].label.clone(),
            children: Vec::new(),
            parent,
            index: 0,
            head_word: None,
            governor: None,
            arcs: FxHashMap::default(),
        });
        for &kid in tree.children(from) {
            let copied = self.copy_node(tree, kid, Some(id));
            self.nodes[id].children.push(copied);
        }
        id
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    pub fn head_word(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].head_word
    }

    /// The word form of a leaf node
    pub fn word(&self, leaf: NodeId) -> &str {
        self.nodes[leaf].label.as_deref().unwrap_or("")
    }

    /// 1-based surface index of a leaf
    pub fn index(&self, leaf: NodeId) -> usize {
        self.nodes[leaf].index
    }

    /// All leaves in surface order
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(self.root, &mut out);
        out
    }

    fn collect_leaves(&self, node: NodeId, out: &mut Vec<NodeId>) {
        if self.nodes[node].children.is_empty() {
            out.push(node);
        } else {
            for i in 0..self.nodes[node].children.len() {
                self.collect_leaves(self.nodes[node].children[i], out);
            }
        }
    }

    /// Find the leaf with the given 1-based surface index
    pub fn leaf_by_index(&self, index: usize) -> Option<NodeId> {
        self.leaves().into_iter().find(|&l| self.nodes[l].index == index)
    }

    /// Percolate head words from the leaves up (post-order).
    ///
    /// A leaf is its own head. An internal node copies the head word of
    /// the child the head finder selects. When head finding fails the
    /// node's head word stays unset — reported, never defaulted.
    pub fn percolate_heads(&mut self, hf: &HeadFinder) {
        self.percolate(hf, self.root, None);
    }

    fn percolate(&mut self, hf: &HeadFinder, node: NodeId, parent: Option<NodeId>) {
        if self.nodes[node].children.is_empty() {
            if self.nodes[node].head_word.is_none() {
                self.nodes[node].head_word = Some(node);
            }
            return;
        }
        for i in 0..self.nodes[node].children.len() {
            let kid = self.nodes[node].children[i];
            self.percolate(hf, kid, Some(node));
        }
        match hf.determine_head(&*self, node, parent) {
            Some(head) => match self.nodes[head].head_word {
                Some(hwn) => self.nodes[node].head_word = Some(hwn),
                None if self.nodes[head].children.is_empty() => {
                    self.nodes[node].head_word = Some(head);
                }
                None => {
                    warn!(
                        category = self.nodes[node].label.as_deref().unwrap_or("?"),
                        "selected head child has no head word"
                    );
                }
            },
            None => {
                warn!(
                    category = self.nodes[node].label.as_deref().unwrap_or("?"),
                    "no head found"
                );
            }
        }
    }

    /// The highest ancestor of `node` sharing its head word: walks up
    /// the top of any unary or head-sharing chain.
    pub fn highest_node_with_same_head(&self, node: NodeId) -> NodeId {
        let mut current = node;
        loop {
            match self.nodes[current].parent {
                Some(parent)
                    if self.nodes[parent].head_word == self.nodes[current].head_word =>
                {
                    current = parent;
                }
                _ => return current,
            }
        }
    }

    /// Record a relation-tagged arc; duplicate targets are ignored
    pub fn add_arc(&mut self, node: NodeId, reln: RelationId, target: NodeId) {
        let targets = self.nodes[node].arcs.entry(reln).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// All relation tags on arcs from `node` to `target`
    pub fn arc_labels_to(&self, node: NodeId, target: NodeId) -> Vec<RelationId> {
        self.nodes[node]
            .arcs
            .iter()
            .filter(|(_, targets)| targets.contains(&target))
            .map(|(&reln, _)| reln)
            .collect()
    }

    /// Derive governor/dependent head-word pairs from the tree: every
    /// node with two or more children contributes one pair per child
    /// whose head word differs from the node's. `keep` filters on the
    /// dependent word form (the punctuation policy).
    pub fn word_pair_dependencies(&self, keep: &dyn Fn(&str) -> bool) -> Vec<(NodeId, NodeId)> {
        let mut seen: FxHashSet<(NodeId, NodeId)> = FxHashSet::default();
        let mut pairs = Vec::new();
        for node in 0..self.nodes.len() {
            if self.nodes[node].children.len() < 2 {
                continue;
            }
            let Some(gov) = self.nodes[node].head_word else {
                continue;
            };
            for i in 0..self.nodes[node].children.len() {
                let kid = self.nodes[node].children[i];
                let Some(dep) = self.nodes[kid].head_word else {
                    continue;
                };
                if dep == gov || !keep(self.word(dep)) {
                    continue;
                }
                if seen.insert((gov, dep)) {
                    pairs.push((gov, dep));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headfinder::{HeadFinder, english};
    use crate::penn::PennReader;

    fn graph_of(text: &str) -> TreeGraph {
        let tree = PennReader::from_str(text).next().unwrap().unwrap();
        let mut graph = TreeGraph::from_tree(&tree);
        graph.percolate_heads(&english());
        graph
    }

    #[test]
    fn test_percolation_sets_every_head_within_yield() {
        let graph = graph_of("(S (NP (DT the) (NN dog)) (VP (VBZ chased) (NP (DT a) (NN cat))))");
        for node in 0..graph.nodes.len() {
            let head = graph.head_word(node).expect("covered table leaves no head unset");
            assert!(graph.nodes[head].children.is_empty(), "head must be a leaf");
            // head word must lie within the node's own yield
            let mut yield_leaves = Vec::new();
            graph.collect_leaves(node, &mut yield_leaves);
            assert!(yield_leaves.contains(&head));
        }
    }

    #[test]
    fn test_sentence_head_is_main_verb() {
        let graph = graph_of("(S (NP (DT the) (NN dog)) (VP (VBZ runs)))");
        let head = graph.head_word(graph.root).unwrap();
        assert_eq!(graph.word(head), "runs");
    }

    #[test]
    fn test_head_finding_failure_leaves_head_unset() {
        let tree = PennReader::from_str("(ZZZ (QQ a) (QQ b))")
            .next()
            .unwrap()
            .unwrap();
        let mut graph = TreeGraph::from_tree(&tree);
        // head finder with no rules and no default
        graph.percolate_heads(&HeadFinder::new());
        assert_eq!(graph.head_word(graph.root), None);
        // leaves still head themselves
        let leaves = graph.leaves();
        assert_eq!(graph.head_word(leaves[0]), Some(leaves[0]));
    }

    #[test]
    fn test_highest_node_with_same_head() {
        let graph = graph_of("(S (NP (DT the) (NN dog)) (VP (VBZ runs)))");
        let runs = graph.leaf_by_index(3).unwrap();
        // runs -> VBZ -> VP -> S all share the head "runs"
        assert_eq!(graph.highest_node_with_same_head(runs), graph.root);
        let dog = graph.leaf_by_index(2).unwrap();
        let np = graph.children(graph.root)[0];
        assert_eq!(graph.highest_node_with_same_head(dog), np);
    }

    #[test]
    fn test_word_pair_dependencies() {
        let graph = graph_of("(S (NP (DT the) (NN dog)) (VP (VBZ runs)))");
        let pairs = graph.word_pair_dependencies(&|_| true);
        let words: Vec<(&str, &str)> = pairs
            .iter()
            .map(|&(g, d)| (graph.word(g), graph.word(d)))
            .collect();
        // S has two children: runs <- dog; NP has two: dog <- the
        assert!(words.contains(&("runs", "dog")));
        assert!(words.contains(&("dog", "the")));
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn test_word_pair_punctuation_filter() {
        let graph = graph_of("(S (NP (NN dogs)) (VP (VBP run)) (. .))");
        let keep_all = graph.word_pair_dependencies(&|_| true);
        let no_punct =
            graph.word_pair_dependencies(&|w| !crate::dependency::is_punctuation(w));
        assert_eq!(keep_all.len(), no_punct.len() + 1);
    }

    #[test]
    fn test_arcs_deduplicate() {
        let mut graph = graph_of("(S (NP (NN dogs)) (VP (VBP run)))");
        let reg = crate::relation::RelationRegistry::with_builtins();
        let nsubj = reg.lookup("nsubj").unwrap();
        let np = graph.children(graph.root)[0];
        graph.add_arc(graph.root, nsubj, np);
        graph.add_arc(graph.root, nsubj, np);
        assert_eq!(graph.nodes[graph.root].arcs[&nsubj].len(), 1);
        assert_eq!(graph.arc_labels_to(graph.root, np), vec![nsubj]);
    }
}
