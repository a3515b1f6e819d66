//! Constituency tree data structures
//!
//! Trees are stored as flat arenas of nodes addressed by `NodeId`, so
//! parent links and later graph overlays are plain indices rather than
//! reference-counted cycles.

/// Unique identifier for a node within one tree's arena
pub type NodeId = usize;

/// Read-only view of labeled, ordered tree structure.
///
/// Implemented by both [`Tree`] and the dependency-annotated graph built
/// on top of it, so the head finder can run over either.
pub trait TreeLike {
    /// The category or word label of a node, if it has one
    fn label(&self, node: NodeId) -> Option<&str>;

    /// The ordered children of a node (empty for leaves)
    fn children(&self, node: NodeId) -> &[NodeId];

    /// A node is a leaf iff it has no children
    fn is_leaf(&self, node: NodeId) -> bool {
        self.children(node).is_empty()
    }

    /// A preterminal has exactly one child, which is a leaf
    fn is_preterminal(&self, node: NodeId) -> bool {
        let kids = self.children(node);
        kids.len() == 1 && self.is_leaf(kids[0])
    }

    /// A phrasal node is neither a leaf nor a preterminal
    fn is_phrasal(&self, node: NodeId) -> bool {
        !self.is_leaf(node) && !self.is_preterminal(node)
    }
}

/// A node in a constituency tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub label: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// 1-based surface position for leaves, 0 for internal nodes
    pub index: usize,
}

impl TreeNode {
    fn new(label: Option<String>) -> Self {
        Self {
            label,
            children: Vec::new(),
            parent: None,
            index: 0,
        }
    }
}

/// A constituency tree (one sentence)
#[derive(Debug, Clone)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
    pub root: NodeId,
}

impl TreeLike for Tree {
    fn label(&self, node: NodeId) -> Option<&str> {
        self.nodes[node].label.as_deref()
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }
}

impl Tree {
    /// Create a single-leaf tree
    pub fn leaf(word: impl Into<String>) -> Self {
        let mut node = TreeNode::new(Some(word.into()));
        node.index = 1;
        Self {
            nodes: vec![node],
            root: 0,
        }
    }

    /// Build a new tree from a label and child subtrees (constructive).
    ///
    /// The child arenas are grafted into a fresh arena; the inputs are
    /// consumed and the result shares no storage with them.
    pub fn node(label: impl Into<String>, children: Vec<Tree>) -> Self {
        let mut tree = Self {
            nodes: vec![TreeNode::new(Some(label.into()))],
            root: 0,
        };
        for child in children {
            let child_root = tree.graft(&child, child.root);
            tree.attach(0, child_root);
        }
        tree.index_leaves();
        tree
    }

    /// Deep-copy the subtree rooted at `node` into a standalone tree
    pub fn subtree(&self, node: NodeId) -> Tree {
        let mut tree = Self {
            nodes: Vec::new(),
            root: 0,
        };
        let root = tree.graft(self, node);
        tree.root = root;
        tree.index_leaves();
        tree
    }

    /// Copy the subtree of `other` rooted at `from` into this arena,
    /// returning the id of the copied root. The copy is detached; callers
    /// attach it with [`Tree::attach`] or one of the surgery operations.
    fn graft(&mut self, other: &Tree, from: NodeId) -> NodeId {
        let id = self.nodes.len();
        self.nodes
            .push(TreeNode::new(other.nodes[from].label.clone()));
        let kids: Vec<NodeId> = other.nodes[from].children.clone();
        for kid in kids {
            let copied = self.graft(other, kid);
            self.attach(id, copied);
        }
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    pub fn num_children(&self, node: NodeId) -> usize {
        self.nodes[node].children.len()
    }

    /// The leaves of the subtree rooted at `node`, in surface order
    pub fn leaves_under(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(node, &mut out);
        out
    }

    /// All leaves of the tree, in surface order
    pub fn leaves(&self) -> Vec<NodeId> {
        self.leaves_under(self.root)
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

    /// Assign 1-based surface indices to the leaves, left to right.
    ///
    /// Called by the constructors and the treebank reader; must be
    /// re-run after destructive surgery if word positions matter.
    pub fn index_leaves(&mut self) {
        for (i, leaf) in self.leaves().into_iter().enumerate() {
            self.nodes[leaf].index = i + 1;
        }
    }

    // -- destructive surgery ------------------------------------------------
    //
    // These mutate children in place, mirroring transformers that edit a
    // tree as they walk it. Constructive callers should use `node`/`subtree`
    // instead. Detached nodes stay in the arena but are unreachable.

    /// Insert `subtree` as the `pos`-th child of `parent` (destructive)
    pub fn add_child_at(&mut self, parent: NodeId, pos: usize, subtree: Tree) -> NodeId {
        let copied = self.graft(&subtree, subtree.root);
        self.nodes[copied].parent = Some(parent);
        self.nodes[parent].children.insert(pos, copied);
        copied
    }

    /// Detach and return the `pos`-th child of `parent` (destructive)
    pub fn remove_child_at(&mut self, parent: NodeId, pos: usize) -> NodeId {
        let removed = self.nodes[parent].children.remove(pos);
        self.nodes[removed].parent = None;
        removed
    }

    /// Replace the `pos`-th child of `parent` with `subtree`, returning
    /// the id of the new child (destructive)
    pub fn replace_child_at(&mut self, parent: NodeId, pos: usize, subtree: Tree) -> NodeId {
        let old = self.nodes[parent].children[pos];
        self.nodes[old].parent = None;
        let copied = self.graft(&subtree, subtree.root);
        self.nodes[copied].parent = Some(parent);
        self.nodes[parent].children[pos] = copied;
        copied
    }

    /// Render the tree in bracketed Penn notation
    pub fn to_bracketed(&self) -> String {
        let mut out = String::new();
        self.write_bracketed(self.root, &mut out);
        out
    }

    fn write_bracketed(&self, node: NodeId, out: &mut String) {
        if self.nodes[node].children.is_empty() {
            out.push_str(self.nodes[node].label.as_deref().unwrap_or(""));
            return;
        }
        out.push('(');
        if let Some(label) = &self.nodes[node].label {
            out.push_str(label);
        }
        for i in 0..self.nodes[node].children.len() {
            out.push(' ');
            self.write_bracketed(self.nodes[node].children[i], out);
        }
        out.push(')');
    }
}

impl std::fmt::Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_bracketed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preterminal(tag: &str, word: &str) -> Tree {
        Tree::node(tag, vec![Tree::leaf(word)])
    }

    /// (S (NP (DT the) (NN dog)) (VP (VBZ runs)))
    fn sample() -> Tree {
        Tree::node(
            "S",
            vec![
                Tree::node("NP", vec![preterminal("DT", "the"), preterminal("NN", "dog")]),
                Tree::node("VP", vec![preterminal("VBZ", "runs")]),
            ],
        )
    }

    #[test]
    fn test_leaf_iff_no_children() {
        let tree = sample();
        for id in 0..tree.nodes.len() {
            assert_eq!(tree.is_leaf(id), tree.children(id).is_empty());
        }
    }

    #[test]
    fn test_preterminal_iff_single_leaf_child() {
        let tree = sample();
        for id in 0..tree.nodes.len() {
            let kids = tree.children(id);
            let expected = kids.len() == 1 && tree.is_leaf(kids[0]);
            assert_eq!(tree.is_preterminal(id), expected);
        }
        assert!(!tree.is_preterminal(tree.root));
        assert!(tree.is_phrasal(tree.root));
    }

    #[test]
    fn test_leaf_indexing() {
        let tree = sample();
        let leaves = tree.leaves();
        let words: Vec<&str> = leaves.iter().map(|&l| tree.label(l).unwrap()).collect();
        assert_eq!(words, vec!["the", "dog", "runs"]);
        let indices: Vec<usize> = leaves.iter().map(|&l| tree.nodes[l].index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_bracketed_rendering() {
        let tree = sample();
        assert_eq!(
            tree.to_bracketed(),
            "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))"
        );
    }

    #[test]
    fn test_destructive_surgery() {
        let mut tree = sample();
        let np = tree.children(tree.root)[0];

        // remove "the"
        let removed = tree.remove_child_at(np, 0);
        assert_eq!(tree.nodes[removed].parent, None);
        assert_eq!(tree.num_children(np), 1);

        // put an adjective in its place
        tree.add_child_at(np, 0, Tree::node("JJ", vec![Tree::leaf("big")]));
        tree.index_leaves();
        assert_eq!(
            tree.to_bracketed(),
            "(S (NP (JJ big) (NN dog)) (VP (VBZ runs)))"
        );

        // swap the noun
        tree.replace_child_at(np, 1, Tree::node("NN", vec![Tree::leaf("cat")]));
        tree.index_leaves();
        assert_eq!(
            tree.to_bracketed(),
            "(S (NP (JJ big) (NN cat)) (VP (VBZ runs)))"
        );
    }

    #[test]
    fn test_constructive_subtree_is_independent() {
        let tree = sample();
        let np = tree.children(tree.root)[0];
        let mut copy = tree.subtree(np);
        assert_eq!(copy.to_bracketed(), "(NP (DT the) (NN dog))");

        let copy_root = copy.root;
        copy.replace_child_at(copy_root, 0, Tree::node("DT", vec![Tree::leaf("a")]));
        // original untouched
        assert_eq!(
            tree.to_bracketed(),
            "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))"
        );
    }
}
