//! Head-finding rule interpreter
//!
//! A [`HeadFinder`] selects, for any internal tree node, which child is
//! its lexical head. Rule lists are keyed by the node's basic category
//! and tried in order; each rule scans the children in one of six
//! directional modes. The last rule for a category may fall back to a
//! positional default when its scan finds nothing.

use crate::tree::{NodeId, TreeLike};
use rustc_hash::FxHashMap;

/// How a rule's category priority list is searched over the children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// for each category in priority order, scan children left to right
    Left,
    /// scan children left to right, matching against the whole set
    LeftDis,
    /// scan left to right for the first child NOT in the set
    LeftExcept,
    /// for each category in priority order, scan children right to left
    Right,
    /// scan children right to left, matching against the whole set
    RightDis,
    /// scan right to left for the first child NOT in the set
    RightExcept,
}

impl Direction {
    /// Positional fallback used when a default-marked rule finds nothing
    fn fallback_leftmost(self) -> bool {
        matches!(self, Direction::Left | Direction::LeftDis | Direction::LeftExcept)
    }
}

/// One head rule: a search direction plus a category priority list
#[derive(Debug, Clone)]
pub struct HeadRule {
    pub dir: Direction,
    pub cats: Vec<String>,
}

impl HeadRule {
    pub fn new(dir: Direction, cats: &[&str]) -> Self {
        Self {
            dir,
            cats: cats.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Hook consulted before the rule table, for corpora that carry gold
/// head annotations on nodes.
pub type MarkedHeadFn = fn(&dyn TreeLike, NodeId) -> Option<NodeId>;

/// Deterministic rule-table head finder
pub struct HeadFinder {
    rules: FxHashMap<String, Vec<HeadRule>>,
    default_rule: Option<HeadRule>,
    marked_head: Option<MarkedHeadFn>,
}

/// Strip Penn-style functional annotation from a category label:
/// `NP-SBJ-1` and `NP=2` both normalize to `NP`. Labels that *start*
/// with `-` (`-LRB-`, `-NONE-`) are kept whole.
pub fn basic_category(label: &str) -> &str {
    if label.starts_with('-') {
        return label;
    }
    let cut = label
        .find(|c| c == '-' || c == '=' || c == '|')
        .unwrap_or(label.len());
    &label[..cut]
}

impl HeadFinder {
    pub fn new() -> Self {
        Self {
            rules: FxHashMap::default(),
            default_rule: None,
            marked_head: None,
        }
    }

    /// Register the in-order rule list for a basic category
    pub fn add_rules(&mut self, category: &str, rules: Vec<HeadRule>) {
        self.rules.insert(category.to_string(), rules);
    }

    /// Rule applied to categories with no entry of their own
    pub fn set_default_rule(&mut self, rule: HeadRule) {
        self.default_rule = Some(rule);
    }

    /// Install the gold-head-annotation hook
    pub fn set_marked_head_fn(&mut self, f: MarkedHeadFn) {
        self.marked_head = Some(f);
    }

    /// Determine which child of `node` is its head.
    ///
    /// Returns `None` when no rule selects a child; the caller decides
    /// what that means (percolation records it and moves on).
    pub fn determine_head(
        &self,
        tree: &dyn TreeLike,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Option<NodeId> {
        if let Some(marked) = self.marked_head
            && let Some(head) = marked(tree, node)
        {
            return Some(head);
        }

        let kids = tree.children(node);
        if kids.is_empty() {
            return None;
        }
        if kids.len() == 1 {
            // unary nodes never consult the table
            return Some(kids[0]);
        }

        let category = tree.label(node).map(basic_category).unwrap_or("");
        let chosen = match self.rules.get(category) {
            Some(rules) => {
                let last = rules.len() - 1;
                let mut found = None;
                for (i, rule) in rules.iter().enumerate() {
                    // only the final rule for a category may fall back
                    if let Some(idx) = scan(tree, kids, rule, i == last) {
                        found = Some(idx);
                        break;
                    }
                }
                found
            }
            None => {
                let rule = self.default_rule.as_ref()?;
                scan(tree, kids, rule, true)
            }
        }?;

        let adjusted = adjust_for_coordination(tree, kids, chosen);
        Some(kids[adjusted])
    }
}

impl Default for HeadFinder {
    fn default() -> Self {
        Self::new()
    }
}

fn child_category<'a>(tree: &'a dyn TreeLike, child: NodeId) -> &'a str {
    tree.label(child).map(basic_category).unwrap_or("")
}

/// Run one rule over the children, returning the index of the selected
/// child. `is_default` enables the positional fallback.
fn scan(tree: &dyn TreeLike, kids: &[NodeId], rule: &HeadRule, is_default: bool) -> Option<usize> {
    let n = kids.len();
    let found = match rule.dir {
        Direction::Left => rule.cats.iter().find_map(|cat| {
            (0..n).find(|&i| child_category(tree, kids[i]) == cat.as_str())
        }),
        Direction::Right => rule.cats.iter().find_map(|cat| {
            (0..n).rev().find(|&i| child_category(tree, kids[i]) == cat.as_str())
        }),
        Direction::LeftDis => {
            (0..n).find(|&i| rule.cats.iter().any(|c| c == child_category(tree, kids[i])))
        }
        Direction::RightDis => {
            (0..n).rev().find(|&i| rule.cats.iter().any(|c| c == child_category(tree, kids[i])))
        }
        Direction::LeftExcept => {
            (0..n).find(|&i| !rule.cats.iter().any(|c| c == child_category(tree, kids[i])))
        }
        Direction::RightExcept => {
            (0..n).rev().find(|&i| !rule.cats.iter().any(|c| c == child_category(tree, kids[i])))
        }
    };
    found.or_else(|| {
        if is_default {
            Some(if rule.dir.fallback_leftmost() { 0 } else { n - 1 })
        } else {
            None
        }
    })
}

/// Post-selection adjustment: when the chosen head is immediately
/// preceded by a coordinating conjunction, prefer the conjunct two
/// positions earlier, stepping over intervening punctuation.
fn adjust_for_coordination(tree: &dyn TreeLike, kids: &[NodeId], head_idx: usize) -> usize {
    if head_idx < 2 {
        return head_idx;
    }
    let prev = child_category(tree, kids[head_idx - 1]);
    if prev != "CC" && prev != "CONJP" {
        return head_idx;
    }
    let mut new_idx = head_idx - 2;
    loop {
        let cat = child_category(tree, kids[new_idx]);
        let is_punct = matches!(cat, "," | ":" | "." | "''" | "``" | "-LRB-" | "-RRB-");
        if !is_punct {
            return new_idx;
        }
        if new_idx == 0 {
            return head_idx;
        }
        new_idx -= 1;
    }
}

/// Head rules for English phrase-structure trees, tuned to pick semantic
/// heads (main verbs rather than auxiliaries where the bracketing allows).
pub fn english() -> HeadFinder {
    use Direction::*;
    let mut hf = HeadFinder::new();

    hf.add_rules("ROOT", vec![HeadRule::new(Left, &["S", "SQ", "SINV", "SBAR", "FRAG"])]);
    hf.add_rules("TOP", vec![HeadRule::new(Left, &["S", "SQ", "SINV", "SBAR", "FRAG"])]);

    hf.add_rules(
        "S",
        vec![
            HeadRule::new(Left, &["VP", "S", "FRAG", "SBAR", "ADJP", "UCP", "TO"]),
            HeadRule::new(Right, &["NP"]),
        ],
    );
    hf.add_rules(
        "SBAR",
        vec![HeadRule::new(
            Left,
            &["S", "SQ", "SINV", "SBAR", "FRAG", "VP", "WHNP", "WHPP", "WHADVP", "WHADJP", "IN", "DT"],
        )],
    );
    hf.add_rules(
        "SBARQ",
        vec![HeadRule::new(Left, &["SQ", "S", "SINV", "SBARQ", "FRAG", "SBAR"])],
    );
    hf.add_rules(
        "SQ",
        vec![HeadRule::new(
            Left,
            &["VP", "SQ", "ADJP", "VB", "VBZ", "VBD", "VBP", "MD", "AUX", "AUXG"],
        )],
    );
    hf.add_rules(
        "SINV",
        vec![HeadRule::new(
            Left,
            &["VBZ", "VBD", "VBP", "VB", "MD", "VBN", "VP", "S", "SINV", "ADJP", "JJP", "NP"],
        )],
    );
    hf.add_rules(
        "VP",
        vec![HeadRule::new(
            Left,
            &[
                "TO", "VBD", "VBN", "MD", "VBZ", "VB", "VBG", "VBP", "VP", "ADJP", "NN", "NNS",
                "JJ", "NP", "NNP",
            ],
        )],
    );
    hf.add_rules(
        "NP",
        vec![
            HeadRule::new(RightDis, &["NN", "NNP", "NNPS", "NNS", "NX", "NML", "JJR", "WP"]),
            HeadRule::new(Left, &["NP", "PRP"]),
            HeadRule::new(RightDis, &["$", "ADJP", "FW"]),
            HeadRule::new(Right, &["CD"]),
            HeadRule::new(RightDis, &["JJ", "JJS", "QP", "DT", "WDT", "NML", "PRN", "RB", "RBR", "ADVP"]),
            HeadRule::new(RightDis, &["VP", "VB", "VBZ", "VBD", "VBP"]),
            HeadRule::new(Left, &["POS"]),
        ],
    );
    let np_rules = hf.rules["NP"].clone();
    hf.add_rules("NX", np_rules.clone());
    hf.add_rules("NML", np_rules);
    hf.add_rules(
        "WHNP",
        vec![
            HeadRule::new(RightDis, &["NN", "NNP", "NNPS", "NNS", "NX", "NML", "JJR", "WP"]),
            HeadRule::new(Left, &["WHNP", "NP"]),
            HeadRule::new(RightDis, &["$", "ADJP", "PRN", "FW"]),
            HeadRule::new(Right, &["CD"]),
            HeadRule::new(RightDis, &["JJ", "JJS", "RB", "QP"]),
            HeadRule::new(Left, &["WHPP", "WHADJP", "WP$", "WDT"]),
        ],
    );
    hf.add_rules(
        "WHADJP",
        vec![
            HeadRule::new(Left, &["ADJP", "JJ", "JJR", "WP"]),
            HeadRule::new(Right, &["RB"]),
            HeadRule::new(Right, &[]),
        ],
    );
    hf.add_rules("WHADVP", vec![HeadRule::new(RightDis, &["WRB", "WHADVP", "RB", "JJ"])]);
    hf.add_rules("WHPP", vec![HeadRule::new(Left, &["IN", "TO", "FW"])]);
    hf.add_rules(
        "QP",
        vec![HeadRule::new(
            Right,
            &["$", "NNS", "NN", "CD", "JJ", "PDT", "DT", "IN", "RB", "NCD", "QP", "JJR", "JJS"],
        )],
    );
    hf.add_rules(
        "ADJP",
        vec![
            HeadRule::new(Left, &["$"]),
            HeadRule::new(RightDis, &["NNS", "NN", "JJ", "QP", "VBN", "VBG"]),
            HeadRule::new(
                Left,
                &["ADJP", "JJP", "JJR", "JJS", "DT", "RB", "RBR", "CD", "IN", "VBD"],
            ),
            HeadRule::new(Left, &[]),
        ],
    );
    hf.add_rules(
        "ADVP",
        vec![
            HeadRule::new(Left, &["ADVP", "IN"]),
            HeadRule::new(RightDis, &["RB", "RBR", "RBS", "JJ", "JJR", "JJS"]),
            HeadRule::new(RightDis, &["RP", "DT", "NN", "CD", "NP", "VBN", "NNP", "CC", "FW", "NNS", "ADJP", "NML"]),
        ],
    );
    hf.add_rules("PP", vec![
        HeadRule::new(Right, &["IN", "TO", "VBG", "VBN", "RP", "FW", "JJ", "SYM"]),
        HeadRule::new(Left, &["PP"]),
    ]);
    hf.add_rules(
        "PRN",
        vec![HeadRule::new(
            Left,
            &["VP", "SQ", "S", "SINV", "SBAR", "NP", "ADJP", "PP", "ADVP", "INTJ", "WHNP", "NAC", "VBP", "JJ", "NN", "NNP"],
        )],
    );
    hf.add_rules("PRT", vec![HeadRule::new(Right, &["RP"])]);
    hf.add_rules("INTJ", vec![HeadRule::new(Left, &[])]);
    hf.add_rules("CONJP", vec![HeadRule::new(Right, &["CC", "VB", "JJ", "RB", "IN"])]);
    hf.add_rules(
        "FRAG",
        vec![
            HeadRule::new(Left, &["IN"]),
            HeadRule::new(Right, &["RB"]),
            HeadRule::new(Left, &["NP"]),
            HeadRule::new(Left, &["ADJP", "ADVP", "FRAG", "S", "SBAR", "VP"]),
        ],
    );
    hf.add_rules("UCP", vec![HeadRule::new(Left, &[])]);
    hf.add_rules("RRC", vec![HeadRule::new(Right, &["VP", "NP", "ADVP", "ADJP", "PP"])]);
    hf.add_rules(
        "NAC",
        vec![HeadRule::new(
            Left,
            &["NN", "NNS", "NNP", "NNPS", "NP", "NAC", "EX", "$", "CD", "QP", "PRP", "VBG", "JJ", "JJS", "JJR", "ADJP", "FW"],
        )],
    );
    hf.add_rules("LST", vec![HeadRule::new(Right, &["LS", ":"])]);
    hf.add_rules("X", vec![HeadRule::new(Right, &["S", "VP", "ADJP", "NP", "SBAR", "PP", "X"])]);
    hf.set_default_rule(HeadRule::new(Left, &[]));

    hf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    fn preterminal(tag: &str, word: &str) -> Tree {
        Tree::node(tag, vec![Tree::leaf(word)])
    }

    /// A node whose children carry categories [X, B, A, Y]
    fn xbay() -> Tree {
        Tree::node(
            "P",
            vec![
                preterminal("X", "x"),
                preterminal("B", "b"),
                preterminal("A", "a"),
                preterminal("Y", "y"),
            ],
        )
    }

    fn finder_with(rules: Vec<HeadRule>) -> HeadFinder {
        let mut hf = HeadFinder::new();
        hf.add_rules("P", rules);
        hf
    }

    #[test]
    fn test_left_searches_categories_in_priority_order() {
        let tree = xbay();
        let hf = finder_with(vec![HeadRule::new(Direction::Left, &["A", "B"])]);
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        // "A" is searched across all positions before "B" is considered
        assert_eq!(head, tree.children(tree.root)[2]);
    }

    #[test]
    fn test_leftdis_takes_leftmost_member_of_set() {
        let tree = xbay();
        let hf = finder_with(vec![HeadRule::new(Direction::LeftDis, &["A", "B"])]);
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[1]);
    }

    #[test]
    fn test_rightdis_takes_rightmost_member_of_set() {
        let tree = xbay();
        let hf = finder_with(vec![HeadRule::new(Direction::RightDis, &["A", "B"])]);
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[2]);
    }

    #[test]
    fn test_leftexcept_skips_listed_categories() {
        let tree = xbay();
        let hf = finder_with(vec![HeadRule::new(Direction::LeftExcept, &["X", "B"])]);
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[2]); // first non-listed is A
    }

    #[test]
    fn test_failed_scan_without_default_returns_none_then_falls_through() {
        let tree = xbay();
        // first rule misses; second (last = default) falls back to leftmost
        let hf = finder_with(vec![
            HeadRule::new(Direction::Left, &["ZZ"]),
            HeadRule::new(Direction::Left, &["QQ"]),
        ]);
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[0]);
    }

    #[test]
    fn test_right_default_falls_back_to_rightmost() {
        let tree = xbay();
        let hf = finder_with(vec![HeadRule::new(Direction::Right, &["ZZ"])]);
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[3]);
    }

    #[test]
    fn test_unknown_category_without_default_rule_is_none() {
        let tree = xbay();
        let hf = HeadFinder::new();
        assert_eq!(hf.determine_head(&tree, tree.root, None), None);
    }

    #[test]
    fn test_unknown_category_uses_caller_default_rule() {
        let tree = xbay();
        let mut hf = HeadFinder::new();
        hf.set_default_rule(HeadRule::new(Direction::Right, &[]));
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[3]);
    }

    #[test]
    fn test_unary_node_never_consults_table() {
        let tree = Tree::node("ZZZ", vec![preterminal("NN", "dog")]);
        let hf = HeadFinder::new(); // empty table
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[0]);
    }

    #[test]
    fn test_coordination_adjustment_steps_past_conjunction() {
        // (NP (NN cats) (CC and) (NN dogs)): "right NN" picks "dogs",
        // the CC before it moves the head back to "cats"
        let tree = Tree::node(
            "P",
            vec![preterminal("NN", "cats"), preterminal("CC", "and"), preterminal("NN", "dogs")],
        );
        let hf = finder_with(vec![HeadRule::new(Direction::Right, &["NN"])]);
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[0]);
    }

    #[test]
    fn test_basic_category_normalization() {
        assert_eq!(basic_category("NP-SBJ"), "NP");
        assert_eq!(basic_category("NP-SBJ-1"), "NP");
        assert_eq!(basic_category("NP=2"), "NP");
        assert_eq!(basic_category("-LRB-"), "-LRB-");
        assert_eq!(basic_category("VP"), "VP");
    }

    #[test]
    fn test_english_np_head() {
        // (NP (DT the) (JJ big) (NN dog)) -> "NN dog" via rightdis
        let tree = Tree::node(
            "NP",
            vec![preterminal("DT", "the"), preterminal("JJ", "big"), preterminal("NN", "dog")],
        );
        let hf = english();
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[2]);
    }

    #[test]
    fn test_english_s_prefers_vp() {
        let tree = Tree::node(
            "S",
            vec![
                Tree::node("NP", vec![preterminal("NN", "dog")]),
                Tree::node("VP", vec![preterminal("VBZ", "runs")]),
            ],
        );
        let hf = english();
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[1]);
    }

    #[test]
    fn test_marked_head_hook_wins() {
        fn always_last(tree: &dyn TreeLike, node: NodeId) -> Option<NodeId> {
            tree.children(node).last().copied()
        }
        let tree = xbay();
        let mut hf = finder_with(vec![HeadRule::new(Direction::Left, &["X"])]);
        hf.set_marked_head_fn(always_last);
        let head = hf.determine_head(&tree, tree.root, None).unwrap();
        assert_eq!(head, tree.children(tree.root)[3]);
    }
}
