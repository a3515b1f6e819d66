//! Grammatical relation tags, the concurrent relation registry, and the
//! rule contract used to attach relation arcs to tree nodes.
//!
//! Relation tags live in a dominance hierarchy: a generic tag (like
//! `mod`) dominates its specializations (like `amod`). The registry
//! interns tag names and grows lazily — collapsing passes register new
//! per-preposition and per-conjunction tags on first use — so lookups
//! are lock-free reads over a `ThreadedRodeo` while creation
//! deduplicates under a write lock.

use crate::graph::TreeGraph;
use crate::headfinder::basic_category;
use crate::tree::{NodeId, TreeLike};
use lasso::{Key, Spur, ThreadedRodeo};
use regex::Regex;
use std::sync::RwLock;
use thiserror::Error;

/// Identifier of an interned relation tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationId(Spur);

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("unknown grammatical relation '{0}'")]
    Unknown(String),
}

#[derive(Debug, Clone)]
struct RelationMeta {
    short_name: String,
    specific: Option<String>,
    parent: Option<RelationId>,
    /// self plus the whole parent chain, precomputed at creation so
    /// dominance queries never walk the hierarchy
    ancestors: Vec<RelationId>,
}

/// Interning registry of relation tags with dominance queries.
///
/// Readers resolve names and ancestors without blocking writers that
/// lazily register specialized tags (`prep_of`, `conj_and`, ...).
pub struct RelationRegistry {
    names: ThreadedRodeo,
    meta: RwLock<Vec<RelationMeta>>,
    dependent: RelationId,
    root: RelationId,
}

impl RelationRegistry {
    /// Create a registry holding only the two distinguished tags:
    /// `dep`, which dominates every other tag, and `root`.
    pub fn new() -> Self {
        let names = ThreadedRodeo::new();
        let mut registry = Self {
            names,
            meta: RwLock::new(Vec::new()),
            // placeholder ids, fixed up immediately below
            dependent: RelationId(Spur::try_from_usize(0).expect("spur zero")),
            root: RelationId(Spur::try_from_usize(0).expect("spur zero")),
        };
        registry.dependent = registry.get_or_create("dep", None, None);
        registry.root = registry.get_or_create("root", None, None);
        registry
    }

    /// The designated hierarchy root: `dep` dominates all other tags
    pub fn dependent(&self) -> RelationId {
        self.dependent
    }

    /// The relation between the virtual ROOT token and the sentence head
    pub fn root_relation(&self) -> RelationId {
        self.root
    }

    /// Intern a relation tag, deduplicating by its full name.
    ///
    /// The full name is `short_name`, or `short_name_specific` for
    /// specialized tags. Returns the existing id when already present.
    pub fn get_or_create(
        &self,
        short_name: &str,
        parent: Option<RelationId>,
        specific: Option<&str>,
    ) -> RelationId {
        let full = match specific {
            Some(s) => format!("{short_name}_{s}"),
            None => short_name.to_string(),
        };
        if let Some(spur) = self.names.get(full.as_str()) {
            return RelationId(spur);
        }
        let mut meta = self.meta.write().unwrap();
        // another writer may have registered it while we waited
        if let Some(spur) = self.names.get(full.as_str()) {
            return RelationId(spur);
        }
        let spur = self.names.get_or_intern(full.as_str());
        debug_assert_eq!(spur.into_usize(), meta.len());
        let id = RelationId(spur);
        let mut ancestors = vec![id];
        if let Some(p) = parent {
            ancestors.extend(meta[p.0.into_usize()].ancestors.iter().copied());
        }
        meta.push(RelationMeta {
            short_name: short_name.to_string(),
            specific: specific.map(|s| s.to_string()),
            parent,
            ancestors,
        });
        id
    }

    /// The full serialized name of a tag (e.g. `nsubj`, `prep_of`)
    pub fn name(&self, id: RelationId) -> &str {
        self.names.resolve(&id.0)
    }

    pub fn short_name(&self, id: RelationId) -> String {
        self.meta.read().unwrap()[id.0.into_usize()].short_name.clone()
    }

    pub fn specific(&self, id: RelationId) -> Option<String> {
        self.meta.read().unwrap()[id.0.into_usize()].specific.clone()
    }

    pub fn parent(&self, id: RelationId) -> Option<RelationId> {
        self.meta.read().unwrap()[id.0.into_usize()].parent
    }

    /// Find an already-registered tag by full name
    pub fn lookup(&self, name: &str) -> Option<RelationId> {
        self.names.get(name).map(RelationId)
    }

    /// True iff `a` equals `b` or dominates it in the hierarchy
    pub fn is_ancestor(&self, a: RelationId, b: RelationId) -> bool {
        if a == b {
            return true;
        }
        self.meta.read().unwrap()[b.0.into_usize()]
            .ancestors
            .contains(&a)
    }

    /// Parse a serialized relation name, registering it if needed.
    ///
    /// `prep_X` / `prepc_X` / `conj_X` re-attach to their generic
    /// parents with `X` as the specific word; other compound names split
    /// at the first `_` or `:`. Names that are not plain identifiers are
    /// rejected with an error naming the offender.
    pub fn parse(&self, s: &str) -> Result<RelationId, RelationError> {
        if s.is_empty()
            || !s
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '$' | '\''))
        {
            return Err(RelationError::Unknown(s.to_string()));
        }
        if let Some(id) = self.lookup(s) {
            return Ok(id);
        }
        for (prefix, parent_name) in [("prep_", "prep"), ("prepc_", "prepc"), ("conj_", "conj")] {
            if let Some(specific) = s.strip_prefix(prefix) {
                let parent = match self.lookup(parent_name) {
                    Some(p) => p,
                    None => self.get_or_create(parent_name, Some(self.dependent), None),
                };
                return Ok(self.get_or_create(
                    prefix.trim_end_matches('_'),
                    Some(parent),
                    Some(specific),
                ));
            }
        }
        match s.find(['_', ':']) {
            Some(pos) if pos > 0 && pos + 1 < s.len() => Ok(self.get_or_create(
                &s[..pos],
                Some(self.dependent),
                Some(&s[pos + 1..]),
            )),
            _ => Ok(self.get_or_create(s, Some(self.dependent), None)),
        }
    }

    /// Register the standard English-style tag hierarchy under `dep`.
    ///
    /// Callers with their own inventories can skip this and build theirs
    /// with [`RelationRegistry::get_or_create`].
    pub fn with_builtins() -> Self {
        let r = Self::new();
        let dep = r.dependent;

        let aux = r.get_or_create("aux", Some(dep), None);
        r.get_or_create("auxpass", Some(aux), None);
        r.get_or_create("cop", Some(aux), None);

        let arg = r.get_or_create("arg", Some(dep), None);
        let subj = r.get_or_create("subj", Some(arg), None);
        let nsubj = r.get_or_create("nsubj", Some(subj), None);
        r.get_or_create("nsubjpass", Some(nsubj), None);
        let csubj = r.get_or_create("csubj", Some(subj), None);
        r.get_or_create("csubjpass", Some(csubj), None);
        let comp = r.get_or_create("comp", Some(arg), None);
        let obj = r.get_or_create("obj", Some(comp), None);
        r.get_or_create("dobj", Some(obj), None);
        r.get_or_create("iobj", Some(obj), None);
        r.get_or_create("pobj", Some(obj), None);
        r.get_or_create("ccomp", Some(comp), None);
        r.get_or_create("xcomp", Some(comp), None);
        r.get_or_create("acomp", Some(comp), None);
        r.get_or_create("rel", Some(comp), None);

        let modifier = r.get_or_create("mod", Some(dep), None);
        r.get_or_create("det", Some(modifier), None);
        r.get_or_create("amod", Some(modifier), None);
        let advmod = r.get_or_create("advmod", Some(modifier), None);
        r.get_or_create("neg", Some(advmod), None);
        r.get_or_create("appos", Some(modifier), None);
        r.get_or_create("nn", Some(modifier), None);
        r.get_or_create("num", Some(modifier), None);
        let prep = r.get_or_create("prep", Some(modifier), None);
        r.get_or_create("prepc", Some(prep), None);
        r.get_or_create("poss", Some(modifier), None);
        r.get_or_create("tmod", Some(modifier), None);
        r.get_or_create("rcmod", Some(modifier), None);
        r.get_or_create("mark", Some(modifier), None);
        r.get_or_create("advcl", Some(modifier), None);

        r.get_or_create("cc", Some(dep), None);
        r.get_or_create("conj", Some(dep), None);
        r.get_or_create("punct", Some(dep), None);
        r.get_or_create("expl", Some(dep), None);

        r
    }
}

impl Default for RelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The contract each relation tag exposes to the extraction engine.
///
/// The engine never inspects how a rule decides: it only asks whether
/// the relation can hold at a node and which nodes it connects to.
pub trait RelationRule: Send + Sync {
    /// Could this relation hold with `node` as governor?
    fn is_applicable(&self, graph: &TreeGraph, node: NodeId) -> bool;

    /// Nodes to which `node` bears this relation
    fn related_nodes(&self, graph: &TreeGraph, node: NodeId, root: NodeId) -> Vec<NodeId>;
}

/// An ordered set of relation tags with their rules, tried in priority
/// order during arc construction.
pub struct RelationSet {
    entries: Vec<(RelationId, Box<dyn RelationRule>)>,
}

impl RelationSet {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, id: RelationId, rule: Box<dyn RelationRule>) {
        self.entries.push((id, rule));
    }

    pub fn iter(&self) -> impl Iterator<Item = (RelationId, &dyn RelationRule)> {
        self.entries.iter().map(|(id, rule)| (*id, rule.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RelationSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Rule matching a governor category pattern and a child category
/// pattern: the relation holds from a matching node to each matching
/// child. `exclude_head` skips children that share the governor's head
/// word (arguments and modifiers are never the head itself).
pub struct ChildPatternRule {
    source: Regex,
    child: Regex,
    exclude_head: bool,
}

impl ChildPatternRule {
    pub fn new(source: &str, child: &str, exclude_head: bool) -> Self {
        Self {
            source: Regex::new(source).expect("valid source pattern"),
            child: Regex::new(child).expect("valid child pattern"),
            exclude_head,
        }
    }
}

impl RelationRule for ChildPatternRule {
    fn is_applicable(&self, graph: &TreeGraph, node: NodeId) -> bool {
        graph
            .label(node)
            .is_some_and(|l| self.source.is_match(basic_category(l)))
    }

    fn related_nodes(&self, graph: &TreeGraph, node: NodeId, _root: NodeId) -> Vec<NodeId> {
        graph
            .children(node)
            .iter()
            .copied()
            .filter(|&kid| {
                graph
                    .label(kid)
                    .is_some_and(|l| self.child.is_match(basic_category(l)))
            })
            .filter(|&kid| {
                !self.exclude_head
                    || graph.head_word(kid).is_none()
                    || graph.head_word(kid) != graph.head_word(node)
            })
            .collect()
    }
}

/// Conjunct rule: in a coordinated phrase, the children after the first
/// coordinating conjunction that repeat the phrase category (and do not
/// carry the phrase head) are conjuncts of the head.
pub struct ConjunctRule {
    source: Regex,
}

impl ConjunctRule {
    pub fn new(source: &str) -> Self {
        Self {
            source: Regex::new(source).expect("valid source pattern"),
        }
    }
}

impl RelationRule for ConjunctRule {
    fn is_applicable(&self, graph: &TreeGraph, node: NodeId) -> bool {
        let Some(label) = graph.label(node) else {
            return false;
        };
        self.source.is_match(basic_category(label))
            && graph
                .children(node)
                .iter()
                .any(|&kid| graph.label(kid).map(basic_category) == Some("CC"))
    }

    fn related_nodes(&self, graph: &TreeGraph, node: NodeId, _root: NodeId) -> Vec<NodeId> {
        let kids = graph.children(node);
        let Some(cc_pos) = kids
            .iter()
            .position(|&kid| graph.label(kid).map(basic_category) == Some("CC"))
        else {
            return Vec::new();
        };
        kids[cc_pos + 1..]
            .iter()
            .copied()
            .filter(|&kid| {
                let cat = graph.label(kid).map(basic_category).unwrap_or("");
                cat != "CC" && !matches!(cat, "," | ":" | ".")
            })
            .filter(|&kid| graph.head_word(kid) != graph.head_word(node))
            .collect()
    }
}

/// A small English relation set over Penn categories, used by the demo
/// pipeline and benches. Real deployments supply their own rules; the
/// engine only sees the [`RelationRule`] contract.
pub fn english_demo(registry: &RelationRegistry) -> RelationSet {
    let dep = registry.dependent();
    let id = |name: &str| {
        registry
            .lookup(name)
            .unwrap_or_else(|| registry.get_or_create(name, Some(dep), None))
    };
    let mut set = RelationSet::new();
    set.push(
        id("nsubj"),
        Box::new(ChildPatternRule::new("^S$", "^NP", true)),
    );
    set.push(
        id("dobj"),
        Box::new(ChildPatternRule::new("^VP$", "^NP", true)),
    );
    set.push(
        id("aux"),
        Box::new(ChildPatternRule::new("^VP$", "^(MD|TO)$", true)),
    );
    set.push(
        id("det"),
        Box::new(ChildPatternRule::new(
            "^(NP|NX|NML|WHNP)$",
            "^(DT|PDT|WDT)$",
            true,
        )),
    );
    set.push(
        id("amod"),
        Box::new(ChildPatternRule::new(
            "^(NP|NX|NML)$",
            "^(JJ|JJR|JJS|ADJP)$",
            true,
        )),
    );
    set.push(
        id("advmod"),
        Box::new(ChildPatternRule::new(
            "^(S|VP|ADJP|ADVP)$",
            "^(RB|RBR|RBS|ADVP)$",
            true,
        )),
    );
    set.push(
        id("prep"),
        Box::new(ChildPatternRule::new("^(VP|NP|ADJP|S)$", "^PP$", true)),
    );
    set.push(
        id("pobj"),
        Box::new(ChildPatternRule::new("^PP$", "^(NP|NX)$", true)),
    );
    set.push(
        id("cc"),
        Box::new(ChildPatternRule::new(
            "^(NP|VP|S|ADJP|ADVP)$",
            "^CC$",
            true,
        )),
    );
    set.push(
        id("conj"),
        Box::new(ConjunctRule::new("^(NP|VP|S|ADJP|ADVP)$")),
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_deduplicates() {
        let r = RelationRegistry::new();
        let dep = r.dependent();
        let a = r.get_or_create("nsubj", Some(dep), None);
        let b = r.get_or_create("nsubj", Some(dep), None);
        assert_eq!(a, b);
        assert_eq!(r.name(a), "nsubj");
    }

    #[test]
    fn test_dependent_dominates_everything() {
        let r = RelationRegistry::with_builtins();
        let dep = r.dependent();
        for name in ["aux", "nsubjpass", "dobj", "neg", "prep", "conj"] {
            let id = r.lookup(name).unwrap();
            assert!(r.is_ancestor(dep, id), "dep should dominate {name}");
        }
    }

    #[test]
    fn test_is_ancestor_follows_chain() {
        let r = RelationRegistry::with_builtins();
        let subj = r.lookup("subj").unwrap();
        let nsubj = r.lookup("nsubj").unwrap();
        let nsubjpass = r.lookup("nsubjpass").unwrap();
        let dobj = r.lookup("dobj").unwrap();
        assert!(r.is_ancestor(subj, nsubjpass));
        assert!(r.is_ancestor(nsubj, nsubj));
        assert!(!r.is_ancestor(nsubj, subj));
        assert!(!r.is_ancestor(subj, dobj));
    }

    #[test]
    fn test_specialized_tag_names() {
        let r = RelationRegistry::with_builtins();
        let prep = r.lookup("prep").unwrap();
        let prep_of = r.get_or_create("prep", Some(prep), Some("of"));
        assert_eq!(r.name(prep_of), "prep_of");
        assert_eq!(r.short_name(prep_of), "prep");
        assert_eq!(r.specific(prep_of), Some("of".to_string()));
        assert!(r.is_ancestor(prep, prep_of));
    }

    #[test]
    fn test_parse_known_and_specialized() {
        let r = RelationRegistry::with_builtins();
        assert_eq!(r.parse("nsubj").unwrap(), r.lookup("nsubj").unwrap());

        let prep_of = r.parse("prep_of").unwrap();
        assert_eq!(r.name(prep_of), "prep_of");
        assert!(r.is_ancestor(r.lookup("prep").unwrap(), prep_of));

        let conj_and = r.parse("conj_and").unwrap();
        assert!(r.is_ancestor(r.lookup("conj").unwrap(), conj_and));
    }

    #[test]
    fn test_parse_novel_name_registers_under_dep() {
        let r = RelationRegistry::with_builtins();
        let id = r.parse("obl").unwrap();
        assert_eq!(r.name(id), "obl");
        assert!(r.is_ancestor(r.dependent(), id));
        // second parse resolves to the same id
        assert_eq!(r.parse("obl").unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        let r = RelationRegistry::new();
        assert!(matches!(r.parse(""), Err(RelationError::Unknown(_))));
        assert!(matches!(r.parse("ns ubj"), Err(RelationError::Unknown(_))));
        assert!(matches!(r.parse("x(y)"), Err(RelationError::Unknown(_))));
    }

    #[test]
    fn test_concurrent_get_or_create() {
        use std::sync::Arc;
        let r = Arc::new(RelationRegistry::with_builtins());
        let prep = r.lookup("prep").unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let r = Arc::clone(&r);
            handles.push(std::thread::spawn(move || {
                (0..100)
                    .map(|i| r.get_or_create("prep", Some(prep), Some(&format!("p{}", i % 10))))
                    .collect::<Vec<_>>()
            }));
        }
        let results: Vec<Vec<RelationId>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        // every thread resolved each key to the same id
        for window in results.windows(2) {
            assert_eq!(window[0], window[1]);
        }
    }
}
