//! Typed dependencies between words
//!
//! A [`TypedDependency`] is an immutable (relation, governor, dependent)
//! triple over surface tokens. Equality and hashing ignore the `extra`
//! marker, so the basic and extra extraction passes agree on identity.

use crate::relation::{RelationId, RelationRegistry};
use std::cmp::Ordering;

/// A word occurrence: surface form plus 1-based sentence position.
/// Index 0 is reserved for the virtual ROOT token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub form: String,
    pub index: usize,
}

impl Token {
    pub fn new(form: impl Into<String>, index: usize) -> Self {
        Self {
            form: form.into(),
            index,
        }
    }

    /// The virtual root-of-sentence token
    pub fn root() -> Self {
        Self::new("ROOT", 0)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.form, self.index)
    }
}

/// A labeled grammatical relation between two tokens
#[derive(Debug, Clone)]
pub struct TypedDependency {
    pub reln: RelationId,
    pub gov: Token,
    pub dep: Token,
    /// set on dependencies added by the extra pass, which may give a
    /// dependent a second governor
    pub extra: bool,
}

impl TypedDependency {
    pub fn new(reln: RelationId, gov: Token, dep: Token) -> Self {
        Self {
            reln,
            gov,
            dep,
            extra: false,
        }
    }

    /// Predicate text form: `reln(gov-idx, dep-idx)`
    pub fn to_predicate(&self, registry: &RelationRegistry) -> String {
        format!("{}({}, {})", registry.name(self.reln), self.gov, self.dep)
    }

    /// XML form with escaped content
    pub fn to_xml(&self, registry: &RelationRegistry) -> String {
        format!(
            "<dep type=\"{}\">\n  <governor idx=\"{}\">{}</governor>\n  <dependent idx=\"{}\">{}</dependent>\n</dep>",
            xml_escape(registry.name(self.reln)),
            self.gov.index,
            xml_escape(&self.gov.form),
            self.dep.index,
            xml_escape(&self.dep.form),
        )
    }
}

// identity is the (relation, governor, dependent) triple; `extra` is
// bookkeeping about how the dependency was found
impl PartialEq for TypedDependency {
    fn eq(&self, other: &Self) -> bool {
        self.reln == other.reln && self.gov == other.gov && self.dep == other.dep
    }
}

impl Eq for TypedDependency {}

impl std::hash::Hash for TypedDependency {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.reln.hash(state);
        self.gov.hash(state);
        self.dep.hash(state);
    }
}

/// Total order over dependencies: dependent position, then governor
/// position, then relation name.
pub fn compare_dependencies(
    a: &TypedDependency,
    b: &TypedDependency,
    registry: &RelationRegistry,
) -> Ordering {
    a.dep
        .index
        .cmp(&b.dep.index)
        .then_with(|| a.gov.index.cmp(&b.gov.index))
        .then_with(|| registry.name(a.reln).cmp(registry.name(b.reln)))
}

/// Sort a dependency list into its canonical order
pub fn sort_dependencies(deps: &mut [TypedDependency], registry: &RelationRegistry) {
    deps.sort_by(|a, b| compare_dependencies(a, b, registry));
}

/// Language-independent punctuation test: a token is punctuation iff it
/// contains no alphabetic or numeric codepoint.
pub fn is_punctuation(token: &str) -> bool {
    !token.chars().any(|c| c.is_alphanumeric())
}

/// Render a dependency list in predicate form, one per line
pub fn to_predicate_string(deps: &[TypedDependency], registry: &RelationRegistry) -> String {
    let mut out = String::new();
    for dep in deps {
        out.push_str(&dep.to_predicate(registry));
        out.push('\n');
    }
    out
}

/// Render a dependency list as XML `<dep>` elements
pub fn to_xml_string(deps: &[TypedDependency], registry: &RelationRegistry) -> String {
    let mut out = String::new();
    for dep in deps {
        out.push_str(&dep.to_xml(registry));
        out.push('\n');
    }
    out
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
