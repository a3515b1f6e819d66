//! Collapsing and correction passes over typed-dependency sequences
//!
//! The extraction engine performs no collapsing itself; language
//! packages plug in a [`DependencyCollapser`]. Collapsing folds function
//! words into relation labels (`prep(ran, to)` + `pobj(to, park)`
//! becomes `prep_to(ran, park)`), which may break the tree shape; the
//! tree-preserving variant skips the rewrites that do.

use crate::dependency::TypedDependency;
use crate::relation::{RelationId, RelationRegistry};
use rustc_hash::FxHashSet;

/// Pluggable post-processing over a typed-dependency sequence.
///
/// Every method must leave dependencies alone unless they are one of
/// its documented rewrite targets; passes never drop a dependency
/// silently.
pub trait DependencyCollapser: Send + Sync {
    /// Correction pass applied to every view, collapsed or not
    fn correct(&self, _registry: &RelationRegistry, _deps: &mut Vec<TypedDependency>) {}

    /// General collapsing; with `cc_process` the pass may also
    /// propagate relations across conjuncts (which breaks tree shape)
    fn collapse(
        &self,
        registry: &RelationRegistry,
        deps: &mut Vec<TypedDependency>,
        _cc_process: bool,
    ) {
        self.correct(registry, deps);
    }

    /// Tree-preserving collapsing: no propagation, no control or
    /// relative-clause rewrites
    fn collapse_tree(&self, registry: &RelationRegistry, deps: &mut Vec<TypedDependency>) {
        self.collapse(registry, deps, false);
    }

    /// Veto hook for the extra (tree-walk) pass: relations used only as
    /// intermediates during collapsing can be kept out of the extras
    fn keep_extra(&self, _registry: &RelationRegistry, _reln: RelationId) -> bool {
        true
    }
}

/// The identity pass: the base engine collapses nothing
pub struct Identity;

impl DependencyCollapser for Identity {}

/// English-style collapser: passive-subject relabeling, duplicate
/// removal, preposition and conjunction folding, and (under
/// `cc_process`) subject propagation across conjoined predicates.
pub struct EnglishCollapser;

impl EnglishCollapser {
    /// Rename `nsubj`/`csubj` to their passive variants on governors
    /// that carry a passive auxiliary.
    fn correct_subj_pass(registry: &RelationRegistry, deps: &mut [TypedDependency]) {
        let Some(auxpass) = registry.lookup("auxpass") else {
            return;
        };
        let passive_govs: Vec<_> = deps
            .iter()
            .filter(|d| d.reln == auxpass)
            .map(|d| d.gov.clone())
            .collect();
        if passive_govs.is_empty() {
            return;
        }
        let renames = [
            (registry.lookup("nsubj"), registry.lookup("nsubjpass")),
            (registry.lookup("csubj"), registry.lookup("csubjpass")),
        ];
        for dep in deps.iter_mut() {
            if !passive_govs.contains(&dep.gov) {
                continue;
            }
            for (from, to) in &renames {
                if let (Some(from), Some(to)) = (from, to)
                    && dep.reln == *from
                {
                    dep.reln = *to;
                }
            }
        }
    }

    fn remove_exact_duplicates(deps: &mut Vec<TypedDependency>) {
        let mut seen: FxHashSet<TypedDependency> = FxHashSet::default();
        deps.retain(|d| seen.insert(d.clone()));
    }

    /// Fold `prep(gov, p)` + `pobj(p, obj)` into `prep_p(gov, obj)`.
    /// The specialized tag registers lazily under `prep`.
    fn collapse_prepositions(registry: &RelationRegistry, deps: &mut Vec<TypedDependency>) {
        let (Some(prep), Some(pobj)) = (registry.lookup("prep"), registry.lookup("pobj")) else {
            return;
        };
        let mut folded = Vec::new();
        let mut consumed = vec![false; deps.len()];
        for (i, prep_dep) in deps.iter().enumerate() {
            if prep_dep.reln != prep {
                continue;
            }
            for (j, obj_dep) in deps.iter().enumerate() {
                if obj_dep.reln == pobj && obj_dep.gov == prep_dep.dep {
                    let specialized = registry.get_or_create(
                        "prep",
                        Some(prep),
                        Some(&prep_dep.dep.form.to_lowercase()),
                    );
                    let mut new_dep = TypedDependency::new(
                        specialized,
                        prep_dep.gov.clone(),
                        obj_dep.dep.clone(),
                    );
                    new_dep.extra = prep_dep.extra;
                    folded.push(new_dep);
                    consumed[i] = true;
                    consumed[j] = true;
                }
            }
        }
        let mut keep = consumed.iter().map(|c| !c);
        deps.retain(|_| keep.next().unwrap_or(true));
        deps.extend(folded);
    }

    /// Fold `cc(gov, and)` + `conj(gov, x)` into `conj_and(gov, x)`
    fn collapse_conjunctions(registry: &RelationRegistry, deps: &mut Vec<TypedDependency>) {
        let (Some(cc), Some(conj)) = (registry.lookup("cc"), registry.lookup("conj")) else {
            return;
        };
        let mut folded = Vec::new();
        let mut consumed = vec![false; deps.len()];
        for (i, conj_dep) in deps.iter().enumerate() {
            if conj_dep.reln != conj {
                continue;
            }
            let Some((j, cc_dep)) = deps
                .iter()
                .enumerate()
                .find(|(_, d)| d.reln == cc && d.gov == conj_dep.gov)
            else {
                continue;
            };
            let specialized = registry.get_or_create(
                "conj",
                Some(conj),
                Some(&cc_dep.dep.form.to_lowercase()),
            );
            let mut new_dep =
                TypedDependency::new(specialized, conj_dep.gov.clone(), conj_dep.dep.clone());
            new_dep.extra = conj_dep.extra;
            folded.push(new_dep);
            consumed[i] = true;
            consumed[j] = true;
        }
        let mut keep = consumed.iter().map(|c| !c);
        deps.retain(|_| keep.next().unwrap_or(true));
        deps.extend(folded);
    }

    /// Give each conjoined predicate the subject of the first conjunct
    /// (breaks the single-governor invariant, so extras only).
    fn propagate_conjunct_subjects(registry: &RelationRegistry, deps: &mut Vec<TypedDependency>) {
        let Some(subj) = registry.lookup("subj") else {
            return;
        };
        let Some(conj) = registry.lookup("conj") else {
            return;
        };
        let mut added = Vec::new();
        for conj_dep in deps.iter() {
            // covers both bare `conj` and specialized `conj_and` tags
            if !registry.is_ancestor(conj, conj_dep.reln) {
                continue;
            }
            for subj_dep in deps.iter() {
                if registry.is_ancestor(subj, subj_dep.reln) && subj_dep.gov == conj_dep.gov {
                    let mut new_dep = TypedDependency::new(
                        subj_dep.reln,
                        conj_dep.dep.clone(),
                        subj_dep.dep.clone(),
                    );
                    new_dep.extra = true;
                    if !deps.contains(&new_dep) && !added.contains(&new_dep) {
                        added.push(new_dep);
                    }
                }
            }
        }
        deps.extend(added);
    }
}

impl DependencyCollapser for EnglishCollapser {
    fn correct(&self, registry: &RelationRegistry, deps: &mut Vec<TypedDependency>) {
        Self::correct_subj_pass(registry, deps);
        Self::remove_exact_duplicates(deps);
    }

    fn collapse(
        &self,
        registry: &RelationRegistry,
        deps: &mut Vec<TypedDependency>,
        cc_process: bool,
    ) {
        self.correct(registry, deps);
        Self::collapse_prepositions(registry, deps);
        Self::collapse_conjunctions(registry, deps);
        if cc_process {
            Self::propagate_conjunct_subjects(registry, deps);
        }
    }

    fn keep_extra(&self, registry: &RelationRegistry, reln: RelationId) -> bool {
        // "rel" is only an intermediate inside relative-clause rewrites
        registry.lookup("rel") != Some(reln)
    }
}
