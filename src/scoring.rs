//! Scoring of typed dependencies
//!
//! Compares per-sentence system dependencies against gold annotations
//! by set intersection, after normalizing every dependency to a
//! case-insensitive string form. Reports precision/recall/F1 for
//! labeled and unlabeled attachment, plus an attachment-only mode that
//! presumes a one-to-one token correspondence between the two sides.

use crate::dependency::{TypedDependency, is_punctuation};
use crate::relation::RelationRegistry;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("sentence count mismatch: gold has {gold}, system has {system}")]
    SentenceCount { gold: usize, system: usize },
    #[error(
        "attachment score cannot be used when count(gold deps: {gold}) != count(system deps: {system})"
    )]
    CountMismatch { gold: usize, system: usize },
}

/// One dependency normalized to string-equality semantics
#[derive(Debug, Clone)]
struct NormalizedDep {
    labeled: String,
    unlabeled: String,
    gov: String,
    dep: String,
    reln: String,
}

impl NormalizedDep {
    fn new(td: &TypedDependency, registry: &RelationRegistry) -> Self {
        let gov = format!("{}-{}", td.gov.form, td.gov.index).to_lowercase();
        let dep = format!("{}-{}", td.dep.form, td.dep.index).to_lowercase();
        let reln = registry.name(td.reln).to_lowercase();
        Self {
            labeled: format!("{reln}({gov}, {dep})"),
            unlabeled: format!("({gov}, {dep})"),
            gov,
            dep,
            reln,
        }
    }

    /// The dependent with its index suffix stripped, for error reports
    fn dep_word(&self) -> &str {
        strip_index(&self.dep)
    }

    fn gov_word(&self) -> &str {
        strip_index(&self.gov)
    }
}

fn strip_index(s: &str) -> &str {
    match s.rfind('-') {
        Some(pos) => &s[..pos],
        None => s,
    }
}

fn normalize_sentence(
    deps: &[TypedDependency],
    registry: &RelationRegistry,
    ignore_punct: bool,
) -> Vec<NormalizedDep> {
    deps.iter()
        .filter(|td| !ignore_punct || !is_punctuation(&td.dep.form))
        .map(|td| NormalizedDep::new(td, registry))
        .collect()
}

/// Corpus-level dependency scorer holding the gold annotations
pub struct DependencyScoring {
    gold: Vec<Vec<NormalizedDep>>,
    ignore_punct: bool,
}

impl DependencyScoring {
    /// Build a scorer from per-sentence gold dependencies. With
    /// `ignore_punct`, dependencies whose dependent token has no
    /// alphanumeric codepoint are dropped from both sides.
    pub fn new(
        gold: &[Vec<TypedDependency>],
        registry: &RelationRegistry,
        ignore_punct: bool,
    ) -> Self {
        Self {
            gold: gold
                .iter()
                .map(|deps| normalize_sentence(deps, registry, ignore_punct))
                .collect(),
            ignore_punct,
        }
    }

    /// Score system output against the gold annotations
    pub fn score(
        &self,
        system: &[Vec<TypedDependency>],
        registry: &RelationRegistry,
    ) -> Result<Score, ScoringError> {
        if system.len() != self.gold.len() {
            return Err(ScoringError::SentenceCount {
                gold: self.gold.len(),
                system: system.len(),
            });
        }

        let mut score = Score::default();
        for (gold, system_deps) in self.gold.iter().zip(system) {
            let system_norm = normalize_sentence(system_deps, registry, self.ignore_punct);

            let gold_labeled: FxHashSet<&str> =
                gold.iter().map(|d| d.labeled.as_str()).collect();
            let gold_unlabeled: FxHashSet<&str> =
                gold.iter().map(|d| d.unlabeled.as_str()).collect();
            let sys_labeled: FxHashSet<&str> =
                system_norm.iter().map(|d| d.labeled.as_str()).collect();
            let sys_unlabeled: FxHashSet<&str> =
                system_norm.iter().map(|d| d.unlabeled.as_str()).collect();

            score.system_count += sys_labeled.len();
            score.gold_count += gold_labeled.len();
            score.system_unlabeled_count += sys_unlabeled.len();
            score.gold_unlabeled_count += gold_unlabeled.len();
            score.correct_labeled += sys_labeled.intersection(&gold_labeled).count();
            score.correct_unlabeled += sys_unlabeled.intersection(&gold_unlabeled).count();

            // per-dependent gold context for the verbose error report
            let mut correct_labeled: FxHashMap<&str, String> = FxHashMap::default();
            let mut correct_unlabeled: FxHashMap<&str, String> = FxHashMap::default();
            for g in gold {
                let child = g.dep_word();
                let labeled_entry = format!("{}({}, {})", g.reln, g.gov_word(), child);
                let unlabeled_entry = format!("dep({}, {})", g.gov_word(), child);
                correct_labeled
                    .entry(child)
                    .and_modify(|e| *e = format!("{e}, {labeled_entry}"))
                    .or_insert(labeled_entry);
                correct_unlabeled
                    .entry(child)
                    .and_modify(|e| *e = format!("{e}, {unlabeled_entry}"))
                    .or_insert(unlabeled_entry);
            }
            for d in &system_norm {
                if !gold_labeled.contains(d.labeled.as_str()) {
                    let expected = correct_labeled
                        .get(d.dep_word())
                        .cloned()
                        .unwrap_or_default();
                    let key = format!(
                        "{}({}, {}) <= {}",
                        d.reln,
                        d.gov_word(),
                        d.dep_word(),
                        expected
                    );
                    *score.labeled_errors.entry(key).or_insert(0) += 1;
                }
                if !gold_unlabeled.contains(d.unlabeled.as_str()) {
                    let expected = correct_unlabeled
                        .get(d.dep_word())
                        .cloned()
                        .unwrap_or_default();
                    let key =
                        format!("dep({}, {}) <= {}", d.gov_word(), d.dep_word(), expected);
                    *score.unlabeled_errors.entry(key).or_insert(0) += 1;
                }
            }
        }
        Ok(score)
    }
}

/// Corpus-level counts with derived metrics
#[derive(Debug, Default)]
pub struct Score {
    pub system_count: usize,
    pub gold_count: usize,
    pub system_unlabeled_count: usize,
    pub gold_unlabeled_count: usize,
    pub correct_labeled: usize,
    pub correct_unlabeled: usize,
    pub labeled_errors: FxHashMap<String, u64>,
    pub unlabeled_errors: FxHashMap<String, u64>,
}

#[derive(Debug, Serialize)]
struct FScoreReport {
    #[serde(rename = "LF1")]
    lf1: f64,
    #[serde(rename = "LP")]
    lp: f64,
    #[serde(rename = "LR")]
    lr: f64,
    #[serde(rename = "UF1")]
    uf1: f64,
    #[serde(rename = "UP")]
    up: f64,
    #[serde(rename = "UR")]
    ur: f64,
}

#[derive(Debug, Serialize)]
struct AttachmentReport {
    #[serde(rename = "LAS")]
    las: f64,
    #[serde(rename = "UAS")]
    uas: f64,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(p: f64, r: f64) -> f64 {
    if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
}

impl Score {
    pub fn labeled_precision(&self) -> f64 {
        ratio(self.correct_labeled, self.system_count)
    }

    pub fn labeled_recall(&self) -> f64 {
        ratio(self.correct_labeled, self.gold_count)
    }

    pub fn labeled_f1(&self) -> f64 {
        f1(self.labeled_precision(), self.labeled_recall())
    }

    pub fn unlabeled_precision(&self) -> f64 {
        ratio(self.correct_unlabeled, self.system_unlabeled_count)
    }

    pub fn unlabeled_recall(&self) -> f64 {
        ratio(self.correct_unlabeled, self.gold_unlabeled_count)
    }

    pub fn unlabeled_f1(&self) -> f64 {
        f1(self.unlabeled_precision(), self.unlabeled_recall())
    }

    /// Labeled attachment score; only meaningful in attachment mode
    pub fn las(&self) -> f64 {
        ratio(self.correct_labeled, self.gold_count)
    }

    /// Unlabeled attachment score; only meaningful in attachment mode
    pub fn uas(&self) -> f64 {
        ratio(self.correct_unlabeled, self.gold_count)
    }

    /// Precision/recall/F1 report, optionally with per-error counts
    pub fn f_score_report(&self, verbose: bool, json: bool) -> String {
        if json {
            let report = FScoreReport {
                lf1: self.labeled_f1(),
                lp: self.labeled_precision(),
                lr: self.labeled_recall(),
                uf1: self.unlabeled_f1(),
                up: self.unlabeled_precision(),
                ur: self.unlabeled_recall(),
            };
            return serde_json::to_string(&report).expect("report serializes");
        }
        let mut out = String::new();
        out.push_str("|| Labeled Attachment   || F ||  P ||  R ||\n");
        out.push_str(&format!(
            "||                      || {:.3} || {:.3} ({}/{}) || {:.3} ({}/{}) ||\n",
            self.labeled_f1(),
            self.labeled_precision(),
            self.correct_labeled,
            self.system_count,
            self.labeled_recall(),
            self.correct_labeled,
            self.gold_count,
        ));
        out.push_str("|| Unlabeled Attachment || F ||  P ||  R ||\n");
        out.push_str(&format!(
            "||                      || {:.3} || {:.3} ({}/{}) || {:.3} ({}/{}) ||\n",
            self.unlabeled_f1(),
            self.unlabeled_precision(),
            self.correct_unlabeled,
            self.system_unlabeled_count,
            self.unlabeled_recall(),
            self.correct_unlabeled,
            self.gold_unlabeled_count,
        ));
        if verbose {
            out.push_str("\nLabeled Attachment Error Counts\n");
            out.push_str(&error_count_table(&self.labeled_errors));
            out.push_str("\nUnlabeled Attachment Error Counts\n");
            out.push_str(&error_count_table(&self.unlabeled_errors));
        }
        out
    }

    /// Attachment-only report; fails unless gold and system dependency
    /// counts match one-to-one.
    pub fn attachment_report(&self, json: bool) -> Result<String, ScoringError> {
        if self.system_count != self.gold_count {
            return Err(ScoringError::CountMismatch {
                gold: self.gold_count,
                system: self.system_count,
            });
        }
        if json {
            let report = AttachmentReport {
                las: self.las(),
                uas: self.uas(),
            };
            return Ok(serde_json::to_string(&report).expect("report serializes"));
        }
        Ok(format!(
            "|| Labeled Attachment Score   || {:.3} ({}/{}) ||\n|| Unlabeled Attachment Score || {:.3} ({}/{}) ||\n",
            self.las(),
            self.correct_labeled,
            self.gold_count,
            self.uas(),
            self.correct_unlabeled,
            self.gold_count,
        ))
    }
}

/// Error keys sorted by count (descending), then alphabetically
fn error_count_table(counts: &FxHashMap<String, u64>) -> String {
    let mut entries: Vec<(&String, &u64)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let mut out = String::new();
    for (key, count) in entries {
        out.push_str(&format!("\t{count}\t{key}\n"));
    }
    out
}
