//! Predicate-form dependency file parsing
//!
//! Reads the line-oriented `reln(gov-idx, dep-idx)` text format emitted
//! by [`crate::dependency::to_predicate_string`], one sentence per
//! blank-line-separated block. Relex parse-failure sentinels
//! (`null(-0,-0)`, `null(-1,-1)`) also terminate a sentence.

use crate::dependency::{Token, TypedDependency};
use crate::relation::{RelationError, RelationRegistry};
use flate2::read::MultiGzDecoder;
use pest::Parser;
use pest_derive::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "deps.pest"]
struct DepsParser;

/// Error while reading predicate-form dependency text
#[derive(Debug, Error)]
pub enum DepsError {
    #[error("I/O error at line {line}: {source}")]
    Io {
        line: usize,
        source: std::io::Error,
    },
    #[error("error on line {line}: malformed dependency '{text}', expected reln(gov-idx, dep-idx)")]
    Malformed { line: usize, text: String },
    #[error("error on line {line}: bad argument '{text}', expected word-index")]
    BadArgument { line: usize, text: String },
    #[error("error on line {line}: {source}")]
    Relation {
        line: usize,
        source: RelationError,
    },
}

/// Sentinels some external parsers emit in place of a failed sentence
const PARSE_FAILURE_SENTINELS: [&str; 2] = ["null(-0,-0)", "null(-1,-1)"];

/// Read per-sentence dependency lists from predicate-form text
pub fn read_deps_str(
    text: &str,
    registry: &RelationRegistry,
) -> Result<Vec<Vec<TypedDependency>>, DepsError> {
    read_deps(text.as_bytes(), registry)
}

/// Read per-sentence dependency lists from a predicate-form file,
/// decompressing `.gz` transparently
pub fn read_deps_file(
    path: &Path,
    registry: Arc<RelationRegistry>,
) -> Result<Vec<Vec<TypedDependency>>, DepsError> {
    let file = File::open(path).map_err(|source| DepsError::Io { line: 0, source })?;
    if path.extension().is_some_and(|e| e == "gz") {
        read_deps(BufReader::new(MultiGzDecoder::new(file)), &registry)
    } else {
        read_deps(BufReader::new(file), &registry)
    }
}

fn read_deps<R: BufRead>(
    reader: R,
    registry: &RelationRegistry,
) -> Result<Vec<Vec<TypedDependency>>, DepsError> {
    let mut sentences = Vec::new();
    let mut current: Vec<TypedDependency> = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_num = i + 1;
        let line = line.map_err(|source| DepsError::Io {
            line: line_num,
            source,
        })?;
        let line = line.trim();

        if PARSE_FAILURE_SENTINELS.contains(&line) {
            sentences.push(std::mem::take(&mut current));
            continue;
        }
        if line.is_empty() {
            if !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(parse_line(line, line_num, registry)?);
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    Ok(sentences)
}

fn parse_line(
    line: &str,
    line_num: usize,
    registry: &RelationRegistry,
) -> Result<TypedDependency, DepsError> {
    let mut pairs = DepsParser::parse(Rule::line, line).map_err(|_| DepsError::Malformed {
        line: line_num,
        text: line.to_string(),
    })?;
    let Some(parsed) = pairs.next() else {
        return Err(DepsError::Malformed {
            line: line_num,
            text: line.to_string(),
        });
    };

    let mut reln = None;
    let mut gov = None;
    let mut dep = None;
    for part in parsed.into_inner() {
        match part.as_rule() {
            Rule::reln => reln = Some(part.as_str().to_string()),
            Rule::gov => gov = Some(part.as_str().to_string()),
            Rule::dep => dep = Some(part.as_str().to_string()),
            _ => {}
        }
    }
    let (Some(reln), Some(gov), Some(dep)) = (reln, gov, dep) else {
        return Err(DepsError::Malformed {
            line: line_num,
            text: line.to_string(),
        });
    };

    let reln = registry
        .parse(&reln)
        .map_err(|source| DepsError::Relation {
            line: line_num,
            source,
        })?;
    Ok(TypedDependency::new(
        reln,
        parse_token(&gov, line_num)?,
        parse_token(&dep, line_num)?,
    ))
}

/// Split `form-idx` at the final dash; primes after the index (marking
/// copied tokens) are discarded.
fn parse_token(text: &str, line_num: usize) -> Result<Token, DepsError> {
    let bad = || DepsError::BadArgument {
        line: line_num,
        text: text.to_string(),
    };
    let dash = text.rfind('-').ok_or_else(bad)?;
    let form = &text[..dash];
    let index: usize = text[dash + 1..]
        .trim_end_matches('\'')
        .parse()
        .map_err(|_| bad())?;
    Ok(Token::new(form, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::to_predicate_string;

    fn registry() -> RelationRegistry {
        RelationRegistry::with_builtins()
    }

    #[test]
    fn test_parse_single_sentence() {
        let reg = registry();
        let text = "nsubj(died-2, Sam-1)\ntmod(died-2, today-3)\n";
        let sentences = read_deps_str(text, &reg).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].len(), 2);
        assert_eq!(sentences[0][0].gov, Token::new("died", 2));
        assert_eq!(sentences[0][0].dep, Token::new("Sam", 1));
        assert_eq!(reg.name(sentences[0][1].reln), "tmod");
    }

    #[test]
    fn test_blank_line_separates_sentences() {
        let reg = registry();
        let text = "nsubj(runs-2, dog-1)\n\nnsubj(sleeps-2, cat-1)\n";
        let sentences = read_deps_str(text, &reg).unwrap();
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_parse_failure_sentinel_ends_sentence() {
        let reg = registry();
        let text = "nsubj(runs-2, dog-1)\nnull(-1,-1)\nnsubj(sleeps-2, cat-1)\n";
        let sentences = read_deps_str(text, &reg).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].len(), 1);
    }

    #[test]
    fn test_punctuation_word_forms_survive() {
        let reg = registry();
        let text = "punct(runs-2, ,-3)\n";
        let sentences = read_deps_str(text, &reg).unwrap();
        assert_eq!(sentences[0][0].dep, Token::new(",", 3));
    }

    #[test]
    fn test_hyphenated_word_splits_at_last_dash() {
        let reg = registry();
        let text = "nsubj(runs-2, well-being-1)\n";
        let sentences = read_deps_str(text, &reg).unwrap();
        assert_eq!(sentences[0][0].dep, Token::new("well-being", 1));
    }

    #[test]
    fn test_prime_marks_are_discarded() {
        let reg = registry();
        let text = "nsubj(runs-2', dog-1)\n";
        let sentences = read_deps_str(text, &reg).unwrap();
        assert_eq!(sentences[0][0].gov, Token::new("runs", 2));
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let reg = registry();
        assert!(matches!(
            read_deps_str("nsubj died-2 Sam-1\n", &reg),
            Err(DepsError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_relation_is_a_named_error() {
        let reg = registry();
        let err = read_deps_str("ns ubj(died-2, Sam-1)\n", &reg).unwrap_err();
        match err {
            DepsError::Relation { line: 1, source } => {
                assert_eq!(
                    source.to_string(),
                    "unknown grammatical relation 'ns ubj'"
                );
            }
            other => panic!("expected relation error, got {other}"),
        }
    }

    #[test]
    fn test_specialized_relations_parse() {
        let reg = registry();
        let sentences = read_deps_str("prep_of(president-2, USA-4)\n", &reg).unwrap();
        let prep = reg.lookup("prep").unwrap();
        assert!(reg.is_ancestor(prep, sentences[0][0].reln));
    }

    #[test]
    fn test_round_trip_with_writer() {
        let reg = registry();
        let text = "det(dog-2, the-1)\nnsubj(chased-3, dog-2)\nroot(ROOT-0, chased-3)\n";
        let sentences = read_deps_str(text, &reg).unwrap();
        let rendered = to_predicate_string(&sentences[0], &reg);
        assert_eq!(rendered, text);
        let reparsed = read_deps_str(&rendered, &reg).unwrap();
        assert_eq!(sentences, reparsed);
    }
}
