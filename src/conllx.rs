//! CoNLL-X file parsing
//!
//! Parses CoNLL-X dependency treebanks into per-sentence typed
//! dependency lists for the scorer: one token per line, ten
//! tab-separated fields, blank line between sentences. Only the word
//! (field 2), head index (field 7) and relation label (field 8) are
//! consumed; a head index of 0 links the token to the virtual ROOT.
//!
//! CoNLL-X format: https://aclanthology.org/W06-2920/

use crate::dependency::{Token, TypedDependency};
use crate::relation::{RelationError, RelationRegistry};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

// 0-based positions within the 10-field token line
const WORD_FIELD: usize = 1;
const HEAD_FIELD: usize = 6;
const RELN_FIELD: usize = 7;
const FIELD_COUNT: usize = 10;

/// Error during CoNLL-X parsing
#[derive(Debug, Error)]
pub enum CoNLLXError {
    #[error("I/O error at line {line}: {source}")]
    Io {
        line: usize,
        source: std::io::Error,
    },
    #[error("error at line {line}: {FIELD_COUNT} fields expected but {found} are present")]
    FieldCount { line: usize, found: usize },
    #[error("error at line {line}: bad head index '{text}'")]
    BadHeadIndex { line: usize, text: String },
    #[error("error at line {line}: {source}")]
    Relation {
        line: usize,
        source: RelationError,
    },
}

/// CoNLL-X reader that iterates over sentences
pub struct CoNLLXReader<R: BufRead> {
    lines: Lines<R>,
    line_num: usize,
    registry: Arc<RelationRegistry>,
}

impl CoNLLXReader<Box<dyn BufRead>> {
    /// Create a reader from a file path, decompressing `.gz` transparently
    pub fn from_file(path: &Path, registry: Arc<RelationRegistry>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader, registry))
    }
}

impl CoNLLXReader<BufReader<std::io::Cursor<String>>> {
    /// Create a reader from a string
    pub fn from_str(text: &str, registry: Arc<RelationRegistry>) -> Self {
        let cursor = std::io::Cursor::new(text.to_string());
        Self::new(BufReader::new(cursor), registry)
    }
}

impl<R: BufRead> CoNLLXReader<R> {
    pub fn new(reader: R, registry: Arc<RelationRegistry>) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
            registry,
        }
    }
}

impl<R: BufRead> Iterator for CoNLLXReader<R> {
    type Item = Result<Vec<TypedDependency>, CoNLLXError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut token_lines = Vec::new();

        // read lines until a blank line (sentence boundary) or EOF
        loop {
            self.line_num += 1;
            match self.lines.next() {
                None => {
                    if token_lines.is_empty() {
                        return None;
                    }
                    break;
                }
                Some(Err(e)) => {
                    return Some(Err(CoNLLXError::Io {
                        line: self.line_num,
                        source: e,
                    }));
                }
                Some(Ok(line)) => {
                    let line = line.trim_end();
                    if line.is_empty() {
                        if !token_lines.is_empty() {
                            break;
                        }
                        continue; // skip excess blank lines
                    }
                    token_lines.push((self.line_num, line.to_string()));
                }
            }
        }

        Some(parse_sentence(token_lines, &self.registry))
    }
}

/// Parse the accumulated token lines into a dependency list
fn parse_sentence(
    lines: Vec<(usize, String)>,
    registry: &RelationRegistry,
) -> Result<Vec<TypedDependency>, CoNLLXError> {
    // first pass: words, so head indices can be resolved to forms
    let mut words = Vec::with_capacity(lines.len());
    for (line_num, line) in &lines {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != FIELD_COUNT {
            return Err(CoNLLXError::FieldCount {
                line: *line_num,
                found: fields.len(),
            });
        }
        words.push(fields[WORD_FIELD].to_string());
    }

    let mut deps = Vec::with_capacity(lines.len());
    for (position, (line_num, line)) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        let head: usize = atoi::atoi(fields[HEAD_FIELD].as_bytes()).ok_or_else(|| {
            CoNLLXError::BadHeadIndex {
                line: *line_num,
                text: fields[HEAD_FIELD].to_string(),
            }
        })?;
        let reln = registry
            .parse(fields[RELN_FIELD])
            .map_err(|source| CoNLLXError::Relation {
                line: *line_num,
                source,
            })?;
        let gov = if head == 0 {
            Token::root()
        } else {
            let Some(form) = words.get(head - 1) else {
                return Err(CoNLLXError::BadHeadIndex {
                    line: *line_num,
                    text: fields[HEAD_FIELD].to_string(),
                });
            };
            Token::new(form.clone(), head)
        };
        let dep = Token::new(words[position].clone(), position + 1);
        deps.push(TypedDependency::new(reln, gov, dep));
    }

    Ok(deps)
}

/// Render a dependency list in CoNLL-X form, one line per dependent in
/// surface order. Fields the dependency does not carry are `_`.
pub fn to_conllx_string(deps: &[TypedDependency], registry: &RelationRegistry) -> String {
    let mut rows: Vec<&TypedDependency> = deps.iter().collect();
    rows.sort_by_key(|d| d.dep.index);
    let mut out = String::new();
    for dep in rows {
        out.push_str(&format!(
            "{}\t{}\t_\t_\t_\t_\t{}\t{}\t_\t_\n",
            dep.dep.index,
            dep.dep.form,
            dep.gov.index,
            registry.name(dep.reln),
        ));
    }
    out
}

/// Read every sentence of a CoNLL-X file
pub fn read_conllx_file(
    path: &Path,
    registry: Arc<RelationRegistry>,
) -> Result<Vec<Vec<TypedDependency>>, CoNLLXError> {
    let reader = CoNLLXReader::from_file(path, registry).map_err(|source| CoNLLXError::Io {
        line: 0,
        source,
    })?;
    reader.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<RelationRegistry> {
        Arc::new(RelationRegistry::with_builtins())
    }

    #[test]
    fn test_parse_simple_sentence() {
        let conllx = "1\tThe\tthe\tDT\tDT\t_\t2\tdet\t_\t_\n\
                      2\tdog\tdog\tNN\tNN\t_\t3\tnsubj\t_\t_\n\
                      3\truns\trun\tVBZ\tVBZ\t_\t0\troot\t_\t_\n\n";
        let reg = registry();
        let mut reader = CoNLLXReader::from_str(conllx, Arc::clone(&reg));
        let deps = reader.next().unwrap().unwrap();
        assert!(reader.next().is_none());

        let preds: Vec<String> = deps.iter().map(|d| d.to_predicate(&reg)).collect();
        assert_eq!(
            preds,
            vec![
                "det(dog-2, The-1)",
                "nsubj(runs-3, dog-2)",
                "root(ROOT-0, runs-3)"
            ]
        );
    }

    #[test]
    fn test_sentence_boundaries() {
        let conllx = "1\tdogs\t_\tNNS\tNNS\t_\t2\tnsubj\t_\t_\n\
                      2\trun\t_\tVBP\tVBP\t_\t0\troot\t_\t_\n\
                      \n\
                      1\tcats\t_\tNNS\tNNS\t_\t2\tnsubj\t_\t_\n\
                      2\tsleep\t_\tVBP\tVBP\t_\t0\troot\t_\t_\n";
        let reg = registry();
        let sentences: Vec<_> = CoNLLXReader::from_str(conllx, reg)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].len(), 2);
        assert_eq!(sentences[1][0].dep.form, "cats");
    }

    #[test]
    fn test_field_count_error() {
        let conllx = "1\tdogs\tnsubj\n";
        let reg = registry();
        let mut reader = CoNLLXReader::from_str(conllx, reg);
        match reader.next() {
            Some(Err(CoNLLXError::FieldCount { line: 1, found: 3 })) => {}
            other => panic!("expected field count error, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_head_index_error() {
        let conllx = "1\tdogs\t_\tNNS\tNNS\t_\tx\tnsubj\t_\t_\n";
        let reg = registry();
        let mut reader = CoNLLXReader::from_str(conllx, reg);
        assert!(matches!(
            reader.next(),
            Some(Err(CoNLLXError::BadHeadIndex { line: 1, .. }))
        ));
    }

    #[test]
    fn test_round_trip_through_output_form() {
        let conllx = "1\tThe\tthe\tDT\tDT\t_\t2\tdet\t_\t_\n\
                      2\tdog\tdog\tNN\tNN\t_\t3\tnsubj\t_\t_\n\
                      3\truns\trun\tVBZ\tVBZ\t_\t0\troot\t_\t_\n\n";
        let reg = registry();
        let deps = CoNLLXReader::from_str(conllx, Arc::clone(&reg))
            .next()
            .unwrap()
            .unwrap();
        let rendered = to_conllx_string(&deps, &reg);
        let reparsed = CoNLLXReader::from_str(&rendered, Arc::clone(&reg))
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(deps, reparsed);
    }
}
