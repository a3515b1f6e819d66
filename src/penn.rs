//! Penn-Treebank bracket reader
//!
//! Parses bracketed phrase-structure text into [`Tree`]s. A malformed
//! unit (unbalanced or empty brackets) is skipped with a warning and
//! reading resumes at the next balanced unit; a stream that ends in the
//! middle of a tree is an error. Files ending in `.gz` are decompressed
//! transparently.

use crate::tree::Tree;
use bstr::ByteSlice;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Error while reading bracketed treebank text
#[derive(Debug, Error)]
pub enum PennError {
    #[error("I/O error reading treebank: {0}")]
    Io(#[from] std::io::Error),
    #[error("incomplete input: stream ended inside a tree started on line {line}")]
    Incomplete { line: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Atom(String),
}

/// Streaming reader yielding one [`Tree`] per balanced bracket unit
pub struct PennReader<R: BufRead> {
    reader: R,
    line_num: usize,
    /// tokens of the unit currently being accumulated
    pending: Vec<Token>,
    depth: usize,
    unit_start_line: usize,
    /// unconsumed tail of the current line after a unit completed mid-line
    carry: Vec<u8>,
    done: bool,
}

impl PennReader<Box<dyn BufRead>> {
    /// Open a treebank file, decompressing `.gz` transparently
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader))
    }
}

impl PennReader<BufReader<std::io::Cursor<String>>> {
    /// Read trees from an in-memory string
    pub fn from_str(text: &str) -> Self {
        Self::new(BufReader::new(std::io::Cursor::new(text.to_string())))
    }
}

impl<R: BufRead> PennReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_num: 0,
            pending: Vec::new(),
            depth: 0,
            unit_start_line: 0,
            carry: Vec::new(),
            done: false,
        }
    }

    /// Tokenize one line (or line tail) into the pending buffer. When a
    /// balanced unit completes, returns the position just past it so the
    /// caller can carry the remainder over to the next call.
    fn consume_line(&mut self, line: &[u8]) -> Option<usize> {
        let mut pos = 0;
        while pos < line.len() {
            let b = line[pos];
            if b.is_ascii_whitespace() {
                pos += 1;
                continue;
            }
            if b == b'(' {
                if self.pending.is_empty() {
                    self.unit_start_line = self.line_num;
                }
                self.pending.push(Token::Open);
                self.depth += 1;
                pos += 1;
            } else if b == b')' {
                if self.depth == 0 {
                    warn!(line = self.line_num, "unbalanced ')' outside any tree, skipping");
                    pos += 1;
                    continue;
                }
                self.pending.push(Token::Close);
                self.depth -= 1;
                pos += 1;
                if self.depth == 0 {
                    return Some(pos);
                }
            } else {
                let rest = &line[pos..];
                let paren = memchr::memchr2(b'(', b')', rest).unwrap_or(rest.len());
                let space = rest
                    .iter()
                    .position(|&b| b.is_ascii_whitespace())
                    .unwrap_or(rest.len());
                let end = paren.min(space);
                let atom = rest[..end].to_str_lossy().into_owned();
                if self.depth == 0 {
                    warn!(line = self.line_num, token = %atom, "stray token outside any tree, skipping");
                } else {
                    self.pending.push(Token::Atom(atom));
                }
                pos += end;
            }
        }
        None
    }

    /// Parse the accumulated balanced unit into a tree
    fn parse_pending(&mut self) -> Option<Tree> {
        let tokens = std::mem::take(&mut self.pending);
        let mut cursor = 0;
        match parse_node(&tokens, &mut cursor) {
            Ok(mut tree) => {
                tree.index_leaves();
                Some(tree)
            }
            Err(reason) => {
                warn!(
                    line = self.unit_start_line,
                    reason, "skipping malformed tree"
                );
                None
            }
        }
    }
}

fn parse_node(tokens: &[Token], cursor: &mut usize) -> Result<Tree, &'static str> {
    if tokens.get(*cursor) != Some(&Token::Open) {
        return Err("expected '('");
    }
    *cursor += 1;

    let label = match tokens.get(*cursor) {
        Some(Token::Atom(s)) => {
            *cursor += 1;
            Some(s.clone())
        }
        _ => None,
    };

    let mut children = Vec::new();
    loop {
        match tokens.get(*cursor) {
            Some(Token::Open) => children.push(parse_node(tokens, cursor)?),
            Some(Token::Atom(word)) => {
                children.push(Tree::leaf(unescape_leaf(word)));
                *cursor += 1;
            }
            Some(Token::Close) => {
                *cursor += 1;
                break;
            }
            None => return Err("unclosed constituent"),
        }
    }

    match label {
        Some(label) => Ok(Tree::node(label, children)),
        // unlabeled wrapper, common at the top level of treebank files
        None if children.len() == 1 => {
            let Some(only) = children.into_iter().next() else {
                return Err("empty constituent");
            };
            Ok(only)
        }
        None if children.is_empty() => Err("empty constituent"),
        None => {
            let mut tree = Tree::node("", children);
            tree.nodes[tree.root].label = None;
            Ok(tree)
        }
    }
}

/// Undo treebank escaping on a leaf token
fn unescape_leaf(word: &str) -> String {
    match word {
        "-LRB-" => return "(".to_string(),
        "-RRB-" => return ")".to_string(),
        _ => {}
    }
    if word.contains('\\') {
        word.replace("\\*", "*").replace("\\/", "/")
    } else {
        word.to_string()
    }
}

impl<R: BufRead> Iterator for PennReader<R> {
    type Item = Result<Tree, PennError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut line = Vec::new();
        loop {
            if self.carry.is_empty() {
                line.clear();
                self.line_num += 1;
                match self.reader.read_until(b'\n', &mut line) {
                    Err(e) => {
                        self.done = true;
                        return Some(Err(PennError::Io(e)));
                    }
                    Ok(0) => {
                        self.done = true;
                        if self.depth > 0 {
                            return Some(Err(PennError::Incomplete {
                                line: self.unit_start_line,
                            }));
                        }
                        return None;
                    }
                    Ok(_) => {}
                }
            } else {
                line = std::mem::take(&mut self.carry);
            }
            if let Some(consumed) = self.consume_line(&line) {
                self.carry = line[consumed..].to_vec();
                if let Some(tree) = self.parse_pending() {
                    return Some(Ok(tree));
                }
                // malformed unit skipped, keep going on the carried tail
            }
        }
    }
}
