//! Operation documents and their classification.
//!
//! The runner only ever executes mutations. Before a runner is built (and on
//! every document change afterwards) the document is classified and anything
//! that is not a single mutation is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Kind of the single operation a document defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "query" => Some(OperationKind::Query),
            "mutation" => Some(OperationKind::Mutation),
            "subscription" => Some(OperationKind::Subscription),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation source text. Cheap to clone; equality is textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document {
    source: Arc<str>,
}

impl Document {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Arc::from(source.into()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl From<&str> for Document {
    fn from(source: &str) -> Self {
        Document::new(source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("document does not define an operation")]
    NoOperation,

    #[error("document must define exactly one operation, found {0}")]
    MultipleOperations(usize),

    #[error("unbalanced `{open}` opened at byte {offset}")]
    Unbalanced { open: char, offset: usize },

    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),

    #[error("unexpected `{token}` at byte {offset}")]
    UnexpectedToken { token: String, offset: usize },
}

/// Document validator boundary.
pub trait DocumentClassifier: Send + Sync {
    fn classify(&self, document: &Document) -> Result<OperationKind, DocumentError>;
}

/// Default classifier working directly on the executable-document source.
///
/// Accepts operation definitions (named, anonymous and the `{ ... }`
/// shorthand query) and fragment definitions; fragments are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceClassifier;

impl DocumentClassifier for SourceClassifier {
    fn classify(&self, document: &Document) -> Result<OperationKind, DocumentError> {
        let kinds = Scanner::new(document.source()).operation_kinds()?;
        match kinds.as_slice() {
            [] => Err(DocumentError::NoOperation),
            [kind] => Ok(*kind),
            many => Err(DocumentError::MultipleOperations(many.len())),
        }
    }
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    /// Walk top-level definitions and collect the kind of each operation.
    fn operation_kinds(mut self) -> Result<Vec<OperationKind>, DocumentError> {
        let mut kinds = Vec::new();
        loop {
            self.skip_ignored();
            let Some(byte) = self.peek() else {
                return Ok(kinds);
            };

            if byte == b'{' {
                kinds.push(OperationKind::Query);
                self.skip_group()?;
                continue;
            }

            let start = self.pos;
            let word = self.name();
            if word.is_empty() {
                return Err(self.unexpected(start));
            }

            if let Some(kind) = OperationKind::from_keyword(word) {
                kinds.push(kind);
                self.skip_definition()?;
            } else if word == "fragment" {
                self.skip_definition()?;
            } else {
                return Err(DocumentError::UnexpectedToken {
                    token: word.to_string(),
                    offset: start,
                });
            }
        }
    }

    /// Skip a definition header (name, variables, directives) and its selection set.
    fn skip_definition(&mut self) -> Result<(), DocumentError> {
        loop {
            self.skip_ignored();
            match self.peek() {
                None => {
                    return Err(DocumentError::UnexpectedToken {
                        token: "end of document".to_string(),
                        offset: self.pos,
                    })
                }
                Some(b'{') => return self.skip_group(),
                Some(b'(') | Some(b'[') => self.skip_group()?,
                Some(b'"') => self.skip_string()?,
                Some(b'}') | Some(b')') | Some(b']') => return Err(self.unexpected(self.pos)),
                Some(_) => self.bump_char(),
            }
        }
    }

    /// Skip a bracketed group starting at the current opener, honoring nesting and strings.
    fn skip_group(&mut self) -> Result<(), DocumentError> {
        let mut stack: Vec<(u8, usize)> = Vec::new();
        loop {
            self.skip_ignored();
            let Some(byte) = self.peek() else {
                let (open, offset) = stack
                    .last()
                    .copied()
                    .unwrap_or((b'{', self.pos));
                return Err(DocumentError::Unbalanced {
                    open: open as char,
                    offset,
                });
            };
            match byte {
                b'{' | b'(' | b'[' => {
                    stack.push((byte, self.pos));
                    self.pos += 1;
                }
                b'}' | b')' | b']' => {
                    match stack.pop() {
                        Some((open, _)) if closer(open) == byte => {}
                        _ => return Err(self.unexpected(self.pos)),
                    }
                    self.pos += 1;
                    if stack.is_empty() {
                        return Ok(());
                    }
                }
                b'"' => self.skip_string()?,
                _ => self.bump_char(),
            }
        }
    }

    fn skip_string(&mut self) -> Result<(), DocumentError> {
        let start = self.pos;
        if self.bytes[self.pos..].starts_with(b"\"\"\"") {
            self.pos += 3;
            while self.pos < self.bytes.len() {
                if self.bytes[self.pos..].starts_with(b"\\\"\"\"") {
                    self.pos += 4;
                } else if self.bytes[self.pos..].starts_with(b"\"\"\"") {
                    self.pos += 3;
                    return Ok(());
                } else {
                    self.pos += 1;
                }
            }
            return Err(DocumentError::UnterminatedString(start));
        }

        self.pos += 1;
        while let Some(byte) = self.peek() {
            match byte {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'\n' | b'\r' => break,
                _ => self.pos += 1,
            }
        }
        Err(DocumentError::UnterminatedString(start))
    }

    /// Whitespace, commas, the BOM and `#` line comments are insignificant.
    fn skip_ignored(&mut self) {
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos..].starts_with(BOM) {
                self.pos += BOM.len();
                continue;
            }
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' | b',' => self.pos += 1,
                b'#' => {
                    while let Some(byte) = self.peek() {
                        if byte == b'\n' || byte == b'\r' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            let valid = byte == b'_'
                || byte.is_ascii_alphabetic()
                || (self.pos > start && byte.is_ascii_digit());
            if !valid {
                break;
            }
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump_char(&mut self) {
        let width = self.src[self.pos..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(1);
        self.pos += width;
    }

    fn unexpected(&self, offset: usize) -> DocumentError {
        let token = self.src[offset..]
            .chars()
            .next()
            .map(String::from)
            .unwrap_or_default();
        DocumentError::UnexpectedToken { token, offset }
    }
}

const BOM: &[u8] = "\u{feff}".as_bytes();

fn closer(open: u8) -> u8 {
    match open {
        b'{' => b'}',
        b'(' => b')',
        _ => b']',
    }
}
