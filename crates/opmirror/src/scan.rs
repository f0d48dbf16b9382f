//! Import-only scanning of Go sources
//!
//! Lexes the header of a Go file (package clause and import declarations)
//! without parsing the rest of it. Scanning stops at the first top-level token
//! that cannot start an import declaration, so anything after the imports is
//! never inspected.

use logos::Logos;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::MirrorError;
use crate::fsutil;

/// Tokens that can appear in a Go file header.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderToken {
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    // Byte order mark, accepted by the Go tool at the start of a file
    #[token("\u{FEFF}", logos::skip)]
    ByteOrderMark,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    // Emitted (and then ignored) only when terminated
    #[token("/*", lex_block_comment)]
    BlockComment,

    #[token("package")]
    Package,

    #[token("import")]
    Import,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(";")]
    Semicolon,

    #[token(".")]
    Dot,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*")]
    Ident,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    InterpretedString,

    #[regex(r"`[^`]*`")]
    RawString,
}

fn lex_block_comment(lex: &mut logos::Lexer<HeaderToken>) -> bool {
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(remainder.len());
            false
        }
    }
}

/// One import declaration found in a file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Unquoted import path
    pub path: String,

    /// Byte range of the path literal in the source, quotes included
    pub span: Range<usize>,

    /// 1-based line of the path literal
    pub line: usize,

    /// Whether the literal is a raw (backquoted) string
    pub raw: bool,
}

impl ImportSpec {
    /// Render a literal for `path` using the same quoting as this import.
    pub fn literal_for(&self, path: &str) -> String {
        if self.raw {
            format!("`{}`", path)
        } else {
            format!("\"{}\"", path)
        }
    }
}

/// Malformed header, located by line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Malformed import section in a specific file
#[derive(Debug, Clone, Error)]
#[error("Parse error in {}:{line}: {message}", .path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(path: &Path, err: SyntaxError) -> Self {
        Self {
            path: path.to_path_buf(),
            line: err.line,
            message: err.message,
        }
    }
}

type Lexed = (Result<HeaderToken, ()>, Range<usize>);

struct HeaderParser<'s> {
    src: &'s str,
    lexer: logos::Lexer<'s, HeaderToken>,
    peeked: Option<Option<Lexed>>,
}

impl<'s> HeaderParser<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            lexer: HeaderToken::lexer(src),
            peeked: None,
        }
    }

    fn lex(&mut self) -> Option<Lexed> {
        loop {
            let tok = self.lexer.next()?;
            if tok == Ok(HeaderToken::BlockComment) {
                continue;
            }
            return Some((tok, self.lexer.span()));
        }
    }

    fn bump(&mut self) -> Option<Lexed> {
        match self.peeked.take() {
            Some(tok) => tok,
            None => self.lex(),
        }
    }

    /// Kind of the next token; `None` at end of input or on a lexing error.
    fn peek_kind(&mut self) -> Option<HeaderToken> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lex());
        }
        match self.peeked.as_ref() {
            Some(Some((Ok(tok), _))) => Some(*tok),
            _ => None,
        }
    }

    fn eat(&mut self, kind: HeaderToken) -> bool {
        if self.peek_kind() == Some(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn line_at(&self, offset: usize) -> usize {
        let end = offset.min(self.src.len());
        self.src.as_bytes()[..end]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line_at(offset),
            message: message.into(),
        }
    }

    fn expect(&mut self, kind: HeaderToken, what: &str) -> Result<Range<usize>, SyntaxError> {
        match self.bump() {
            Some((Ok(tok), span)) if tok == kind => Ok(span),
            Some((_, span)) => Err(self.error_at(
                span.start,
                format!("expected {}, found {:?}", what, &self.src[span]),
            )),
            None => Err(self.error_at(self.src.len(), format!("expected {}, found EOF", what))),
        }
    }

    fn file_header(&mut self) -> Result<Vec<ImportSpec>, SyntaxError> {
        self.expect(HeaderToken::Package, "'package'")?;
        self.expect(HeaderToken::Ident, "package name")?;

        let mut imports = Vec::new();
        loop {
            match self.peek_kind() {
                Some(HeaderToken::Semicolon) => {
                    self.bump();
                }
                Some(HeaderToken::Import) => {
                    self.bump();
                    self.import_decl(&mut imports)?;
                }
                _ => break,
            }
        }

        if let Some(Some((Err(()), span))) = self.peeked.as_ref() {
            if self.src[span.clone()].starts_with("/*") {
                return Err(self.error_at(span.start, "comment not terminated"));
            }
        }
        Ok(imports)
    }

    fn import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> Result<(), SyntaxError> {
        if !self.eat(HeaderToken::LParen) {
            imports.push(self.import_spec()?);
            return Ok(());
        }

        loop {
            match self.peek_kind() {
                Some(HeaderToken::RParen) => {
                    self.bump();
                    return Ok(());
                }
                Some(HeaderToken::Semicolon) => {
                    self.bump();
                }
                _ => imports.push(self.import_spec()?),
            }
        }
    }

    fn import_spec(&mut self) -> Result<ImportSpec, SyntaxError> {
        if matches!(
            self.peek_kind(),
            Some(HeaderToken::Ident) | Some(HeaderToken::Dot)
        ) {
            self.bump();
        }

        let (tok, span) = match self.bump() {
            Some(lexed) => lexed,
            None => {
                return Err(self.error_at(
                    self.src.len(),
                    "unexpected EOF in import declaration",
                ));
            }
        };

        let literal = &self.src[span.clone()];
        let (path, raw) = match tok {
            Ok(HeaderToken::InterpretedString) => (
                unquote(&literal[1..literal.len() - 1])
                    .map_err(|msg| self.error_at(span.start, msg))?,
                false,
            ),
            Ok(HeaderToken::RawString) => (literal[1..literal.len() - 1].to_string(), true),
            _ => {
                return Err(self.error_at(
                    span.start,
                    format!("expected import path, found {:?}", literal),
                ));
            }
        };

        if path.is_empty() {
            return Err(self.error_at(span.start, "empty import path"));
        }
        if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(self.error_at(span.start, format!("invalid import path {:?}", path)));
        }

        Ok(ImportSpec {
            path,
            line: self.line_at(span.start),
            span,
            raw,
        })
    }
}

fn unquote(inner: &str) -> Result<String, String> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => return Err(format!("unsupported escape \\{} in import path", other)),
            None => return Err("unterminated escape in import path".to_string()),
        }
    }
    Ok(out)
}

/// Parse the import declarations of one Go source text.
pub fn parse_imports(src: &str) -> Result<Vec<ImportSpec>, SyntaxError> {
    HeaderParser::new(src).file_header()
}

/// Scan a single file; the result keeps declaration order.
pub fn scan_imports_in_file(path: &Path) -> Result<Vec<ImportSpec>, MirrorError> {
    let src = fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
    parse_imports(&src).map_err(|e| ParseError::new(path, e).into())
}

/// Union of the import paths of the given files
pub fn scan_imports_in_files(files: &[PathBuf]) -> Result<BTreeSet<String>, MirrorError> {
    let mut paths = BTreeSet::new();
    for file in files {
        paths.extend(scan_imports_in_file(file)?.into_iter().map(|spec| spec.path));
    }
    Ok(paths)
}

/// Union of the import paths of every Go source below `dir`
pub fn scan_imports_in_dir(dir: &Path) -> Result<BTreeSet<String>, MirrorError> {
    let files = fsutil::go_files_in_tree(dir)?;
    scan_imports_in_files(&files)
}
