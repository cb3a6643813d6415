//! Builds a [`Tree`] from configuration text.
//!
//! ```text
//! file      := statement*
//! statement := IDENT value? ';'
//!            | IDENT value? '{' statement* '}' ';'?
//! value     := item+                   one item is the value, several an array
//! item      := scalar | '(' list ')'
//! list      := (item+ (',' item+)* ','?)?
//! scalar    := a word or string, plus any strings or words glued to it
//! ```
//!
//! The grammar is error tolerant: a malformed statement is reported and
//! skipped up to the next `;` or closing `}`, so every problem in a file shows
//! up in one pass.

use std::path::Path;

use crate::diag::{Diagnostics, Locus};
use crate::error::CfgError;
use crate::file;
use crate::lexer::{Spanned, Token, lex};
use crate::tree::{NodeId, NodeKind, Tree};
use crate::value::Value;

/// Parse `text`, reporting problems against `file`.
pub fn parse(text: &str, file: &str, diag: &mut Diagnostics) -> Result<Tree, CfgError> {
    let before = diag.error_count();
    let tokens = lex(text, file, diag);
    let tree = ParserContext::new(tokens, Tree::new(), diag).run();
    let count = diag.error_count() - before;
    if count > 0 {
        return Err(CfgError::Syntax {
            file: file.to_string(),
            count,
        });
    }
    Ok(tree)
}

/// Read and parse a file. The resulting tree remembers its source path.
pub fn parse_file(path: &Path, diag: &mut Diagnostics) -> Result<Tree, CfgError> {
    tracing::debug!(path = %path.display(), "parsing configuration file");
    let text = file::read_required(path)?;
    parse_source(&text, path, diag)
}

/// Parse `text` that was read from `path`. The tree remembers `path`, so
/// relative includes resolve against its directory.
pub fn parse_source(text: &str, path: &Path, diag: &mut Diagnostics) -> Result<Tree, CfgError> {
    let file = path.display().to_string();
    let before = diag.error_count();
    let tokens = lex(text, &file, diag);
    let tree = ParserContext::new(tokens, Tree::with_source(path), diag).run();
    let count = diag.error_count() - before;
    if count > 0 {
        return Err(CfgError::Syntax { file, count });
    }
    Ok(tree)
}

/// Parse a standalone value such as the label part of a path segment.
pub fn parse_value(text: &str) -> Result<Value, String> {
    let mut diag = Diagnostics::new();
    let tokens = lex(text, "<value>", &mut diag);
    let mut ctx = ParserContext::new(tokens, Tree::new(), &mut diag);
    let value = ctx.value();
    let trailing = ctx.peek().token.clone();
    if let Some(d) = diag.errors().next() {
        return Err(d.message.clone());
    }
    if trailing != Token::Eof {
        return Err(format!("unexpected {}", trailing.describe()));
    }
    match value {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Ok(Value::string("")),
        Err(()) => Err("malformed value".into()),
    }
}

pub(crate) fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Parse state threaded through every grammar action.
struct ParserContext<'d> {
    tokens: Vec<Spanned>,
    pos: usize,
    tree: Tree,
    diag: &'d mut Diagnostics,
}

/// Marker for "an error was reported, resynchronize".
type Recover<T> = Result<T, ()>;

impl<'d> ParserContext<'d> {
    fn new(tokens: Vec<Spanned>, tree: Tree, diag: &'d mut Diagnostics) -> Self {
        ParserContext {
            tokens,
            pos: 0,
            tree,
            diag,
        }
    }

    fn peek(&self) -> &Spanned {
        // the stream always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Spanned {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Token) -> bool {
        &self.peek().token == token
    }

    fn error(&mut self, locus: &Locus, msg: impl Into<String>) {
        self.diag.error(locus, msg);
    }

    fn unexpected(&mut self, expected: &str) {
        let tok = self.peek().clone();
        self.error(
            &tok.locus,
            format!("syntax error: expected {expected}, found {}", tok.token.describe()),
        );
    }

    fn run(mut self) -> Tree {
        while !self.at(&Token::Eof) {
            if self.at(&Token::RBrace) {
                let locus = self.peek().locus.clone();
                self.error(&locus, "syntax error: unbalanced `}'");
                self.bump();
                continue;
            }
            if self.statement(None).is_err() {
                self.recover();
            }
        }
        self.tree
    }

    fn statement(&mut self, parent: Option<NodeId>) -> Recover<()> {
        let tag = match &self.peek().token {
            Token::Word(w) if is_ident(w) => w.clone(),
            _ => {
                self.unexpected("identifier");
                return Err(());
            }
        };
        let locus = self.bump().locus;
        let label = self.value()?;

        match self.peek().token {
            Token::Semicolon => {
                self.bump();
                self.tree
                    .push(parent, NodeKind::Parameter, tag, label, locus);
                Ok(())
            }
            Token::LBrace => {
                self.bump();
                let id = self
                    .tree
                    .push(parent, NodeKind::Statement, tag, label, locus);
                self.block(id);
                if self.at(&Token::Semicolon) {
                    self.bump();
                }
                Ok(())
            }
            _ => {
                self.unexpected("`;' or `{'");
                Err(())
            }
        }
    }

    /// Statements up to the closing brace, which is consumed.
    fn block(&mut self, id: NodeId) {
        loop {
            match self.peek().token {
                Token::RBrace => {
                    self.bump();
                    return;
                }
                Token::Eof => {
                    let locus = self.tree.node(id).locus.clone();
                    self.error(&locus, "syntax error: missing `}'");
                    return;
                }
                _ => {
                    if self.statement(Some(id)).is_err() {
                        self.recover();
                    }
                }
            }
        }
    }

    /// Skip to just after the next `;`, or up to (not past) a closing `}` of
    /// the enclosing block. Nested blocks are skipped whole.
    fn recover(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek().token {
                Token::Eof => return,
                Token::Semicolon if depth == 0 => {
                    self.bump();
                    return;
                }
                Token::LBrace => {
                    depth += 1;
                    self.bump();
                }
                Token::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        if self.at(&Token::Semicolon) {
                            self.bump();
                        }
                        return;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Items up to a statement terminator. `None` when there are none.
    fn value(&mut self) -> Recover<Option<Value>> {
        let mut items = Vec::new();
        loop {
            match self.peek().token {
                Token::Semicolon | Token::LBrace | Token::RBrace | Token::Eof => break,
                Token::RParen | Token::Comma => {
                    self.unexpected("value");
                    return Err(());
                }
                _ => items.push(self.item()?),
            }
        }
        Ok((!items.is_empty()).then(|| Value::collapse(items)))
    }

    fn item(&mut self) -> Recover<Value> {
        if self.at(&Token::LParen) {
            self.bump();
            return self.list();
        }
        self.scalar().map(Value::String)
    }

    fn scalar(&mut self) -> Recover<String> {
        let first = self.bump();
        let (mut text, mut quoted) = match first.token {
            Token::Word(w) => (w, false),
            Token::Quoted(s) | Token::Multiline(s) => (s, true),
            other => {
                self.error(
                    &first.locus,
                    format!("syntax error: unexpected {}", other.describe()),
                );
                return Err(());
            }
        };

        loop {
            let next = self.peek();
            let glued = !next.spaced;
            match &next.token {
                Token::Quoted(s) | Token::Multiline(s) if quoted || glued => {
                    text.push_str(s);
                    quoted = true;
                }
                Token::Word(w) if glued => {
                    text.push_str(w);
                    quoted = false;
                }
                _ => break,
            }
            self.bump();
        }
        Ok(text)
    }

    /// The inside of `( ... )`; the opening paren is already consumed.
    fn list(&mut self) -> Recover<Value> {
        let mut elems = Vec::new();
        loop {
            if self.at(&Token::RParen) {
                self.bump();
                return Ok(Value::List(elems));
            }

            let mut items = Vec::new();
            while !matches!(
                self.peek().token,
                Token::Comma | Token::RParen | Token::Semicolon | Token::LBrace | Token::RBrace | Token::Eof
            ) {
                items.push(self.item()?);
            }
            if items.is_empty() {
                self.unexpected("list element");
                return Err(());
            }
            elems.push(Value::collapse(items));

            match self.peek().token {
                Token::Comma => {
                    self.bump();
                }
                Token::RParen => {}
                _ => {
                    self.unexpected("`,' or `)'");
                    return Err(());
                }
            }
        }
    }
}
