use crate::diag::{Diagnostics, Locus};
use crate::value::is_word_char;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare word; identifiers are distinguished in the parser
    Word(String),
    /// Quoted string (content without quotes, escapes resolved)
    Quoted(String),
    /// Here-document body
    Multiline(String),
    Semicolon,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("`{w}'"),
            Token::Quoted(_) => "quoted string".into(),
            Token::Multiline(_) => "multi-line string".into(),
            Token::Semicolon => "`;'".into(),
            Token::LBrace => "`{'".into(),
            Token::RBrace => "`}'".into(),
            Token::LParen => "`('".into(),
            Token::RParen => "`)'".into(),
            Token::Comma => "`,'".into(),
            Token::Eof => "end of file".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub locus: Locus,
    /// Whitespace (or a comment) separated this token from the previous one.
    pub spaced: bool,
}

/// Tokenize `src`. Lexical errors are reported to `diag` and scanning goes on,
/// so one pass reports every problem in the file. The returned stream always
/// ends with [`Token::Eof`].
pub fn lex(src: &str, file: &str, diag: &mut Diagnostics) -> Vec<Spanned> {
    Lexer::new(src, file).run(diag)
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(src: &str, file: &'a str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn locus(&self) -> Locus {
        Locus::new(self.file, self.line, self.column)
    }

    fn run(mut self, diag: &mut Diagnostics) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        let mut spaced = true;

        loop {
            let Some(c) = self.peek() else { break };

            if c.is_whitespace() {
                self.bump();
                spaced = true;
                continue;
            }

            // Line comments
            if c == '#' || (c == '/' && self.peek_at(1) == Some('/')) {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                spaced = true;
                continue;
            }

            // Block comment
            if c == '/' && self.peek_at(1) == Some('*') {
                let start = self.locus();
                self.bump();
                self.bump();
                loop {
                    match self.bump() {
                        None => {
                            diag.error(&start, "unexpected end of file in comment");
                            break;
                        }
                        Some('*') if self.peek() == Some('/') => {
                            self.bump();
                            break;
                        }
                        Some(_) => {}
                    }
                }
                spaced = true;
                continue;
            }

            let locus = self.locus();
            let token = match c {
                ';' => self.punct(Token::Semicolon),
                '{' => self.punct(Token::LBrace),
                '}' => self.punct(Token::RBrace),
                '(' => self.punct(Token::LParen),
                ')' => self.punct(Token::RParen),
                ',' => self.punct(Token::Comma),
                '"' => self.double_quoted(&locus, diag),
                '\'' => self.single_quoted(&locus, diag),
                '<' if self.peek_at(1) == Some('<') => self.heredoc(&locus, diag),
                _ => self.word(),
            };
            tokens.push(Spanned {
                token,
                locus,
                spaced,
            });
            spaced = false;
        }

        tokens.push(Spanned {
            token: Token::Eof,
            locus: self.locus(),
            spaced: true,
        });
        tokens
    }

    fn punct(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn word(&mut self) -> Token {
        let mut w = String::new();
        while let Some(c) = self.peek() {
            if !is_word_char(c) {
                break;
            }
            w.push(c);
            self.bump();
        }
        Token::Word(w)
    }

    fn double_quoted(&mut self, start: &Locus, diag: &mut Diagnostics) -> Token {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => {
                    diag.error(start, "unterminated string");
                    break;
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    None => {
                        diag.error(start, "unterminated string");
                        break;
                    }
                    // Line continuation
                    Some('\n') => {}
                    Some(c) => match unescape(c) {
                        Some(u) => s.push(u),
                        None => {
                            s.push('\\');
                            s.push(c);
                        }
                    },
                },
                Some(c) => s.push(c),
            }
        }
        Token::Quoted(s)
    }

    fn single_quoted(&mut self, start: &Locus, diag: &mut Diagnostics) -> Token {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => {
                    diag.error(start, "unterminated string");
                    break;
                }
                Some('\'') => break,
                Some(c) => s.push(c),
            }
        }
        Token::Quoted(s)
    }

    /// `<<WORD` up to a line consisting of `WORD`. With `<<-WORD`, leading tabs
    /// are stripped from every body line.
    fn heredoc(&mut self, start: &Locus, diag: &mut Diagnostics) -> Token {
        self.bump();
        self.bump();
        let strip_tabs = if self.peek() == Some('-') {
            self.bump();
            true
        } else {
            false
        };
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }

        let mut marker = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            marker.push(c);
            self.bump();
        }
        let marker = marker.trim_end().to_string();
        if marker.is_empty() {
            diag.error(start, "missing here-document terminator");
            return Token::Multiline(String::new());
        }
        self.bump();

        let mut lines: Vec<String> = Vec::new();
        loop {
            if self.peek().is_none() {
                diag.error(
                    start,
                    format!("unexpected end of file in here-document (expected `{marker}')"),
                );
                break;
            }
            let mut line = String::new();
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                line.push(c);
                self.bump();
            }
            let body = if strip_tabs {
                line.trim_start_matches('\t').to_string()
            } else {
                line
            };
            if body.trim_end() == marker {
                break;
            }
            self.bump();
            lines.push(body);
        }

        let mut text = lines.join("\n");
        if !lines.is_empty() {
            text.push('\n');
        }
        Token::Multiline(text)
    }
}

fn unescape(c: char) -> Option<char> {
    Some(match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0c}',
        'v' => '\u{0b}',
        '\\' => '\\',
        '"' => '"',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut diag = Diagnostics::new();
        let out = lex(src, "test", &mut diag);
        assert!(diag.is_clean(), "unexpected lex errors: {diag}");
        out.into_iter().map(|s| s.token).collect()
    }

    fn word(w: &str) -> Token {
        Token::Word(w.into())
    }

    #[test]
    fn simple_statement() {
        assert_eq!(
            tokens("facility mail;"),
            vec![word("facility"), word("mail"), Token::Semicolon, Token::Eof]
        );
    }

    #[test]
    fn words_keep_slashes_and_dots() {
        assert_eq!(
            tokens("allow 127.0.0.1/8;"),
            vec![word("allow"), word("127.0.0.1/8"), Token::Semicolon, Token::Eof]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let src = "# hash\n// slashes\n/* block\n spans */ x 1;";
        assert_eq!(
            tokens(src),
            vec![word("x"), word("1"), Token::Semicolon, Token::Eof]
        );
    }

    #[test]
    fn quoted_string_escapes() {
        assert_eq!(
            tokens(r#""a\tb\"c\q""#),
            vec![Token::Quoted("a\tb\"c\\q".into()), Token::Eof]
        );
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(
            tokens(r"'a\nb'"),
            vec![Token::Quoted("a\\nb".into()), Token::Eof]
        );
    }

    #[test]
    fn heredoc_body() {
        let src = "text <<EOT\nline one\nline two\nEOT\n;";
        assert_eq!(
            tokens(src),
            vec![
                word("text"),
                Token::Multiline("line one\nline two\n".into()),
                Token::Semicolon,
                Token::Eof
            ]
        );
    }

    #[test]
    fn heredoc_strips_tabs() {
        let src = "text <<-END\n\tindented\n\tEND\n;";
        assert_eq!(
            tokens(src),
            vec![
                word("text"),
                Token::Multiline("indented\n".into()),
                Token::Semicolon,
                Token::Eof
            ]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let mut diag = Diagnostics::new();
        let out = lex("a;\n  bb;", "f.conf", &mut diag);
        assert_eq!(out[2].locus, Locus::new("f.conf", 2, 3));
    }

    #[test]
    fn marks_glued_tokens() {
        let mut diag = Diagnostics::new();
        let out = lex("x \"a\"\"b\" c", "t", &mut diag);
        assert!(out[1].spaced);
        assert!(!out[2].spaced);
        assert!(out[3].spaced);
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let mut diag = Diagnostics::new();
        let out = lex("x 1; /* never closed", "t", &mut diag);
        assert_eq!(diag.error_count(), 1);
        assert_eq!(out.last().map(|s| &s.token), Some(&Token::Eof));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut diag = Diagnostics::new();
        lex("x \"oops;", "t", &mut diag);
        assert_eq!(diag.error_count(), 1);
    }
}
