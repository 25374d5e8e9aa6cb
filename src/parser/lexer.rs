//! Lexer for command lines
//!
//! The lexer turns a line into tokens that the parser consumes. Tokens are
//! views (`offset`, `length`) into the input; nothing is copied while lexing.
//! It recognizes:
//! - Special characters and operators: `| & ; < > << >>`
//! - Whitespace runs (emitted as a special token, skipped by the parser)
//! - Words
//! - Single- and double-quoted strings (no escape processing inside)

use std::collections::HashMap;

use crate::ast::types::Span;
use crate::parser::types::{SyntaxError, MAX_TOKENS};

/// Operators and separators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Special {
    Pipe,       // |
    Amp,        // &
    Semi,       // ;
    Less,       // <
    Great,      // >
    DLess,      // <<
    DGreat,     // >>
    Whitespace, // run of blanks
}

impl Special {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pipe => "|",
            Self::Amp => "&",
            Self::Semi => ";",
            Self::Less => "<",
            Self::Great => ">",
            Self::DLess => "<<",
            Self::DGreat => ">>",
            Self::Whitespace => " ",
        }
    }
}

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Special(Special),
    Word,
    QuotedString,
}

/// A token produced by the lexer: a slice of the input, never a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub length: usize,
}

impl Token {
    pub fn new(kind: TokenKind, offset: usize, length: usize) -> Self {
        Self { kind, offset, length }
    }

    pub fn span(&self) -> Span {
        Span::new(self.offset, self.length)
    }

    /// Raw text, quotes included.
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        self.span().text(input)
    }

    /// Text with the surrounding quotes of a quoted string removed.
    pub fn value<'a>(&self, input: &'a str) -> &'a str {
        let raw = self.text(input);
        match self.kind {
            TokenKind::QuotedString => &raw[1..raw.len() - 1],
            _ => raw,
        }
    }

    pub fn special(&self) -> Option<Special> {
        match self.kind {
            TokenKind::Special(s) => Some(s),
            _ => None,
        }
    }
}

lazy_static::lazy_static! {
    /// Single-character operators
    static ref SINGLE_CHAR_OPS: HashMap<u8, Special> = {
        let mut m = HashMap::new();
        m.insert(b'|', Special::Pipe);
        m.insert(b'&', Special::Amp);
        m.insert(b';', Special::Semi);
        m.insert(b'<', Special::Less);
        m.insert(b'>', Special::Great);
        m
    };
}

/// Two-character operators
const TWO_CHAR_OPS: &[(&[u8; 2], Special)] = &[
    (b"<<", Special::DLess),
    (b">>", Special::DGreat),
];

fn is_blank(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_quote(c: u8) -> bool {
    c == b'\'' || c == b'"'
}

/// Check if a byte ends a word token
fn is_word_boundary(c: u8) -> bool {
    is_blank(c) || is_quote(c) || SINGLE_CHAR_OPS.contains_key(&c)
}

/// Lexer over a single input line
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            if tokens.len() >= MAX_TOKENS {
                return Err(SyntaxError::new(
                    format!("too many tokens (limit {})", MAX_TOKENS),
                    token.offset,
                ));
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    /// Return the next token, or `None` at end of input.
    ///
    /// An unterminated quote is an error: the token would otherwise swallow the
    /// rest of the line, including any pipes or redirections in it.
    pub fn next_token(&mut self) -> Result<Option<Token>, SyntaxError> {
        let start = self.pos;
        let c0 = match self.peek(0) {
            Some(c) => c,
            None => return Ok(None),
        };

        if is_blank(c0) {
            while self.peek(0).is_some_and(is_blank) {
                self.pos += 1;
            }
            return Ok(Some(self.emit(TokenKind::Special(Special::Whitespace), start)));
        }

        if let Some(c1) = self.peek(1) {
            if let Some((_, op)) = TWO_CHAR_OPS.iter().find(|(chars, _)| **chars == [c0, c1]) {
                self.pos += 2;
                return Ok(Some(self.emit(TokenKind::Special(*op), start)));
            }
        }

        if let Some(op) = SINGLE_CHAR_OPS.get(&c0) {
            self.pos += 1;
            return Ok(Some(self.emit(TokenKind::Special(*op), start)));
        }

        if is_quote(c0) {
            return self.read_quoted(c0, start).map(Some);
        }

        while self.peek(0).is_some_and(|c| !is_word_boundary(c)) {
            self.pos += 1;
        }
        Ok(Some(self.emit(TokenKind::Word, start)))
    }

    fn read_quoted(&mut self, quote: u8, start: usize) -> Result<Token, SyntaxError> {
        self.pos += 1;
        match self.input.as_bytes()[self.pos..].iter().position(|&c| c == quote) {
            Some(rel) => {
                self.pos += rel + 1;
                Ok(self.emit(TokenKind::QuotedString, start))
            }
            None => {
                self.pos = self.input.len();
                Err(SyntaxError::with_span(
                    format!("unterminated quote `{}'", quote as char),
                    Span::new(start, self.input.len() - start),
                ))
            }
        }
    }

    fn emit(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, start, self.pos - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_command() {
        let input = "echo hello";
        let tokens = Lexer::new(input).tokenize().unwrap();
        assert_eq!(tokens.len(), 3); // echo, blank, hello
        assert_eq!(tokens[0].kind, TokenKind::Word);
        assert_eq!(tokens[0].text(input), "echo");
        assert_eq!(tokens[1].kind, TokenKind::Special(Special::Whitespace));
        assert_eq!(tokens[2].text(input), "hello");
    }

    #[test]
    fn test_pipeline() {
        assert_eq!(
            kinds("a|b"),
            vec![
                TokenKind::Word,
                TokenKind::Special(Special::Pipe),
                TokenKind::Word
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        let tokens = Lexer::new(">>x<<y").tokenize().unwrap();
        assert_eq!(tokens[0].special(), Some(Special::DGreat));
        assert_eq!(tokens[2].special(), Some(Special::DLess));
        assert_eq!(tokens[0].length, 2);
    }

    #[test]
    fn test_three_angles_split_into_two_tokens() {
        let tokens = Lexer::new(">>>").tokenize().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].special(), Some(Special::DGreat));
        assert_eq!(tokens[1].special(), Some(Special::Great));
    }

    #[test]
    fn test_whitespace_run_is_one_token() {
        let tokens = Lexer::new("a \t  b").tokenize().unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].length, 4);
    }

    #[test]
    fn test_double_quotes() {
        let input = "echo \"hello | world\"";
        let tokens = Lexer::new(input).tokenize().unwrap();
        assert_eq!(tokens[2].kind, TokenKind::QuotedString);
        assert_eq!(tokens[2].text(input), "\"hello | world\"");
        assert_eq!(tokens[2].value(input), "hello | world");
    }

    #[test]
    fn test_single_quotes_keep_double_quote() {
        let input = "'say \"hi\"'";
        let tokens = Lexer::new(input).tokenize().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value(input), "say \"hi\"");
    }

    #[test]
    fn test_no_escape_processing() {
        let input = r#""a\nb""#;
        let tokens = Lexer::new(input).tokenize().unwrap();
        assert_eq!(tokens[0].value(input), r"a\nb");
    }

    #[test]
    fn test_word_stops_at_quote() {
        let input = "ab'cd'";
        let tokens = Lexer::new(input).tokenize().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text(input), "ab");
        assert_eq!(tokens[1].kind, TokenKind::QuotedString);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = Lexer::new("echo \"abc").tokenize().unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_next_token_end_of_input() {
        let mut lexer = Lexer::new("x");
        assert!(lexer.next_token().unwrap().is_some());
        assert!(lexer.next_token().unwrap().is_none());
        assert!(lexer.next_token().unwrap().is_none());
    }

    #[test]
    fn test_utf8_words() {
        let input = "echo héllo";
        let tokens = Lexer::new(input).tokenize().unwrap();
        assert_eq!(tokens[2].text(input), "héllo");
    }
}
