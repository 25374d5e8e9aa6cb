//! Recursive Descent Parser for command lines
//!
//! This parser consumes tokens from the lexer and produces an AST.
//!
//! Grammar:
//!   program      ::= command ('|' command)*
//!   command      ::= (WORD | QUOTED) (argument | redirection)*
//!   argument     ::= WORD | QUOTED
//!   redirection  ::= ('>' | '>>' | '<' | '<<') (WORD | QUOTED)
//!
//! Parsing is all-or-nothing: any error means no AST at all, so a malformed
//! pipeline can never be partially executed.

use crate::ast::types::{
    CommandNode, PipelineNode, RedirectionKind, RedirectionNode, WordNode, AST,
};
use crate::parser::lexer::{Lexer, Special, Token, TokenKind};
use crate::parser::types::{SyntaxError, MAX_INPUT_SIZE};

/// Main parser struct
pub struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Tokenize `input` and prepare to parse it. Whitespace tokens are dropped here.
    pub fn new(input: &'a str) -> Result<Self, SyntaxError> {
        if input.len() > MAX_INPUT_SIZE {
            return Err(SyntaxError::new(
                format!(
                    "input too large: {} bytes exceeds limit of {}",
                    input.len(),
                    MAX_INPUT_SIZE
                ),
                0,
            ));
        }

        let tokens = Lexer::new(input)
            .tokenize()?
            .into_iter()
            .filter(|t| t.special() != Some(Special::Whitespace))
            .collect();

        Ok(Self { input, tokens, pos: 0 })
    }

    /// Parse the whole line. `Ok(None)` means there was nothing to run.
    pub fn parse(mut self) -> Result<Option<AST>, SyntaxError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        let mut stages = vec![self.parse_command()?];
        while self.eat(Special::Pipe) {
            stages.push(self.parse_command()?);
        }

        if let Some(token) = self.current() {
            return Err(self.unexpected(token));
        }

        let ast = if stages.len() == 1 {
            AST::Command(stages.remove(0))
        } else {
            AST::Pipeline(PipelineNode { stages })
        };
        Ok(Some(ast))
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn current(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.current();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, special: Special) -> bool {
        if self.current().and_then(|t| t.special()) == Some(special) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn word(&self, token: Token) -> Option<WordNode> {
        match token.kind {
            TokenKind::Word | TokenKind::QuotedString => Some(WordNode::new(
                token.value(self.input),
                token.span(),
                token.kind == TokenKind::QuotedString,
            )),
            TokenKind::Special(_) => None,
        }
    }

    fn unexpected(&self, token: Token) -> SyntaxError {
        SyntaxError::with_span(
            format!("unexpected token `{}'", token.text(self.input)),
            token.span(),
        )
    }

    fn end_offset(&self) -> usize {
        self.input.len()
    }

    // =========================================================================
    // Productions
    // =========================================================================

    fn parse_command(&mut self) -> Result<CommandNode, SyntaxError> {
        let name = match self.current() {
            Some(token) => match self.word(token) {
                Some(word) => {
                    self.pos += 1;
                    word
                }
                None => return Err(self.unexpected(token)),
            },
            None => {
                return Err(SyntaxError::new(
                    "expected a command after `|'",
                    self.end_offset(),
                ))
            }
        };

        let mut args = Vec::new();
        let mut redirects = Vec::new();

        while let Some(token) = self.current() {
            if let Some(word) = self.word(token) {
                self.pos += 1;
                args.push(word);
                continue;
            }
            match redirection_kind(token) {
                Some(kind) => {
                    self.pos += 1;
                    redirects.push(self.parse_redirection_target(kind, token)?);
                }
                // pipe, `;`, `&`: the command ends here
                None => break,
            }
        }

        Ok(CommandNode { name, args, redirects })
    }

    fn parse_redirection_target(
        &mut self,
        kind: RedirectionKind,
        op: Token,
    ) -> Result<RedirectionNode, SyntaxError> {
        match self.advance() {
            Some(token) => match self.word(token) {
                Some(target) => Ok(RedirectionNode { kind, target }),
                None => Err(self.unexpected(token)),
            },
            None => Err(SyntaxError::with_span(
                format!("expected a file name after `{}'", kind.as_str()),
                op.span(),
            )),
        }
    }
}

fn redirection_kind(token: Token) -> Option<RedirectionKind> {
    match token.special()? {
        Special::Great => Some(RedirectionKind::Output),
        Special::DGreat => Some(RedirectionKind::Append),
        Special::Less => Some(RedirectionKind::Input),
        Special::DLess => Some(RedirectionKind::HereDoc),
        _ => None,
    }
}

/// Parse a command line.
pub fn parse(input: &str) -> Result<Option<AST>, SyntaxError> {
    Parser::new(input)?.parse()
}
