mod expressions;

use crate::ast::Expr;
use crate::error::{ParseError, Span};
use crate::lexer::{SpannedToken, Token, tokenize};

/// Recursive-descent parser for data-construction expressions: object and
/// array literals, paths and backtick templates.
pub struct Parser {
    pub(super) tokens: Vec<SpannedToken>,
    pub(super) pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    #[inline]
    pub(super) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|st| &st.token)
    }

    #[inline]
    pub(super) fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|st| &st.token)
    }

    #[inline]
    pub(super) fn advance(&mut self) -> Option<SpannedToken> {
        if self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    pub(super) fn expect(&mut self, expected: Token, context: &str) -> Result<Span, ParseError> {
        match self.advance() {
            Some(st) if st.token == expected => Ok(st.span),
            Some(st) => Err(ParseError::UnexpectedToken {
                expected: expected.display_name(),
                found: st.token.display_name(),
                span: st.span,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.display_name(),
                context: Some(context.to_string()),
            }),
        }
    }

    pub(super) fn unexpected(&mut self, expected: &str, context: &str) -> ParseError {
        match self.advance() {
            Some(st) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: st.token.display_name(),
                span: st.span,
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                context: Some(context.to_string()),
            },
        }
    }
}

/// Parses a complete data expression. Trailing tokens are an error.
pub fn parse_dynamic(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    if parser.peek().is_some() {
        return Err(parser.unexpected("end of expression", "expression"));
    }
    Ok(expr)
}
