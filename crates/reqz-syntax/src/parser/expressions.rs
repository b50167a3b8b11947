//! Expression parsing methods for the recursive-descent parser.

use super::{Parser, parse_dynamic};
use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{TemplatePiece, Token};
use crate::reader;

impl Parser {
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::LeftBrace) => self.parse_object(),
            Some(Token::LeftBracket) => self.parse_array(),
            _ => self.parse_primary(),
        }
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        self.expect(Token::LeftBrace, "object")?;
        let mut entries = Vec::new();

        loop {
            if matches!(self.peek(), Some(Token::RightBrace)) {
                self.advance();
                break;
            }

            let key = match self.advance().map(|st| st.token) {
                Some(Token::Identifier(name)) => {
                    if matches!(self.peek(), Some(Token::Comma) | Some(Token::RightBrace)) {
                        let value = Expr::Path(vec![PathSegment::Name(name.clone())]);
                        entries.push((name, value));
                        self.skip_separator("object")?;
                        continue;
                    }
                    name
                }
                Some(Token::String(s)) => s,
                Some(Token::Number(n)) => Literal::Number(n).to_string(),
                Some(Token::True) => "true".to_string(),
                Some(Token::False) => "false".to_string(),
                Some(Token::Null) => "null".to_string(),
                Some(Token::Undefined) => "undefined".to_string(),
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.unexpected("property name", "object"));
                }
                None => {
                    return Err(ParseError::UnexpectedEof {
                        expected: "'}'".to_string(),
                        context: Some("object".to_string()),
                    });
                }
            };

            self.expect(Token::Colon, "object")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            self.skip_separator("object")?;
        }

        Ok(Expr::Object(entries))
    }

    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        self.expect(Token::LeftBracket, "array")?;
        let mut items = Vec::new();

        loop {
            if matches!(self.peek(), Some(Token::RightBracket)) {
                self.advance();
                break;
            }
            items.push(self.parse_expression()?);
            self.skip_separator("array")?;
        }

        Ok(Expr::Array(items))
    }

    /// After an entry: a comma, or the closing token left for the loop.
    fn skip_separator(&mut self, context: &str) -> Result<(), ParseError> {
        let close = if context == "object" { Token::RightBrace } else { Token::RightBracket };
        match self.peek() {
            Some(Token::Comma) => {
                self.advance();
                Ok(())
            }
            Some(t) if *t == close => Ok(()),
            _ => Err(self.unexpected(&format!("',' or {}", close.display_name()), context)),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(st) = self.advance() else {
            return Err(ParseError::UnexpectedEof {
                expected: "expression".to_string(),
                context: None,
            });
        };

        match st.token {
            Token::String(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::True => Ok(Expr::Literal(Literal::Bool(true))),
            Token::False => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Null => Ok(Expr::Literal(Literal::Null)),
            Token::Undefined => Ok(Expr::Literal(Literal::Undefined)),
            Token::Interpolation(var) => Ok(Expr::Var(var)),
            Token::Template(pieces) => parse_template_pieces(pieces).map(Expr::Template),
            Token::Identifier(name) => self.parse_path(name),
            other => Err(ParseError::UnexpectedToken {
                expected: "expression".to_string(),
                found: other.display_name(),
                span: st.span,
            }),
        }
    }

    fn parse_path(&mut self, first: String) -> Result<Expr, ParseError> {
        let mut segments = vec![PathSegment::Name(first)];

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    match self.peek() {
                        Some(Token::Identifier(name)) => {
                            segments.push(PathSegment::Name(name.clone()));
                            self.advance();
                        }
                        _ => return Err(self.unexpected("property name", "path")),
                    }
                }
                Some(Token::LeftBracket) if !matches!(self.peek_nth(1), Some(Token::RightBracket)) => {
                    self.advance();
                    let segment = match self.peek() {
                        Some(Token::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
                            PathSegment::Index(*n as usize)
                        }
                        Some(Token::String(s)) => PathSegment::Name(s.clone()),
                        _ => return Err(self.unexpected("index or quoted key", "path")),
                    };
                    self.advance();
                    self.expect(Token::RightBracket, "path")?;
                    segments.push(segment);
                }
                _ => break,
            }
        }

        Ok(Expr::Path(segments))
    }
}

fn parse_template_pieces(pieces: Vec<TemplatePiece>) -> Result<Vec<TemplateChunk>, ParseError> {
    pieces
        .into_iter()
        .map(|piece| match piece {
            TemplatePiece::Text(text) => Ok(TemplateChunk::Text(text)),
            TemplatePiece::Expr(source) => parse_dynamic(&source).map(TemplateChunk::Expr),
            TemplatePiece::Var(source) => reader::parse_var_ref(&source)?
                .map(|var| TemplateChunk::Expr(Expr::Var(var)))
                .ok_or_else(|| ParseError::InvalidVariable { text: source.trim().to_string() }),
        })
        .collect()
}
