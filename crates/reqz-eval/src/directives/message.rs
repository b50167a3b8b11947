//! Directives shaping the outgoing message: headers, query and body.

use crate::directive::{Directive, DirectiveShape, block_content};
use crate::module::RequestModule;
use anyhow::Result;
use reqz_syntax::ParseError;
use reqz_syntax::line::split_header;

/// `@header Name: value`
pub struct HeaderDirective;

impl Directive for HeaderDirective {
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        if arg.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        let (header, value) = split_header(arg)?;
        module.set_header_expr(header, value)
    }
}

/// `@headers` followed by one `Name: value` line per header.
pub struct HeadersDirective;

impl Directive for HeadersDirective {
    fn shape(&self) -> DirectiveShape {
        DirectiveShape::Block
    }

    fn build(&self, module: &mut RequestModule, _name: &str, arg: &str, lines: &[String]) -> Result<()> {
        if !arg.is_empty() {
            return Err(ParseError::invalid(format!("invalid content after @headers directive: {}", arg)).into());
        }
        for line in lines {
            let (header, value) = split_header(line)?;
            module.set_header_expr(header, value)?;
        }
        Ok(())
    }
}

/// `@query { ... }` replaces the query parameters.
pub struct QueryDirective;

impl Directive for QueryDirective {
    fn shape(&self) -> DirectiveShape {
        DirectiveShape::Block
    }

    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, lines: &[String]) -> Result<()> {
        let content = block_content(arg, lines);
        if content.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        module.set_query_expr(&content)
    }
}

pub struct BodyDirective;

impl Directive for BodyDirective {
    fn shape(&self) -> DirectiveShape {
        DirectiveShape::Block
    }

    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, lines: &[String]) -> Result<()> {
        let content = block_content(arg, lines);
        if content.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        module.set_body_expr(&content)
    }
}
