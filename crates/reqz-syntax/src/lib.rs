//! # reqz Syntax
//!
//! Expression readers, lexer, parser and AST for the reqz request language.
//!
//! ## Overview
//!
//! A reqz script is line oriented: each line is a directive (`@set`, `@header`,
//! …) or belongs to the request section started by an HTTP method. This crate
//! does not know about directives. It provides the pieces directive
//! implementations use to read their arguments:
//!
//! - **Readers**: literals, variable references (`{{ path ? default | filter }}`)
//!   and `{{ … }}` templates
//! - **Lexer / Parser**: object and array expressions with paths, shorthand
//!   keys, backtick templates and comments
//! - **Line helpers**: first word, header lines, assignments
//!
//! ## Example
//!
//! ```rust
//! use reqz_syntax::{Expression, parse_string_expression, parse_value_expression};
//!
//! let url = parse_string_expression("https://api.test/users/{{id}}").unwrap();
//! assert!(matches!(url, Expression::Template(_)));
//!
//! let total = parse_value_expression("{{price}} | json").unwrap();
//! assert!(matches!(total, Expression::Var(ref v) if v.filters == ["json"]));
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod line;
pub mod parser;
pub mod reader;

pub use ast::*;
pub use error::{LexError, ParseError, Span, format_error_with_source};
pub use lexer::{SpannedToken, Token, tokenize};
pub use parser::parse_dynamic;
pub use reader::{
    parse_array_expression, parse_body_expression, parse_literal, parse_object_expression,
    parse_string_expression, parse_string_literal, parse_template, parse_value_expression,
    parse_var_ref, read_literal, read_var_ref,
};
