//! Scanning readers for the inline expression forms.
//!
//! Each `read_*` function looks at the start of its input and returns the
//! recognized value together with the unconsumed rest, or `None` when the
//! input does not start with that form, so callers can fall through to the
//! next attempt. The `parse_*` entry points decide which form a directive
//! argument uses.

use crate::ast::{Expression, Literal, Template, TemplatePart, VarPath, VarRef};
use crate::error::ParseError;
use crate::parser;
use once_cell::sync::Lazy;
use regex::Regex;

static VAR_REF_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*((?:[_$a-zA-Z][_$a-zA-Z0-9]*\.?)+)\s*").unwrap());
static FILTER_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|\s*([_$a-zA-Z][_$a-zA-Z0-9]*)\s*").unwrap());
static SYMBOL_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(true|false|null|undefined)\b\s*").unwrap());
static NUMBER_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([+-]?\d+(?:\.\d+)?)\s*").unwrap());
static DQUOTED_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*"((?:[^"\\]|\\.)*)"\s*"#).unwrap());
static SQUOTED_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*'((?:[^'\\]|\\.)*)'\s*").unwrap());
static SINGLE_INTERP_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\{([^{}]*)\}\}((?:\s*\|\s*[_$a-zA-Z][_$a-zA-Z0-9]*)*)\s*$").unwrap()
});

/// A value read from the front of a string plus what is left of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Read<'a, V> {
    pub value: V,
    pub rest: &'a str,
}

pub fn skip_spaces(text: &str) -> &str {
    text.trim_start()
}

/// Resolves backslash escapes the way JSON string literals do, plus `\'`.
pub fn unescape(raw: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('`') => out.push('`'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ParseError::invalid(format!("invalid unicode escape: \\u{}", hex)))?;
                out.push(code);
            }
            Some(other) => {
                return Err(ParseError::invalid(format!("invalid escape sequence: \\{}", other)));
            }
            None => return Err(ParseError::invalid("dangling escape at end of string")),
        }
    }
    Ok(out)
}

pub fn read_number(text: &str) -> Option<Read<'_, f64>> {
    let m = NUMBER_RX.captures(text)?;
    let value = m[1].parse::<f64>().ok()?;
    Some(Read { value, rest: &text[m[0].len()..] })
}

pub fn read_symbol(text: &str) -> Option<Read<'_, Literal>> {
    let m = SYMBOL_RX.captures(text)?;
    let value = match &m[1] {
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        "null" => Literal::Null,
        _ => Literal::Undefined,
    };
    Some(Read { value, rest: &text[m[0].len()..] })
}

pub fn read_quoted_string(text: &str) -> Result<Option<Read<'_, String>>, ParseError> {
    let rx = match skip_spaces(text).chars().next() {
        Some('"') => &*DQUOTED_RX,
        Some('\'') => &*SQUOTED_RX,
        _ => return Ok(None),
    };
    match rx.captures(text) {
        Some(m) => Ok(Some(Read { value: unescape(&m[1])?, rest: &text[m[0].len()..] })),
        None => Ok(None),
    }
}

/// Reads a string, number or symbol literal from the front of `text`.
pub fn read_literal(text: &str) -> Result<Option<Read<'_, Literal>>, ParseError> {
    let trimmed = skip_spaces(text);
    match trimmed.chars().next() {
        Some('"') | Some('\'') => Ok(read_quoted_string(trimmed)?
            .map(|r| Read { value: Literal::String(r.value), rest: r.rest })),
        Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => Ok(read_number(trimmed)
            .map(|r| Read { value: Literal::Number(r.value), rest: r.rest })),
        Some(_) => Ok(read_symbol(trimmed)),
        None => Ok(None),
    }
}

/// Parses `text` as exactly one literal.
pub fn parse_literal(text: &str) -> Result<Option<Literal>, ParseError> {
    match read_literal(text)? {
        Some(r) if r.rest.is_empty() => Ok(Some(r.value)),
        _ => Ok(None),
    }
}

/// Reads `ident(.ident)*`. A trailing dot means the text is not a reference.
pub fn read_var_path(text: &str) -> Option<Read<'_, VarPath>> {
    let m = VAR_REF_RX.captures(text)?;
    let token = &m[1];
    if token.ends_with('.') {
        return None;
    }
    Some(Read {
        value: token.split('.').map(str::to_string).collect(),
        rest: &text[m[0].len()..],
    })
}

/// Reads `path ('?' literal)? ('|' filter)*` from the front of `text`.
pub fn read_var_ref(text: &str) -> Result<Option<Read<'_, VarRef>>, ParseError> {
    let Some(path) = read_var_path(text) else {
        return Ok(None);
    };
    let mut var = VarRef { path: path.value, default: None, filters: Vec::new() };
    let mut rest = path.rest;

    if let Some(after) = rest.strip_prefix('?') {
        match read_literal(after)? {
            Some(lit) => {
                var.default = Some(lit.value);
                rest = lit.rest;
            }
            None => {
                return Err(ParseError::invalid(format!("expecting a literal: {}", after.trim())));
            }
        }
    }

    while rest.trim_start().starts_with('|') {
        match FILTER_RX.captures(rest) {
            Some(m) => {
                var.filters.push(m[1].to_string());
                rest = &rest[m[0].len()..];
            }
            None => {
                return Err(ParseError::invalid(format!("invalid filter: {}", rest.trim())));
            }
        }
    }

    Ok(Some(Read { value: var, rest }))
}

/// Parses `text` as exactly one variable reference.
pub fn parse_var_ref(text: &str) -> Result<Option<VarRef>, ParseError> {
    match read_var_ref(text)? {
        Some(r) if r.rest.trim().is_empty() => Ok(Some(r.value)),
        _ => Ok(None),
    }
}

/// Splits text on `{{ … }}` markers. Text outside markers is kept verbatim,
/// an opening `{{` without a closing `}}` is kept as text too.
pub fn parse_template(text: &str) -> Result<Template, ParseError> {
    let mut parts = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open..].find("}}").map(|c| c + open) else {
            break;
        };
        if open > 0 {
            push_text(&mut parts, &rest[..open]);
        }
        let inner = &rest[open + 2..close];
        let var = parse_var_ref(inner)?
            .ok_or_else(|| ParseError::InvalidVariable { text: inner.trim().to_string() })?;
        parts.push(TemplatePart::Var(var));
        rest = &rest[close + 2..];
    }

    if !rest.is_empty() || parts.is_empty() {
        push_text(&mut parts, rest);
    }
    Ok(Template { parts })
}

fn push_text(parts: &mut Vec<TemplatePart>, text: &str) {
    if let Some(TemplatePart::Text(prev)) = parts.last_mut() {
        prev.push_str(text);
    } else {
        parts.push(TemplatePart::Text(text.to_string()));
    }
}

fn template_expression(text: &str) -> Result<Expression, ParseError> {
    let template = parse_template(text)?;
    if template.is_plain() {
        Ok(Expression::text(text))
    } else {
        Ok(Expression::Template(template))
    }
}

fn backtick_expression(text: &str) -> Result<Expression, ParseError> {
    if text.len() < 2 || !text.ends_with('`') {
        return Err(ParseError::invalid(format!(
            "invalid template string, expecting an ending tick: {}",
            text
        )));
    }
    template_expression(&text[1..text.len() - 1])
}

fn starts_dynamic(text: &str) -> bool {
    (text.starts_with('{') && !text.starts_with("{{")) || text.starts_with('[')
}

/// Parses a directive argument that denotes a string-ish value: URLs, header
/// values, file names, echo text.
pub fn parse_string_expression(text: &str) -> Result<Expression, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Expression::text(""));
    }
    if text.starts_with('`') {
        return backtick_expression(text);
    }
    if starts_dynamic(text) {
        return parser::parse_dynamic(text).map(Expression::Dynamic);
    }
    if text.starts_with('"') || text.starts_with('\'') {
        if let Some(Literal::String(s)) = parse_literal(text)? {
            return Ok(Expression::Literal(Literal::String(s)));
        }
    }
    template_expression(text)
}

/// Parses the right-hand side of an assignment. Unlike string expressions a
/// lone `{{ref}}` keeps the referenced value's type, and filters may follow
/// the closing braces: `{{price}} | json`.
pub fn parse_value_expression(text: &str) -> Result<Expression, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::invalid("missing value expression"));
    }
    if text.starts_with('`') {
        return backtick_expression(text);
    }
    if let Some(m) = SINGLE_INTERP_RX.captures(text) {
        let inner = m.get(1).map(|g| g.as_str()).unwrap_or_default();
        let mut var = parse_var_ref(inner)?
            .ok_or_else(|| ParseError::InvalidVariable { text: inner.trim().to_string() })?;
        let trailing = m.get(2).map(|g| g.as_str()).unwrap_or_default();
        var.filters.extend(
            trailing
                .split('|')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        );
        return Ok(Expression::Var(var));
    }
    if starts_dynamic(text) {
        return parser::parse_dynamic(text).map(Expression::Dynamic);
    }
    if let Some(lit) = parse_literal(text)? {
        return Ok(Expression::Literal(lit));
    }
    if let Some(var) = parse_var_ref(text)? {
        return Ok(Expression::Var(var));
    }
    template_expression(text)
}

/// Parses a request body: object/array expressions become structured data,
/// anything else is interpolated text.
pub fn parse_body_expression(text: &str) -> Result<Expression, ParseError> {
    let text = text.trim();
    if text.starts_with('`') {
        return backtick_expression(text);
    }
    if starts_dynamic(text) {
        return parser::parse_dynamic(text).map(Expression::Dynamic);
    }
    template_expression(text)
}

pub fn parse_object_expression(text: &str) -> Result<Expression, ParseError> {
    let text = text.trim();
    if !text.starts_with('{') {
        return Err(ParseError::invalid(format!("expecting an object expression: {}", text)));
    }
    parser::parse_dynamic(text).map(Expression::Dynamic)
}

pub fn parse_array_expression(text: &str) -> Result<Expression, ParseError> {
    let text = text.trim();
    if !text.starts_with('[') {
        return Err(ParseError::invalid(format!("expecting an array expression: {}", text)));
    }
    parser::parse_dynamic(text).map(Expression::Dynamic)
}

/// Parses a quoted string literal, as required by `@import`.
pub fn parse_string_literal(text: &str) -> Result<String, ParseError> {
    match parse_literal(text)? {
        Some(Literal::String(s)) => Ok(s),
        _ => Err(ParseError::invalid(format!("expecting a quoted string: {}", text.trim()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_literal_kinds() {
        assert_eq!(parse_literal("'it\\'s'").unwrap(), Some(Literal::String("it's".into())));
        assert_eq!(parse_literal(" 42 ").unwrap(), Some(Literal::Number(42.0)));
        assert_eq!(parse_literal("-1.5").unwrap(), Some(Literal::Number(-1.5)));
        assert_eq!(parse_literal("null").unwrap(), Some(Literal::Null));
        assert_eq!(parse_literal("nullable").unwrap(), None);
        assert_eq!(parse_literal("abc").unwrap(), None);
    }

    #[test]
    fn test_read_var_ref_rest() {
        let r = read_var_ref("a.b ? 'x' | upper | trim }} tail").unwrap().unwrap();
        assert_eq!(r.value.dotted(), "a.b");
        assert_eq!(r.value.default, Some(Literal::String("x".into())));
        assert_eq!(r.value.filters, vec!["upper", "trim"]);
        assert_eq!(r.rest, "}} tail");
    }

    #[test]
    fn test_trailing_dot_is_not_a_reference() {
        assert!(read_var_path("a.b.").is_none());
        assert_eq!(parse_var_ref("a.b.").unwrap(), None);
    }

    #[test]
    fn test_default_must_be_literal() {
        let err = parse_var_ref("a ? b").unwrap_err();
        assert!(err.to_string().contains("expecting a literal"));
    }

    #[test]
    fn test_unclosed_marker_stays_text() {
        let t = parse_template("x {{ y").unwrap();
        assert_eq!(t.parts, vec![TemplatePart::Text("x {{ y".into())]);
    }
}
