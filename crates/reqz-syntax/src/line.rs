//! Line-level helpers shared by the script parser and the directives.

use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;

static NAME_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[_$a-zA-Z][_$a-zA-Z0-9]*$").unwrap());
static ASSIGN_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^([_$a-zA-Z][_$a-zA-Z0-9]*)\s*(\?=|=)\s*(.*)$").unwrap());
static HEADER_NAME_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[!#$%&'*+.^_`|~0-9A-Za-z-]+$").unwrap());

pub fn is_blank_or_comment(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Splits a trimmed line into its first space-delimited word and the
/// remaining text, trimmed.
pub fn split_first_word(line: &str) -> (&str, &str) {
    match line.find(' ') {
        Some(i) => (&line[..i], line[i + 1..].trim()),
        None => (line, ""),
    }
}

pub fn is_identifier(text: &str) -> bool {
    NAME_RX.is_match(text)
}

/// `Name: value`, as used for request header lines and `@header`.
pub fn split_header(text: &str) -> Result<(&str, &str), ParseError> {
    let Some((name, value)) = text.split_once(':') else {
        return Err(ParseError::invalid(format!("invalid header line: {}", text)));
    };
    let name = name.trim();
    if !HEADER_NAME_RX.is_match(name) {
        return Err(ParseError::invalid(format!("invalid header name: {}", name)));
    }
    Ok((name, value.trim()))
}

/// Names separated by commas or spaces, as accepted by `@optional` and
/// `@required`.
pub fn split_names(text: &str) -> Result<Vec<String>, ParseError> {
    let names: Vec<String> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(bad) = names.iter().find(|n| !is_identifier(n)) {
        return Err(ParseError::invalid(format!("invalid variable name: {}", bad)));
    }
    Ok(names)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub name: &'a str,
    pub only_if_unset: bool,
    pub value: &'a str,
}

/// `name = expr` or `name ?= expr`.
pub fn split_assignment(text: &str) -> Result<Assignment<'_>, ParseError> {
    let caps = ASSIGN_RX
        .captures(text)
        .ok_or_else(|| ParseError::invalid(format!("invalid assignment: {}", text)))?;
    let (Some(name), Some(op), Some(value)) = (caps.get(1), caps.get(2), caps.get(3)) else {
        return Err(ParseError::invalid(format!("invalid assignment: {}", text)));
    };
    Ok(Assignment {
        name: name.as_str(),
        only_if_unset: op.as_str() == "?=",
        value: value.as_str().trim(),
    })
}

/// `name` or `name?` as written after `@var`.
pub fn split_var_decl(text: &str) -> Result<(&str, bool), ParseError> {
    let text = text.trim();
    let (name, optional) = match text.strip_suffix('?') {
        Some(name) => (name.trim_end(), true),
        None => (text, false),
    };
    if !is_identifier(name) {
        return Err(ParseError::invalid(format!("invalid variable name: {}", text)));
    }
    Ok((name, optional))
}
