//! Variables given after the request file: `--name value` pairs.

use anyhow::{Result, bail};
use reqz_eval::{Value, Vars};
use reqz_syntax::{Literal, parse_literal};

/// Numeric text becomes a number, anything else stays a string.
fn cli_value(text: &str) -> Value {
    match parse_literal(text) {
        Ok(Some(Literal::Number(n))) => Value::Number(n),
        _ => Value::String(text.to_string()),
    }
}

/// Reads `--name value` pairs. A name without a value is `true`, a lone
/// `--` ends the list.
pub fn parse_vars(args: &[String]) -> Result<Vars> {
    let mut vars = Vars::default();
    let mut pending: Option<&str> = None;

    for arg in args {
        if let Some(name) = arg.strip_prefix("--") {
            if let Some(key) = pending.take() {
                vars.insert(key.to_string(), Value::Bool(true));
            }
            if name.is_empty() {
                break;
            }
            pending = Some(name);
        } else if let Some(key) = pending.take() {
            vars.insert(key.to_string(), cli_value(arg));
        } else {
            bail!("Unknown option: \"{}\", variables are passed as --name value", arg);
        }
    }
    if let Some(key) = pending {
        vars.insert(key.to_string(), Value::Bool(true));
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pairs_and_flags() {
        let vars = parse_vars(&args(&["--id", "42", "--dry", "--name", "ada", "--verbose"])).unwrap();
        assert_eq!(vars.get("id"), Some(&Value::Number(42.0)));
        assert_eq!(vars.get("dry"), Some(&Value::Bool(true)));
        assert_eq!(vars.get("name"), Some(&Value::from("ada")));
        assert_eq!(vars.get("verbose"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_numbers() {
        let vars = parse_vars(&args(&["--a", "-1.5", "--b", "1e3", "--c", "007"])).unwrap();
        assert_eq!(vars.get("a"), Some(&Value::Number(-1.5)));
        assert_eq!(vars.get("b"), Some(&Value::from("1e3")));
        assert_eq!(vars.get("c"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn test_double_dash_ends_vars() {
        let vars = parse_vars(&args(&["--a", "1", "--", "--b", "2"])).unwrap();
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_stray_value() {
        let err = parse_vars(&args(&["oops"])).unwrap_err();
        assert!(err.to_string().starts_with("Unknown option: \"oops\""));
    }
}
