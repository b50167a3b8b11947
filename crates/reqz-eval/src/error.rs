//! Runtime error type.
//!
//! [`EvalError`] carries an [`ErrorKind`] next to the message so callers can
//! tell scope failures (an unbound variable) from request failures (no URL)
//! after the error went through `anyhow`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    VariableNotFound,
    FilterNotFound,
    RequiredVariable,
    MissingRequest,
    Function,
    Prompt,
    Extension,
    Io,
}

/// A runtime evaluation error.
///
/// Use the [`bail_eval!`] macro (or [`EvalError::new`]) inside commands. The
/// outer [`anyhow::Error`] wrapper is kept so call sites stay on `Result<T>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EvalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn variable_not_found(path: impl fmt::Display) -> Self {
        Self::new(ErrorKind::VariableNotFound, format!("variable not found: {}", path))
    }

    pub fn filter_not_found(name: &str) -> Self {
        Self::new(ErrorKind::FilterNotFound, format!("filter not found: {}", name))
    }

    /// Returns the kind when `err` wraps an [`EvalError`].
    pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
        err.downcast_ref::<EvalError>().map(|e| e.kind)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Bail out of a function with an [`EvalError`] of the given kind.
///
/// # Usage
/// ```ignore
/// bail_eval!(ErrorKind::MissingRequest, "missing request URL");
/// bail_eval!(ErrorKind::RequiredVariable, "required variable {} not found", name);
/// ```
#[macro_export]
macro_rules! bail_eval {
    ($kind:expr, $($arg:tt)*) => {
        return Err(anyhow::anyhow!($crate::error::EvalError::new($kind, format!($($arg)*))))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_error_display() {
        let err = EvalError::variable_not_found("user.id");
        assert_eq!(format!("{err}"), "variable not found: user.id");
        assert_eq!(err.kind, ErrorKind::VariableNotFound);
    }

    #[test]
    fn eval_error_downcast_from_anyhow() {
        let anyhow_err = anyhow::anyhow!(EvalError::filter_not_found("shout"));
        assert_eq!(EvalError::kind_of(&anyhow_err), Some(ErrorKind::FilterNotFound));
        assert_eq!(anyhow_err.to_string(), "filter not found: shout");
    }

    #[test]
    fn kind_of_survives_context() {
        let err = anyhow::anyhow!(EvalError::new(ErrorKind::Io, "gone")).context("while loading");
        assert_eq!(EvalError::kind_of(&err), Some(ErrorKind::Io));
    }

    #[test]
    fn bail_eval_macro_produces_eval_error() {
        fn try_bail() -> anyhow::Result<()> {
            bail_eval!(ErrorKind::RequiredVariable, "required variable {} not found", "id");
        }
        let err = try_bail().unwrap_err();
        let eval_err = err.downcast_ref::<EvalError>().unwrap();
        assert_eq!(eval_err.kind, ErrorKind::RequiredVariable);
        assert_eq!(eval_err.message, "required variable id not found");
    }

    #[test]
    fn kind_of_plain_error_is_none() {
        assert_eq!(EvalError::kind_of(&anyhow::anyhow!("plain")), None);
    }
}
