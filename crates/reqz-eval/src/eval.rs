//! Evaluation of the expression AST against an [`Environment`].
//!
//! Evaluation only reads the environment. Variable references follow the
//! lookup rules of `{{ … }}` markers; bare paths inside object and array
//! expressions follow property semantics and yield `undefined` for missing
//! properties of a bound root.

use crate::environment::Environment;
use crate::error::EvalError;
use crate::value::{Object, Value};
use anyhow::Result;
use reqz_syntax::{Expr, Expression, Literal, PathSegment, Template, TemplateChunk, TemplatePart, VarRef};

pub trait Evaluate {
    fn eval(&self, env: &Environment) -> Result<Value>;
}

impl Evaluate for Literal {
    fn eval(&self, _env: &Environment) -> Result<Value> {
        Ok(Value::from(self))
    }
}

impl Evaluate for VarRef {
    fn eval(&self, env: &Environment) -> Result<Value> {
        let resolved = env.lookup(&self.path).filter(|v| !v.is_nullish());

        let mut value = match (resolved, &self.default) {
            (Some(v), _) => v,
            (None, Some(default)) => Value::from(default),
            (None, None) => match env.get(self.root()) {
                Some(Value::Undefined) => Value::Undefined,
                _ => return Err(EvalError::variable_not_found(self.dotted()).into()),
            },
        };

        for name in &self.filters {
            let filter = env.filter(name)?;
            value = filter(value)?;
        }
        Ok(value)
    }
}

impl Evaluate for Template {
    fn eval(&self, env: &Environment) -> Result<Value> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Text(text) => out.push_str(text),
                TemplatePart::Var(var) => out.push_str(&var.eval(env)?.display()),
            }
        }
        Ok(Value::String(out))
    }
}

fn eval_path(segments: &[PathSegment], env: &Environment) -> Result<Value> {
    let Some(PathSegment::Name(root)) = segments.first() else {
        return Ok(Value::Undefined);
    };

    let mut current = if root == "$env" {
        env.root_value()
    } else {
        env.get(root)
            .ok_or_else(|| EvalError::variable_not_found(Expr::path_name(segments)))?
    };

    for segment in &segments[1..] {
        let next = match segment {
            PathSegment::Name(name) => current.get(name).cloned().or_else(|| {
                if name == "length" { current.length() } else { None }
            }),
            PathSegment::Index(i) => current.get_index(*i).cloned(),
        };
        current = next.unwrap_or(Value::Undefined);
    }
    Ok(current)
}

impl Evaluate for Expr {
    fn eval(&self, env: &Environment) -> Result<Value> {
        match self {
            Expr::Literal(lit) => lit.eval(env),
            Expr::Path(segments) => eval_path(segments, env),
            Expr::Var(var) => var.eval(env),
            Expr::Template(chunks) => {
                let mut out = String::new();
                for chunk in chunks {
                    match chunk {
                        TemplateChunk::Text(text) => out.push_str(text),
                        TemplateChunk::Expr(expr) => out.push_str(&expr.eval(env)?.display()),
                    }
                }
                Ok(Value::String(out))
            }
            Expr::Array(items) => items
                .iter()
                .map(|item| item.eval(env))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Expr::Object(entries) => {
                let mut obj = Object::new();
                for (key, expr) in entries {
                    obj.insert(key.clone(), expr.eval(env)?);
                }
                Ok(Value::Object(obj))
            }
        }
    }
}

impl Evaluate for Expression {
    fn eval(&self, env: &Environment) -> Result<Value> {
        match self {
            Expression::Literal(lit) => lit.eval(env),
            Expression::Var(var) => var.eval(env),
            Expression::Template(template) => template.eval(env),
            Expression::Dynamic(expr) => expr.eval(env),
        }
    }
}
