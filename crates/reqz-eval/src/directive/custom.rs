//! Directives contributed by extension bundles.

use super::{Directive, DirectiveShape, block_content};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::eval::Evaluate;
use crate::extension::Export;
use crate::module::RequestModule;
use crate::value::Value;
use anyhow::Result;
use reqz_syntax::{
    Expression, ParseError, parse_array_expression, parse_object_expression, parse_string_expression,
};
use std::sync::Arc;
use tracing::trace;

/// Build-time argument reader of a [`DirectiveArgs::Custom`] directive.
/// Receives the block lines only for block directives.
pub type ArgsFn = Arc<dyn Fn(&str, Option<&[String]>) -> Result<Value> + Send + Sync>;

/// Run-time body of a custom directive.
pub type DirectiveFn = Arc<dyn Fn(&RequestModule, &mut Environment, Value) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub enum DirectiveArgs {
    /// Line directive; the argument is a string expression.
    String,
    /// Block directive; the content is an object expression.
    Object,
    /// Block directive; the content is an array expression.
    Array,
    Custom(ArgsFn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionShape {
    Auto,
    Line,
    Block,
}

#[derive(Clone)]
pub struct DirectiveDefinition {
    pub name: String,
    /// Only consulted for `String`, `Object` and `Array` arguments.
    pub optional: bool,
    pub args: DirectiveArgs,
    /// Only consulted for `Custom` arguments.
    pub shape: DefinitionShape,
}

impl DirectiveDefinition {
    /// Line directive with an optional string argument.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), optional: true, args: DirectiveArgs::String, shape: DefinitionShape::Auto }
    }

    pub fn with_args(mut self, args: DirectiveArgs) -> Self {
        self.args = args;
        self
    }

    pub fn with_shape(mut self, shape: DefinitionShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    /// The registry keyword, `@` prefixed.
    pub fn keyword(&self) -> String {
        if self.name.starts_with('@') { self.name.clone() } else { format!("@{}", self.name) }
    }
}

enum Argument {
    Expr(Option<Expression>),
    Computed(Value),
}

struct CustomDirective {
    keyword: String,
    definition: DirectiveDefinition,
    shape: DirectiveShape,
    run: DirectiveFn,
}

impl CustomDirective {
    fn read_argument(&self, arg: &str, lines: &[String]) -> Result<Argument> {
        let parse: fn(&str) -> Result<Expression, ParseError> = match &self.definition.args {
            DirectiveArgs::Custom(f) => {
                let lines = (self.shape == DirectiveShape::Block).then_some(lines);
                return Ok(Argument::Computed(f(arg, lines)?));
            }
            DirectiveArgs::String => parse_string_expression,
            DirectiveArgs::Object => parse_object_expression,
            DirectiveArgs::Array => parse_array_expression,
        };

        let content = match self.shape {
            DirectiveShape::Block => block_content(arg, lines),
            _ => arg.trim().to_string(),
        };
        if content.is_empty() {
            if !self.definition.optional {
                return Err(ParseError::missing_argument(&self.keyword).into());
            }
            return Ok(Argument::Expr(None));
        }
        Ok(Argument::Expr(Some(parse(&content)?)))
    }
}

impl Directive for CustomDirective {
    fn shape(&self) -> DirectiveShape {
        self.shape
    }

    fn build(&self, module: &mut RequestModule, _name: &str, arg: &str, lines: &[String]) -> Result<()> {
        trace!(directive = %self.keyword, "building custom directive");
        let argument = self.read_argument(arg, lines)?;
        let run = self.run.clone();
        module.add_command(move |module, env| {
            let value = match &argument {
                Argument::Expr(Some(expr)) => expr.eval(env)?,
                Argument::Expr(None) => Value::Undefined,
                Argument::Computed(value) => value.clone(),
            };
            run(module, env, value)
        });
        Ok(())
    }
}

/// Wraps `run` in a directive shaped after `definition`.
pub fn create_directive(definition: DirectiveDefinition, run: DirectiveFn) -> Result<Arc<dyn Directive>> {
    if definition.name.trim_start_matches('@').is_empty() {
        crate::bail_eval!(ErrorKind::Extension, "invalid directive definition: missing name");
    }
    let shape = match (&definition.args, definition.shape) {
        (DirectiveArgs::String, _) => DirectiveShape::Line,
        (DirectiveArgs::Object | DirectiveArgs::Array, _) => DirectiveShape::Block,
        (DirectiveArgs::Custom(_), DefinitionShape::Line) => DirectiveShape::Line,
        (DirectiveArgs::Custom(_), DefinitionShape::Block) => DirectiveShape::Block,
        (DirectiveArgs::Custom(_), DefinitionShape::Auto) => crate::bail_eval!(
            ErrorKind::Extension,
            "invalid directive definition: type property must be line or block when args is a function"
        ),
    };
    Ok(Arc::new(CustomDirective { keyword: definition.keyword(), definition, shape, run }))
}

/// Returns the keyword and directive for directive exports, `None` for any
/// other export.
pub fn try_create_custom_directive(export: &Export) -> Result<Option<(String, Arc<dyn Directive>)>> {
    match export {
        Export::Directive(definition, run) => {
            let directive = create_directive(definition.clone(), run.clone())?;
            Ok(Some((definition.keyword(), directive)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;

    fn noop() -> DirectiveFn {
        Arc::new(|_, _, _| Ok(()))
    }

    #[test]
    fn test_keyword_prefix() {
        assert_eq!(DirectiveDefinition::named("auth").keyword(), "@auth");
        assert_eq!(DirectiveDefinition::named("@auth").keyword(), "@auth");
    }

    #[test]
    fn test_shapes() {
        let line = create_directive(DirectiveDefinition::named("a"), noop()).unwrap();
        assert_eq!(line.shape(), DirectiveShape::Line);

        let block = create_directive(
            DirectiveDefinition::named("b").with_args(DirectiveArgs::Object),
            noop(),
        )
        .unwrap();
        assert_eq!(block.shape(), DirectiveShape::Block);
    }

    #[test]
    fn test_custom_args_need_shape() {
        let args = DirectiveArgs::Custom(Arc::new(|arg, _| Ok(Value::from(arg))));
        let def = DirectiveDefinition::named("c").with_args(args.clone());
        let err = create_directive(def, noop()).err().unwrap();
        assert!(err.to_string().contains("type property must be line or block"));
        assert_eq!(EvalError::kind_of(&err), Some(ErrorKind::Extension));

        let def = DirectiveDefinition::named("c").with_args(args).with_shape(DefinitionShape::Block);
        assert_eq!(create_directive(def, noop()).unwrap().shape(), DirectiveShape::Block);
    }

    #[test]
    fn test_missing_name() {
        let err = create_directive(DirectiveDefinition::named("@"), noop()).err().unwrap();
        assert_eq!(err.to_string(), "invalid directive definition: missing name");
    }

    #[test]
    fn test_non_directive_export() {
        assert!(try_create_custom_directive(&Export::Value(Value::Null)).unwrap().is_none());
    }
}
