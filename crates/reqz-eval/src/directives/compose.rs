//! Directives composing scripts: `@include`, `@run`, `@import`, `@lib` and
//! `@call`.

use crate::directive::{Directive, DirectiveShape};
use crate::environment::{Environment, Vars};
use crate::eval::Evaluate;
use crate::module::RequestModule;
use crate::value::Value;
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use reqz_syntax::{ParseError, parse_object_expression, parse_string_expression, parse_string_literal};
use tracing::debug;

static RUN_USING_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+using\s*(\{)?$").unwrap());

/// `@include <file>`: runs another script against the current environment.
pub struct IncludeDirective;

impl Directive for IncludeDirective {
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        if arg.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        let file_expr = parse_string_expression(arg)?;
        module.add_command(move |module, env| {
            let file = file_expr.eval(env)?.display();
            debug!(file = %file, "including");
            let child = module.spawn(true).load_file(&file)?;
            child.exec_with_env(env)?;
            Ok(())
        });
        Ok(())
    }
}

struct RunArgs {
    file: String,
    using: Option<String>,
}

fn split_run_args(arg: &str, lines: &[String]) -> Result<RunArgs, ParseError> {
    match RUN_USING_RX.find(arg) {
        Some(m) => {
            let mut using = String::new();
            if arg.ends_with('{') {
                using.push_str("{\n");
            }
            using.push_str(&lines.join("\n"));
            Ok(RunArgs { file: arg[..m.start()].trim().to_string(), using: Some(using) })
        }
        None if !lines.is_empty() => Err(ParseError::invalid(format!(
            "unexpected content after @run {}: {}, expecting 'using {{ ... }}'",
            arg, lines[0]
        ))),
        None => Ok(RunArgs { file: arg.trim().to_string(), using: None }),
    }
}

/// `@run <file> [using { ... }]`: runs another script in its own environment
/// and binds its response to `$response`.
pub struct RunDirective;

impl Directive for RunDirective {
    fn shape(&self) -> DirectiveShape {
        DirectiveShape::Block
    }

    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, lines: &[String]) -> Result<()> {
        let args = split_run_args(arg, lines)?;
        if args.file.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        let file_expr = parse_string_expression(&args.file)?;
        let using = args.using.as_deref().map(parse_object_expression).transpose()?;

        module.add_command(move |module, env| {
            let file = file_expr.eval(env)?.display();
            let vars: Vars = match &using {
                Some(expr) => match expr.eval(env)? {
                    Value::Object(obj) => obj.into_iter().collect(),
                    other => anyhow::bail!("@run using expects an object, got {}", other.type_name()),
                },
                None => env.vars(),
            };

            debug!(file = %file, "running child script");
            let child = module.spawn(false).load_file(&file)?;
            let mut child_env = Environment::child_of(env, vars);
            let response = child.exec_with_env(&mut child_env)?;
            env.set("$response", response.map(|r| r.to_value()).unwrap_or_default());
            Ok(())
        });
        Ok(())
    }
}

/// `@import "<bundle>"`
pub struct ImportDirective;

impl Directive for ImportDirective {
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        if arg.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        let bundle = parse_string_literal(arg)?;
        module.import_lib(&bundle)
    }
}

/// `@lib <bundle>`: `@import` without quotes.
pub struct LibDirective;

impl Directive for LibDirective {
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        if arg.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        module.import_lib(arg.trim())
    }
}

/// `@call <function>`
pub struct CallDirective;

impl Directive for CallDirective {
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        if arg.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        let name_expr = parse_string_expression(arg)?;
        module.add_command(move |module, env| {
            let name = name_expr.eval(env)?.display();
            let function = env.function(&name)?;
            function(module, env)
        });
        Ok(())
    }
}
