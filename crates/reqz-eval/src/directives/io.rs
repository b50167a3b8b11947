//! `@echo`, `@inspect` and `@prompt`.

use crate::directive::{Directive, DirectiveShape, block_content};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::eval::Evaluate;
use crate::module::RequestModule;
use crate::prompt::Prompt;
use crate::value::Value;
use anyhow::Result;
use reqz_syntax::{Expr, Expression, ParseError, parse_object_expression, parse_string_expression, parse_var_ref};

/// `@echo <text>`: the evaluated text is interpolated once more, so values
/// holding `{{ … }}` markers expand too.
pub struct EchoDirective;

impl Directive for EchoDirective {
    fn build(&self, module: &mut RequestModule, _name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        let text_expr = parse_string_expression(arg)?;
        module.add_command(move |module, env| {
            let text = text_expr.eval(env)?.display();
            let text = env.eval(&text)?;
            module.services().logger.echo(&text);
            Ok(())
        });
        Ok(())
    }
}

/// `@inspect [<var>]`: pretty prints a value, or the whole environment.
pub struct InspectDirective;

impl Directive for InspectDirective {
    fn build(&self, module: &mut RequestModule, _name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        let var = if arg.is_empty() {
            None
        } else {
            let var = parse_var_ref(arg)?.ok_or_else(|| ParseError::InvalidVariable { text: arg.to_string() })?;
            Some(var)
        };
        module.add_command(move |module, env| {
            let value = match &var {
                Some(var) => var.eval(env)?,
                None => env.root_value(),
            };
            module.services().logger.inspect(&value);
            Ok(())
        });
        Ok(())
    }
}

/// Evaluates the prompt definitions keeping the order they were written in.
fn prompt_entries(expr: &Expression, env: &Environment) -> Result<Vec<(String, Value)>> {
    if let Expression::Dynamic(Expr::Object(entries)) = expr {
        return entries
            .iter()
            .map(|(name, e)| -> Result<(String, Value)> { Ok((name.clone(), e.eval(env)?)) })
            .collect();
    }
    match expr.eval(env)? {
        Value::Object(obj) => Ok(obj.into_iter().collect()),
        other => crate::bail_eval!(ErrorKind::Prompt, "@prompt expects an object, got {}", other.type_name()),
    }
}

fn to_prompt(name: String, definition: Value) -> Result<Prompt> {
    match definition {
        Value::String(message) => Ok(Prompt::text(name, message)),
        Value::Object(obj) => {
            let message = obj.get("message").and_then(Value::as_str).filter(|m| !m.is_empty());
            let Some(message) = message else {
                crate::bail_eval!(
                    ErrorKind::Prompt,
                    "invalid prompt value for {}, expecting a string or an object: {{message, type?}}",
                    name
                );
            };
            let kind = obj.get("type").and_then(Value::as_str).unwrap_or("text");
            Ok(Prompt { message: message.to_string(), kind: kind.to_string(), name })
        }
        _ => crate::bail_eval!(
            ErrorKind::Prompt,
            "invalid prompt value for {}, expecting a string or an object: {{message, type?}}",
            name
        ),
    }
}

/// `@prompt { name: "Message", secret: { message: "Password", type: "password" } }`
///
/// Asks only for variables that are still unbound or `undefined`.
pub struct PromptDirective;

impl Directive for PromptDirective {
    fn shape(&self) -> DirectiveShape {
        DirectiveShape::Block
    }

    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, lines: &[String]) -> Result<()> {
        let content = block_content(arg, lines);
        if content.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        let expr = parse_object_expression(&content)?;

        module.add_command(move |module, env| {
            let mut prompts = Vec::new();
            for (name, definition) in prompt_entries(&expr, env)? {
                let unbound = env.get(&name).is_none_or(|v| v.is_undefined());
                let prompt = to_prompt(name, definition)?;
                if unbound {
                    prompts.push(prompt);
                }
            }
            if prompts.is_empty() {
                return Ok(());
            }

            let mut answers = module.prompt(&prompts)?;
            for prompt in &prompts {
                let Some(answer) = answers.remove(&prompt.name) else {
                    continue;
                };
                let value = if prompt.is_confirm() {
                    Value::Bool(answer == "true")
                } else {
                    Value::String(answer)
                };
                env.set(prompt.name.clone(), value);
            }
            Ok(())
        });
        Ok(())
    }
}
