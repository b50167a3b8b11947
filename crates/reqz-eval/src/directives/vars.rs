//! `@var`, `@optional`, `@required` and `@set`.

use crate::directive::{Directive, DirectiveShape, block_content};
use crate::error::ErrorKind;
use crate::eval::Evaluate;
use crate::module::RequestModule;
use crate::value::Value;
use anyhow::Result;
use reqz_syntax::line::{split_assignment, split_names, split_var_decl};
use reqz_syntax::{ParseError, parse_value_expression};

/// `@var id, token?`: declares variables; a trailing `?` marks them optional.
pub struct VarDirective;

impl Directive for VarDirective {
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        if arg.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        for decl in arg.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (var, optional) = split_var_decl(decl)?;
            module.declare_var(var, !optional);
        }
        Ok(())
    }
}

fn names_argument(name: &str, arg: &str) -> Result<Vec<String>> {
    let names = split_names(arg)?;
    if names.is_empty() {
        return Err(ParseError::missing_argument(name).into());
    }
    Ok(names)
}

pub struct OptionalDirective;

impl Directive for OptionalDirective {
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        let names = names_argument(name, arg)?;
        module.add_command(move |_, env| {
            for name in &names {
                if !env.contains(name) {
                    env.set(name.clone(), Value::Undefined);
                }
            }
            Ok(())
        });
        Ok(())
    }
}

pub struct RequiredDirective;

impl Directive for RequiredDirective {
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        let names = names_argument(name, arg)?;
        module.add_command(move |_, env| {
            if let Some(missing) = names.iter().find(|n| !env.contains(n)) {
                crate::bail_eval!(ErrorKind::RequiredVariable, "required variable {} not found", missing);
            }
            Ok(())
        });
        Ok(())
    }
}

/// `@set name = value` or `@set name ?= value`. The value may continue on
/// the following lines.
pub struct SetDirective;

impl Directive for SetDirective {
    fn shape(&self) -> DirectiveShape {
        DirectiveShape::Block
    }

    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, lines: &[String]) -> Result<()> {
        let content = block_content(arg, lines);
        if content.is_empty() {
            return Err(ParseError::missing_argument(name).into());
        }
        let assignment = split_assignment(&content)?;
        let expr = parse_value_expression(assignment.value)?;
        let var = assignment.name.to_string();
        let only_if_unset = assignment.only_if_unset;

        module.add_command(move |_, env| {
            let unset = env.get(&var).is_none_or(|v| v.is_undefined());
            if !only_if_unset || unset {
                let value = expr.eval(env)?;
                env.set(var.clone(), value);
            }
            Ok(())
        });
        module.declare_var(assignment.name, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::error::EvalError;
    use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};
    use crate::module::{Services, VarDecl};

    struct Offline;

    impl Transport for Offline {
        fn send(&self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::new("offline"))
        }
    }

    fn load(text: &str) -> RequestModule {
        RequestModule::new(Services::new(Offline)).load_content(text).unwrap()
    }

    fn run(module: &RequestModule, env: &mut Environment) -> Result<()> {
        module.exec_with_env(env).map(|_| ())
    }

    #[test]
    fn test_var_declarations() {
        let m = load("@var id, token?");
        assert_eq!(
            m.declared_vars(),
            vec![
                VarDecl { name: "id".into(), required: true },
                VarDecl { name: "token".into(), required: false },
            ]
        );
    }

    #[test]
    fn test_optional_var_bound_to_undefined() {
        let m = load("@var token?\n@set auth = {{token ? 'none'}}");
        let mut env = Environment::new();
        run(&m, &mut env).unwrap();
        assert_eq!(env.get("token"), Some(Value::Undefined));
        assert_eq!(env.get("auth"), Some(Value::from("none")));
    }

    #[test]
    fn test_optional_directive() {
        let m = load("@optional a, b");
        let mut env = Environment::new();
        env.set("a", Value::from(1.0));
        run(&m, &mut env).unwrap();
        assert_eq!(env.get("a"), Some(Value::Number(1.0)));
        assert_eq!(env.get("b"), Some(Value::Undefined));
    }

    #[test]
    fn test_required_directive() {
        let m = load("@required host, token");
        let mut env = Environment::new();
        env.set("host", Value::from("h"));
        let err = run(&m, &mut env).unwrap_err();
        assert_eq!(err.to_string(), "required variable token not found");
        assert_eq!(EvalError::kind_of(&err), Some(ErrorKind::RequiredVariable));
    }

    #[test]
    fn test_set_keeps_value_type() {
        let m = load("@set total = {{price}} | json\n@set count = {{n}}\n@set greeting = hi {{name}}");
        let mut env = Environment::new();
        env.set("price", Value::from(9.99));
        env.set("n", Value::from(3.0));
        env.set("name", Value::from("Ada"));
        run(&m, &mut env).unwrap();
        assert_eq!(env.get("total"), Some(Value::from("9.99")));
        assert_eq!(env.get("count"), Some(Value::Number(3.0)));
        assert_eq!(env.get("greeting"), Some(Value::from("hi Ada")));
    }

    #[test]
    fn test_set_if_unset() {
        let m = load("@set page ?= 1\n@set size ?= 20");
        let mut env = Environment::new();
        env.set("page", Value::from(4.0));
        run(&m, &mut env).unwrap();
        assert_eq!(env.get("page"), Some(Value::Number(4.0)));
        assert_eq!(env.get("size"), Some(Value::Number(20.0)));
    }

    #[test]
    fn test_set_multiline_object() {
        let m = load("@set user = {\n  name: 'Ada',\n  roles: ['admin']\n}");
        let mut env = Environment::new();
        run(&m, &mut env).unwrap();
        let user = env.get("user").unwrap();
        assert_eq!(user.to_json(), serde_json::json!({"name": "Ada", "roles": ["admin"]}));
    }

    #[test]
    fn test_set_requires_assignment() {
        let err = RequestModule::new(Services::new(Offline)).load_content("@set nothing here").unwrap_err();
        assert!(err.to_string().starts_with("invalid assignment"));
    }
}
