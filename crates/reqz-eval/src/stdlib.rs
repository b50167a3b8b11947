//! The `reqz:http` bundle: header shorthands and the `urlencode` filter.
//!
//! ```text
//! @import "reqz:http"
//! @auth basic {{user}}:{{password}}
//! @accept json
//! @type form
//! GET https://example.com/search?q={{term | urlencode}}
//! ```

use crate::directive::DirectiveDefinition;
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::extension::Extension;
use crate::module::RequestModule;
use crate::value::Value;
use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub const HTTP_EXTENSION: &str = "reqz:http";

pub fn http_extension() -> Extension {
    Extension::new(HTTP_EXTENSION)
        .with_directive(DirectiveDefinition::named("auth").required(), auth)
        .with_directive(DirectiveDefinition::named("accept").required(), accept)
        .with_directive(DirectiveDefinition::named("type").required(), content_type)
        .with_filter("urlencode", |value| {
            Ok(Value::String(urlencoding::encode(&value.display()).into_owned()))
        })
}

/// Expands the short content type names, anything else is kept.
pub fn mime_type(name: &str) -> &str {
    match name {
        "json" => "application/json",
        "xml" => "application/xml",
        "html" => "text/html",
        "text" => "text/plain",
        "form" => "application/x-www-form-urlencoded",
        "multipart" => "multipart/form-data",
        other => other,
    }
}

/// `basic user:pass` becomes a Basic credential; anything else is used
/// verbatim.
pub fn authorization(value: &str) -> String {
    let value = value.trim();
    match value.split_once(char::is_whitespace) {
        Some((scheme, credentials)) if scheme.eq_ignore_ascii_case("basic") && credentials.contains(':') => {
            format!("Basic {}", STANDARD.encode(credentials.trim()))
        }
        _ => value.to_string(),
    }
}

fn text_argument(directive: &str, value: &Value) -> Result<String> {
    match value {
        Value::Undefined | Value::Null => {
            crate::bail_eval!(ErrorKind::Extension, "{} expects a value", directive)
        }
        other => Ok(other.display()),
    }
}

fn auth(_module: &RequestModule, env: &mut Environment, value: Value) -> Result<()> {
    let text = text_argument("@auth", &value)?;
    env.headers.insert("Authorization".to_string(), authorization(&text));
    Ok(())
}

fn accept(_module: &RequestModule, env: &mut Environment, value: Value) -> Result<()> {
    let text = text_argument("@accept", &value)?;
    env.headers.insert("Accept".to_string(), mime_type(text.trim()).to_string());
    Ok(())
}

fn content_type(_module: &RequestModule, env: &mut Environment, value: Value) -> Result<()> {
    let text = text_argument("@type", &value)?;
    env.headers.insert("Content-Type".to_string(), mime_type(text.trim()).to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization() {
        assert_eq!(authorization("basic user:pass"), "Basic dXNlcjpwYXNz");
        assert_eq!(authorization("Bearer abc"), "Bearer abc");
        assert_eq!(authorization("basic token"), "basic token");
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type("json"), "application/json");
        assert_eq!(mime_type("form"), "application/x-www-form-urlencoded");
        assert_eq!(mime_type("image/png"), "image/png");
    }

    #[test]
    fn test_bundle_exports() {
        let ext = http_extension();
        let names: Vec<&str> = ext.exports().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["auth", "accept", "type", "urlencode"]);
    }
}
