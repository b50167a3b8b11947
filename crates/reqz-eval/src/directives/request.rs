use crate::directive::{Directive, DirectiveShape};
use crate::module::RequestModule;
use anyhow::Result;

/// `GET <url>` and the other method lines. Header and body lines that follow
/// are handled by the line parser.
pub struct RequestDirective;

impl Directive for RequestDirective {
    fn shape(&self) -> DirectiveShape {
        DirectiveShape::Request
    }

    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, _lines: &[String]) -> Result<()> {
        module.set_method(name);
        module.set_url_expr(arg)
    }
}
