//! The built-in directive set.

mod compose;
mod io;
mod message;
mod request;
mod vars;

pub use compose::{CallDirective, ImportDirective, IncludeDirective, LibDirective, RunDirective};
pub use io::{EchoDirective, InspectDirective, PromptDirective};
pub use message::{BodyDirective, HeaderDirective, HeadersDirective, QueryDirective};
pub use request::RequestDirective;
pub use vars::{OptionalDirective, RequiredDirective, SetDirective, VarDirective};

use crate::directive::{Directive, DirectiveRegistry};
use once_cell::sync::Lazy;
use std::sync::Arc;

pub const HTTP_METHODS: [&str; 9] =
    ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD", "CONNECT", "TRACE"];

static BUILTIN: Lazy<DirectiveRegistry> = Lazy::new(|| {
    let mut registry = DirectiveRegistry::new();

    let request: Arc<dyn Directive> = Arc::new(RequestDirective);
    for method in HTTP_METHODS {
        registry.insert(method, request.clone());
    }

    registry.insert("@var", Arc::new(VarDirective));
    registry.insert("@optional", Arc::new(OptionalDirective));
    registry.insert("@required", Arc::new(RequiredDirective));
    registry.insert("@set", Arc::new(SetDirective));
    registry.insert("@header", Arc::new(HeaderDirective));
    registry.insert("@headers", Arc::new(HeadersDirective));
    registry.insert("@query", Arc::new(QueryDirective));
    registry.insert("@body", Arc::new(BodyDirective));
    registry.insert("@include", Arc::new(IncludeDirective));
    registry.insert("@run", Arc::new(RunDirective));
    registry.insert("@import", Arc::new(ImportDirective));
    registry.insert("@lib", Arc::new(LibDirective));
    registry.insert("@call", Arc::new(CallDirective));
    registry.insert("@echo", Arc::new(EchoDirective));
    registry.insert("@inspect", Arc::new(InspectDirective));
    registry.insert("@prompt", Arc::new(PromptDirective));
    registry
});

/// A fresh copy of the built-in registry.
pub fn builtin_registry() -> DirectiveRegistry {
    BUILTIN.clone()
}
