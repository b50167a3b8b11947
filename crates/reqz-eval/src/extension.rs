//! Extension bundles loaded by `@import` and `@lib`.
//!
//! A bundle is a named list of exports: plain values, filters, functions for
//! `@call`, and directive descriptors. Bundles are registered with an
//! [`ExtensionRegistry`] before any script is parsed; a script imports them
//! by name or by a path relative to the script.

use crate::directive::{DirectiveDefinition, DirectiveFn};
use crate::environment::{Environment, Function};
use crate::error::ErrorKind;
use crate::filters::Filter;
use crate::module::RequestModule;
use crate::value::Value;
use anyhow::Result;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub enum Export {
    Value(Value),
    Filter(Filter),
    Function(Function),
    Directive(DirectiveDefinition, DirectiveFn),
}

impl Export {
    pub fn is_directive(&self) -> bool {
        matches!(self, Export::Directive(..))
    }

    /// Loads a non-directive export into `env` under `name`.
    pub fn apply(&self, name: &str, env: &mut Environment) {
        match self {
            Export::Value(value) => env.set(name, value.clone()),
            Export::Filter(filter) => env.add_filter(name, filter.clone()),
            Export::Function(function) => env.add_function(name, function.clone()),
            Export::Directive(..) => {}
        }
    }
}

#[derive(Clone)]
pub struct Extension {
    name: String,
    exports: Vec<(String, Export)>,
}

impl Extension {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), exports: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exports(&self) -> &[(String, Export)] {
        &self.exports
    }

    pub fn with_export(mut self, name: impl Into<String>, export: Export) -> Self {
        self.exports.push((name.into(), export));
        self
    }

    pub fn with_value(self, name: impl Into<String>, value: Value) -> Self {
        self.with_export(name, Export::Value(value))
    }

    pub fn with_filter<F>(self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.with_export(name, Export::Filter(Arc::new(filter)))
    }

    pub fn with_function<F>(self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&RequestModule, &mut Environment) -> Result<()> + Send + Sync + 'static,
    {
        self.with_export(name, Export::Function(Arc::new(function)))
    }

    pub fn with_directive<F>(self, definition: DirectiveDefinition, run: F) -> Self
    where
        F: Fn(&RequestModule, &mut Environment, Value) -> Result<()> + Send + Sync + 'static,
    {
        let name = definition.name.clone();
        self.with_export(name, Export::Directive(definition, Arc::new(run)))
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.exports.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Extension").field("name", &self.name).field("exports", &names).finish()
    }
}

#[derive(Clone, Default, Debug)]
pub struct ExtensionRegistry {
    bundles: FxHashMap<String, Arc<Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the `reqz:http` bundle.
    pub fn with_stdlib() -> Self {
        let mut registry = Self::new();
        registry.register(crate::stdlib::http_extension());
        registry
    }

    /// Registers `extension` under its own name.
    pub fn register(&mut self, extension: Extension) {
        let name = extension.name.clone();
        self.bundles.insert(name, Arc::new(extension));
    }

    /// Registers `extension` under a file path, as imported by a relative
    /// path from a script.
    pub fn register_at(&mut self, path: impl AsRef<Path>, extension: Extension) {
        let key = path.as_ref().to_string_lossy().into_owned();
        self.bundles.insert(key, Arc::new(extension));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Extension>> {
        self.bundles.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bundles.contains_key(name)
    }

    /// Looks `name` up as given, then as `resolved` (the name resolved
    /// against the importing script's directory).
    pub fn resolve(&self, name: &str, resolved: Option<&Path>) -> Result<Arc<Extension>> {
        if let Some(ext) = self.get(name) {
            return Ok(ext);
        }
        if let Some(ext) = resolved.and_then(|p| self.get(&p.to_string_lossy())) {
            return Ok(ext);
        }
        crate::bail_eval!(ErrorKind::Extension, "extension not found: {}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let ext = Extension::new("demo")
            .with_value("host", Value::from("h"))
            .with_filter("twice", |v| Ok(Value::from(format!("{v}{v}"))))
            .with_function("noop", |_, _| Ok(()));
        let names: Vec<&str> = ext.exports().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["host", "twice", "noop"]);
    }

    #[test]
    fn test_apply_exports() {
        let ext = Extension::new("demo")
            .with_value("host", Value::from("h"))
            .with_filter("twice", |v| Ok(Value::from(format!("{v}{v}"))));
        let mut env = Environment::new();
        for (name, export) in ext.exports() {
            export.apply(name, &mut env);
        }
        assert_eq!(env.get("host"), Some(Value::from("h")));
        assert_eq!(env.eval("{{host | twice}}").unwrap(), "hh");
    }

    #[test]
    fn test_resolve_by_name_then_path() {
        let mut reg = ExtensionRegistry::with_stdlib();
        reg.register_at("/work/libs/util.rs", Extension::new("util"));

        assert_eq!(reg.resolve("reqz:http", None).unwrap().name(), "reqz:http");
        let found = reg.resolve("./libs/util.rs", Some(Path::new("/work/libs/util.rs"))).unwrap();
        assert_eq!(found.name(), "util");

        let err = reg.resolve("missing", None).unwrap_err();
        assert_eq!(err.to_string(), "extension not found: missing");
    }
}
