//! Directive dispatch.
//!
//! A [`Directive`] turns one script line (or block) into commands on the
//! module being built. The [`DirectiveRegistry`] maps keywords (`GET`,
//! `@set`, ...) to directives; every module owns a copy so that extensions
//! imported by one script never leak into sibling scripts.

mod custom;

pub use custom::{
    ArgsFn, DefinitionShape, DirectiveArgs, DirectiveDefinition, DirectiveFn, create_directive,
    try_create_custom_directive,
};

use crate::module::RequestModule;
use anyhow::Result;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// How the line parser feeds a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveShape {
    /// Built as soon as the line is matched.
    Line,
    /// Collects the following lines up to the next directive.
    Block,
    /// The HTTP request line; the rest of the file is headers and body.
    Request,
}

pub trait Directive: Send + Sync {
    fn shape(&self) -> DirectiveShape {
        DirectiveShape::Line
    }

    /// Appends commands to `module`. `lines` is empty for line directives.
    fn build(&self, module: &mut RequestModule, name: &str, arg: &str, lines: &[String]) -> Result<()>;
}

/// Own-line argument followed by the block lines, newline joined and trimmed.
pub fn block_content(arg: &str, lines: &[String]) -> String {
    let mut content = String::from(arg);
    for line in lines {
        content.push('\n');
        content.push_str(line);
    }
    content.trim().to_string()
}

#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    directives: FxHashMap<String, Arc<dyn Directive>>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in directive set.
    pub fn builtin() -> Self {
        crate::directives::builtin_registry()
    }

    pub fn get(&self, keyword: &str) -> Option<Arc<dyn Directive>> {
        self.directives.get(keyword).cloned()
    }

    pub fn insert(&mut self, keyword: impl Into<String>, directive: Arc<dyn Directive>) {
        self.directives.insert(keyword.into(), directive);
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.directives.contains_key(keyword)
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.directives.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveRegistry").field("directives", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Directive for Noop {
        fn build(&self, _: &mut RequestModule, _: &str, _: &str, _: &[String]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_builtin_keywords() {
        let reg = DirectiveRegistry::builtin();
        for kw in ["GET", "POST", "TRACE", "@set", "@headers", "@run", "@lib", "@prompt"] {
            assert!(reg.contains(kw), "missing {kw}");
        }
        assert!(!reg.contains("get"));
        assert_eq!(reg.get("GET").map(|d| d.shape()), Some(DirectiveShape::Request));
        assert_eq!(reg.get("@set").map(|d| d.shape()), Some(DirectiveShape::Block));
        assert_eq!(reg.get("@echo").map(|d| d.shape()), Some(DirectiveShape::Line));
    }

    #[test]
    fn test_block_content() {
        let lines = vec!["a: 1,".to_string(), "b: 2 }".to_string()];
        assert_eq!(block_content("{", &lines), "{\na: 1,\nb: 2 }");
        assert_eq!(block_content("", &[]), "");
        assert_eq!(block_content("  x ", &[]), "x");
    }

    #[test]
    fn test_registry_is_copied() {
        let base = DirectiveRegistry::builtin();
        let mut copy = base.clone();
        copy.insert("@noop", Arc::new(Noop));
        assert!(copy.contains("@noop"));
        assert!(!base.contains("@noop"));
        assert_eq!(copy.len(), base.len() + 1);
    }
}
