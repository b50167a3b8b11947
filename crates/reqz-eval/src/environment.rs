//! Per-run variable store and in-progress request state.

use crate::error::{ErrorKind, EvalError};
use crate::eval::Evaluate;
use crate::filters::{Filter, builtin_filters};
use crate::module::RequestModule;
use crate::value::{Object, Value};
use anyhow::Result;
use lru::LruCache;
use reqz_syntax::{Template, parse_template};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Variables handed to [`RequestModule::exec`].
pub type Vars = FxHashMap<String, Value>;

/// A callable invoked by `@call`.
pub type Function = Arc<dyn Fn(&RequestModule, &mut Environment) -> Result<()> + Send + Sync>;

static TEMPLATE_CACHE: OnceLock<Mutex<LruCache<String, Arc<Template>>>> = OnceLock::new();

const DEFAULT_CACHE_SIZE: usize = 128;

fn get_template_cache_size() -> usize {
    std::env::var("REQZ_TEMPLATE_CACHE_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CACHE_SIZE)
}

fn get_cached_template(text: &str) -> Result<Arc<Template>> {
    let cache = TEMPLATE_CACHE.get_or_init(|| {
        let size = NonZeroUsize::new(get_template_cache_size())
            .or(NonZeroUsize::new(DEFAULT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);
        Mutex::new(LruCache::new(size))
    });

    let mut cache = cache.lock().expect("Template cache mutex should not be poisoned");

    if let Some(template) = cache.get(text) {
        return Ok(template.clone());
    }

    let template = Arc::new(parse_template(text)?);
    cache.put(text.to_string(), template.clone());
    Ok(template)
}

#[derive(Clone)]
pub enum Binding {
    Value(Value),
    /// Resolved on every read.
    Computed(fn() -> Value),
}

impl Binding {
    pub fn resolve(&self) -> Value {
        match self {
            Binding::Value(v) => v.clone(),
            Binding::Computed(f) => f(),
        }
    }
}

fn now_seconds() -> Value {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    Value::Number(secs as f64)
}

fn now_millis() -> Value {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    Value::Number(millis as f64)
}

/// Names bound by the runtime itself; never copied into child runs.
pub const COMPUTED_VARS: [&str; 2] = ["$timestamp", "$millis"];

#[derive(Clone)]
pub struct Environment {
    vars: FxHashMap<String, Binding>,
    pub method: Option<String>,
    pub url: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub query: Option<Object>,
    pub body: Option<Value>,
    filters: FxHashMap<String, Filter>,
    functions: FxHashMap<String, Function>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        let mut vars = FxHashMap::default();
        vars.insert("$timestamp".to_string(), Binding::Computed(now_seconds));
        vars.insert("$millis".to_string(), Binding::Computed(now_millis));
        Self {
            vars,
            method: None,
            url: None,
            headers: BTreeMap::new(),
            query: None,
            body: None,
            filters: builtin_filters(),
            functions: FxHashMap::default(),
        }
    }

    pub fn with_vars(vars: Vars) -> Self {
        let mut env = Self::new();
        env.load_vars(vars);
        env
    }

    /// Fresh environment for a child run: new variables and request state,
    /// but the filters and functions the parent has imported stay available.
    pub fn child_of(parent: &Environment, vars: Vars) -> Self {
        let mut env = Self::with_vars(vars);
        env.filters = parent.filters.clone();
        env.functions = parent.functions.clone();
        env
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(name).map(Binding::resolve)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), Binding::Value(value));
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name).map(|b| b.resolve())
    }

    /// Merges `vars` into the store; later values win.
    pub fn load_vars(&mut self, vars: impl IntoIterator<Item = (String, Value)>) {
        for (name, value) in vars {
            self.set(name, value);
        }
    }

    /// Plain variables, resolved. Computed bindings are left out.
    pub fn vars(&self) -> Vars {
        self.vars
            .iter()
            .filter(|(_, b)| matches!(b, Binding::Value(_)))
            .map(|(k, b)| (k.clone(), b.resolve()))
            .collect()
    }

    pub fn var_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The `$env` object: every variable plus the request fields.
    pub fn root_value(&self) -> Value {
        let mut root: Object = self
            .vars
            .iter()
            .filter(|(_, b)| matches!(b, Binding::Value(_)))
            .map(|(k, b)| (k.clone(), b.resolve()))
            .collect();
        root.insert("method".into(), self.method.clone().map(Value::String).unwrap_or_default());
        root.insert("url".into(), self.url.clone().map(Value::String).unwrap_or_default());
        root.insert(
            "headers".into(),
            Value::Object(self.headers.iter().map(|(k, v)| (k.clone(), Value::from(v.as_str()))).collect()),
        );
        root.insert("query".into(), self.query.clone().map(Value::Object).unwrap_or_default());
        root.insert("body".into(), self.body.clone().unwrap_or_default());
        Value::Object(root)
    }

    /// Resolves a dotted path. `$env` starts at [`root_value`](Self::root_value),
    /// anything else at the variable store. `None` when any step is missing.
    pub fn lookup(&self, path: &[String]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        let mut current = if first == "$env" { self.root_value() } else { self.get(first)? };
        for segment in rest {
            current = match current.get(segment) {
                Some(v) => v.clone(),
                None if segment == "length" => current.length()?,
                None => return None,
            };
        }
        Some(current)
    }

    /// Interpolates `{{ … }}` markers in `text`. Text without markers is
    /// returned unchanged.
    pub fn eval(&self, text: &str) -> Result<String> {
        if !text.contains("{{") {
            return Ok(text.to_string());
        }
        let template = get_cached_template(text)?;
        Ok(template.eval(self)?.display())
    }

    pub fn filter(&self, name: &str) -> Result<Filter> {
        self.filters
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::filter_not_found(name).into())
    }

    pub fn add_filter(&mut self, name: impl Into<String>, filter: Filter) {
        self.filters.insert(name.into(), filter);
    }

    pub fn add_function(&mut self, name: impl Into<String>, function: Function) {
        self.functions.insert(name.into(), function);
    }

    pub fn function(&self, name: &str) -> Result<Function> {
        if let Some(f) = self.functions.get(name) {
            return Ok(f.clone());
        }
        if self.vars.contains_key(name) {
            crate::bail_eval!(ErrorKind::Function, "not a function: {}", name);
        }
        crate::bail_eval!(ErrorKind::Function, "unknown function: {}", name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}
