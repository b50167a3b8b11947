use crate::value::Value;
use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A named unary transform applied in a `{{ value | filter }}` pipeline.
pub type Filter = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

pub type BuiltinFilter = fn(Value) -> Result<Value>;

static BUILTIN_FILTERS: Lazy<FxHashMap<&'static str, BuiltinFilter>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("json", filter_json as BuiltinFilter);
    map.insert("lowercase", filter_lowercase as BuiltinFilter);
    map.insert("uppercase", filter_uppercase as BuiltinFilter);
    map.insert("trim", filter_trim as BuiltinFilter);
    map.insert("base64", filter_base64 as BuiltinFilter);
    map
});

/// Fresh filter table holding the built-in set.
pub fn builtin_filters() -> FxHashMap<String, Filter> {
    BUILTIN_FILTERS
        .iter()
        .map(|(name, f)| {
            let f = *f;
            (name.to_string(), Arc::new(f) as Filter)
        })
        .collect()
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_FILTERS.contains_key(name)
}

/// Strings render without quotes, so `{{price | json}}` of `9.99` is `9.99`
/// and of `"a"` is `"a"`.
pub fn filter_json(value: Value) -> Result<Value> {
    if value.is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::String(value.to_json_string()))
}

fn text_or_empty(value: &Value) -> String {
    if value.is_nullish() { String::new() } else { value.display() }
}

pub fn filter_lowercase(value: Value) -> Result<Value> {
    Ok(Value::String(text_or_empty(&value).to_lowercase()))
}

pub fn filter_uppercase(value: Value) -> Result<Value> {
    Ok(Value::String(text_or_empty(&value).to_uppercase()))
}

pub fn filter_trim(value: Value) -> Result<Value> {
    Ok(Value::String(text_or_empty(&value).trim().to_string()))
}

pub fn filter_base64(value: Value) -> Result<Value> {
    Ok(Value::String(STANDARD.encode(text_or_empty(&value))))
}
