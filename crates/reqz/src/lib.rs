//! # reqz
//!
//! A line-oriented scripting language for HTTP requests.
//!
//! This crate re-exports the parts of `reqz-syntax` and `reqz-eval` needed to
//! load and run `.req` files from Rust.
//!
//! ```no_run
//! use reqz::{Value, Vars, run_file};
//!
//! let mut vars = Vars::default();
//! vars.insert("id".to_string(), Value::from(7.0));
//! if let Some(response) = run_file("user.req", vars)? {
//!     println!("{}", response.status);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub use reqz_syntax::{Expression, ParseError, Template, VarRef, parse_template};
pub use reqz_eval::{
    Config, Environment, Extension, ExtensionRegistry, HttpRequest, HttpResponse, RequestModule, Services, Value,
    Vars, play, play_file,
};

use anyhow::Result;
use std::path::Path;

/// Runs a request file with the configuration found next to it. `vars`
/// override the configured default variables.
pub fn run_file(path: impl AsRef<Path>, vars: Vars) -> Result<Option<HttpResponse>> {
    let path = path.as_ref();
    let config = Config::load(path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new(".")))?;
    let mut run_vars = config.default_vars();
    run_vars.extend(vars);
    let module = RequestModule::new(Services::from_config(config)?).load_file(path)?;
    module.exec(run_vars)
}

pub mod prelude {
    pub use crate::{Config, RequestModule, Services, Value, Vars, play, run_file};
    pub use crate::{HttpResponse, ParseError};
}
