//! Runtime configuration for request scripts.
//!
//! [`Config`] controls the HTTP client, console logging and default
//! variables. Use [`Config::default()`] for a 30 s timeout, request line plus
//! response body logging and no default variables.
//!
//! # Config file: `.reqzrc`
//!
//! - **Global**: `~/.reqzrc`, applies everywhere
//! - **Local**: `.reqzrc` or `.reqz/.reqzrc` next to the request files, overrides global
//!
//! ```toml
//! http_timeout = 10
//! user_agent = "my-team/1.0"
//! log = "req,reqh,resb"
//! all = false
//! col_delimiter = ";"
//!
//! [vars]
//! host = "https://staging.example.com"
//! ```
//!
//! All fields are optional. Local values override global values; `[vars]`
//! tables are merged key by key.

use crate::environment::Vars;
use crate::value::Value;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const RC_FILE: &str = ".reqzrc";

/// TOML-friendly intermediate representation (all fields optional).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    /// HTTP timeout in seconds.
    http_timeout: Option<u64>,
    user_agent: Option<String>,
    /// Log spec, e.g. `"req,resb"`.
    log: Option<String>,
    /// Log child requests too.
    all: Option<bool>,
    col_delimiter: Option<String>,
    #[serde(default)]
    vars: BTreeMap<String, toml::Value>,
}

/// Runtime configuration.
///
/// | Setting | Default |
/// |---------|---------|
/// | `http_timeout` | 30 s |
/// | `user_agent` | `reqz/<version>` |
/// | `log` | `"req,resb"` |
/// | `all` | `false` |
/// | `col_delimiter` | `","` |
/// | `vars` | empty |
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Timeout for each HTTP exchange.
    pub http_timeout: Duration,
    pub user_agent: String,
    /// Comma separated log switches, see [`LogConfig`](crate::logger::LogConfig).
    pub log: String,
    pub all: bool,
    /// Column delimiter for CSV batch files.
    pub col_delimiter: u8,
    /// Variables every run starts with. Command line values win.
    pub vars: BTreeMap<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            user_agent: concat!("reqz/", env!("CARGO_PKG_VERSION")).to_string(),
            log: "req,resb".to_string(),
            all: false,
            col_delimiter: b',',
            vars: BTreeMap::new(),
        }
    }
}

/// A one character column delimiter; `\t` stands for a tab.
pub fn parse_delimiter(text: &str) -> Result<u8> {
    match text.as_bytes() {
        [b] => Ok(*b),
        _ if text == "\\t" => Ok(b'\t'),
        _ => anyhow::bail!("col_delimiter must be a single character, got {:?}", text),
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration by merging global and local `.reqzrc` files.
    ///
    /// 1. Loads `~/.reqzrc` (global) if it exists
    /// 2. Searches for `.reqzrc` or `.reqz/.reqzrc` starting from `start_dir`
    /// 3. Local values override global values
    pub fn load(start_dir: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::find_global_config() {
            if let Ok(global_config) = Self::from_file(&global_path) {
                config = global_config;
            }
        }

        if let Some(local_path) = Self::find_local_config(start_dir) {
            let content = std::fs::read_to_string(&local_path)
                .with_context(|| format!("Failed to read config file: {}", local_path.display()))?;
            let file: ConfigFile = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", local_path.display()))?;
            config.merge(file)?;
        }

        Ok(config)
    }

    /// Loads configuration from a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(toml_str: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(toml_str).context("Failed to parse config")?;
        let mut config = Self::default();
        config.merge(file)?;
        Ok(config)
    }

    fn merge(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(timeout) = file.http_timeout {
            self.http_timeout = Duration::from_secs(timeout);
        }
        if let Some(agent) = file.user_agent {
            self.user_agent = agent;
        }
        if let Some(log) = file.log {
            self.log = log;
        }
        if let Some(all) = file.all {
            self.all = all;
        }
        if let Some(delim) = file.col_delimiter {
            self.col_delimiter = parse_delimiter(&delim)?;
        }
        for (name, value) in file.vars {
            self.vars.insert(name, Value::from_toml(value));
        }
        Ok(())
    }

    /// Default variables as a run map.
    pub fn default_vars(&self) -> Vars {
        self.vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn find_global_config() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(RC_FILE)).filter(|p| p.is_file())
    }

    /// Walks up from `start_dir` looking for `.reqzrc` or `.reqz/.reqzrc`.
    fn find_local_config(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
        let mut dir = start_dir.as_ref().to_path_buf();
        if let Ok(abs) = dir.canonicalize() {
            dir = abs;
        }

        loop {
            let rc_file = dir.join(RC_FILE);
            if rc_file.is_file() {
                return Some(rc_file);
            }
            let nested = dir.join(".reqz").join(RC_FILE);
            if nested.is_file() {
                return Some(nested);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn with_log(mut self, spec: impl Into<String>) -> Self {
        self.log = spec.into();
        self
    }

    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    pub fn with_col_delimiter(mut self, delimiter: u8) -> Self {
        self.col_delimiter = delimiter;
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }
}
