//! The request module: a parsed script plus the shared services it runs with.
//!
//! Parsing a file (the build phase) turns every directive into [`Command`]s;
//! [`RequestModule::exec`] (the run phase) replays them against a fresh
//! [`Environment`] and finally issues the HTTP request the script describes.
//! A parsed module can be executed any number of times.

use crate::config::Config;
use crate::directive::{Directive, DirectiveRegistry, try_create_custom_directive};
use crate::environment::{Environment, Vars};
use crate::error::{ErrorKind, EvalError};
use crate::eval::Evaluate;
use crate::extension::ExtensionRegistry;
use crate::http::{HttpRequest, HttpResponse, ReqwestTransport, Transport, build_url};
use crate::logger::{ConsoleLogger, LogConfig, RequestLogger};
use crate::parser::parse_text;
use crate::prompt::{NoPrompter, Prompt, Prompter};
use crate::value::Value;
use anyhow::{Context, Result};
use reqz_syntax::{Expression, parse_body_expression, parse_object_expression, parse_string_expression};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, trace};

/// One step of the run phase.
pub type Command = Box<dyn Fn(&RequestModule, &mut Environment) -> Result<()>>;

/// Collaborators shared by a module and all of its children.
#[derive(Clone)]
pub struct Services {
    pub logger: Rc<dyn RequestLogger>,
    pub transport: Rc<dyn Transport>,
    pub prompter: Rc<dyn Prompter>,
    pub extensions: Rc<ExtensionRegistry>,
    pub config: Rc<Config>,
}

impl Services {
    /// Console logging with default settings, no prompter and the standard
    /// extension bundles.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            logger: Rc::new(ConsoleLogger::default()),
            transport: Rc::new(transport),
            prompter: Rc::new(NoPrompter),
            extensions: Rc::new(ExtensionRegistry::with_stdlib()),
            config: Rc::new(Config::default()),
        }
    }

    /// Real HTTP transport and console logging, both set up from `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        let logger = ConsoleLogger::new(LogConfig::from_spec(&config.log).with_all(config.all));
        Ok(Self::new(transport).with_logger(logger).with_config(config))
    }

    pub fn with_logger(mut self, logger: impl RequestLogger + 'static) -> Self {
        self.logger = Rc::new(logger);
        self
    }

    pub fn with_prompter(mut self, prompter: impl Prompter + 'static) -> Self {
        self.prompter = Rc::new(prompter);
        self
    }

    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = Rc::new(extensions);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Rc::new(config);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: String,
    pub required: bool,
}

/// Declarations of one module. Included modules forward theirs to the
/// includer so that the script doing the `@include` sees them.
struct Scope {
    directives: DirectiveRegistry,
    vars: Vec<VarDecl>,
    parent: Option<Weak<RefCell<Scope>>>,
    is_included: bool,
}

impl Scope {
    fn forward_to(&self) -> Option<Rc<RefCell<Scope>>> {
        if !self.is_included {
            return None;
        }
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn declare_var(&mut self, decl: VarDecl) {
        if let Some(parent) = self.forward_to() {
            parent.borrow_mut().declare_var(decl.clone());
        }
        // Includes are parsed on every run; repeated declarations are kept once.
        if !self.vars.contains(&decl) {
            self.vars.push(decl);
        }
    }

    fn declare_directive(&mut self, keyword: &str, directive: Arc<dyn Directive>) {
        if let Some(parent) = self.forward_to() {
            parent.borrow_mut().declare_directive(keyword, directive.clone());
        }
        self.directives.insert(keyword, directive);
    }
}

pub struct RequestModule {
    file: Option<PathBuf>,
    cwd: Option<PathBuf>,
    /// Directory of the spawning module, used to resolve `load_file`.
    parent_cwd: Option<PathBuf>,
    scope: Rc<RefCell<Scope>>,
    commands: Vec<Command>,
    services: Services,
}

impl RequestModule {
    pub fn new(services: Services) -> Self {
        let scope = Scope {
            directives: DirectiveRegistry::builtin(),
            vars: Vec::new(),
            parent: None,
            is_included: false,
        };
        Self {
            file: None,
            cwd: None,
            parent_cwd: None,
            scope: Rc::new(RefCell::new(scope)),
            commands: Vec::new(),
            services,
        }
    }

    /// A child module for `@include` (`is_included`) or `@run`.
    pub fn spawn(&self, is_included: bool) -> Self {
        let scope = Scope {
            directives: DirectiveRegistry::builtin(),
            vars: Vec::new(),
            parent: Some(Rc::downgrade(&self.scope)),
            is_included,
        };
        Self {
            file: None,
            cwd: None,
            parent_cwd: self.cwd.clone(),
            scope: Rc::new(RefCell::new(scope)),
            commands: Vec::new(),
            services: self.services.clone(),
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn has_parent(&self) -> bool {
        self.scope.borrow().parent.is_some()
    }

    pub fn is_included(&self) -> bool {
        self.scope.borrow().is_included
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn declared_vars(&self) -> Vec<VarDecl> {
        self.scope.borrow().vars.clone()
    }

    pub fn directive(&self, keyword: &str) -> Option<Arc<dyn Directive>> {
        self.scope.borrow().directives.get(keyword)
    }

    pub fn has_directive(&self, keyword: &str) -> bool {
        self.scope.borrow().directives.contains(keyword)
    }

    /// Reads and parses `path`. Relative paths resolve against the spawning
    /// module's directory, or the process directory for top-level modules.
    pub fn load_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = match &self.parent_cwd {
            Some(dir) => normalize(&dir.join(path)),
            None => absolute(path)?,
        };
        debug!(file = %file.display(), "loading request file");

        let content = std::fs::read_to_string(&file).map_err(|e| {
            EvalError::new(ErrorKind::Io, format!("Failed to read request file {}: {}", file.display(), e))
        })?;
        self.cwd = file.parent().map(Path::to_path_buf);
        self.file = Some(file);
        parse_text(&mut self, &content)?;
        Ok(self)
    }

    /// Parses `text` as a script without a backing file.
    pub fn load_content(mut self, text: &str) -> Result<Self> {
        parse_text(&mut self, text)?;
        Ok(self)
    }

    pub fn declare_var(&mut self, name: impl Into<String>, required: bool) {
        let decl = VarDecl { name: name.into(), required };
        trace!(name = %decl.name, required, "declaring variable");
        self.scope.borrow_mut().declare_var(decl);
    }

    pub fn declare_directive(&mut self, keyword: &str, directive: Arc<dyn Directive>) {
        trace!(keyword, "declaring directive");
        self.scope.borrow_mut().declare_directive(keyword, directive);
    }

    pub fn add_command<F>(&mut self, command: F)
    where
        F: Fn(&RequestModule, &mut Environment) -> Result<()> + 'static,
    {
        self.commands.push(Box::new(command));
    }

    /// Runs the module against a fresh environment holding `vars`.
    pub fn exec(&self, vars: Vars) -> Result<Option<HttpResponse>> {
        let mut env = Environment::with_vars(vars);
        self.exec_with_env(&mut env)
    }

    /// Binds unset optional variables to `undefined`, runs every command in
    /// order, then issues the request.
    pub fn exec_with_env(&self, env: &mut Environment) -> Result<Option<HttpResponse>> {
        let optional: Vec<String> = self
            .scope
            .borrow()
            .vars
            .iter()
            .filter(|v| !v.required)
            .map(|v| v.name.clone())
            .collect();
        for name in optional {
            if !env.contains(&name) {
                env.set(name, Value::Undefined);
            }
        }

        debug!(file = ?self.file, commands = self.commands.len(), "executing module");
        for command in &self.commands {
            command(self, env)?;
        }
        self.request(env)
    }

    /// Sends the request described by `env`, if any.
    ///
    /// A transport failure that still carries a response is logged and the
    /// response returned; other failures are errors.
    pub fn request(&self, env: &Environment) -> Result<Option<HttpResponse>> {
        let method = env.method.as_deref().filter(|m| !m.is_empty());
        let url = env.url.as_deref().filter(|u| !u.is_empty());
        let (method, url) = match (method, url) {
            (None, None) => return Ok(None),
            (Some(_), None) => crate::bail_eval!(ErrorKind::MissingRequest, "missing request URL"),
            (None, Some(_)) => crate::bail_eval!(ErrorKind::MissingRequest, "missing request method"),
            (Some(method), Some(url)) => (method, url),
        };

        let mut headers = env.headers.clone();
        let body = match &env.body {
            None | Some(Value::Undefined) | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(value @ (Value::Object(_) | Value::Array(_))) => {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    headers.insert("Content-Type".to_string(), "application/json".to_string());
                }
                Some(value.to_json_string())
            }
            Some(other) => Some(other.display()),
        };

        let request = HttpRequest {
            method: method.to_string(),
            url: build_url(url, env.query.as_ref())?,
            headers,
            body,
        };

        self.log_request(&request);
        match self.services.transport.send(&request) {
            Ok(response) => {
                debug!(status = response.status, "response received");
                self.log_response(&response);
                Ok(Some(response))
            }
            Err(err) => match err.response.clone() {
                Some(response) => {
                    debug!(status = response.status, "error response received");
                    self.services.logger.log_response_error(&request, &err);
                    Ok(Some(response))
                }
                None => Err(anyhow::Error::new(err)),
            },
        }
    }

    fn log_request(&self, request: &HttpRequest) {
        if self.has_parent() {
            self.services.logger.log_child_request(request);
        } else {
            self.services.logger.log_request(request);
        }
    }

    fn log_response(&self, response: &HttpResponse) {
        if self.has_parent() {
            self.services.logger.log_child_response(response);
        } else {
            self.services.logger.log_response(response);
        }
    }

    /// Resolves `file` against this module's directory.
    pub fn resolve_file(&self, file: impl AsRef<Path>) -> PathBuf {
        let file = file.as_ref();
        match &self.cwd {
            Some(dir) => normalize(&dir.join(file)),
            None => absolute(file).unwrap_or_else(|_| normalize(file)),
        }
    }

    /// Reads a file, refusing anything outside this module's directory.
    pub fn safe_read_file(&self, file: impl AsRef<Path>) -> Result<String> {
        let resolved = self.resolve_file(file);
        let inside = match &self.cwd {
            Some(dir) => resolved.starts_with(dir) && resolved != *dir,
            None => false,
        };
        if !inside {
            crate::bail_eval!(
                ErrorKind::Io,
                "Cannot read file: \"{}\". The file is outside the module directory",
                resolved.display()
            );
        }
        std::fs::read_to_string(&resolved).with_context(|| format!("Failed to read {}", resolved.display()))
    }

    pub fn prompt(&self, prompts: &[Prompt]) -> Result<BTreeMap<String, String>> {
        self.services.prompter.ask(prompts)
    }

    /// Imports an extension bundle: its directives become available to the
    /// rest of the script right away, its other exports are loaded into the
    /// environment when the import is reached at run time.
    pub fn import_lib(&mut self, name: &str) -> Result<()> {
        let resolved = self.resolve_file(name);
        let extension = self.services.extensions.resolve(name, Some(&resolved))?;
        debug!(extension = extension.name(), "importing extension");

        for (_, export) in extension.exports() {
            if let Some((keyword, directive)) = try_create_custom_directive(export)? {
                self.declare_directive(&keyword, directive);
            }
        }

        self.add_command(move |_, env| {
            for (name, export) in extension.exports() {
                export.apply(name, env);
            }
            Ok(())
        });
        Ok(())
    }

    pub fn set_method(&mut self, method: &str) {
        let method = method.to_string();
        self.add_command(move |_, env| {
            env.method = Some(method.clone());
            Ok(())
        });
    }

    pub fn set_url_expr(&mut self, text: &str) -> Result<()> {
        let expr = parse_string_expression(text)?;
        self.add_command(move |_, env| {
            env.url = Some(expr.eval(env)?.display());
            Ok(())
        });
        Ok(())
    }

    /// Header from a string expression; null and undefined values leave the
    /// header unset. A value that is a single `{{ … }}` marker keeps the
    /// variable's raw value so that unset optional variables drop the header.
    pub fn set_header_expr(&mut self, name: &str, text: &str) -> Result<()> {
        let name = name.to_string();
        let expr = parse_string_expression(text)?;
        let single = match &expr {
            Expression::Template(template) => template.single_var().cloned(),
            _ => None,
        };
        let expr = single.map(Expression::Var).unwrap_or(expr);
        self.add_command(move |_, env| {
            let value = expr.eval(env)?;
            if !value.is_nullish() {
                env.headers.insert(name.clone(), value.display());
            }
            Ok(())
        });
        Ok(())
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        let (name, value) = (name.to_string(), value.to_string());
        self.add_command(move |_, env| {
            env.headers.insert(name.clone(), value.clone());
            Ok(())
        });
    }

    pub fn set_body_expr(&mut self, text: &str) -> Result<()> {
        let expr = parse_body_expression(text)?;
        self.add_command(move |_, env| {
            env.body = Some(expr.eval(env)?);
            Ok(())
        });
        Ok(())
    }

    pub fn set_body(&mut self, text: &str) {
        let text = text.to_string();
        self.add_command(move |_, env| {
            env.body = Some(Value::String(text.clone()));
            Ok(())
        });
    }

    /// Replaces the query mapping with the value of an object expression.
    pub fn set_query_expr(&mut self, text: &str) -> Result<()> {
        let expr = parse_object_expression(text)?;
        self.add_command(move |_, env| {
            env.query = match expr.eval(env)? {
                Value::Object(obj) => Some(obj),
                Value::Undefined | Value::Null => None,
                other => anyhow::bail!("query must be an object, got {}", other.type_name()),
            };
            Ok(())
        });
        Ok(())
    }
}

impl std::fmt::Debug for RequestModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestModule")
            .field("file", &self.file)
            .field("commands", &self.commands.len())
            .field("vars", &self.declared_vars())
            .finish()
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    Ok(normalize(&cwd.join(path)))
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
