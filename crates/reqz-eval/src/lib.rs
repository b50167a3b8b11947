pub mod batch;
pub mod config;
pub mod directive;
pub mod directives;
pub mod environment;
pub mod error;
pub mod eval;
pub mod extension;
pub mod filters;
pub mod http;
pub mod logger;
pub mod module;
mod parser;
pub mod prompt;
pub mod stdlib;
pub mod value;

pub use batch::{play, play_file};
pub use config::Config;
pub use directive::{
    DefinitionShape, Directive, DirectiveArgs, DirectiveDefinition, DirectiveRegistry, DirectiveShape,
};
pub use environment::{Environment, Vars};
pub use error::{ErrorKind, EvalError};
pub use eval::Evaluate;
pub use extension::{Export, Extension, ExtensionRegistry};
pub use http::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use logger::{ConsoleLogger, LogConfig, QuietLogger, RequestLogger};
pub use module::{Command, RequestModule, Services, VarDecl};
pub use prompt::{NoPrompter, Prompt, Prompter, StdinPrompter};
pub use value::{Object, Value};
