//! User-facing output of a run.

use crate::http::{HttpRequest, HttpResponse, TransportError};
use crate::value::Value;
use colored::*;
use std::collections::BTreeMap;

/// Which parts of an exchange the console logger prints.
///
/// Parsed from a comma separated list of switches, e.g. `"req,reqh,resb"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Request line.
    pub req: bool,
    pub reqh: bool,
    pub reqb: bool,
    pub resh: bool,
    pub resb: bool,
    /// Also log requests of `@run` and `@include` children.
    pub all: bool,
}

impl LogConfig {
    /// Unknown switches are ignored.
    pub fn from_spec(spec: &str) -> Self {
        let mut config = Self::default();
        for key in spec.split(',').map(str::trim) {
            match key {
                "req" => config.req = true,
                "reqh" => config.reqh = true,
                "reqb" => config.reqb = true,
                "resh" => config.resh = true,
                "resb" => config.resb = true,
                "all" => config.all = true,
                _ => {}
            }
        }
        config
    }

    pub fn with_all(mut self, all: bool) -> Self {
        self.all = self.all || all;
        self
    }
}

pub trait RequestLogger {
    fn echo(&self, message: &str);
    fn inspect(&self, value: &Value);
    fn log_request(&self, request: &HttpRequest);
    fn log_child_request(&self, request: &HttpRequest);
    fn log_response(&self, response: &HttpResponse);
    fn log_child_response(&self, response: &HttpResponse);
    fn log_response_error(&self, request: &HttpRequest, error: &TransportError);
}

/// Colored output on stdout.
pub struct ConsoleLogger {
    config: LogConfig,
}

impl ConsoleLogger {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    fn print_hr(&self) {
        println!("{}", "---------------------------------------------------".dimmed());
    }

    fn print_headers(&self, title: &str, headers: &BTreeMap<String, String>) {
        self.print_hr();
        println!("{}", title.blue().bold());
        for (name, value) in headers {
            println!("{}: {}", name, value);
        }
    }

    fn print_request_body(&self, request: &HttpRequest) {
        println!();
        println!("{}", request.body.as_deref().unwrap_or(""));
    }

    fn print_response_body(&self, response: &HttpResponse) {
        println!();
        if response.is_json() {
            println!("{}", response.body().to_json_pretty());
        } else {
            println!("{}", response.text);
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(LogConfig::from_spec("req,resb"))
    }
}

impl RequestLogger for ConsoleLogger {
    fn echo(&self, message: &str) {
        println!("{} {}", "@echo".dimmed(), message);
    }

    fn inspect(&self, value: &Value) {
        match value {
            Value::String(s) => println!("{}", s.green()),
            Value::Undefined => println!("{}", "undefined".dimmed()),
            other => println!("{}", other.to_json_pretty()),
        }
    }

    fn log_request(&self, request: &HttpRequest) {
        let config = self.config;
        println!();
        if config.req {
            println!("{}", format!("{} {}", request.method, request.url).green().bold());
        }
        if config.reqh {
            self.print_headers("Request Headers:", &request.headers);
        }
        if config.reqb {
            self.print_request_body(request);
        }
        if config.reqh || config.reqb {
            self.print_hr();
        }
    }

    fn log_child_request(&self, request: &HttpRequest) {
        if self.config.all {
            self.log_request(request);
        }
    }

    fn log_response(&self, response: &HttpResponse) {
        let config = self.config;
        if config.req || config.reqh || config.reqb {
            println!();
            println!("{} {}", "Response".green().bold(), response.status.to_string().dimmed());
        }
        if config.resh {
            self.print_headers("Response Headers:", &response.headers);
        }
        if config.resb {
            self.print_response_body(response);
        }
    }

    fn log_child_response(&self, response: &HttpResponse) {
        if self.config.all {
            self.log_response(response);
        }
    }

    fn log_response_error(&self, request: &HttpRequest, error: &TransportError) {
        println!();
        match &error.response {
            Some(response) => println!("{}", format!("Server Error {}", response.status).red().bold()),
            None => println!("{}", error.message.red().bold()),
        }
        if self.config.reqh {
            self.print_headers("Request Headers:", &request.headers);
        }
        if self.config.reqb {
            self.print_request_body(request);
        }
        if let Some(response) = &error.response {
            if self.config.resh {
                self.print_headers("Response Headers:", &response.headers);
            }
            if self.config.resb {
                self.print_response_body(response);
            }
        }
    }
}

/// Prints nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuietLogger;

impl RequestLogger for QuietLogger {
    fn echo(&self, _message: &str) {}
    fn inspect(&self, _value: &Value) {}
    fn log_request(&self, _request: &HttpRequest) {}
    fn log_child_request(&self, _request: &HttpRequest) {}
    fn log_response(&self, _response: &HttpResponse) {}
    fn log_child_response(&self, _response: &HttpResponse) {}
    fn log_response_error(&self, _request: &HttpRequest, _error: &TransportError) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_spec() {
        let cfg = LogConfig::from_spec("req, resh,bogus");
        assert!(cfg.req);
        assert!(cfg.resh);
        assert!(!cfg.resb);
        assert!(!cfg.all);
    }

    #[test]
    fn test_default_console_config() {
        let logger = ConsoleLogger::default();
        assert_eq!(logger.config(), &LogConfig { req: true, resb: true, ..Default::default() });
    }

    #[test]
    fn test_with_all_keeps_spec_flag() {
        assert!(LogConfig::from_spec("all").with_all(false).all);
        assert!(LogConfig::from_spec("req").with_all(true).all);
    }
}
