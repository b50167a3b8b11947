use colored::*;
use reqz_eval::{ErrorKind, EvalError, TransportError};
use reqz_syntax::ParseError;
use std::fmt;

/// A failure as shown to the user, with the script location and hints.
pub struct EnhancedError {
    pub message: String,
    pub line: Option<usize>,
    pub file: Option<String>,
    pub source: Option<String>,
    pub suggestion: Option<String>,
    pub help: Option<String>,
}

impl EnhancedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            file: None,
            source: None,
            suggestion: None,
            help: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Prints the error to stderr.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.message.bold());

        match (&self.file, self.line) {
            (Some(file), Some(line)) => eprintln!("  {} {}:{}", "-->".blue().bold(), file, line),
            (Some(file), None) => eprintln!("  {} {}", "-->".blue().bold(), file),
            _ => {}
        }

        if let (Some(source), Some(line)) = (&self.source, self.line) {
            eprintln!();
            self.display_source_line(source, line);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!();
            eprintln!("{} {}", "suggestion:".green().bold(), suggestion);
        }

        if let Some(help) = &self.help {
            eprintln!();
            eprintln!("{} {}", "help:".cyan().bold(), help);
        }
    }

    /// The failing line with one line of context on each side, the failing
    /// one underlined.
    fn display_source_line(&self, source: &str, line: usize) {
        let lines: Vec<&str> = source.lines().collect();
        let line_idx = line.saturating_sub(1);
        if line_idx >= lines.len() {
            return;
        }

        let start = line_idx.saturating_sub(1);
        let end = (line_idx + 2).min(lines.len());
        let width = end.to_string().len();

        for (i, text) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            if line_num == line {
                eprintln!("{:>width$} {} {}", line_num.to_string().blue().bold(), "|".blue().bold(), text);
                let indent = text.len() - text.trim_start().len();
                let carets = "^".repeat(text.trim().chars().count().max(1));
                eprintln!("{:>width$} {} {}{}", "", "|".blue().bold(), " ".repeat(indent), carets.red().bold());
            } else {
                eprintln!("{:>width$} {} {}", line_num.to_string().dimmed(), "|".blue().bold(), text);
            }
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnhancedError: {}", self.message)
    }
}

impl std::error::Error for EnhancedError {}

/// Turns an error from loading or running `file` into an [`EnhancedError`]
/// with location and hints.
pub fn enhance_error(err: anyhow::Error, file: &str) -> EnhancedError {
    if let Some(parse_error) = err.downcast_ref::<ParseError>() {
        return enhance_parse_error(parse_error, file);
    }

    let mut enhanced = EnhancedError::new(format!("{:#}", err)).with_file(file);

    if let Some(transport) = err.downcast_ref::<TransportError>() {
        enhanced = EnhancedError::new(format!("request failed: {}", transport))
            .with_file(file)
            .with_suggestion("Check the request URL and that the server is reachable");
        return enhanced;
    }

    match EvalError::kind_of(&err) {
        Some(ErrorKind::VariableNotFound) => {
            enhanced = enhanced
                .with_suggestion("Pass the variable on the command line: reqz <file> --name value")
                .with_help("Declare variables that may stay unset with '@var name?'");
        }
        Some(ErrorKind::RequiredVariable) => {
            enhanced = enhanced.with_suggestion("Pass the variable on the command line or set it in .reqzrc [vars]");
        }
        Some(ErrorKind::FilterNotFound) => {
            enhanced = enhanced
                .with_help("Built-in filters: json, lowercase, uppercase, trim, base64. Others come from @import");
        }
        Some(ErrorKind::MissingRequest) => {
            enhanced = enhanced.with_suggestion("Add a request line such as 'GET https://example.com'");
        }
        Some(ErrorKind::Extension) => {
            enhanced = enhanced.with_help("The built-in bundle is imported with '@import \"reqz:http\"'");
        }
        Some(ErrorKind::Io) => {
            enhanced = enhanced.with_help("Files are resolved relative to the script that names them");
        }
        Some(ErrorKind::Function) | Some(ErrorKind::Prompt) | None => {}
    }
    enhanced
}

fn enhance_parse_error(err: &ParseError, main_file: &str) -> EnhancedError {
    let file = err.file().unwrap_or(main_file).to_string();
    let message = match err {
        ParseError::Located { source, .. } => source.to_string(),
        other => other.to_string(),
    };

    let mut enhanced = EnhancedError::new(format!("Parse error: {}", message)).with_file(&file);
    if let Some(line) = err.line() {
        enhanced = enhanced.with_line(line);
        if let Ok(source) = std::fs::read_to_string(&file) {
            enhanced = enhanced.with_source(source);
        }
    }

    if message.starts_with("unexpected line") {
        enhanced = enhanced
            .with_suggestion("Check the directive name and that extension directives come after their @import")
            .with_help("Request headers go right after the method line, the body after one empty line");
    } else if message.starts_with("missing argument") {
        enhanced = enhanced.with_help("The argument goes on the same line as the directive");
    }
    enhanced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_location() {
        let err = ParseError::UnexpectedLine { line: "hello".into() }.at_line(Some("/tmp/a.req".into()), 4);
        let enhanced = enhance_error(err.into(), "main.req");
        assert_eq!(enhanced.line, Some(4));
        assert_eq!(enhanced.file.as_deref(), Some("/tmp/a.req"));
        assert_eq!(enhanced.message, "Parse error: unexpected line: hello");
        assert!(enhanced.suggestion.is_some());
    }

    #[test]
    fn test_variable_hint() {
        let err = anyhow::anyhow!(EvalError::variable_not_found("id"));
        let enhanced = enhance_error(err, "main.req");
        assert_eq!(enhanced.message, "variable not found: id");
        assert!(enhanced.suggestion.as_deref().is_some_and(|s| s.contains("--name value")));
    }

    #[test]
    fn test_transport_error() {
        let enhanced = enhance_error(TransportError::new("connection refused").into(), "main.req");
        assert_eq!(enhanced.message, "request failed: connection refused");
    }
}
