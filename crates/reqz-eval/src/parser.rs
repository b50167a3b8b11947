//! Line/block state machine turning script text into module commands.

use crate::directive::{Directive, DirectiveShape};
use crate::module::RequestModule;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqz_syntax::ParseError;
use reqz_syntax::line::{is_blank_or_comment, split_first_word, split_header};
use std::sync::Arc;
use tracing::{debug, trace};

static FILE_BODY_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@file\s+(.+)$").unwrap());

enum State {
    Line,
    Block {
        directive: Arc<dyn Directive>,
        name: String,
        arg: String,
        lines: Vec<String>,
        start_line: usize,
    },
    RequestHeaders,
    RequestBody {
        lines: Vec<String>,
        start_line: usize,
    },
}

struct ScriptParser<'m> {
    module: &'m mut RequestModule,
    file: Option<String>,
}

/// Parses `text` into `module`. Errors name the file and 1-based line.
pub fn parse_text(module: &mut RequestModule, text: &str) -> Result<()> {
    let file = module.file().map(|p| p.display().to_string());
    debug!(file = ?file, "parsing script");
    let mut parser = ScriptParser { module, file };

    let mut state = State::Line;
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        state = parser.parse_line(state, line, line_no).map_err(|e| parser.locate(e, line_no))?;
    }
    parser.close(state)
}

impl ScriptParser<'_> {
    /// Attaches the location to `err`, turning foreign errors into parse
    /// errors on the way.
    fn locate(&self, err: anyhow::Error, line: usize) -> anyhow::Error {
        let parse_error = match err.downcast::<ParseError>() {
            Ok(pe) => pe,
            Err(other) => ParseError::invalid(format!("{:#}", other)),
        };
        parse_error.at_line(self.file.clone(), line).into()
    }

    fn parse_line(&mut self, state: State, raw: &str, line_no: usize) -> Result<State> {
        match state {
            State::Line => self.dispatch(raw, line_no),
            State::Block { directive, name, arg, mut lines, start_line } => {
                let line = raw.trim();
                if is_blank_or_comment(line) {
                    return Ok(State::Block { directive, name, arg, lines, start_line });
                }
                let (word, _) = split_first_word(line);
                if self.module.has_directive(word) {
                    self.build_block(&directive, &name, &arg, &lines, start_line)?;
                    return self.dispatch(line, line_no);
                }
                lines.push(line.to_string());
                Ok(State::Block { directive, name, arg, lines, start_line })
            }
            State::RequestHeaders => {
                let line = raw.trim();
                if line.starts_with('#') {
                    return Ok(State::RequestHeaders);
                }
                if line.is_empty() {
                    return Ok(State::RequestBody { lines: Vec::new(), start_line: line_no + 1 });
                }
                let (name, value) = split_header(line)?;
                self.module.set_header_expr(name, value)?;
                Ok(State::RequestHeaders)
            }
            State::RequestBody { mut lines, start_line } => {
                lines.push(raw.to_string());
                Ok(State::RequestBody { lines, start_line })
            }
        }
    }

    fn dispatch(&mut self, raw: &str, line_no: usize) -> Result<State> {
        let line = raw.trim();
        if is_blank_or_comment(line) {
            return Ok(State::Line);
        }
        let (word, arg) = split_first_word(line);
        let Some(directive) = self.module.directive(word) else {
            return Err(ParseError::UnexpectedLine { line: line.to_string() }.into());
        };
        trace!(directive = word, line = line_no, "matched directive");

        match directive.shape() {
            DirectiveShape::Line => {
                directive.build(self.module, word, arg, &[])?;
                Ok(State::Line)
            }
            DirectiveShape::Block => Ok(State::Block {
                directive,
                name: word.to_string(),
                arg: arg.to_string(),
                lines: Vec::new(),
                start_line: line_no,
            }),
            DirectiveShape::Request => {
                directive.build(self.module, word, arg, &[])?;
                Ok(State::RequestHeaders)
            }
        }
    }

    fn build_block(
        &mut self,
        directive: &Arc<dyn Directive>,
        name: &str,
        arg: &str,
        lines: &[String],
        start_line: usize,
    ) -> Result<()> {
        trace!(directive = name, lines = lines.len(), "closing block");
        directive
            .build(self.module, name, arg, lines)
            .map_err(|e| self.locate(e, start_line))
    }

    fn close(&mut self, state: State) -> Result<()> {
        match state {
            State::Line | State::RequestHeaders => Ok(()),
            State::Block { directive, name, arg, lines, start_line } => {
                self.build_block(&directive, &name, &arg, &lines, start_line)
            }
            State::RequestBody { lines, start_line } => {
                self.build_body(&lines).map_err(|e| self.locate(e, start_line))
            }
        }
    }

    fn build_body(&mut self, lines: &[String]) -> Result<()> {
        let body = lines.join("\n");
        let body = body.trim();
        if body.is_empty() {
            return Ok(());
        }
        if let Some(caps) = FILE_BODY_RX.captures(body) {
            let path = self.module.resolve_file(caps[1].trim());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read body file {}", path.display()))?;
            self.module.set_body(&content);
            return Ok(());
        }
        self.module.set_body_expr(body)
    }
}
