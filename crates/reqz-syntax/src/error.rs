use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(line: usize, col: usize, start: usize, end: usize) -> Self {
        Self { line, col, start, end }
    }

    pub fn single(line: usize, col: usize, offset: usize) -> Self {
        Self { line, col, start: offset, end: offset + 1 }
    }

    pub fn merge(&self, other: &Span) -> Self {
        Self {
            line: self.line.min(other.line),
            col: if self.line == other.line { self.col.min(other.col) } else { self.col },
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LexError {
    UnexpectedChar { ch: char, span: Span },
    UnterminatedString { span: Span },
    UnterminatedTemplate { span: Span },
    InvalidNumber { text: String, span: Span },
    InvalidEscape { ch: char, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. } => *span,
            LexError::UnterminatedString { span } => *span,
            LexError::UnterminatedTemplate { span } => *span,
            LexError::InvalidNumber { span, .. } => *span,
            LexError::InvalidEscape { span, .. } => *span,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedChar { ch, .. } => write!(f, "unexpected character '{}'", ch),
            LexError::UnterminatedString { .. } => write!(f, "unterminated string literal"),
            LexError::UnterminatedTemplate { .. } => {
                write!(f, "invalid template string, expecting an ending tick")
            }
            LexError::InvalidNumber { text, .. } => write!(f, "invalid number: '{}'", text),
            LexError::InvalidEscape { ch, .. } => {
                write!(f, "invalid escape sequence: '\\{}'", ch)
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Every compile-time failure of the request language.
///
/// Directive builds return these wrapped in `anyhow::Error`; the line parser
/// adds the file and line through [`ParseError::at_line`].
#[derive(Debug, Clone)]
pub enum ParseError {
    UnexpectedToken { expected: String, found: String, span: Span },
    UnexpectedEof { expected: String, context: Option<String> },
    InvalidSyntax { message: String, span: Option<Span> },
    InvalidVariable { text: String },
    UnexpectedLine { line: String },
    MissingArgument { directive: String },
    Lex(LexError),
    Located { file: Option<String>, line: usize, source: Box<ParseError> },
}

impl ParseError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ParseError::InvalidSyntax { message: message.into(), span: None }
    }

    pub fn missing_argument(directive: impl Into<String>) -> Self {
        ParseError::MissingArgument { directive: directive.into() }
    }

    /// Attaches the script location. Already located errors keep their
    /// innermost location, which is the one that points at the offending line.
    pub fn at_line(self, file: Option<String>, line: usize) -> Self {
        match self {
            located @ ParseError::Located { .. } => located,
            other => ParseError::Located { file, line, source: Box::new(other) },
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. } => Some(*span),
            ParseError::InvalidSyntax { span, .. } => *span,
            ParseError::Lex(e) => Some(e.span()),
            ParseError::Located { line, source, .. } => {
                let col = source.span().map(|s| s.col).unwrap_or(1);
                Some(Span::new(*line, col, 0, 0))
            }
            _ => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Located { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            ParseError::Located { file, .. } => file.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, found, .. } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ParseError::UnexpectedEof { expected, context } => {
                if let Some(ctx) = context {
                    write!(f, "unexpected end of input while parsing {}, expected {}", ctx, expected)
                } else {
                    write!(f, "unexpected end of input, expected {}", expected)
                }
            }
            ParseError::InvalidSyntax { message, .. } => write!(f, "{}", message),
            ParseError::InvalidVariable { text } => {
                write!(f, "invalid variable expression: {}", text)
            }
            ParseError::UnexpectedLine { line } => write!(f, "unexpected line: {}", line),
            ParseError::MissingArgument { directive } => {
                write!(f, "missing argument for {} directive", directive)
            }
            ParseError::Lex(e) => write!(f, "{}", e),
            ParseError::Located { file, line, source } => match file {
                Some(file) => write!(f, "{} ({}:{})", source, file, line),
                None => write!(f, "{} (line {})", source, line),
            },
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::Lex(err)
    }
}

/// Renders an error against the script source with a caret under the column.
pub fn format_error_with_source(error_msg: &str, source: &str, span: Span) -> String {
    let lines: Vec<&str> = source.lines().collect();

    let line_idx = if span.line > 0 { span.line - 1 } else { 0 };

    if line_idx >= lines.len() {
        return format!("{} at line {}", error_msg, span.line);
    }

    let line_num = span.line;
    let mut output = String::new();
    output.push_str(&format!("  --> line {}:{}\n", line_num, span.col));
    output.push_str("   |\n");

    if line_idx > 0 {
        output.push_str(&format!(" {} | {}\n", line_num - 1, lines[line_idx - 1]));
    }

    output.push_str(&format!(" {} | {}\n", line_num, lines[line_idx]));
    output.push_str(&format!("   | {}^ {}\n", " ".repeat(span.col.saturating_sub(1)), error_msg));

    if line_idx + 1 < lines.len() {
        output.push_str(&format!(" {} | {}\n", line_num + 1, lines[line_idx + 1]));
    }

    output.push_str("   |");
    output
}
