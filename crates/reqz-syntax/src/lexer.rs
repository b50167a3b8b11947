use crate::ast::VarRef;
use crate::error::{LexError, Span};
use crate::reader;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static KEYWORDS: Lazy<HashMap<&'static str, Token>> = Lazy::new(|| {
    let mut m = HashMap::with_capacity(4);
    m.insert("true", Token::True);
    m.insert("false", Token::False);
    m.insert("null", Token::Null);
    m.insert("undefined", Token::Undefined);
    m
});

/// Raw piece of a backtick template, resolved by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePiece {
    Text(String),
    /// Source of a `${ … }` placeholder.
    Expr(String),
    /// Source of a `{{ … }}` placeholder.
    Var(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    True,
    False,
    Null,
    Undefined,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Dot,
    Comma,
    Colon,
    Identifier(String),
    String(String),
    Number(f64),
    Interpolation(VarRef),
    Template(Vec<TemplatePiece>),
}

impl Token {
    pub fn display_name(&self) -> String {
        match self {
            Token::True => "keyword 'true'".to_string(),
            Token::False => "keyword 'false'".to_string(),
            Token::Null => "keyword 'null'".to_string(),
            Token::Undefined => "keyword 'undefined'".to_string(),
            Token::LeftBrace => "'{'".to_string(),
            Token::RightBrace => "'}'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Identifier(s) => format!("'{}'", s),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Number(n) => format!("number {}", n),
            Token::Interpolation(v) => format!("'{{{{{}}}}}'", v.dotted()),
            Token::Template(_) => "template string".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

/// Tokenizes an object, array or value expression. Whitespace, newlines and
/// `#` / `//` comments are skipped.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    let mut tokens = Vec::with_capacity(input.len() / 4);
    let mut chars = input.chars().peekable();

    let mut line = 1;
    let mut col = 1;
    let mut offset = 0;

    let bump = |ch: char, line: &mut usize, col: &mut usize, offset: &mut usize| {
        if ch == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
        *offset += ch.len_utf8();
    };

    macro_rules! single {
        ($ch:expr, $token:expr, $sl:expr, $sc:expr, $so:expr) => {{
            chars.next();
            bump($ch, &mut line, &mut col, &mut offset);
            tokens.push(SpannedToken { token: $token, span: Span::new($sl, $sc, $so, offset) });
        }};
    }

    while let Some(&ch) = chars.peek() {
        let start_line = line;
        let start_col = col;
        let start_offset = offset;

        match ch {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);
            }

            '#' => {
                while let Some(&ch) = chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    chars.next();
                    bump(ch, &mut line, &mut col, &mut offset);
                }
            }

            '/' => {
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);
                if chars.peek() != Some(&'/') {
                    return Err(LexError::UnexpectedChar {
                        ch: '/',
                        span: Span::new(start_line, start_col, start_offset, offset),
                    });
                }
                while let Some(&ch) = chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    chars.next();
                    bump(ch, &mut line, &mut col, &mut offset);
                }
            }

            '"' | '\'' => {
                let quote = ch;
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);

                let mut string = String::new();
                let mut closed = false;

                while let Some(&ch) = chars.peek() {
                    chars.next();
                    bump(ch, &mut line, &mut col, &mut offset);
                    if ch == '\\' {
                        let Some(&esc) = chars.peek() else { break };
                        chars.next();
                        bump(esc, &mut line, &mut col, &mut offset);
                        let decoded =
                            unescape_char(esc, &mut chars, &mut |c| bump(c, &mut line, &mut col, &mut offset));
                        let Some(decoded) = decoded else {
                            return Err(LexError::InvalidEscape {
                                ch: esc,
                                span: Span::new(line, col, offset, offset),
                            });
                        };
                        string.push(decoded);
                    } else if ch == quote {
                        closed = true;
                        break;
                    } else {
                        string.push(ch);
                    }
                }

                if !closed {
                    return Err(LexError::UnterminatedString {
                        span: Span::new(start_line, start_col, start_offset, offset),
                    });
                }

                tokens.push(SpannedToken {
                    token: Token::String(string),
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }

            '`' => {
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);

                let mut pieces = Vec::new();
                let mut text = String::new();
                let mut closed = false;

                while let Some(&ch) = chars.peek() {
                    chars.next();
                    bump(ch, &mut line, &mut col, &mut offset);
                    match ch {
                        '`' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some(&esc) = chars.peek() {
                                chars.next();
                                bump(esc, &mut line, &mut col, &mut offset);
                                let decoded = unescape_char(esc, &mut chars, &mut |c| {
                                    bump(c, &mut line, &mut col, &mut offset)
                                });
                                text.push(decoded.unwrap_or(esc));
                            }
                        }
                        '$' if chars.peek() == Some(&'{') => {
                            chars.next();
                            bump('{', &mut line, &mut col, &mut offset);
                            let source = take_until(&mut chars, "}", &mut |c| {
                                bump(c, &mut line, &mut col, &mut offset)
                            });
                            let Some(source) = source else { break };
                            if !text.is_empty() {
                                pieces.push(TemplatePiece::Text(std::mem::take(&mut text)));
                            }
                            pieces.push(TemplatePiece::Expr(source));
                        }
                        '{' if chars.peek() == Some(&'{') => {
                            chars.next();
                            bump('{', &mut line, &mut col, &mut offset);
                            let source = take_until(&mut chars, "}}", &mut |c| {
                                bump(c, &mut line, &mut col, &mut offset)
                            });
                            let Some(source) = source else { break };
                            if !text.is_empty() {
                                pieces.push(TemplatePiece::Text(std::mem::take(&mut text)));
                            }
                            pieces.push(TemplatePiece::Var(source));
                        }
                        other => text.push(other),
                    }
                }

                if !closed {
                    return Err(LexError::UnterminatedTemplate {
                        span: Span::new(start_line, start_col, start_offset, offset),
                    });
                }
                if !text.is_empty() || pieces.is_empty() {
                    pieces.push(TemplatePiece::Text(text));
                }

                tokens.push(SpannedToken {
                    token: Token::Template(pieces),
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }

            '0'..='9' | '-' | '+' => {
                let mut num_str = String::new();
                num_str.push(ch);
                chars.next();
                bump(ch, &mut line, &mut col, &mut offset);

                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' {
                        num_str.push(ch);
                        chars.next();
                        bump(ch, &mut line, &mut col, &mut offset);
                    } else {
                        break;
                    }
                }

                let num = num_str.parse::<f64>().map_err(|_| LexError::InvalidNumber {
                    text: num_str,
                    span: Span::new(start_line, start_col, start_offset, offset),
                })?;

                tokens.push(SpannedToken {
                    token: Token::Number(num),
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }

            '{' => {
                let rest = &input[offset..];
                let interpolation = rest
                    .strip_prefix("{{")
                    .and_then(|inner| inner.find("}}").map(|end| (end, &inner[..end])))
                    .and_then(|(end, inner)| match reader::parse_var_ref(inner) {
                        Ok(Some(var)) => Some((end + 4, var)),
                        _ => None,
                    });

                match interpolation {
                    Some((len, var)) => {
                        for c in rest[..len].chars() {
                            chars.next();
                            bump(c, &mut line, &mut col, &mut offset);
                        }
                        tokens.push(SpannedToken {
                            token: Token::Interpolation(var),
                            span: Span::new(start_line, start_col, start_offset, offset),
                        });
                    }
                    None => single!(ch, Token::LeftBrace, start_line, start_col, start_offset),
                }
            }
            '}' => single!(ch, Token::RightBrace, start_line, start_col, start_offset),
            '[' => single!(ch, Token::LeftBracket, start_line, start_col, start_offset),
            ']' => single!(ch, Token::RightBracket, start_line, start_col, start_offset),
            '.' => single!(ch, Token::Dot, start_line, start_col, start_offset),
            ',' => single!(ch, Token::Comma, start_line, start_col, start_offset),
            ':' => single!(ch, Token::Colon, start_line, start_col, start_offset),

            ch if is_ident_start(ch) => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if is_ident_char(ch) {
                        ident.push(ch);
                        chars.next();
                        bump(ch, &mut line, &mut col, &mut offset);
                    } else {
                        break;
                    }
                }

                let token = KEYWORDS
                    .get(ident.as_str())
                    .cloned()
                    .unwrap_or(Token::Identifier(ident));

                tokens.push(SpannedToken {
                    token,
                    span: Span::new(start_line, start_col, start_offset, offset),
                });
            }

            _ => {
                return Err(LexError::UnexpectedChar {
                    ch,
                    span: Span::single(start_line, start_col, start_offset),
                });
            }
        }
    }

    Ok(tokens)
}

/// Consumes characters up to and including `terminator`, returning what came
/// before it. `None` when the input ends first.
fn take_until<I>(
    chars: &mut std::iter::Peekable<I>,
    terminator: &str,
    bump: &mut impl FnMut(char),
) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        bump(ch);
        out.push(ch);
        if out.ends_with(terminator) {
            out.truncate(out.len() - terminator.len());
            return Some(out);
        }
    }
    None
}

/// Decodes the escape introduced by `esc`, reading the four hex digits of
/// `\u` from `chars`. `None` for an unknown escape.
fn unescape_char<I>(esc: char, chars: &mut std::iter::Peekable<I>, bump: &mut impl FnMut(char)) -> Option<char>
where
    I: Iterator<Item = char>,
{
    match esc {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        '0' => Some('\0'),
        '\\' | '"' | '\'' | '/' | '`' => Some(esc),
        'u' => {
            let mut hex = String::with_capacity(4);
            while hex.len() < 4 {
                let ch = chars.next_if(char::is_ascii_hexdigit)?;
                bump(ch);
                hex.push(ch);
            }
            u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_tokenize_object() {
        assert_eq!(
            kinds("{ a: 1, 'b': true }"),
            vec![
                Token::LeftBrace,
                Token::Identifier("a".into()),
                Token::Colon,
                Token::Number(1.0),
                Token::Comma,
                Token::String("b".into()),
                Token::Colon,
                Token::True,
                Token::RightBrace,
            ]
        );
    }

    #[test]
    fn test_interpolation_vs_nested_brace() {
        let toks = kinds("{ id: {{user.id|trim}} }");
        assert!(matches!(&toks[3], Token::Interpolation(v) if v.dotted() == "user.id"));
    }

    #[test]
    fn test_comments_are_skipped() {
        let toks = kinds("[1, # first\n 2 // second\n]");
        assert_eq!(toks.len(), 5);
    }

    #[test]
    fn test_template_pieces() {
        let toks = kinds("`Hello ${name}, {{id}}!`");
        assert_eq!(
            toks[0],
            Token::Template(vec![
                TemplatePiece::Text("Hello ".into()),
                TemplatePiece::Expr("name".into()),
                TemplatePiece::Text(", ".into()),
                TemplatePiece::Var("id".into()),
                TemplatePiece::Text("!".into()),
            ])
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(tokenize("\"abc"), Err(LexError::UnterminatedString { .. })));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""\u0041\b\f\0""#), vec![Token::String("A\u{8}\u{c}\0".into())]);
        assert_eq!(kinds(r#"'café \'x\''"#), vec![Token::String("café 'x'".into())]);
        assert_eq!(
            kinds(r"`\u0042${a}`"),
            vec![Token::Template(vec![TemplatePiece::Text("B".into()), TemplatePiece::Expr("a".into())])]
        );
        assert!(matches!(tokenize(r#""\q""#), Err(LexError::InvalidEscape { ch: 'q', .. })));
        assert!(matches!(tokenize(r#""\u00zz""#), Err(LexError::InvalidEscape { ch: 'u', .. })));
    }

    #[test]
    fn test_identifiers_stop_at_hyphen() {
        assert_eq!(kinds("[a-1]")[1], Token::Identifier("a".into()));
        assert!(matches!(tokenize("{ a-b: 1 }"), Err(LexError::InvalidNumber { .. })));
    }

    #[test]
    fn test_position_tracking() {
        let tokens = tokenize("[\n  x]").unwrap();
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.col, 3);
    }
}
