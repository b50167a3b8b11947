use smallvec::SmallVec;
use std::fmt;

/// Path segments of a variable reference. Most references are one or two
/// segments deep (`id`, `$response.body`).
pub type VarPath = SmallVec<[String; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Undefined => write!(f, "undefined"),
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "{}", s),
        }
    }
}

/// `name.path?default|filter|filter`
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub path: VarPath,
    pub default: Option<Literal>,
    pub filters: Vec<String>,
}

impl VarRef {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            default: None,
            filters: Vec::new(),
        }
    }

    pub fn root(&self) -> &str {
        self.path.first().map(|s| s.as_str()).unwrap_or("")
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Var(VarRef),
}

/// Interpolated text. A template built from text without `{{` holds a single
/// [`TemplatePart::Text`].
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

impl Template {
    pub fn text(text: impl Into<String>) -> Self {
        Self { parts: vec![TemplatePart::Text(text.into())] }
    }

    pub fn is_plain(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, TemplatePart::Text(_)))
    }

    /// The reference when the template is exactly one `{{ … }}` marker.
    pub fn single_var(&self) -> Option<&VarRef> {
        match self.parts.as_slice() {
            [TemplatePart::Var(var)] => Some(var),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Name(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Name(n) => write!(f, "{}", n),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A chunk of a backtick template inside a data-construction expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChunk {
    Text(String),
    Expr(Expr),
}

/// Data-construction expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Path(Vec<PathSegment>),
    Var(VarRef),
    Template(Vec<TemplateChunk>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
}

impl Expr {
    /// Renders a path expression back to its dotted form for error messages.
    pub fn path_name(segments: &[PathSegment]) -> String {
        let mut out = String::new();
        for (i, seg) in segments.iter().enumerate() {
            match seg {
                PathSegment::Name(n) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(n);
                }
                PathSegment::Index(_) => out.push_str(&seg.to_string()),
            }
        }
        out
    }
}

/// Top-level evaluable produced by the expression readers.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Var(VarRef),
    Template(Template),
    Dynamic(Expr),
}

impl Expression {
    pub fn text(text: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(text.into()))
    }

    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::Template(t) => t.is_plain(),
            _ => false,
        }
    }
}
