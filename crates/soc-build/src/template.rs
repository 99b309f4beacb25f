//! Minimal line-oriented template language for build artifacts.
//!
//! Two constructs are supported:
//!
//! ```text
//! {{ resource.name }},{{ resource.start | hex }}
//! {% for resource in resources %}
//! ...
//! {% endfor %}
//! ```
//!
//! Substitutions resolve a dotted path against the render context and may
//! apply the `hex` filter to integers. Loop tags must sit alone on their
//! line and iterate over a list value; a tag line produces no output.
//! Sources are dedented and stripped of leading and trailing blank lines
//! before parsing, so line numbers in errors count from the first non-blank
//! line.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use thiserror::Error;

/// Deepest permitted nesting of `for` blocks.
pub const MAX_LOOP_DEPTH: usize = 4;

/// A value reachable from a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Text, substituted verbatim.
    Str(String),
    /// Unsigned integer, substituted in decimal unless filtered.
    Int(u64),
    /// Sequence a `for` block can iterate.
    List(Vec<Value>),
    /// Named fields reached with `.` paths.
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a record from `(field, value)` pairs.
    pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Str(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Str(text)
    }
}

impl From<u64> for Value {
    fn from(number: u64) -> Self {
        Self::Int(number)
    }
}

impl From<u32> for Value {
    fn from(number: u32) -> Self {
        Self::Int(u64::from(number))
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Top-level variables available to a render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Why a template failed to parse or render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderErrorKind {
    /// `{{` without a closing `}}` on the same line.
    #[error("unterminated '{{{{' expression")]
    UnterminatedExpression,
    /// The text between `{{` and `}}` is not a path with an optional filter.
    #[error("malformed expression '{0}'")]
    MalformedExpression(String),
    /// A filter other than `hex`.
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
    /// A `{% ... %}` tag that is not a well-formed `for` or `endfor`, or
    /// that shares its line with other text.
    #[error("malformed block tag '{0}'")]
    MalformedTag(String),
    /// `endfor` with no open loop.
    #[error("'endfor' without a matching 'for'")]
    UnexpectedEndFor,
    /// A loop still open at the end of the template.
    #[error("'for' loop over '{0}' is never closed")]
    UnclosedFor(String),
    /// Loops nested deeper than [`MAX_LOOP_DEPTH`].
    #[error("loops nested deeper than {0} levels")]
    NestingTooDeep(usize),
    /// A path that resolves to nothing.
    #[error("undefined variable '{0}'")]
    Undefined(String),
    /// A loop over something other than a list.
    #[error("'{0}' is not a list")]
    NotAList(String),
    /// Substitution of a list or record.
    #[error("'{0}' cannot be rendered as text")]
    NotPrintable(String),
    /// `hex` applied to a non-integer.
    #[error("filter 'hex' needs an integer but '{0}' is not one")]
    NotAnInteger(String),
}

/// A parse or render failure, located by template identifier and line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (at {origin}:{line})")]
pub struct RenderError {
    /// Identifier of the failing template.
    pub origin: String,
    /// 1-based line within the dedented template.
    pub line: usize,
    /// What went wrong.
    pub kind: RenderErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path(Vec<String>);

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Hex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Expr { path: Path, filter: Option<Filter> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Line {
        line: usize,
        segments: Vec<Segment>,
    },
    For {
        line: usize,
        binding: String,
        list: Path,
        body: Vec<Node>,
    },
}

struct OpenLoop {
    line: usize,
    binding: String,
    list: Path,
    body: Vec<Node>,
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    origin: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parses `source`, naming it `origin` in errors.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] for malformed expressions or tags and for
    /// unbalanced or over-nested loops.
    pub fn parse(origin: impl Into<String>, source: &str) -> Result<Self, RenderError> {
        let origin = origin.into();
        let text = dedent(source);
        let mut nodes = Vec::new();
        let mut open: Vec<OpenLoop> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let fail = |kind| RenderError {
                origin: origin.clone(),
                line,
                kind,
            };
            let trimmed = raw.trim();

            if let Some(tag) = trimmed.strip_prefix("{%") {
                let body = tag
                    .strip_suffix("%}")
                    .ok_or_else(|| fail(RenderErrorKind::MalformedTag(trimmed.to_string())))?;
                let words: Vec<&str> = body.split_whitespace().collect();
                match words.as_slice() {
                    ["for", binding, "in", list] if is_identifier(binding) => {
                        if open.len() >= MAX_LOOP_DEPTH {
                            return Err(fail(RenderErrorKind::NestingTooDeep(MAX_LOOP_DEPTH)));
                        }
                        open.push(OpenLoop {
                            line,
                            binding: (*binding).to_string(),
                            list: parse_path(list).map_err(fail)?,
                            body: Vec::new(),
                        });
                    }
                    ["endfor"] => {
                        let closed = open
                            .pop()
                            .ok_or_else(|| fail(RenderErrorKind::UnexpectedEndFor))?;
                        let node = Node::For {
                            line: closed.line,
                            binding: closed.binding,
                            list: closed.list,
                            body: closed.body,
                        };
                        match open.last_mut() {
                            Some(parent) => parent.body.push(node),
                            None => nodes.push(node),
                        }
                    }
                    _ => return Err(fail(RenderErrorKind::MalformedTag(trimmed.to_string()))),
                }
                continue;
            }

            if raw.contains("{%") {
                return Err(fail(RenderErrorKind::MalformedTag(trimmed.to_string())));
            }
            let node = Node::Line {
                line,
                segments: parse_line(raw).map_err(fail)?,
            };
            match open.last_mut() {
                Some(parent) => parent.body.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(unclosed) = open.pop() {
            return Err(RenderError {
                origin,
                line: unclosed.line,
                kind: RenderErrorKind::UnclosedFor(unclosed.list.to_string()),
            });
        }
        Ok(Self { origin, nodes })
    }

    /// Identifier used in errors.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Renders against `context`. Every output line ends with `\n`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] for undefined references and for values of
    /// the wrong shape.
    pub fn render(&self, context: &Context) -> Result<String, RenderError> {
        let mut scope = Scope {
            root: context,
            bindings: Vec::new(),
        };
        let mut out = String::new();
        self.render_nodes(&self.nodes, &mut scope, &mut out)?;
        Ok(out)
    }

    fn render_nodes<'a>(
        &'a self,
        nodes: &'a [Node],
        scope: &mut Scope<'a>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Line { line, segments } => {
                    for segment in segments {
                        match segment {
                            Segment::Text(text) => out.push_str(text),
                            Segment::Expr { path, filter } => {
                                let value = scope.resolve(path).ok_or_else(|| {
                                    self.error(*line, RenderErrorKind::Undefined(path.to_string()))
                                })?;
                                write_value(out, value, *filter, path)
                                    .map_err(|kind| self.error(*line, kind))?;
                            }
                        }
                    }
                    out.push('\n');
                }
                Node::For {
                    line,
                    binding,
                    list,
                    body,
                } => {
                    let items = match scope.resolve(list) {
                        Some(Value::List(items)) => items,
                        Some(_) => {
                            let kind = RenderErrorKind::NotAList(list.to_string());
                            return Err(self.error(*line, kind));
                        }
                        None => {
                            let kind = RenderErrorKind::Undefined(list.to_string());
                            return Err(self.error(*line, kind));
                        }
                    };
                    for item in items {
                        scope.bindings.push((binding.as_str(), item));
                        let rendered = self.render_nodes(body, scope, out);
                        scope.bindings.pop();
                        rendered?;
                    }
                }
            }
        }
        Ok(())
    }

    fn error(&self, line: usize, kind: RenderErrorKind) -> RenderError {
        RenderError {
            origin: self.origin.clone(),
            line,
            kind,
        }
    }
}

struct Scope<'a> {
    root: &'a Context,
    bindings: Vec<(&'a str, &'a Value)>,
}

impl<'a> Scope<'a> {
    fn resolve(&self, path: &Path) -> Option<&'a Value> {
        let (head, fields) = path.0.split_first()?;
        let mut value = self
            .bindings
            .iter()
            .rev()
            .find(|(name, _)| *name == head.as_str())
            .map(|(_, value)| *value)
            .or_else(|| self.root.get(head))?;
        for field in fields {
            value = match value {
                Value::Record(record) => record.get(field)?,
                _ => return None,
            };
        }
        Some(value)
    }
}

fn write_value(
    out: &mut String,
    value: &Value,
    filter: Option<Filter>,
    path: &Path,
) -> Result<(), RenderErrorKind> {
    match (value, filter) {
        (Value::Str(text), None) => out.push_str(text),
        (Value::Int(number), None) => {
            let _ = write!(out, "{number}");
        }
        (Value::Int(number), Some(Filter::Hex)) => {
            let _ = write!(out, "{number:#x}");
        }
        (Value::Str(_), Some(Filter::Hex)) => {
            return Err(RenderErrorKind::NotAnInteger(path.to_string()))
        }
        (Value::List(_) | Value::Record(_), _) => {
            return Err(RenderErrorKind::NotPrintable(path.to_string()))
        }
    }
    Ok(())
}

fn parse_line(raw: &str) -> Result<Vec<Segment>, RenderErrorKind> {
    let mut segments = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        let after = &rest[open + 2..];
        let close = after
            .find("}}")
            .ok_or(RenderErrorKind::UnterminatedExpression)?;
        segments.push(parse_expression(&after[..close])?);
        rest = &after[close + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

fn parse_expression(inner: &str) -> Result<Segment, RenderErrorKind> {
    let mut parts = inner.split('|');
    let path = parse_path(parts.next().unwrap_or_default().trim())?;
    let filter = match parts.next().map(str::trim) {
        None => None,
        Some("hex") => Some(Filter::Hex),
        Some(other) => return Err(RenderErrorKind::UnknownFilter(other.to_string())),
    };
    if parts.next().is_some() {
        return Err(RenderErrorKind::MalformedExpression(inner.trim().to_string()));
    }
    Ok(Segment::Expr { path, filter })
}

fn parse_path(text: &str) -> Result<Path, RenderErrorKind> {
    let fields: Vec<String> = text.split('.').map(str::to_string).collect();
    if fields.iter().all(|field| is_identifier(field)) {
        Ok(Path(fields))
    } else {
        Err(RenderErrorKind::MalformedExpression(text.to_string()))
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Removes common indentation and surrounding blank lines.
///
/// Only a leading whitespace prefix shared verbatim by every non-blank line
/// is removed.
fn dedent(source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let is_blank = |line: &&str| line.trim().is_empty();
    let Some(first) = lines.iter().position(|line| !is_blank(line)) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !is_blank(line))
        .unwrap_or(first);
    let body = &lines[first..=last];
    let margin = body
        .iter()
        .filter(|line| !is_blank(line))
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .reduce(common_prefix)
        .unwrap_or_default();
    body.iter()
        .map(|line| line.strip_prefix(margin).unwrap_or(line).trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(left: &'a str, right: &str) -> &'a str {
    let end = left
        .char_indices()
        .zip(right.chars())
        .find(|((_, l), r)| l != r)
        .map_or_else(|| left.len().min(right.len()), |((index, _), _)| index);
    &left[..end]
}
