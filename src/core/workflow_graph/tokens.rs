//! Reference tokens embedded in authoring strings.
//!
//! Three families share one syntax: `@fixture/<slug>`, `@selector/<id>` and
//! `@seed/<key>`, each optionally followed by an argument list
//! `(k1=v1, k2="v 2", k3='v3')`. This module scans strings for tokens, parses
//! argument lists, binds arguments against declared parameters with type
//! coercion, and computes "did you mean" suggestions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

static FIXTURE_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@fixture/([A-Za-z0-9_.\-/]+)?").unwrap());

static SELECTOR_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@selector/([A-Za-z0-9_.\-]+)?").unwrap());

static SEED_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@seed/([A-Za-z0-9_.\-]+)?").unwrap());

const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Fixture,
    Selector,
    Seed,
}

impl TokenKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            TokenKind::Fixture => "@fixture/",
            TokenKind::Selector => "@selector/",
            TokenKind::Seed => "@seed/",
        }
    }

    fn head(&self) -> &'static Regex {
        match self {
            TokenKind::Fixture => &FIXTURE_HEAD,
            TokenKind::Selector => &SELECTOR_HEAD,
            TokenKind::Seed => &SEED_HEAD,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Fixture => write!(f, "fixture"),
            TokenKind::Selector => write!(f, "selector"),
            TokenKind::Seed => write!(f, "seed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenSyntaxError {
    #[error("missing identifier after `{0}`")]
    MissingId(&'static str),
    #[error("argument list is not closed with `)`")]
    UnterminatedArgs,
    #[error("argument `{0}` is missing `=`")]
    MissingEquals(String),
    #[error("argument name is empty")]
    EmptyKey,
    #[error("quoted value for `{0}` is not terminated")]
    UnterminatedQuote(String),
    #[error("argument `{0}` is given more than once")]
    DuplicateArg(String),
    #[error("unexpected `{found}` after the value of `{key}`")]
    UnexpectedCharacter { key: String, found: char },
    #[error("`{0}` is not a single token")]
    TrailingText(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenArg {
    pub key: String,
    pub value: String,
}

/// A parsed token and its byte span in the scanned string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRef {
    pub kind: TokenKind,
    pub id: String,
    pub args: Vec<TokenArg>,
    /// True when an argument list was written, even an empty one.
    pub has_args: bool,
    pub start: usize,
    pub end: usize,
}

/// A token that starts correctly but fails to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedToken {
    pub kind: TokenKind,
    pub raw: String,
    pub start: usize,
    pub end: usize,
    pub error: TokenSyntaxError,
}

pub type Scanned = Result<TokenRef, MalformedToken>;

/// All tokens of `kind` in `text`, left to right.
pub fn scan(text: &str, kind: TokenKind) -> Vec<Scanned> {
    let head = kind.head();
    let mut found = Vec::new();
    let mut position = 0;
    while position < text.len() {
        let Some(captures) = head.captures_at(text, position) else {
            break;
        };
        let Some(whole) = captures.get(0) else {
            break;
        };
        let start = whole.start();
        let mut end = whole.end();

        // A bare prefix matches without the id group.
        let Some(id) = captures.get(1).map(|id| id.as_str().to_string()) else {
            found.push(Err(MalformedToken {
                kind,
                raw: text[start..end].to_string(),
                start,
                end,
                error: TokenSyntaxError::MissingId(kind.prefix()),
            }));
            position = end.max(start + 1);
            continue;
        };

        if text[end..].starts_with('(') {
            match parse_args(text, end) {
                Ok((args, close)) => {
                    end = close;
                    found.push(Ok(TokenRef {
                        kind,
                        id,
                        args,
                        has_args: true,
                        start,
                        end,
                    }));
                }
                Err(error) => {
                    let stop = text[end..].find(')').map(|offset| end + offset + 1).unwrap_or(text.len());
                    found.push(Err(MalformedToken {
                        kind,
                        raw: text[start..stop].to_string(),
                        start,
                        end: stop,
                        error,
                    }));
                    end = stop;
                }
            }
        } else {
            found.push(Ok(TokenRef {
                kind,
                id,
                args: Vec::new(),
                has_args: false,
                start,
                end,
            }));
        }
        position = end;
    }
    found
}

/// Parse a string that must consist of exactly one token (surrounding whitespace allowed).
pub fn parse_exact(text: &str, kind: TokenKind) -> Result<TokenRef, TokenSyntaxError> {
    let trimmed = text.trim();
    let offset = text.len() - text.trim_start().len();
    let mut scanned = scan(trimmed, kind).into_iter();
    match scanned.next() {
        Some(Ok(token)) if token.start == 0 && token.end == trimmed.len() => Ok(TokenRef {
            start: token.start + offset,
            end: token.end + offset,
            ..token
        }),
        Some(Err(malformed)) if malformed.start == 0 => Err(malformed.error),
        _ => Err(TokenSyntaxError::TrailingText(trimmed.to_string())),
    }
}

/// Parse `(k=v, ...)` starting at the `(` at byte `open`. Returns the
/// arguments and the byte offset just past the closing `)`.
fn parse_args(text: &str, open: usize) -> Result<(Vec<TokenArg>, usize), TokenSyntaxError> {
    let mut chars = text[open + 1..].char_indices().peekable();
    let base = open + 1;
    let mut args: Vec<TokenArg> = Vec::new();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        match chars.peek().copied() {
            None => return Err(TokenSyntaxError::UnterminatedArgs),
            Some((index, ')')) => return Ok((args, base + index + 1)),
            _ => {}
        }

        let mut key = String::new();
        while let Some((_, c)) = chars.next_if(|(_, c)| !matches!(c, '=' | ',' | ')')) {
            key.push(c);
        }
        let key = key.trim().to_string();
        match chars.next() {
            Some((_, '=')) if key.is_empty() => return Err(TokenSyntaxError::EmptyKey),
            Some((_, '=')) => {}
            None => return Err(TokenSyntaxError::UnterminatedArgs),
            Some(_) if key.is_empty() => return Err(TokenSyntaxError::EmptyKey),
            Some(_) => return Err(TokenSyntaxError::MissingEquals(key)),
        }

        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let value = match chars.peek().copied() {
            Some((_, quote @ ('"' | '\''))) => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, c)) if c == quote => break,
                        Some((_, c)) => value.push(c),
                        None => return Err(TokenSyntaxError::UnterminatedQuote(key)),
                    }
                }
                value
            }
            _ => {
                let mut value = String::new();
                while let Some((_, c)) = chars.next_if(|(_, c)| !matches!(c, ',' | ')')) {
                    value.push(c);
                }
                value.trim().to_string()
            }
        };

        if args.iter().any(|arg| arg.key == key) {
            return Err(TokenSyntaxError::DuplicateArg(key));
        }
        args.push(TokenArg {
            key: key.clone(),
            value,
        });

        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        match chars.next() {
            Some((_, ',')) => continue,
            Some((index, ')')) => return Ok((args, base + index + 1)),
            Some((_, found)) => return Err(TokenSyntaxError::UnexpectedCharacter { key, found }),
            None => return Err(TokenSyntaxError::UnterminatedArgs),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
    Enum,
}

/// A declared parameter of a dynamic selector or a fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default, alias = "values")]
    pub enum_values: Vec<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoercionError {
    #[error("expected a number, got `{0}`")]
    NotANumber(String),
    #[error("expected a boolean (true/false, 1/0, yes/no), got `{0}`")]
    NotABoolean(String),
    #[error("`{value}` is not one of [{allowed}]")]
    NotInEnum { value: String, allowed: String },
}

/// Coerce a raw argument to its declared type and render it canonically.
pub fn coerce(spec: &ParamSpec, raw: &str) -> Result<String, CoercionError> {
    match spec.param_type {
        ParamType::String => Ok(raw.to_string()),
        ParamType::Number => {
            let trimmed = raw.trim();
            if let Ok(int) = trimmed.parse::<i64>() {
                return Ok(int.to_string());
            }
            match trimmed.parse::<f64>() {
                Ok(float) if float.is_finite() => Ok(format_number(float)),
                _ => Err(CoercionError::NotANumber(raw.to_string())),
            }
        }
        ParamType::Boolean => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok("true".to_string()),
            "false" | "0" | "no" => Ok("false".to_string()),
            _ => Err(CoercionError::NotABoolean(raw.to_string())),
        },
        ParamType::Enum => {
            let allowed: Vec<String> = spec.enum_values.iter().map(render_value).collect();
            if allowed.iter().any(|candidate| candidate == raw) {
                Ok(raw.to_string())
            } else {
                Err(CoercionError::NotInEnum {
                    value: raw.to_string(),
                    allowed: allowed.join(", "),
                })
            }
        }
    }
}

/// Integral values print without a fractional part.
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Render a JSON scalar the way it is substituted into strings.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_i64() {
            Some(int) => int.to_string(),
            None => number.as_f64().map(format_number).unwrap_or_else(|| number.to_string()),
        },
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingIssueKind {
    Missing,
    Unknown,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingIssue {
    pub kind: BindingIssueKind,
    pub param: String,
    pub message: String,
}

/// Bind token arguments to declared parameters.
///
/// Every declared parameter ends up in the returned map: supplied values and
/// defaults are coerced, optional parameters with neither bind to `""`.
/// Issues are reported for every missing, unknown or invalid argument.
pub fn bind_params(
    specs: &[ParamSpec],
    args: &[TokenArg],
) -> (BTreeMap<String, String>, Vec<BindingIssue>) {
    let mut bound = BTreeMap::new();
    let mut issues = Vec::new();

    for arg in args {
        if !specs.iter().any(|spec| spec.name == arg.key) {
            issues.push(BindingIssue {
                kind: BindingIssueKind::Unknown,
                param: arg.key.clone(),
                message: format!("unknown parameter `{}`", arg.key),
            });
        }
    }

    for spec in specs {
        let supplied = args.iter().find(|arg| arg.key == spec.name);
        let raw = match (supplied, &spec.default) {
            (Some(arg), _) => arg.value.clone(),
            (None, Some(default)) => render_value(default),
            (None, None) if spec.required => {
                issues.push(BindingIssue {
                    kind: BindingIssueKind::Missing,
                    param: spec.name.clone(),
                    message: format!("required parameter `{}` is missing", spec.name),
                });
                continue;
            }
            (None, None) => {
                bound.insert(spec.name.clone(), String::new());
                continue;
            }
        };
        match coerce(spec, &raw) {
            Ok(value) => {
                bound.insert(spec.name.clone(), value);
            }
            Err(err) => issues.push(BindingIssue {
                kind: BindingIssueKind::Invalid,
                param: spec.name.clone(),
                message: format!("parameter `{}`: {}", spec.name, err),
            }),
        }
    }

    (bound, issues)
}

/// Up to five known ids sharing the most segments with `target`.
pub fn suggest<'a, I>(target: &str, known: I, separators: &[char]) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let wanted: BTreeSet<&str> = segments(target, separators);
    let mut scored: Vec<(usize, &String)> = known
        .into_iter()
        .filter(|candidate| candidate.as_str() != target)
        .map(|candidate| {
            let shared = segments(candidate, separators).intersection(&wanted).count();
            (shared, candidate)
        })
        .filter(|(shared, _)| *shared > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, candidate)| candidate.clone())
        .collect()
}

fn segments<'s>(id: &'s str, separators: &[char]) -> BTreeSet<&'s str> {
    id.split(|c| separators.contains(&c))
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// "did you mean" hint text, or `None` without suggestions.
pub fn did_you_mean(suggestions: &[String]) -> Option<String> {
    if suggestions.is_empty() {
        None
    } else {
        Some(format!("did you mean: {}", suggestions.join(", ")))
    }
}
