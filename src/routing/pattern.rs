//! Path template compilation and matching.
//!
//! # Grammar
//! ```text
//! /users/:id            named parameter, one segment
//! /users/:id?           optional parameter (leading '/' optional too)
//! /files/:name.:ext     '.'-prefixed parameter stops at '/' and '.'
//! /posts/:id(\d+)       custom parameter pattern (no capture groups)
//! /assets/*             wildcard, captured positionally as "0", "1", ...
//! ["/a", "/b"]          alternation
//! Regex                 raw expression anchored at the path start
//! ```
//!
//! # Design Decisions
//! - Templates compile once at registration; a bad template is a
//!   `RegistrationError`, never a dispatch-time failure
//! - `/` (prefix mode) and `*` skip the regex entirely
//! - Matching returns the captured values instead of storing them on the
//!   layer, so a pattern can be shared by concurrent dispatches

use std::fmt;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::{RegistrationError, RouteError};
use crate::routing::params::Params;

/// A path template as accepted by the registration methods.
#[derive(Debug, Clone)]
pub enum PathTemplate {
    Path(String),
    Many(Vec<PathTemplate>),
    Regex(Regex),
}

impl From<&str> for PathTemplate {
    fn from(path: &str) -> Self {
        PathTemplate::Path(path.to_string())
    }
}

impl From<String> for PathTemplate {
    fn from(path: String) -> Self {
        PathTemplate::Path(path)
    }
}

impl From<&String> for PathTemplate {
    fn from(path: &String) -> Self {
        PathTemplate::Path(path.clone())
    }
}

impl From<Regex> for PathTemplate {
    fn from(regex: Regex) -> Self {
        PathTemplate::Regex(regex)
    }
}

impl<T: Into<PathTemplate>> From<Vec<T>> for PathTemplate {
    fn from(list: Vec<T>) -> Self {
        PathTemplate::Many(list.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PathTemplate>, const N: usize> From<[T; N]> for PathTemplate {
    fn from(list: [T; N]) -> Self {
        PathTemplate::Many(list.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathTemplate::Path(path) => write!(f, "{}", path),
            PathTemplate::Many(list) => {
                write!(f, "[")?;
                for (i, template) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", template)?;
                }
                write!(f, "]")
            }
            PathTemplate::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Flags that shape how a template compiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    /// Literal segments compare case-sensitively.
    pub sensitive: bool,
    /// A trailing slash is significant.
    pub strict: bool,
    /// The template must consume the whole path (otherwise prefix match).
    pub end: bool,
}

/// Result of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// The matched prefix of the path.
    pub path: String,
    /// Decoded parameter values.
    pub params: Params,
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    matcher: Matcher,
    keys: Vec<String>,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Prefix-mode `/`: everything matches, nothing is consumed.
    Slash,
    /// `*`: everything matches, the whole path is parameter `0`.
    Star,
    Regex { regex: Regex, groups: Vec<Group> },
}

/// Role of each capture group, in group order.
#[derive(Debug, Clone, Copy)]
enum Group {
    Path,
    Param(usize),
}

impl PathPattern {
    /// Compile `template` under `options`.
    pub fn compile(
        template: &PathTemplate,
        options: PatternOptions,
    ) -> Result<Self, RegistrationError> {
        if let PathTemplate::Path(path) = template {
            if path == "*" {
                return Ok(Self {
                    matcher: Matcher::Star,
                    keys: vec!["0".to_string()],
                });
            }
            if !options.end && (path.is_empty() || path == "/") {
                return Ok(Self {
                    matcher: Matcher::Slash,
                    keys: Vec::new(),
                });
            }
        }

        let mut builder = Builder::default();
        let fragment = builder.fragment(template, options)?;
        let source = if options.sensitive {
            fragment
        } else {
            format!("(?i){}", fragment)
        };
        let regex = Regex::new(&source)
            .map_err(|e| invalid(&template.to_string(), e.to_string()))?;

        Ok(Self {
            matcher: Matcher::Regex {
                regex,
                groups: builder.groups,
            },
            keys: builder.keys,
        })
    }

    /// Parameter names in declaration order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Match `path`, returning the matched prefix and decoded parameters.
    ///
    /// A parameter that fails to decode fails the whole match with
    /// `RouteError::MalformedParam`.
    pub fn match_path(&self, path: &str) -> Result<Option<PathMatch>, RouteError> {
        match &self.matcher {
            Matcher::Slash => Ok(Some(PathMatch {
                path: String::new(),
                params: Params::new(),
            })),
            Matcher::Star => {
                let mut params = Params::new();
                params.insert_raw("0".to_string(), Some(decode_param(path)?));
                Ok(Some(PathMatch {
                    path: path.to_string(),
                    params,
                }))
            }
            Matcher::Regex { regex, groups } => {
                let Some(caps) = regex.captures(path) else {
                    return Ok(None);
                };

                let mut matched: Option<String> = None;
                let mut params = Params::new();
                for (index, group) in groups.iter().enumerate() {
                    let capture = caps.get(index + 1);
                    match group {
                        Group::Path => {
                            if matched.is_none() {
                                matched = capture.map(|m| m.as_str().to_string());
                            }
                        }
                        Group::Param(key) => {
                            let name = &self.keys[*key];
                            let value = capture.map(|m| decode_param(m.as_str())).transpose()?;
                            if value.is_some() || !params.contains(name) {
                                params.insert_raw(name.clone(), value);
                            }
                        }
                    }
                }

                Ok(Some(PathMatch {
                    path: matched.unwrap_or_default(),
                    params,
                }))
            }
        }
    }
}

#[derive(Default)]
struct Builder {
    keys: Vec<String>,
    groups: Vec<Group>,
    positional: usize,
}

impl Builder {
    fn fragment(
        &mut self,
        template: &PathTemplate,
        options: PatternOptions,
    ) -> Result<String, RegistrationError> {
        match template {
            PathTemplate::Path(path) => self.path(path, options),
            PathTemplate::Many(list) => {
                if list.is_empty() {
                    return Err(invalid("[]", "empty template list".to_string()));
                }
                let mut parts = Vec::with_capacity(list.len());
                for template in list {
                    parts.push(self.fragment(template, options)?);
                }
                Ok(format!("(?:{})", parts.join("|")))
            }
            PathTemplate::Regex(regex) => {
                self.groups.push(Group::Path);
                for name in regex.capture_names().skip(1) {
                    let key = match name {
                        Some(name) => name.to_string(),
                        None => self.next_positional(),
                    };
                    self.push_param(key);
                }
                Ok(format!("^((?-i:{}))", regex.as_str()))
            }
        }
    }

    fn path(&mut self, path: &str, options: PatternOptions) -> Result<String, RegistrationError> {
        self.groups.push(Group::Path);

        let chars: Vec<char> = path.chars().collect();
        let mut body = String::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                ':' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && is_name_char(chars[end]) {
                        end += 1;
                    }
                    if end == start {
                        literal.push(':');
                        i += 1;
                        continue;
                    }
                    let name: String = chars[start..end].iter().collect();

                    let mut next = end;
                    let custom = if chars.get(next) == Some(&'(') {
                        let close = find_group_end(&chars, next).ok_or_else(|| {
                            invalid(path, format!("unterminated pattern for parameter '{}'", name))
                        })?;
                        let pattern: String = chars[next + 1..close].iter().collect();
                        validate_custom(path, &name, &pattern)?;
                        next = close + 1;
                        Some(pattern)
                    } else {
                        None
                    };

                    let optional = chars.get(next) == Some(&'?');
                    if optional {
                        next += 1;
                    }

                    // A '/' or '.' right before the parameter belongs to it.
                    let format = literal.ends_with('.');
                    if format {
                        literal.pop();
                    }
                    let slash = literal.ends_with('/');
                    if slash {
                        literal.pop();
                    }
                    body.push_str(&regex::escape(&literal));
                    literal.clear();

                    let capture = match custom {
                        Some(pattern) => pattern,
                        None if format => "[^/.]+?".to_string(),
                        None => "[^/]+?".to_string(),
                    };
                    let slash = if slash { "/" } else { "" };
                    let format = if format { "\\." } else { "" };
                    if optional {
                        body.push_str(&format!("(?:{}{}({}))?", slash, format, capture));
                    } else {
                        body.push_str(&format!("{}(?:{}({}))", slash, format, capture));
                    }
                    self.push_param(name);
                    i = next;
                }
                '*' => {
                    body.push_str(&regex::escape(&literal));
                    literal.clear();
                    body.push_str("(.*)");
                    let key = self.next_positional();
                    self.push_param(key);
                    i += 1;
                }
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        body.push_str(&regex::escape(&literal));

        if !options.strict {
            if path.ends_with('/') {
                body.push('?');
            } else {
                body.push_str("/?");
            }
        }

        // A non-strict prefix always ends on a segment boundary, even when the
        // template itself ends in '/'.
        let terminator = if options.end {
            "$"
        } else if options.strict && path.ends_with('/') {
            ""
        } else {
            "(?:/|$)"
        };

        Ok(format!("^({}){}", body, terminator))
    }

    fn push_param(&mut self, name: String) {
        self.groups.push(Group::Param(self.keys.len()));
        self.keys.push(name);
    }

    fn next_positional(&mut self) -> String {
        let name = self.positional.to_string();
        self.positional += 1;
        name
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Index of the `)` closing the group opened at `open`.
fn find_group_end(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn validate_custom(template: &str, name: &str, pattern: &str) -> Result<(), RegistrationError> {
    let regex = Regex::new(pattern).map_err(|e| {
        invalid(template, format!("bad pattern for parameter '{}': {}", name, e))
    })?;
    if regex.captures_len() > 1 {
        return Err(invalid(
            template,
            format!("pattern for parameter '{}' must not contain capture groups", name),
        ));
    }
    Ok(())
}

fn invalid(template: &str, reason: String) -> RegistrationError {
    RegistrationError::InvalidTemplate {
        template: template.to_string(),
        reason,
    }
}

/// Percent-decode a captured value.
///
/// Stricter than `percent_decode_str`: a `%` must be followed by two hex
/// digits and the result must be valid UTF-8.
pub(crate) fn decode_param(value: &str) -> Result<String, RouteError> {
    if value.is_empty() {
        return Ok(String::new());
    }

    let malformed = || RouteError::MalformedParam {
        value: value.to_string(),
    };

    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return Err(malformed());
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| malformed())
}
