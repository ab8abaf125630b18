//! Route predicates.
//!
//! # Responsibilities
//! - Compile path patterns with `:name` placeholders into anchored regexes
//! - Match request attributes against one or more alternative patterns
//! - Report captured placeholder values on a match
//!
//! # Design Decisions
//! - Patterns are compiled once, when the route is registered
//! - Keys of an attribute map are AND-combined, alternatives OR-combined
//! - A missing attribute never matches

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::http::request::Request;

/// Placeholder values captured by a successful match.
pub type Captures = Vec<(String, String)>;

/// A compiled pattern with its placeholder names.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compiles a literal pattern in which `:name` tokens capture one path
    /// segment (`[^/]+`).
    ///
    /// ```
    /// # use lantern::routing::matcher::Pattern;
    /// let p = Pattern::compile("/controller/:action/:id").unwrap();
    /// assert_eq!(p.as_regex().as_str(), r"^/controller/(?P<action>[^/]+)/(?P<id>[^/]+)$");
    /// ```
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut source = String::from("^");
        let mut rest = pattern;

        while let Some(idx) = rest.find(':') {
            let (literal, tail) = rest.split_at(idx);
            let name_len = placeholder_len(&tail[1..]);

            source.push_str(&regex::escape(literal));
            if name_len == 0 {
                source.push_str(&regex::escape(":"));
            } else {
                source.push_str(&format!("(?P<{}>[^/]+)", &tail[1..=name_len]));
            }
            rest = &tail[1 + name_len..];
        }
        source.push_str(&regex::escape(rest));
        source.push('$');

        Ok(Self {
            regex: Regex::new(&source)?,
        })
    }

    /// Wraps an existing regex; its named groups become captures.
    pub fn from_regex(regex: Regex) -> Self {
        Self { regex }
    }

    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }

    pub fn captures(&self, value: &str) -> Option<Captures> {
        let caps = self.regex.captures(value)?;
        Some(
            self.regex
                .capture_names()
                .flatten()
                .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
                .collect(),
        )
    }
}

/// Length of the identifier at the start of `s`, 0 if there is none.
fn placeholder_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// A rule's predicate.
#[derive(Clone)]
pub enum Matcher {
    /// Pattern checked against the request path.
    Path(Pattern),
    /// Attribute name to alternative patterns.
    Attributes(Vec<(String, Vec<Pattern>)>),
    /// Arbitrary predicate; never captures.
    Predicate(Arc<dyn Fn(&Request) -> bool + Send + Sync>),
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Path(p) => f.debug_tuple("Path").field(&p.regex.as_str()).finish(),
            Matcher::Attributes(attrs) => {
                let mut map = f.debug_map();
                for (name, patterns) in attrs {
                    let sources: Vec<&str> = patterns.iter().map(|p| p.regex.as_str()).collect();
                    map.entry(name, &sources);
                }
                map.finish()
            }
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl Matcher {
    pub fn path(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Matcher::Path(Pattern::compile(pattern)?))
    }

    pub fn regex(regex: Regex) -> Self {
        Matcher::Path(Pattern::from_regex(regex))
    }

    /// Builds an attribute map, e.g. `[("host", &["a.com", "b.com"]), ("path", &["/x"])]`.
    pub fn attributes(attrs: &[(&str, &[&str])]) -> Result<Self, regex::Error> {
        let mut compiled = Vec::with_capacity(attrs.len());
        for (name, alternatives) in attrs {
            let patterns = alternatives
                .iter()
                .map(|p| Pattern::compile(p))
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push((name.to_string(), patterns));
        }
        Ok(Matcher::Attributes(compiled))
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(f))
    }

    /// Returns the captured placeholders when the request matches.
    pub fn matches(&self, req: &Request) -> Option<Captures> {
        match self {
            Matcher::Path(pattern) => pattern.captures(&req.path),
            Matcher::Attributes(attrs) => {
                let mut all = Captures::new();
                for (name, patterns) in attrs {
                    let value = req.attribute(name)?;
                    let caps = patterns.iter().find_map(|p| p.captures(&value))?;
                    all.extend(caps);
                }
                Some(all)
            }
            Matcher::Predicate(f) => f(req).then(Captures::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{Method, RequestBuilder};

    fn get(path: &str) -> Request {
        RequestBuilder::new()
            .method(Method::GET)
            .path(path)
            .header("Host", "api.example.com:8080")
            .build()
            .unwrap()
    }

    #[test]
    fn test_literal_pattern_escapes_regex_syntax() {
        let p = Pattern::compile("/a.b/(c)").unwrap();
        assert!(p.captures("/a.b/(c)").is_some());
        assert!(p.captures("/aXb/(c)").is_none());
    }

    #[test]
    fn test_lone_colon_is_literal() {
        let p = Pattern::compile("/time/12:30").unwrap();
        assert!(p.captures("/time/12:30").is_some());

        let p = Pattern::compile("/a:/b").unwrap();
        assert!(p.captures("/a:/b").is_some());
    }

    #[test]
    fn test_placeholders_capture_segments() {
        let p = Pattern::compile("/controller/:action/:id").unwrap();
        let caps = p.captures("/controller/show/16").unwrap();
        assert_eq!(
            caps,
            vec![("action".to_string(), "show".to_string()), ("id".to_string(), "16".to_string())]
        );
        assert!(p.captures("/controller").is_none());
        assert!(p.captures("/controller/show/16/extra").is_none());
    }

    #[test]
    fn test_attribute_map_and_or() {
        let m = Matcher::attributes(&[
            ("host", &["www.example.com", ":sub.example.com"][..]),
            ("path", &["/v1/:resource"][..]),
        ])
        .unwrap();

        let caps = m.matches(&get("/v1/users")).unwrap();
        assert!(caps.contains(&("sub".to_string(), "api".to_string())));
        assert!(caps.contains(&("resource".to_string(), "users".to_string())));

        assert!(m.matches(&get("/v2/users")).is_none());
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let m = Matcher::attributes(&[("X-Tenant", &["acme"][..])]).unwrap();
        assert!(m.matches(&get("/")).is_none());
    }

    #[test]
    fn test_regex_named_groups() {
        let m = Matcher::regex(Regex::new(r"^/posts/(?P<year>\d{4})$").unwrap());
        assert_eq!(
            m.matches(&get("/posts/2024")),
            Some(vec![("year".to_string(), "2024".to_string())])
        );
        assert!(m.matches(&get("/posts/abc")).is_none());
    }

    #[test]
    fn test_predicate() {
        let m = Matcher::predicate(|req| req.port() == Some(8080));
        assert_eq!(m.matches(&get("/")), Some(vec![]));
    }
}
