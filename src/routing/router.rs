//! Rule-based dispatch.
//!
//! # Responsibilities
//! - Store compiled rules, newest first
//! - Run the first matching rule's handler, falling through to older
//!   matching rules while handlers decline
//! - Fall back to a default handler (403 unless configured)
//!
//! # Design Decisions
//! - The rule list is owned by a `Router` value shared read-only behind an
//!   `Arc` while serving; registration happens before the listener starts
//! - Placeholder captures are written into the request only once a rule has
//!   matched, and are rolled back if its handler declines

use async_trait::async_trait;
use tracing::debug;

use crate::http::request::{Param, Request};
use crate::http::response::Response;
use crate::routing::matcher::Matcher;

/// `Ok(None)` declines the request so that older rules get a chance.
pub type HandlerResult = anyhow::Result<Option<Response>>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: &Request) -> HandlerResult;
}

/// Adapts a synchronous closure into a [`Handler`].
pub struct FnHandler<F>(F);

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Request) -> HandlerResult + Send + Sync,
{
    FnHandler(f)
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request) -> HandlerResult + Send + Sync,
{
    async fn call(&self, req: &Request) -> HandlerResult {
        (self.0)(req)
    }
}

struct Rule {
    matcher: Matcher,
    handler: Box<dyn Handler>,
}

pub struct Router {
    rules: Vec<Rule>,
    default: Option<Box<dyn Handler>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: None,
        }
    }

    /// Registers a rule ahead of every existing one.
    pub fn route(&mut self, matcher: Matcher, handler: impl Handler + 'static) -> &mut Self {
        self.rules.insert(
            0,
            Rule {
                matcher,
                handler: Box::new(handler),
            },
        );
        self
    }

    /// Shorthand for a path-pattern rule with a closure handler.
    pub fn path<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, regex::Error>
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        let matcher = Matcher::path(pattern)?;
        Ok(self.route(matcher, handler_fn(f)))
    }

    /// Handler used when no rule produces a response.
    pub fn set_default(&mut self, handler: impl Handler + 'static) -> &mut Self {
        self.default = Some(Box::new(handler));
        self
    }

    /// Drops every rule and the default handler.
    pub fn reset(&mut self) {
        self.rules.clear();
        self.default = None;
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub async fn dispatch(&self, req: &mut Request) -> anyhow::Result<Response> {
        for (index, rule) in self.rules.iter().enumerate() {
            let Some(captures) = rule.matcher.matches(req) else {
                continue;
            };

            let previous: Vec<(String, Option<Param>)> = captures
                .into_iter()
                .map(|(name, value)| {
                    let old = req.params.insert(name.clone(), Param::Text(value));
                    (name, old)
                })
                .collect();

            debug!(rule = index, path = %req.path, "rule matched");

            if let Some(resp) = rule.handler.call(req).await? {
                return Ok(resp);
            }

            debug!(rule = index, path = %req.path, "handler declined, falling through");
            for (name, old) in previous.into_iter().rev() {
                match old {
                    Some(value) => req.params.insert(name, value),
                    None => req.params.remove(&name),
                };
            }
        }

        if let Some(default) = &self.default {
            if let Some(resp) = default.call(req).await? {
                return Ok(resp);
            }
        }

        debug!(path = %req.path, "no handler found");
        Ok(Response::forbidden("No handler found"))
    }
}

/// Joins two path pieces with exactly one `/` between them.
pub fn join_path(base: &str, segment: &str) -> String {
    let base = base.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    if segment.is_empty() {
        return if base.is_empty() { "/".to_string() } else { base.to_string() };
    }
    format!("{base}/{segment}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/static/", "/css/site.css"), "/static/css/site.css");
        assert_eq!(join_path("", "a"), "/a");
        assert_eq!(join_path("/", ""), "/");
        assert_eq!(join_path("/api", ""), "/api");
    }
}
