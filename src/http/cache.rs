//! Conditional-request negotiation.
//!
//! A resource is validated either by a concrete etag or, when none is
//! available, by an *expiry etag* `<mtime>-<expiry>` (both Unix seconds)
//! which stays valid until its expiry passes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::CacheConfig;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

/// Longest freshness lifetime ever advertised (one year).
pub const MAX_AGE_CAP: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Freshness settings applied to validated responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: Duration,
    pub cache_control: Option<String>,
    pub vary: Option<String>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            max_age: Duration::from_secs(cfg.max_age_secs),
            cache_control: cfg.cache_control.clone(),
            vary: cfg.vary.clone(),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug)]
pub enum Validation {
    /// The client's copy is current; send this 304 as is.
    NotModified(Response),
    /// Produce the body and attach these headers.
    Fresh(FreshHeaders),
}

/// Validator and expiration headers for a fresh response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshHeaders {
    pub etag: String,
    pub last_modified: String,
    pub expires: String,
    pub cache_control: Option<String>,
    pub vary: Option<String>,
}

impl FreshHeaders {
    pub fn apply(&self, resp: &mut Response) {
        resp.set_header("ETag", format!("\"{}\"", self.etag));
        resp.set_header("Last-Modified", self.last_modified.clone());
        resp.set_header("Expires", self.expires.clone());
        if let Some(cache_control) = &self.cache_control {
            resp.set_header("Cache-Control", cache_control.clone());
        }
        if let Some(vary) = &self.vary {
            resp.set_header("Vary", vary.clone());
        }
    }
}

/// Formats an expiry etag.
pub fn expiry_etag(modified: SystemTime, expires: SystemTime) -> String {
    format!("{}-{}", epoch_secs(modified), epoch_secs(expires))
}

/// Splits an expiry etag into `(mtime, expiry)` seconds.
pub fn parse_expiry_etag(tag: &str) -> Option<(u64, u64)> {
    let (mtime, expiry) = tag.split_once('-')?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(mtime) || !digits(expiry) {
        return None;
    }
    Some((mtime.parse().ok()?, expiry.parse().ok()?))
}

fn epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Etags listed in `If-None-Match`, unquoted.
fn submitted_etags(req: &Request) -> Vec<String> {
    req.header_values("If-None-Match")
        .flat_map(|v| v.split(','))
        .map(|tag| {
            let tag = tag.trim();
            let tag = tag.strip_prefix("W/").unwrap_or(tag);
            tag.trim_matches('"').to_string()
        })
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn etag_matches(submitted: &[String], etag: Option<&str>, now: u64) -> bool {
    submitted.iter().any(|tag| {
        if tag == "*" {
            return true;
        }
        match etag {
            Some(etag) => tag == etag,
            None => parse_expiry_etag(tag)
                .map(|(_, expiry)| now < expiry)
                .unwrap_or(false),
        }
    })
}

fn not_modified_since(req: &Request, last_modified: SystemTime, stamp: &str) -> bool {
    let Some(since) = req.header("If-Modified-Since").map(str::trim) else {
        return false;
    };
    if since == stamp {
        return true;
    }
    match httpdate::parse_http_date(since) {
        Ok(since) => epoch_secs(last_modified) <= epoch_secs(since),
        Err(_) => false,
    }
}

/// Decides whether the client's cached copy is still valid.
pub fn validate(
    req: &Request,
    etag: Option<&str>,
    last_modified: SystemTime,
    policy: &CachePolicy,
) -> Validation {
    validate_at(req, etag, last_modified, policy, SystemTime::now())
}

/// [`validate`] with an explicit clock.
pub fn validate_at(
    req: &Request,
    etag: Option<&str>,
    last_modified: SystemTime,
    policy: &CachePolicy,
    now: SystemTime,
) -> Validation {
    let stamp = httpdate::fmt_http_date(last_modified);
    let submitted = submitted_etags(req);

    if etag_matches(&submitted, etag, epoch_secs(now)) || not_modified_since(req, last_modified, &stamp) {
        let resp = ResponseBuilder::new(StatusCode::NotModified)
            .content_length(0)
            .build();
        return Validation::NotModified(resp);
    }

    let expires_at = now
        .checked_add(policy.max_age.min(MAX_AGE_CAP))
        .unwrap_or(now);
    let etag = match etag {
        Some(etag) => etag.to_string(),
        None => expiry_etag(last_modified, expires_at),
    };

    Validation::Fresh(FreshHeaders {
        etag,
        last_modified: stamp,
        expires: httpdate::fmt_http_date(expires_at),
        cache_control: policy.cache_control.clone(),
        vary: policy.vary.clone(),
    })
}

/// Runs negotiation and only calls `produce` when the client copy is stale.
pub fn respond<F>(
    req: &Request,
    etag: Option<&str>,
    last_modified: SystemTime,
    policy: &CachePolicy,
    produce: F,
) -> anyhow::Result<Response>
where
    F: FnOnce() -> anyhow::Result<Response>,
{
    match validate(req, etag, last_modified, policy) {
        Validation::NotModified(resp) => Ok(resp),
        Validation::Fresh(headers) => {
            let mut resp = produce()?;
            headers.apply(&mut resp);
            Ok(resp)
        }
    }
}

/// Marks a response as uncacheable.
pub fn disable_caching(resp: &mut Response) {
    for header in ["ETag", "Last-Modified", "Expires", "Vary"] {
        resp.remove_header(header);
    }
    resp.set_header("Cache-Control", "no-cache");
}
