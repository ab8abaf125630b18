//! Resource providers.
//!
//! A provider turns a resource identifier into content plus the validators
//! cache negotiation needs. How the content is produced (disk, templates,
//! memory) is the provider's business.

pub mod static_files;

use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::HttpError;
use crate::http::cache::{self, CachePolicy, Validation};
use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

pub use static_files::StaticFiles;

#[derive(Debug, Clone)]
pub struct Resource {
    pub content: Bytes,
    /// Concrete validator; `None` selects expiry-etag validation.
    pub etag: Option<String>,
    pub last_modified: SystemTime,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Resource, HttpError>;
}

/// Builds the response for `resource`, answering 304 when the client's copy
/// is still valid.
pub fn respond(req: &Request, resource: Resource, policy: &CachePolicy) -> Response {
    match cache::validate(req, resource.etag.as_deref(), resource.last_modified, policy) {
        Validation::NotModified(resp) => resp,
        Validation::Fresh(headers) => {
            let mut builder = ResponseBuilder::new(StatusCode::Ok);
            if let Some(content_type) = resource.content_type {
                builder = builder.content_type(content_type);
            }
            let mut resp = builder.body(resource.content).build();
            headers.apply(&mut resp);
            resp
        }
    }
}
