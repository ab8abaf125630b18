use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::HttpError;
use crate::http::cache::CachePolicy;
use crate::http::mime;
use crate::http::request::{Method, Request};
use crate::provider::{Resource, ResourceProvider, respond};
use crate::routing::{Handler, HandlerResult};

#[derive(Debug, Clone)]
struct CachedFile {
    modified: SystemTime,
    len: u64,
    content: Bytes,
}

/// Serves files below `root` under the URL prefix `mount`.
///
/// File contents are kept in a process-wide cache and re-read when the
/// file's modification time or size changes.
pub struct StaticFiles {
    mount: String,
    root: PathBuf,
    policy: CachePolicy,
    cache: RwLock<HashMap<PathBuf, CachedFile>>,
}

impl StaticFiles {
    pub fn new(mount: impl Into<String>, root: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        let mount = mount.into();
        Self {
            mount: mount.trim_end_matches('/').to_string(),
            root: root.into(),
            policy,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Path relative to the mount, or `None` when `path` is outside it.
    fn strip_mount<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.mount.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest.trim_start_matches('/'))
        } else {
            None
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, HttpError> {
        let decoded = percent_decode_str(relative)
            .decode_utf8()
            .map_err(|_| HttpError::NotFound(relative.to_string()))?;
        let relative = Path::new(decoded.as_ref());

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(HttpError::Forbidden(decoded.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[async_trait]
impl ResourceProvider for StaticFiles {
    async fn fetch(&self, id: &str) -> Result<Resource, HttpError> {
        let path = self.resolve(id)?;

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| HttpError::NotFound(id.to_string()))?;
        if meta.is_dir() {
            return Err(HttpError::Forbidden(id.to_string()));
        }
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        let len = meta.len();

        let hit = self
            .cache
            .read()
            .await
            .get(&path)
            .filter(|f| f.modified == modified && f.len == len)
            .map(|f| f.content.clone());

        let content = match hit {
            Some(content) => content,
            None => {
                let content = Bytes::from(
                    tokio::fs::read(&path)
                        .await
                        .map_err(|_| HttpError::NotFound(id.to_string()))?,
                );
                debug!(path = %path.display(), bytes = content.len(), "caching static file");
                self.cache.write().await.insert(
                    path.clone(),
                    CachedFile {
                        modified,
                        len,
                        content: content.clone(),
                    },
                );
                content
            }
        };

        let mtime = modified.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        Ok(Resource {
            content,
            etag: Some(format!("{len:x}-{mtime:x}")),
            last_modified: modified,
            content_type: Some(mime::from_path(&path).to_string()),
        })
    }
}

#[async_trait]
impl Handler for StaticFiles {
    async fn call(&self, req: &Request) -> HandlerResult {
        if !matches!(req.method, Method::GET | Method::HEAD) {
            return Ok(None);
        }
        let Some(relative) = self.strip_mount(&req.path) else {
            return Ok(None);
        };
        let resource = self.fetch(relative).await?;
        Ok(Some(respond(req, resource, &self.policy)))
    }
}
