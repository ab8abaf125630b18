use std::time::SystemTime;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::http::response::{Body, Response};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Content length known at header-send time, if any.
pub fn resolve_content_length(resp: &Response) -> Option<u64> {
    resp.content_length.or(match &resp.body {
        Body::Full(bytes) => Some(bytes.len() as u64),
        Body::Empty | Body::Stream(_) => None,
    })
}

/// Whether the handler asked for the connection to be closed.
fn requests_close(resp: &Response) -> bool {
    resp.header_values("Connection")
        .any(|v| v.split(',').any(|token| token.trim().eq_ignore_ascii_case("close")))
}

/// Serializes the status line and headers.
///
/// Order: status line, `Date`, `Connection: close` (non-persistent only),
/// the response's own headers, `Content-Length` (when known).
pub fn serialize_head(
    resp: &Response,
    content_length: Option<u64>,
    persistent: bool,
    date: SystemTime,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    push_header(&mut buf, "Date", &httpdate::fmt_http_date(date));
    if !persistent {
        push_header(&mut buf, "Connection", "close");
    }

    for (k, v) in &resp.headers {
        if k.eq_ignore_ascii_case("Content-Length") || k.eq_ignore_ascii_case("Date") {
            continue;
        }
        if k.eq_ignore_ascii_case("Connection") && !persistent {
            continue;
        }
        push_header(&mut buf, k, v);
    }

    if let Some(length) = content_length {
        push_header(&mut buf, "Content-Length", &length.to_string());
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");
    buf
}

fn push_header(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Serializes a response with a fixed body in one buffer.
pub fn serialize_response(resp: &Response, persistent: bool, date: SystemTime) -> Vec<u8> {
    let content_length = resolve_content_length(resp);
    let persistent = persistent && resp.keep_alive && content_length.is_some() && !requests_close(resp);
    let mut buf = serialize_head(resp, content_length, persistent, date);
    if let Body::Full(bytes) = &resp.body {
        buf.extend_from_slice(bytes);
    }
    buf
}

/// Writes responses onto a connection and tracks whether it may stay open.
///
/// Socket write failures never surface as errors; they mark the connection
/// non-persistent so the caller closes it.
pub struct ResponseWriter<'a, W> {
    stream: &'a mut W,
    persistent: bool,
    announce_keep_alive: bool,
    broken: bool,
}

impl<'a, W: AsyncWrite + Unpin> ResponseWriter<'a, W> {
    pub fn new(stream: &'a mut W, persistent: bool) -> Self {
        Self {
            stream,
            persistent,
            announce_keep_alive: false,
            broken: false,
        }
    }

    /// Emit `Connection: keep-alive` on responses that keep the connection
    /// open. HTTP/1.0 clients assume a close otherwise.
    pub fn with_keep_alive_header(mut self, announce: bool) -> Self {
        self.announce_keep_alive = announce;
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Sends a complete response. With `head_only` the body bytes are
    /// skipped but the framing headers are kept.
    pub async fn send(&mut self, mut response: Response, head_only: bool) {
        let content_length = resolve_content_length(&response);
        if content_length.is_none() || !response.keep_alive || requests_close(&response) {
            self.persistent = false;
        }
        if self.persistent && self.announce_keep_alive {
            response.set_header("Connection", "keep-alive");
        }

        let head = serialize_head(&response, content_length, self.persistent, SystemTime::now());
        self.write(&head).await;

        if head_only {
            self.flush().await;
            return;
        }

        match response.body {
            Body::Empty => {}
            Body::Full(bytes) => self.write(&bytes).await,
            Body::Stream(mut rx) => {
                while let Some(chunk) = rx.recv().await {
                    self.stream(&chunk).await;
                    if self.broken {
                        break;
                    }
                }
            }
        }
        self.flush().await;
    }

    /// Writes more bytes of an already-started response.
    pub async fn stream(&mut self, chunk: &[u8]) {
        self.write(chunk).await;
    }

    async fn write(&mut self, bytes: &[u8]) {
        if self.broken {
            return;
        }
        if let Err(e) = self.stream.write_all(bytes).await {
            debug!(error = %e, "write failed, closing connection after this response");
            self.persistent = false;
            self.broken = true;
        }
    }

    async fn flush(&mut self) {
        if self.broken {
            return;
        }
        if let Err(e) = self.stream.flush().await {
            debug!(error = %e, "flush failed");
            self.persistent = false;
            self.broken = true;
        }
    }
}
