use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::http::urlencoded;

/// HTTP status codes the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Found
    Found,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotModified.as_u16(), 304);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::MovedPermanently => 301,
            StatusCode::Found => 302,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::Found => "Found",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// What follows the response head.
#[derive(Debug, Default)]
pub enum Body {
    /// Nothing; framed by an explicit `content_length` if one is set.
    #[default]
    Empty,
    /// A body whose length is known before the head is sent.
    Full(Bytes),
    /// Chunks produced after the head is sent.
    Stream(mpsc::Receiver<Bytes>),
}

/// A response ready to be serialized by the writer.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    /// Header lines in the order they will be written. Duplicates allowed.
    pub headers: Vec<(String, String)>,
    pub body: Body,
    /// Explicit length for bodies the writer cannot measure.
    pub content_length: Option<u64>,
    /// `false` forces the connection closed after this response.
    pub keep_alive: bool,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use lantern::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// assert_eq!(response.header("Content-Type"), Some("application/json"));
/// ```
pub struct ResponseBuilder {
    response: Response,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            response: Response::new(status),
        }
    }

    /// Appends a header line.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.add_header(key, value);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.response.set_header("Content-Type", content_type);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.response.body = Body::Full(body.into());
        self
    }

    pub fn content_length(mut self, length: u64) -> Self {
        self.response.content_length = Some(length);
        self
    }

    pub fn close(mut self) -> Self {
        self.response.keep_alive = false;
        self
    }

    pub fn build(self) -> Response {
        self.response
    }
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
            content_length: None,
            keep_alive: true,
        }
    }

    /// A 200 response with a fixed body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// A plain-text response with the given status.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(status)
            .content_type("text/plain; charset=utf-8")
            .body(body)
            .build()
    }

    pub fn not_found() -> Self {
        Self::text(StatusCode::NotFound, "404 Not Found")
    }

    pub fn forbidden(message: &str) -> Self {
        Self::text(StatusCode::Forbidden, message.to_string())
    }

    pub fn internal_error() -> Self {
        Self::text(StatusCode::InternalServerError, "500 Internal Server Error")
    }

    /// 301/302 to `location`. Redirects always close the connection.
    pub fn redirect(location: &str, permanent: bool) -> Self {
        let status = if permanent {
            StatusCode::MovedPermanently
        } else {
            StatusCode::Found
        };
        ResponseBuilder::new(status)
            .header("Location", location)
            .content_length(0)
            .close()
            .build()
    }

    /// A streaming response and the sender that feeds it.
    ///
    /// The head is written without `Content-Length` and the connection is
    /// closed once the sender is dropped.
    pub fn streaming(status: StatusCode, buffer: usize) -> (Self, mpsc::Sender<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let mut response = Self::new(status);
        response.body = Body::Stream(rx);
        (response, tx)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    /// Replaces every header named `key` with a single line.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.remove_header(&key);
        self.headers.push((key, value.into()));
    }

    pub fn remove_header(&mut self, key: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    /// Adds a `Set-Cookie` directive. The value is form-encoded.
    pub fn set_cookie(
        &mut self,
        name: &str,
        value: &str,
        expires: SystemTime,
        path: Option<&str>,
        domain: Option<&str>,
    ) {
        let mut cookie = format!(
            "{}={}; expires={}",
            name,
            urlencoded::escape(value.as_bytes()),
            httpdate::fmt_http_date(expires)
        );
        if let Some(path) = path {
            cookie.push_str("; path=");
            cookie.push_str(path);
        }
        if let Some(domain) = domain {
            cookie.push_str("; domain=");
            cookie.push_str(domain);
        }
        self.add_header("Set-Cookie", cookie);
    }

    /// Expires a cookie on the client.
    pub fn delete_cookie(&mut self, name: &str, path: Option<&str>, domain: Option<&str>) {
        self.set_cookie(name, "", SystemTime::UNIX_EPOCH, path, domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_format() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.set_cookie("session", "a b;c", SystemTime::UNIX_EPOCH, Some("/"), Some("example.com"));

        assert_eq!(
            resp.header("Set-Cookie"),
            Some("session=a+b%3Bc; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/; domain=example.com")
        );
    }

    #[test]
    fn test_set_header_replaces_duplicates() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.add_header("X-A", "1");
        resp.add_header("x-a", "2");
        resp.set_header("X-A", "3");
        assert_eq!(resp.header_values("X-A").collect::<Vec<_>>(), vec!["3"]);
    }
}
