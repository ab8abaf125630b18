use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use bytes::Bytes;

/// HTTP request methods.
///
/// Method tokens are matched case-insensitively on the wire and exposed in
/// lower case through [`Method::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
}

impl Method {
    /// Parses an HTTP method token.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), Some(Method::GET));
    /// assert_eq!(Method::from_str("BREW"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(Method::GET),
            "post" => Some(Method::POST),
            "put" => Some(Method::PUT),
            "delete" => Some(Method::DELETE),
            "head" => Some(Method::HEAD),
            "options" => Some(Method::OPTIONS),
            "patch" => Some(Method::PATCH),
            _ => None,
        }
    }

    /// The lower-cased method token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "get",
            Method::POST => "post",
            Method::PUT => "put",
            Method::DELETE => "delete",
            Method::HEAD => "head",
            Method::OPTIONS => "options",
            Method::PATCH => "patch",
        }
    }
}

/// A file received in a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

/// A decoded request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Text(String),
    File(UploadedFile),
}

impl Param {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Param::Text(s) => Some(s),
            Param::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Param::File(f) => Some(f),
            Param::Text(_) => None,
        }
    }
}

/// A parsed HTTP request.
///
/// Method, path, version and headers are fixed once the parser returns;
/// `params` is extended by body decoding and by the router's placeholder
/// extraction.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Normalized path without the query and without a trailing slash.
    pub path: String,
    /// Raw query string (after `?`), empty when absent.
    pub query: String,
    /// Protocol version as sent, e.g. `HTTP/1.1`.
    pub version: String,
    /// Header lines in arrival order, names as received.
    pub headers: Vec<(String, String)>,
    pub params: HashMap<String, Param>,
    pub cookies: HashMap<String, String>,
    pub content_length: Option<usize>,
    pub content_type: Option<String>,
    pub body: Bytes,
    /// Whether the connection may serve another request after this one.
    pub persistent: bool,
    host: OnceLock<(String, Option<u16>)>,
}

/// Builder for constructing Request objects.
#[derive(Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    query: String,
    version: Option<String>,
    headers: Vec<(String, String)>,
    params: HashMap<String, Param>,
    body: Bytes,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), Param::Text(value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let mut request = Request::new(
            self.method.ok_or("method missing")?,
            self.path.ok_or("path missing")?,
            self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
        );
        request.query = self.query;
        request.headers = self.headers;
        request.params = self.params;
        request.body = self.body;
        request.content_length = request.header("Content-Length").and_then(|v| v.trim().parse().ok());
        request.content_type = request.header("Content-Type").map(str::to_string);
        request.persistent = request.negotiate_persistence();
        Ok(request)
    }
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>, version: impl Into<String>) -> Self {
        let mut request = Self {
            method,
            path: path.into(),
            query: String::new(),
            version: version.into(),
            headers: Vec::new(),
            params: HashMap::new(),
            cookies: HashMap::new(),
            content_length: None,
            content_type: None,
            body: Bytes::new(),
            persistent: false,
            host: OnceLock::new(),
        };
        request.persistent = request.negotiate_persistence();
        request
    }

    /// Retrieves the first header with the given name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// All values received for a header name.
    pub fn header_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Param::as_text)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.params.get(name).and_then(Param::as_file)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Persistence implied by the version and `Connection` header.
    ///
    /// `Connection: close` always wins. HTTP/1.1 defaults to persistent,
    /// HTTP/1.0 only when `Connection: keep-alive` is sent.
    pub fn negotiate_persistence(&self) -> bool {
        match self.header("Connection") {
            Some(v) if v.trim().eq_ignore_ascii_case("close") => false,
            Some(v) if v.trim().eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version == "HTTP/1.1",
        }
    }

    /// Host name from the `Host` header, without the port.
    pub fn host(&self) -> Option<&str> {
        let (host, _) = self.host_port();
        if host.is_empty() { None } else { Some(host.as_str()) }
    }

    /// Port from the `Host` header, if one was given.
    pub fn port(&self) -> Option<u16> {
        self.host_port().1
    }

    fn host_port(&self) -> &(String, Option<u16>) {
        self.host.get_or_init(|| match self.header("Host") {
            Some(raw) => split_host(raw.trim()),
            None => (String::new(), None),
        })
    }

    /// Looks up a derivable attribute by name.
    ///
    /// Known attributes are `path`, `host`, `port`, `method`, `query`,
    /// `version` and `content_type`; any other name is tried as a header and
    /// then as a text parameter.
    pub fn attribute(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "path" => Some(Cow::Borrowed(self.path.as_str())),
            "host" => self.host().map(Cow::Borrowed),
            "port" => self.port().map(|p| Cow::Owned(p.to_string())),
            "method" => Some(Cow::Borrowed(self.method.as_str())),
            "query" => Some(Cow::Borrowed(self.query.as_str())),
            "version" => Some(Cow::Borrowed(self.version.as_str())),
            "content_type" => self.content_type.as_deref().map(Cow::Borrowed),
            other => self
                .header(other)
                .or_else(|| self.param(other))
                .map(Cow::Borrowed),
        }
    }
}

/// Splits `host[:port]` on the last `:`. Bracketed IPv6 literals without a
/// port are returned whole.
fn split_host(raw: &str) -> (String, Option<u16>) {
    match raw.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') => (host.to_string(), port.parse().ok()),
        _ => (raw.to_string(), None),
    }
}
