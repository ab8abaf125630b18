use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::config::Limits;
use crate::http::multipart;
use crate::http::request::{Method, Param, Request};
use crate::http::urlencoded;

#[derive(Debug, Error)]
pub enum ParseError {
    /// Grammar violation or limit breach.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// A multipart body ended before its closing boundary.
    #[error("multipart body ended before its closing boundary")]
    PrematureBoundary,

    /// The peer closed the stream in the middle of a request.
    #[error("connection closed mid-request")]
    UnexpectedEof,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pull-based request reader.
///
/// Reads one CRLF-terminated line at a time from the underlying stream and
/// awaits more bytes whenever a line boundary has not arrived yet.
pub struct Parser<R> {
    reader: R,
    limits: Limits,
}

impl<R: AsyncBufRead + Unpin> Parser<R> {
    pub fn new(reader: R, limits: Limits) -> Self {
        Self { reader, limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Waits until the next request's first bytes arrive. Returns `false`
    /// when the peer closed the stream instead.
    pub async fn wait_for_request(&mut self) -> std::io::Result<bool> {
        Ok(!self.reader.fill_buf().await?.is_empty())
    }

    /// Reads the next request off the stream.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly between
    /// requests.
    pub async fn parse(&mut self) -> Result<Option<Request>, ParseError> {
        let line = match self.read_line(self.limits.max_request_line).await? {
            Some(line) => line,
            None => return Ok(None),
        };

        let mut request = parse_request_line(&line)?;
        request.params = urlencoded::parse_query(&request.query, &self.limits)?
            .into_iter()
            .map(|(k, v)| (k, Param::Text(v)))
            .collect();

        self.read_headers(&mut request).await?;
        request.persistent = request.negotiate_persistence();

        self.read_body(&mut request).await?;
        Ok(Some(request))
    }

    async fn read_headers(&mut self, request: &mut Request) -> Result<(), ParseError> {
        let mut total = 0usize;

        loop {
            let remaining = self.limits.max_header_bytes.saturating_sub(total);
            if remaining == 0 {
                return Err(ParseError::Malformed(format!(
                    "headers exceed {} bytes",
                    self.limits.max_header_bytes
                )));
            }

            let line = self.read_line(remaining).await?.ok_or(ParseError::UnexpectedEof)?;
            total += line.len() + 2;

            if line.is_empty() {
                return Ok(());
            }

            if request.headers.len() >= self.limits.max_headers {
                return Err(ParseError::Malformed(format!(
                    "more than {} headers",
                    self.limits.max_headers
                )));
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::Malformed(format!("invalid header line: {line}")))?;

            if name.is_empty() || name.len() > self.limits.max_header_name || name.contains(char::is_whitespace) {
                return Err(ParseError::Malformed(format!("invalid header name: {name}")));
            }
            let value = value.trim();

            if name.eq_ignore_ascii_case("Content-Length") {
                let length = value
                    .parse::<usize>()
                    .map_err(|_| ParseError::Malformed(format!("invalid content-length: {value}")))?;
                request.content_length = Some(length);
            } else if name.eq_ignore_ascii_case("Content-Type") {
                request.content_type = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("Cookie") {
                request.cookies.extend(urlencoded::parse_cookies(value)?);
            } else if name.eq_ignore_ascii_case("Transfer-Encoding") {
                return Err(ParseError::Malformed(format!("unsupported transfer-encoding: {value}")));
            }

            request.headers.push((name.to_string(), value.to_string()));
        }
    }

    async fn read_body(&mut self, request: &mut Request) -> Result<(), ParseError> {
        let length = match request.content_length {
            Some(0) | None => return Ok(()),
            Some(n) => n,
        };
        if length > self.limits.max_body {
            return Err(ParseError::Malformed(format!(
                "content-length {length} exceeds {} bytes",
                self.limits.max_body
            )));
        }

        let mut body = vec![0u8; length];
        self.reader.read_exact(&mut body).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ParseError::UnexpectedEof,
            _ => ParseError::Io(e),
        })?;
        request.body = Bytes::from(body);

        let content_type = request
            .content_type
            .clone()
            .unwrap_or_else(|| "application/x-www-form-urlencoded".to_string());

        if let Some(boundary) = multipart::boundary(&content_type) {
            let parts = multipart::parse(&request.body, &boundary)?;
            for (name, value) in parts {
                request.params.entry(name).or_insert(value);
            }
        } else if is_form_urlencoded(&content_type) {
            let raw = std::str::from_utf8(&request.body)
                .map_err(|_| ParseError::Malformed("form body is not UTF-8".into()))?;
            let fields = urlencoded::parse_query(raw.trim_end_matches(['\r', '\n']), &self.limits)?;
            urlencoded::merge_params(&mut request.params, fields);
        }

        Ok(())
    }

    /// Reads one line of at most `max` bytes (excluding the CRLF).
    ///
    /// `Ok(None)` means EOF before any byte was read.
    async fn read_line(&mut self, max: usize) -> Result<Option<String>, ParseError> {
        let mut buf = Vec::new();
        // Room for the CRLF plus one byte to detect overflow.
        let n = (&mut self.reader)
            .take(max as u64 + 3)
            .read_until(b'\n', &mut buf)
            .await?;

        if n == 0 {
            return Ok(None);
        }
        if buf.last() != Some(&b'\n') {
            if buf.len() > max + 2 {
                return Err(ParseError::Malformed(format!("line exceeds {max} bytes")));
            }
            return Err(ParseError::UnexpectedEof);
        }

        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        if buf.len() > max {
            return Err(ParseError::Malformed(format!("line exceeds {max} bytes")));
        }

        String::from_utf8(buf)
            .map(Some)
            .map_err(|_| ParseError::Malformed("line is not valid UTF-8".into()))
    }
}

/// Parses `METHOD SP PATH[?QUERY] SP HTTP/VERSION`.
pub fn parse_request_line(line: &str) -> Result<Request, ParseError> {
    let malformed = || ParseError::Malformed(format!("invalid request line: {line}"));

    let mut parts = line.split(' ');
    let (method_str, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v), None) => (m, t, v),
        _ => return Err(malformed()),
    };

    let method = Method::from_str(method_str).ok_or_else(malformed)?;

    let version_number = version.strip_prefix("HTTP/").ok_or_else(malformed)?;
    let valid_version = matches!(version_number.split_once('.'), Some((major, minor))
        if !major.is_empty() && !minor.is_empty()
            && major.bytes().all(|b| b.is_ascii_digit())
            && minor.bytes().all(|b| b.is_ascii_digit()));
    if !valid_version {
        return Err(malformed());
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };
    if !path.starts_with('/') {
        return Err(malformed());
    }

    let mut request = Request::new(method, normalize_path(path), version);
    request.query = query.to_string();
    Ok(request)
}

/// Strips a single trailing slash, keeping `/` itself.
pub fn normalize_path(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => path.to_string(),
    }
}

fn is_form_urlencoded(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Parses a complete request held in memory.
pub async fn parse_http_request(buf: &[u8], limits: Limits) -> Result<Option<Request>, ParseError> {
    Parser::new(buf, limits).parse().await
}
