//! `multipart/form-data` body decoding.

use std::collections::HashMap;

use bytes::Bytes;

use crate::http::parser::ParseError;
use crate::http::request::{Param, UploadedFile};

/// Extracts the boundary from a `multipart/form-data; boundary=X` content
/// type. Returns `None` for any other content type.
pub fn boundary(content_type: &str) -> Option<String> {
    let mut parts = content_type.split(';').map(str::trim);
    let mime = parts.next()?;
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    parts
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
}

/// Splits a multipart body on `boundary` and decodes every part.
///
/// Parts with a `filename` become [`Param::File`], the rest [`Param::Text`].
/// A body whose closing delimiter never appears fails with
/// [`ParseError::PrematureBoundary`].
pub fn parse(body: &Bytes, boundary: &str) -> Result<HashMap<String, Param>, ParseError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut params = HashMap::new();

    let mut pos = find(body, &delimiter, 0).ok_or(ParseError::PrematureBoundary)? + delimiter.len();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(params);
        }
        if !rest.starts_with(b"\r\n") {
            return Err(ParseError::Malformed("multipart delimiter not followed by CRLF".into()));
        }
        let part_start = pos + 2;

        // The part runs until CRLF followed by the next delimiter.
        let mut next_marker = Vec::with_capacity(delimiter.len() + 2);
        next_marker.extend_from_slice(b"\r\n");
        next_marker.extend_from_slice(&delimiter);
        let part_end = find(body, &next_marker, part_start).ok_or(ParseError::PrematureBoundary)?;

        let (name, value) = parse_part(body.slice(part_start..part_end))?;
        params.insert(name, value);

        pos = part_end + next_marker.len();
        if pos >= body.len() {
            return Err(ParseError::PrematureBoundary);
        }
    }
}

fn parse_part(part: Bytes) -> Result<(String, Param), ParseError> {
    let header_end = find(&part, b"\r\n\r\n", 0)
        .ok_or_else(|| ParseError::Malformed("multipart part without header block".into()))?;
    let headers = std::str::from_utf8(&part[..header_end])
        .map_err(|_| ParseError::Malformed("multipart headers are not UTF-8".into()))?;
    let content = part.slice(header_end + 4..);

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n").filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::Malformed(format!("malformed multipart header: {line}")))?;
        let key = key.trim();
        if key.eq_ignore_ascii_case("Content-Disposition") {
            for attr in value.split(';').skip(1) {
                if let Some((k, v)) = attr.trim().split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("Content-Type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let name = name.ok_or_else(|| ParseError::Malformed("multipart part without a name".into()))?;
    let value = match filename {
        Some(filename) => Param::File(UploadedFile {
            filename,
            content_type,
            content,
        }),
        None => Param::Text(String::from_utf8_lossy(&content).into_owned()),
    };
    Ok((name, value))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\
\r\n\
hello world\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"upload\"; filename=\"notes.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
line one\r\nline two\r\n\
--XyZ--\r\n";

    #[test]
    fn test_boundary_extraction() {
        assert_eq!(boundary("multipart/form-data; boundary=XyZ").as_deref(), Some("XyZ"));
        assert_eq!(boundary("multipart/form-data; boundary=\"a b\"").as_deref(), Some("a b"));
        assert_eq!(boundary("application/x-www-form-urlencoded"), None);
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn test_parse_text_and_file_parts() {
        let params = parse(&Bytes::from_static(BODY), "XyZ").unwrap();

        assert_eq!(params["title"].as_text(), Some("hello world"));

        let file = params["upload"].as_file().unwrap();
        assert_eq!(file.filename, "notes.txt");
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&file.content[..], b"line one\r\nline two");
    }

    #[test]
    fn test_missing_closing_boundary() {
        let body = Bytes::from_static(
            b"--XyZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue without end",
        );
        assert!(matches!(parse(&body, "XyZ"), Err(ParseError::PrematureBoundary)));
    }

    #[test]
    fn test_missing_opening_boundary() {
        let body = Bytes::from_static(b"no delimiter here");
        assert!(matches!(parse(&body, "XyZ"), Err(ParseError::PrematureBoundary)));
    }
}
