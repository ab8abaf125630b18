//! Form/query string and cookie decoding.

use std::collections::HashMap;

use percent_encoding::percent_decode;
use url::form_urlencoded;

use crate::config::Limits;
use crate::http::parser::ParseError;
use crate::http::request::Param;

/// Form-encodes arbitrary bytes (space becomes `+`).
pub fn escape(raw: &[u8]) -> String {
    form_urlencoded::byte_serialize(raw).collect()
}

/// Reverses [`escape`]: `+` becomes a space, `%XX` becomes the byte.
///
/// Malformed escapes are kept literally.
pub fn unescape(encoded: &str) -> Vec<u8> {
    let plus_decoded: Vec<u8> = encoded
        .bytes()
        .map(|b| if b == b'+' { b' ' } else { b })
        .collect();
    percent_decode(&plus_decoded).collect()
}

pub fn unescape_str(encoded: &str) -> String {
    String::from_utf8_lossy(&unescape(encoded)).into_owned()
}

/// Decodes a `name=value&name=value` string.
///
/// Empty segments are skipped. A duplicate name keeps the last value.
pub fn parse_query(raw: &str, limits: &Limits) -> Result<HashMap<String, String>, ParseError> {
    let mut params = HashMap::new();

    for part in raw.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = part
            .split_once('=')
            .ok_or_else(|| ParseError::Malformed(format!("query parameter without '=': {part}")))?;

        if name.is_empty() || name.len() > limits.max_param_name {
            return Err(ParseError::Malformed(format!(
                "query parameter name length {} out of range",
                name.len()
            )));
        }
        if value.len() > limits.max_param_value {
            return Err(ParseError::Malformed(format!(
                "query parameter '{name}' exceeds {} bytes",
                limits.max_param_value
            )));
        }

        params.insert(unescape_str(name), unescape_str(value));
    }

    Ok(params)
}

/// Merges decoded form fields into `params` without replacing names that
/// are already present.
pub fn merge_params(params: &mut HashMap<String, Param>, decoded: HashMap<String, String>) {
    for (name, value) in decoded {
        params.entry(name).or_insert(Param::Text(value));
    }
}

/// Splits a `Cookie` header on `;` and `,` into decoded pairs.
pub fn parse_cookies(raw: &str) -> Result<HashMap<String, String>, ParseError> {
    let mut cookies = HashMap::new();

    for segment in raw.split([';', ',']).map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = segment
            .split_once('=')
            .ok_or_else(|| ParseError::Malformed(format!("malformed cookie: {segment}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::Malformed(format!("malformed cookie: {segment}")));
        }
        cookies.insert(name.to_string(), unescape_str(value.trim()));
    }

    Ok(cookies)
}
