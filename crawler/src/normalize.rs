//! Canonicalizes a URL string into a comparable form.
//!
//! Applies, in order: lowercase scheme/host (done by the underlying
//! parser for `http`/`https`, which are "special" schemes under the URL
//! standard); strip the default port; strip the fragment; decode
//! percent-escapes that encode unreserved characters, re-encoding the
//! rest with uppercase hex; sort query parameters by key; collapse
//! consecutive `/` in the path. Dot-segment resolution (`.`/`..`) is
//! likewise handled by the parser's path state.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("cannot parse {url:?} as an absolute URL: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

pub fn normalize(input: &str) -> Result<String, NormalizeError> {
    let mut url = Url::parse(input).map_err(|source| NormalizeError::Parse {
        url: input.to_string(),
        source,
    })?;

    url.set_fragment(None);
    strip_default_port(&mut url);

    let decoded_path = decode_unreserved(url.path());
    let collapsed_path = collapse_slashes(&decoded_path);
    url.set_path(&collapsed_path);

    if let Some(query) = url.query() {
        let decoded_query = decode_unreserved(query);
        let sorted_query = sort_query(&decoded_query);
        url.set_query(Some(&sorted_query));
    }

    Ok(url.to_string())
}

fn strip_default_port(url: &mut Url) {
    let default_port = match url.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if url.port() == default_port {
        let _ = url.set_port(None);
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decodes `%XX` sequences that encode an unreserved character, leaving
/// every other escape in place (re-encoded with uppercase hex digits so
/// that e.g. `%2f` and `%2F` compare equal after normalization).
fn decode_unreserved(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = (hi << 4) | lo;
                if is_unreserved(decoded) {
                    out.push(decoded as char);
                } else {
                    out.push('%');
                    out.push(bytes[i + 1].to_ascii_uppercase() as char);
                    out.push(bytes[i + 2].to_ascii_uppercase() as char);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_was_slash {
                continue;
            }
            prev_was_slash = true;
        } else {
            prev_was_slash = false;
        }
        out.push(c);
    }
    out
}

/// Sorts `key=value` pairs lexicographically by key, stable on ties, so
/// repeated keys keep their relative order. Operates on the raw
/// (percent-encoded) query string rather than decoding through
/// `application/x-www-form-urlencoded`, which would mangle `+` and other
/// reserved characters.
fn sort_query(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<&str> = query.split('&').collect();
    pairs.sort_by_key(|pair| pair.split('=').next().unwrap_or(""));
    pairs.join("&")
}
