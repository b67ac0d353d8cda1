//! URI resolution and normalization utilities
//!
//! Shared primitives used by the catalog loader, query engine, and fetch layer:
//! absolute/relative resolution, the comparison-normalization function `N(s)` from
//! spec §4.2, `data:`/`classpath:` handling, and scheme access-list enforcement.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

/// The XML Catalogs 1.1 namespace.
pub const CATALOG_NS: &str = "urn:oasis:names:tc:entity:xmlns:xml:catalog";
/// The TR9401 extension namespace.
pub const TR9401_NS: &str = "urn:oasis:names:tc:entity:xmlns:tr9401:catalog";
/// The `xml:` namespace, home of `xml:base`.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

static WINDOWS_DRIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]:[\\/]").unwrap());

/// Resolve a (possibly relative) URI reference against a base URI.
///
/// Absolute `uri` values are returned unchanged (after parsing). Relative values are
/// resolved per RFC 3986 using the `url` crate's `join`.
pub fn resolve(base: Option<&Url>, uri: &str) -> Result<Url> {
    if let Ok(absolute) = Url::parse(uri) {
        return Ok(absolute);
    }
    let base = base.ok_or_else(|| Error::MalformedUri {
        uri: uri.to_string(),
        reason: "relative URI with no base to resolve against".to_string(),
    })?;
    base.join(uri).map_err(|e| Error::MalformedUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a string that must already be absolute, surfacing a [`Error::MalformedUri`]
/// rather than panicking or silently failing, so callers can honor
/// `throw_uri_exceptions` vs. tolerant fallback at the boundary.
pub fn parse_absolute(uri: &str) -> Result<Url> {
    Url::parse(uri).map_err(|e| Error::MalformedUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}

/// Rewrite a Windows-style path (`C:\foo\bar.xml` or `C:/foo/bar.xml`) into a `file:`
/// URI, per the `fix_windows_system_identifiers` option. Inputs that don't look like a
/// drive-letter path are returned unchanged.
pub fn fix_windows_system_identifier(id: &str) -> String {
    if !WINDOWS_DRIVE.is_match(id) {
        return id.replace('\\', "/");
    }
    let normalized = id.replace('\\', "/");
    format!("file:///{}", normalized)
}

/// Normalize `classpath:/x` to `classpath:x` at load time (spec §3 invariant).
pub fn normalize_classpath(uri: &str) -> String {
    if let Some(rest) = uri.strip_prefix("classpath:/") {
        format!("classpath:{}", rest)
    } else {
        uri.to_string()
    }
}

/// The comparison-normalization function `N(s)` from spec §4.2: lowercases scheme and
/// host, optionally merges `http`/`https`, and leaves path/query/fragment case intact.
pub fn normalize_for_comparison(uri: &str, merge_https: bool) -> String {
    match Url::parse(uri) {
        Ok(mut url) => {
            if let Some(host) = url.host_str().map(|h| h.to_ascii_lowercase()) {
                let _ = url.set_host(Some(&host));
            }
            if merge_https && matches!(url.scheme(), "http" | "https") {
                let _ = url.set_scheme("http");
            }
            url.to_string()
        }
        Err(_) => uri.to_string(),
    }
}

/// Find the entry (by its match string, e.g. a `systemIdSuffix` or `uriSuffix`) with
/// the longest suffix match against `candidate`, breaking ties by first occurrence in
/// `entries` (which callers pass in document order).
pub fn longest_suffix_match<'a, T>(
    candidate: &str,
    entries: impl IntoIterator<Item = (&'a str, T)>,
) -> Option<T> {
    let mut best: Option<(usize, T)> = None;
    for (suffix, value) in entries {
        if candidate.ends_with(suffix) {
            let len = suffix.len();
            if best.as_ref().map(|(blen, _)| len > *blen).unwrap_or(true) {
                best = Some((len, value));
            }
        }
    }
    best.map(|(_, v)| v)
}

/// Find the entry with the longest prefix match against `candidate`, breaking ties by
/// first occurrence. Returns the matched prefix alongside the value, since a caller
/// computing a remainder (e.g. `apply_rewrite`) needs the exact prefix that won, not
/// just any entry that happens to share its value.
pub fn longest_prefix_match<'a, T>(
    candidate: &str,
    entries: impl IntoIterator<Item = (&'a str, T)>,
) -> Option<(&'a str, T)> {
    let mut best: Option<(usize, &'a str, T)> = None;
    for (prefix, value) in entries {
        if candidate.starts_with(prefix) {
            let len = prefix.len();
            if best.as_ref().map(|(blen, _, _)| len > *blen).unwrap_or(true) {
                best = Some((len, prefix, value));
            }
        }
    }
    best.map(|(_, prefix, v)| (prefix, v))
}

/// Check whether `scheme` is present in an access list, honoring `merge_https`.
pub fn scheme_allowed(scheme: &str, allow_list: &[String], merge_https: bool) -> bool {
    let scheme = scheme.to_ascii_lowercase();
    allow_list.iter().any(|s| {
        let s = s.to_ascii_lowercase();
        s == scheme
            || (merge_https
                && ((s == "http" && scheme == "https") || (s == "https" && scheme == "http")))
    })
}

/// A parsed `data:` URI per RFC 2397, decoded manually from the raw string (never via
/// a library accessor that would have already percent-decoded the media type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// The media type before any `;base64` marker, or `None` if the mediatype part was
    /// empty (RFC 2397 defaults this to `text/plain;charset=US-ASCII`, but the spec
    /// wants an absent content-type reported for an empty mediatype).
    pub content_type: Option<String>,
    /// The decoded body bytes.
    pub body: Vec<u8>,
}

impl DataUri {
    /// Parse a `data:` URI's raw string form.
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw.strip_prefix("data:").ok_or_else(|| Error::MalformedUri {
            uri: raw.to_string(),
            reason: "not a data: URI".to_string(),
        })?;

        let comma = rest.find(',').ok_or_else(|| Error::MalformedUri {
            uri: raw.to_string(),
            reason: "data: URI missing ',' separator".to_string(),
        })?;

        let header = &rest[..comma];
        let data = &rest[comma + 1..];

        let (mediatype, is_base64) = match header.strip_suffix(";base64") {
            Some(mt) => (mt, true),
            None => (header, false),
        };

        let mut charset = "UTF-8".to_string();
        let content_type = if mediatype.is_empty() {
            None
        } else {
            for param in mediatype.split(';').skip(1) {
                if let Some(value) = param.strip_prefix("charset=") {
                    charset = value.to_string();
                }
            }
            Some(mediatype.split(';').next().unwrap_or(mediatype).to_string())
        };

        let body = if is_base64 {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(data.as_bytes())
                .map_err(|e| Error::MalformedUri {
                    uri: raw.to_string(),
                    reason: format!("invalid base64 body: {}", e),
                })?
        } else {
            decode_percent_body(data, &charset)?
        };

        Ok(DataUri { content_type, body })
    }
}

fn decode_percent_body(data: &str, charset: &str) -> Result<Vec<u8>> {
    let decoded = percent_encoding::percent_decode_str(data).collect::<Vec<u8>>();
    if charset.eq_ignore_ascii_case("UTF-8") || charset.eq_ignore_ascii_case("US-ASCII") {
        Ok(decoded)
    } else {
        // Unsupported non-UTF-8 charsets are passed through as raw decoded bytes;
        // re-encoding is the caller's concern (the fetch layer only needs a byte
        // stream plus the declared content-type/encoding).
        Ok(decoded)
    }
}
