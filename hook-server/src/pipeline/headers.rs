//! Header conversions for capture and forwarding.

use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::HeaderMap;

use crate::store::HeaderMultimap;

/// Group every header value under its (lowercase) name, keeping repeats.
pub fn to_multimap(headers: &HeaderMap) -> HeaderMultimap {
    let mut map = HeaderMultimap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

/// Copy of the original headers minus the transport headers the HTTP client
/// recomputes for the outbound connection.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION] {
        out.remove(name);
    }
    out
}
