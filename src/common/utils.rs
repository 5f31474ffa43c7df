//! Utility functions for simpleriak

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Path segment encode set: everything except unreserved URI characters
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encode a bucket, key, or index value for use as one URL path segment
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

/// Decode a percent-encoded path segment
pub fn decode_segment(encoded: &str) -> crate::Result<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.to_string())
        .map_err(|e| crate::Error::MalformedResponse(format!("Failed to decode segment: {}", e)))
}

/// Final path segment of a location-style header, URL-decoded
pub fn last_segment(location: &str) -> crate::Result<String> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    let segment = path.rsplit('/').next().unwrap_or(path);
    decode_segment(segment)
}

/// Standard reason phrase for an HTTP status code
pub fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Error")
}

/// Strip parameters from a content type (`text/plain; charset=utf-8` -> `text/plain`)
pub fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or(content_type).trim()
}

/// Whether a media type carries JSON
pub fn is_json_media(content_type: &str) -> bool {
    let media = media_type(content_type);
    media.eq_ignore_ascii_case("application/json") || media.ends_with("+json")
}
