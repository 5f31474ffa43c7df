//! Uniform replies and the response normalizer
//!
//! Every backend turns its native answer into a [`RawResponse`] (or a
//! [`TransportFailure`]) and hands it to [`normalize`]. That is the only
//! place where status codes become [`Error`]s.

use crate::codec::{Indexes, Link};
use crate::common::utils::{is_json_media, last_segment, media_type, reason_phrase};
use crate::common::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// A payload, either declared by the caller or decoded from a response
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Data {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Binary(Bytes),
}

impl Data {
    /// Classify a caller string: JSON when it parses as JSON, opaque text otherwise.
    pub fn infer(s: &str) -> Self {
        match serde_json::from_str::<Value>(s) {
            Ok(value) => Data::Json(value),
            Err(_) => Data::Text(s.to_string()),
        }
    }

    /// Decode a response body.
    ///
    /// A JSON media type is parsed, `text/*` stays text, any other declared
    /// type stays binary. Without a content type the body is JSON only if it
    /// is structurally an object or array.
    pub fn decode(content_type: Option<&str>, body: &[u8]) -> Self {
        if body.is_empty() {
            return Data::Empty;
        }
        match content_type.map(media_type) {
            Some(ct) if is_json_media(ct) => match serde_json::from_slice(body) {
                Ok(value) => Data::Json(value),
                Err(_) => Self::text_or_binary(body),
            },
            Some(ct) if ct.starts_with("text/") => Self::text_or_binary(body),
            Some(_) => Data::Binary(Bytes::copy_from_slice(body)),
            None => match serde_json::from_slice::<Value>(body) {
                Ok(value) if value.is_object() || value.is_array() => Data::Json(value),
                _ => Self::text_or_binary(body),
            },
        }
    }

    fn text_or_binary(body: &[u8]) -> Self {
        match std::str::from_utf8(body) {
            Ok(text) => Data::Text(text.to_string()),
            Err(_) => Data::Binary(Bytes::copy_from_slice(body)),
        }
    }

    /// Wire body plus the content type to send when the caller gave none
    pub fn encode(&self) -> (Bytes, &'static str) {
        match self {
            Data::Empty => (Bytes::new(), TEXT_CONTENT_TYPE),
            Data::Json(value) => (Bytes::from(value.to_string()), JSON_CONTENT_TYPE),
            Data::Text(text) => (Bytes::from(text.clone()), TEXT_CONTENT_TYPE),
            Data::Binary(bytes) => (bytes.clone(), BINARY_CONTENT_TYPE),
        }
    }

    /// JSON view; binary payloads become base64 strings
    pub fn to_json(&self) -> Value {
        match self {
            Data::Empty => Value::Null,
            Data::Json(value) => value.clone(),
            Data::Text(text) => Value::String(text.clone()),
            Data::Binary(bytes) => Value::String(BASE64.encode(bytes)),
        }
    }

    /// Inverse of [`Data::to_json`] for values produced server-side
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Data::Empty,
            Value::String(text) => Data::Text(text),
            other => Data::Json(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::Text(text) => Some(text),
            Data::Json(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Data::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Data::Empty)
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::infer(s)
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Data::infer(&s)
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data::Json(value)
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data::Binary(Bytes::from(bytes))
    }
}

impl From<Bytes> for Data {
    fn from(bytes: Bytes) -> Self {
        Data::Binary(bytes)
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Empty => Ok(()),
            Data::Json(value) => write!(f, "{}", value),
            Data::Text(text) => write!(f, "{}", text),
            Data::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// One version of a stored value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Content {
    pub value: Data,
    pub content_type: String,
    pub vtag: Option<String>,
    pub indexes: Indexes,
    pub links: Vec<Link>,
}

/// The uniform result shape returned by every operation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    pub status_code: u16,
    /// Lower-cased response headers; `None` for replies assembled client-side
    pub headers: Option<BTreeMap<String, String>>,
    pub data: Data,
    /// Key assigned by the server, taken from the `location` header
    pub key: Option<String>,
    /// Causality token captured on reads
    pub vclock: Option<String>,
    /// Every sibling of a read, in the order the server listed them
    pub content: Vec<Content>,
}

impl Reply {
    pub fn new(status_code: u16, data: Data) -> Self {
        Self {
            status_code,
            data,
            ..Default::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// `data.keys` as a list of strings
    pub fn keys(&self) -> Result<Vec<String>> {
        let keys = self
            .data
            .as_json()
            .and_then(|v| v.get("keys"))
            .and_then(Value::as_array)
            .ok_or_else(|| Error::MalformedResponse("reply has no keys list".into()))?;
        keys.iter()
            .map(|k| {
                k.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::MalformedResponse(format!("non-string key: {}", k)))
            })
            .collect()
    }

    /// Whether the read found more than one sibling
    pub fn has_siblings(&self) -> bool {
        self.content.len() > 1
    }
}

/// A reply as it came off the wire, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with a matching content type
    pub fn json(self, value: &Value) -> Self {
        self.header("content-type", JSON_CONTENT_TYPE)
            .body(value.to_string())
    }
}

/// No response was received
#[derive(Debug, Clone)]
pub struct TransportFailure(pub String);

impl From<reqwest::Error> for TransportFailure {
    fn from(e: reqwest::Error) -> Self {
        TransportFailure(e.to_string())
    }
}

impl From<std::io::Error> for TransportFailure {
    fn from(e: std::io::Error) -> Self {
        TransportFailure(e.to_string())
    }
}

/// Turn a transport outcome into a [`Reply`] or a typed error.
pub fn normalize(outcome: std::result::Result<RawResponse, TransportFailure>) -> Result<Reply> {
    let raw = match outcome {
        Ok(raw) => raw,
        Err(TransportFailure(message)) => {
            tracing::warn!(error = %message, "no response received");
            let reply = Reply::new(500, Data::Text(message.clone()));
            return Err(Error::Transport {
                message,
                reply: Box::new(reply),
            });
        }
    };

    let data = Data::decode(
        raw.headers.get("content-type").map(String::as_str),
        &raw.body,
    );
    let key = match raw.headers.get("location") {
        Some(location) => Some(last_segment(location)?),
        None => None,
    };
    let reply = Reply {
        status_code: raw.status,
        headers: Some(raw.headers),
        data,
        key,
        ..Default::default()
    };

    if reply.status_code >= 400 {
        let status = reply.status_code;
        return Err(Error::HttpStatus {
            status,
            reason: reason_phrase(status).to_string(),
            reply: Box::new(reply),
        });
    }

    Ok(reply)
}
