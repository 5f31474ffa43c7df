//! Secondary index codec
//!
//! An index entry's type is fixed by its value at write time and carried in
//! the wire name as a `_int` or `_bin` suffix. Reads strip the suffix again
//! and parse integer values back into numbers.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Header prefix carrying index entries over HTTP
pub const INDEX_HEADER_PREFIX: &str = "x-riak-index-";

const INT_SUFFIX: &str = "_int";
const BIN_SUFFIX: &str = "_bin";

/// Logical index name -> entries
pub type Indexes = BTreeMap<String, Vec<IndexValue>>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    Int(i64),
    Bin(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Int,
    Bin,
}

impl IndexKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            IndexKind::Int => INT_SUFFIX,
            IndexKind::Bin => BIN_SUFFIX,
        }
    }
}

impl IndexValue {
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexValue::Int(_) => IndexKind::Int,
            IndexValue::Bin(_) => IndexKind::Bin,
        }
    }

    /// Raw (binary) or decimal (integer) wire representation
    pub fn wire_value(&self) -> String {
        match self {
            IndexValue::Int(n) => n.to_string(),
            IndexValue::Bin(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            IndexValue::Int(n) => json!(n),
            IndexValue::Bin(s) => json!(s),
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_value())
    }
}

impl From<i64> for IndexValue {
    fn from(n: i64) -> Self {
        IndexValue::Int(n)
    }
}

impl From<i32> for IndexValue {
    fn from(n: i32) -> Self {
        IndexValue::Int(n.into())
    }
}

impl From<u32> for IndexValue {
    fn from(n: u32) -> Self {
        IndexValue::Int(n.into())
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::Bin(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        IndexValue::Bin(s)
    }
}

/// Wire name for an entry: `name_int` for integers, `name_bin` otherwise
pub fn encode_name(name: &str, value: &IndexValue) -> String {
    format!("{}{}", name, value.kind().suffix())
}

/// Wire name for a range query: `_int` only when both endpoints are integers
pub fn encode_range_name(name: &str, start: &IndexValue, end: &IndexValue) -> String {
    let kind = match (start, end) {
        (IndexValue::Int(_), IndexValue::Int(_)) => IndexKind::Int,
        _ => IndexKind::Bin,
    };
    format!("{}{}", name, kind.suffix())
}

/// Recover the logical name and type from a wire name or an index header.
pub fn decode_name(wire: &str) -> Result<(String, IndexKind)> {
    let wire = match wire.get(..INDEX_HEADER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(INDEX_HEADER_PREFIX) => {
            &wire[INDEX_HEADER_PREFIX.len()..]
        }
        _ => wire,
    };
    if let Some(name) = wire.strip_suffix(INT_SUFFIX) {
        Ok((name.to_string(), IndexKind::Int))
    } else if let Some(name) = wire.strip_suffix(BIN_SUFFIX) {
        Ok((name.to_string(), IndexKind::Bin))
    } else {
        Err(Error::MalformedResponse(format!(
            "index name without type suffix: {}",
            wire
        )))
    }
}

/// Parse a raw wire value under the given type
pub fn decode_value(kind: IndexKind, raw: &str) -> Result<IndexValue> {
    match kind {
        IndexKind::Bin => Ok(IndexValue::Bin(raw.to_string())),
        IndexKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(IndexValue::Int)
            .map_err(|_| Error::MalformedResponse(format!("non-integer index value: {}", raw))),
    }
}

/// One `(header name, value)` pair per index entry. Servers join repeated
/// entries with commas, so binary values must not contain one; the HTTP
/// backend refuses such writes.
pub fn index_headers(indexes: &Indexes) -> Vec<(String, String)> {
    indexes
        .iter()
        .flat_map(|(name, values)| {
            values.iter().map(move |value| {
                (
                    format!("{}{}", INDEX_HEADER_PREFIX, encode_name(name, value)),
                    value.wire_value(),
                )
            })
        })
        .collect()
}

/// Collect index entries from response headers. Repeated entries arrive
/// comma-joined under one header.
pub fn indexes_from_headers<'a, I>(headers: I) -> Result<Indexes>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut indexes = Indexes::new();
    for (header, raw) in headers {
        if !header.to_ascii_lowercase().starts_with(INDEX_HEADER_PREFIX) {
            continue;
        }
        let (name, kind) = decode_name(header)?;
        let entries = indexes.entry(name).or_default();
        for part in raw.split(',') {
            entries.push(decode_value(kind, part.trim())?);
        }
    }
    Ok(indexes)
}

/// Collect index entries from `(wire name, value)` pairs
pub fn indexes_from_pairs<'a, I>(pairs: I) -> Result<Indexes>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut indexes = Indexes::new();
    for (wire, raw) in pairs {
        let (name, kind) = decode_name(wire)?;
        indexes.entry(name).or_default().push(decode_value(kind, raw)?);
    }
    Ok(indexes)
}

/// JSON view of an index map: single entries flatten to scalars
pub fn indexes_to_json(indexes: &Indexes) -> Value {
    let map = indexes
        .iter()
        .map(|(name, values)| {
            let value = match values.as_slice() {
                [single] => single.to_json(),
                many => Value::Array(many.iter().map(IndexValue::to_json).collect()),
            };
            (name.clone(), value)
        })
        .collect();
    Value::Object(map)
}

/// One index constraint of a query
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub name: String,
    pub matcher: IndexMatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexMatch {
    Exact(IndexValue),
    Range(IndexValue, IndexValue),
}

impl IndexQuery {
    pub fn exact(name: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self {
            name: name.into(),
            matcher: IndexMatch::Exact(value.into()),
        }
    }

    pub fn range(
        name: impl Into<String>,
        start: impl Into<IndexValue>,
        end: impl Into<IndexValue>,
    ) -> Self {
        Self {
            name: name.into(),
            matcher: IndexMatch::Range(start.into(), end.into()),
        }
    }

    /// Suffixed wire name
    pub fn wire_name(&self) -> String {
        match &self.matcher {
            IndexMatch::Exact(value) => encode_name(&self.name, value),
            IndexMatch::Range(start, end) => encode_range_name(&self.name, start, end),
        }
    }

    /// Map-reduce input descriptor for this constraint
    pub fn to_input(&self, bucket: &str) -> Value {
        match &self.matcher {
            IndexMatch::Exact(value) => json!({
                "bucket": bucket,
                "index": self.wire_name(),
                "key": value.to_json(),
            }),
            IndexMatch::Range(start, end) => json!({
                "bucket": bucket,
                "index": self.wire_name(),
                "start": self.endpoint(start),
                "end": self.endpoint(end),
            }),
        }
    }

    /// Constraint as read by the index filter map phase
    pub fn to_filter(&self) -> Value {
        match &self.matcher {
            IndexMatch::Exact(value) => json!({ "eq": value.to_json() }),
            IndexMatch::Range(start, end) => {
                json!({ "range": [self.endpoint(start), self.endpoint(end)] })
            }
        }
    }

    /// Mixed ranges compare as binary, so both endpoints travel as strings
    fn endpoint(&self, value: &IndexValue) -> Value {
        if self.wire_name().ends_with(BIN_SUFFIX) {
            Value::String(value.wire_value())
        } else {
            value.to_json()
        }
    }
}

/// Keys present in every set, in first-set order, without duplicates
pub fn intersect(sets: Vec<Vec<String>>) -> Vec<String> {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let others: Vec<HashSet<String>> = iter.map(|set| set.into_iter().collect()).collect();

    let mut seen = HashSet::new();
    first
        .into_iter()
        .filter(|key| others.iter().all(|set| set.contains(key)))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}
