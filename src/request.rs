//! Request building
//!
//! Bucket resolution, URL composition and write encoding shared by the
//! backends. Nothing here touches the network.

use crate::codec::index::index_headers;
use crate::codec::{encode_links, IndexMatch, IndexQuery, Indexes, Link};
use crate::common::utils::encode_segment;
use crate::common::{Error, Result};
use crate::reply::Data;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeMap;

/// Flat string-keyed query parameters
pub type QueryParams = BTreeMap<String, String>;

pub const VCLOCK_HEADER: &str = "x-riak-vclock";
pub const LINK_HEADER: &str = "link";

const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'*');

/// Explicit bucket wins over the configured default; neither is an error.
pub fn resolve_bucket(explicit: Option<&str>, default: Option<&str>) -> Result<String> {
    explicit
        .or(default)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .ok_or(Error::NoBucketSpecified)
}

/// `a=1&b=two%20words`, in key order
pub fn encode_query(query: &QueryParams) -> String {
    query
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, QUERY_ENCODE_SET),
                utf8_percent_encode(v, QUERY_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Addressable HTTP resources
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Root,
    Ping,
    Stats,
    MapRed,
    Buckets,
    BucketProps(&'a str),
    Keys(&'a str),
    Object(&'a str, &'a str),
    Index(&'a str, &'a IndexQuery),
    Search(&'a str),
}

impl Resource<'_> {
    /// Unencoded path segments
    pub fn segments(&self) -> Vec<String> {
        match *self {
            Resource::Root => vec![],
            Resource::Ping => vec!["ping".into()],
            Resource::Stats => vec!["stats".into()],
            Resource::MapRed => vec!["mapred".into()],
            Resource::Buckets => vec!["buckets".into()],
            Resource::BucketProps(bucket) => vec!["buckets".into(), bucket.into(), "props".into()],
            Resource::Keys(bucket) => vec!["buckets".into(), bucket.into(), "keys".into()],
            Resource::Object(bucket, key) => {
                vec!["buckets".into(), bucket.into(), "keys".into(), key.into()]
            }
            Resource::Index(bucket, query) => {
                let mut segments = vec![
                    "buckets".into(),
                    bucket.into(),
                    "index".into(),
                    query.wire_name(),
                ];
                match &query.matcher {
                    IndexMatch::Exact(value) => segments.push(value.wire_value()),
                    IndexMatch::Range(start, end) => {
                        segments.push(start.wire_value());
                        segments.push(end.wire_value());
                    }
                }
                segments
            }
            Resource::Search(index) => vec!["solr".into(), index.into(), "select".into()],
        }
    }

    /// Full URL under `base`, each segment URL-encoded
    pub fn url(&self, base: &str, query: &QueryParams) -> String {
        let path = self
            .segments()
            .iter()
            .map(|s| encode_segment(s))
            .collect::<Vec<_>>()
            .join("/");
        let mut url = format!("{}/{}", base.trim_end_matches('/'), path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&encode_query(query));
        }
        url
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    /// Client-chosen key
    Put,
    /// Server-assigned key
    Post,
}

/// A fully encoded object write
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub key: Option<String>,
    pub body: Bytes,
    pub content_type: String,
    pub vclock: Option<String>,
    pub indexes: Indexes,
    pub links: Vec<Link>,
    pub return_body: bool,
    pub options: QueryParams,
}

impl WriteRequest {
    /// Encode `data`; an explicit content type overrides the payload's default.
    pub fn new(key: Option<String>, data: &Data, content_type: Option<&str>) -> Self {
        let (body, default_type) = data.encode();
        Self {
            key,
            body,
            content_type: content_type.unwrap_or(default_type).to_string(),
            vclock: None,
            indexes: Indexes::new(),
            links: Vec::new(),
            return_body: false,
            options: QueryParams::new(),
        }
    }

    pub fn method(&self) -> WriteMethod {
        if self.key.is_some() {
            WriteMethod::Put
        } else {
            WriteMethod::Post
        }
    }

    /// Content type, vclock, one header per index entry, and the link header
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), self.content_type.clone())];
        if let Some(vclock) = &self.vclock {
            headers.push((VCLOCK_HEADER.to_string(), vclock.clone()));
        }
        headers.extend(index_headers(&self.indexes));
        if let Some(links) = encode_links(&self.links) {
            headers.push((LINK_HEADER.to_string(), links));
        }
        headers
    }

    pub fn query(&self) -> QueryParams {
        let mut query = self.options.clone();
        if self.return_body {
            query.insert("returnbody".into(), "true".into());
        }
        query
    }
}

/// Solr-style search parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub df: Option<String>,
    pub q_op: Option<String>,
    pub start: Option<u32>,
    pub rows: Option<u32>,
    pub sort: Option<String>,
    pub filter: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// `wt=json&q=...` plus whichever options are set
    pub fn params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("wt".into(), "json".into());
        params.insert("q".into(), self.query.clone());
        let optional = [
            ("df", self.df.clone()),
            ("q.op", self.q_op.clone()),
            ("start", self.start.map(|n| n.to_string())),
            ("rows", self.rows.map(|n| n.to_string())),
            ("sort", self.sort.clone()),
            ("filter", self.filter.clone()),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                params.insert(name.into(), value);
            }
        }
        params
    }
}
