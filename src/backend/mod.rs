//! Transport backends
//!
//! Each wire protocol implements [`Backend`] on its own; the client picks
//! one at construction time and never looks behind the trait. Every method
//! returns a reply that went through [`crate::reply::normalize`].

pub mod binary;
pub mod http;

use crate::codec::IndexQuery;
use crate::common::{BackendKind, ClientConfig, Error, Result};
use crate::mapred::Job;
use crate::reply::Reply;
use crate::request::{QueryParams, SearchQuery, WriteRequest};
use async_trait::async_trait;

pub use binary::BinaryBackend;
pub use http::HttpBackend;

/// Bucket properties, e.g. `n_val` or `allow_mult`
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Optional features a transport may answer natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Search queries without a map-reduce rewrite
    pub native_search: bool,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities;

    /// `data: {buckets: [...]}`
    async fn get_buckets(&self) -> Result<Reply>;

    /// `data: {props: {...}}`
    async fn get_bucket(&self, bucket: &str) -> Result<Reply>;

    async fn set_bucket(&self, bucket: &str, props: &Properties) -> Result<Reply>;

    /// `data: {keys: [...]}` for the whole bucket
    async fn get_keys(&self, bucket: &str) -> Result<Reply>;

    /// `data: {keys: [...]}` matching one index constraint
    async fn index_keys(&self, bucket: &str, query: &IndexQuery) -> Result<Reply>;

    /// Direct key read with every sibling in `content`
    async fn get(&self, bucket: &str, key: &str, options: &QueryParams) -> Result<Reply>;

    /// Metadata-only read used to capture the current vclock
    async fn head(&self, bucket: &str, key: &str) -> Result<Reply>;

    async fn put(&self, bucket: &str, write: &WriteRequest) -> Result<Reply>;

    async fn delete(&self, bucket: &str, key: &str, options: &QueryParams) -> Result<Reply>;

    /// Raw map-reduce results as a JSON list
    async fn mapred(&self, job: &Job) -> Result<Reply>;

    /// `data: [{key, data}, ...]` from a search index
    async fn search(&self, _index: &str, _query: &SearchQuery) -> Result<Reply> {
        Err(Error::NotImplemented(format!(
            "search over the {:?} backend",
            self.kind()
        )))
    }

    async fn ping(&self) -> Result<Reply>;

    async fn status(&self) -> Result<Reply>;

    async fn resources(&self) -> Result<Reply>;
}

/// Build the backend named in the configuration
pub fn connect(config: &ClientConfig) -> Result<Box<dyn Backend>> {
    let (host, port) = (config.host(), config.port());
    tracing::debug!(host, port, backend = ?config.backend, "creating backend");
    match config.backend {
        BackendKind::Http => Ok(Box::new(HttpBackend::new(host, port)?)),
        BackendKind::Binary => Ok(Box::new(BinaryBackend::new(host, port))),
    }
}
