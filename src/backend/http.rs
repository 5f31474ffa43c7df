//! HTTP backend

use super::{Backend, Capabilities, Properties};
use crate::codec::index::Indexes;
use crate::codec::{IndexQuery, IndexValue};
use crate::common::{BackendKind, Error, Result};
use crate::mapred::Job;
use crate::reply::{normalize, Data, RawResponse, Reply, TransportFailure, JSON_CONTENT_TYPE};
use crate::request::{
    QueryParams, Resource, SearchQuery, WriteMethod, WriteRequest, VCLOCK_HEADER,
};
use crate::siblings;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: format!("http://{}:{}", host, port),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        resource: Resource<'_>,
        query: &QueryParams,
        headers: &[(String, String)],
        body: Option<Bytes>,
    ) -> Result<Reply> {
        let url = resource.url(&self.base_url, query);
        tracing::debug!(%method, %url, "riak request");

        let mut request = self.client.request(method, &url);
        for (name, value) in headers {
            let (name, value) = header_pair(name, value)?;
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        normalize(read_response(request).await)
    }

    /// Complete a direct read, fetching every sibling of a 300 reply
    async fn resolve(
        &self,
        bucket: &str,
        key: &str,
        options: &QueryParams,
        initial: Reply,
    ) -> Result<Reply> {
        siblings::resolve(initial, |vtag| {
            let mut query = options.clone();
            query.insert("vtag".to_string(), vtag);
            async move {
                self.send(Method::GET, Resource::Object(bucket, key), &query, &[], None)
                    .await
            }
        })
        .await
    }

    async fn get_json(&self, resource: Resource<'_>, query: &QueryParams) -> Result<Reply> {
        let accept = [("accept".to_string(), JSON_CONTENT_TYPE.to_string())];
        self.send(Method::GET, resource, query, &accept, None).await
    }
}

/// Collect status, headers and the full body of one exchange
async fn read_response(
    request: reqwest::RequestBuilder,
) -> std::result::Result<RawResponse, TransportFailure> {
    let response = request.send().await?;
    let status = response.status().as_u16();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let mut body = BytesMut::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        body.extend_from_slice(&chunk?);
    }

    Ok(RawResponse {
        status,
        headers,
        body: body.freeze(),
    })
}

/// Header values are sent as raw bytes, so UTF-8 index values pass through.
/// Control characters cannot be framed and are refused before sending.
fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::InvalidRequest(format!("header name {:?}: {}", name, e)))?;
    let header_value = HeaderValue::from_bytes(value.as_bytes())
        .map_err(|e| Error::InvalidRequest(format!("value of {}: {}", name, e)))?;
    Ok((header_name, header_value))
}

/// Repeated index headers come back comma-joined, so a binary index value
/// holding a comma could not be read back as one entry.
fn check_index_values(indexes: &Indexes) -> Result<()> {
    for (name, values) in indexes {
        for value in values {
            if let IndexValue::Bin(s) = value {
                if s.contains(',') {
                    return Err(Error::InvalidRequest(format!(
                        "index {} value {:?} contains a comma",
                        name, s
                    )));
                }
            }
        }
    }
    Ok(())
}

fn flag(name: &str) -> QueryParams {
    let mut query = QueryParams::new();
    query.insert(name.to_string(), "true".to_string());
    query
}

/// `{key, data}` pairs from a Solr `response.docs` list
fn search_results(reply: Reply) -> Result<Reply> {
    let docs = reply
        .data
        .as_json()
        .and_then(|v| v.pointer("/response/docs"))
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedResponse("search reply has no response.docs".into()))?;

    let results = docs
        .iter()
        .map(|doc| {
            let key = doc
                .get("_yz_rk")
                .or_else(|| doc.get("id"))
                .cloned()
                .unwrap_or(Value::Null);
            json!({ "key": key, "data": doc })
        })
        .collect();

    Ok(Reply {
        data: Data::Json(Value::Array(results)),
        ..reply
    })
}

#[async_trait]
impl Backend for HttpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            native_search: true,
        }
    }

    async fn get_buckets(&self) -> Result<Reply> {
        let mut reply = self.get_json(Resource::Buckets, &flag("buckets")).await?;
        if reply.data.is_empty() {
            reply.data = Data::Json(json!({ "buckets": [] }));
        }
        Ok(reply)
    }

    async fn get_bucket(&self, bucket: &str) -> Result<Reply> {
        self.get_json(Resource::BucketProps(bucket), &QueryParams::new())
            .await
    }

    async fn set_bucket(&self, bucket: &str, props: &Properties) -> Result<Reply> {
        let body = json!({ "props": props }).to_string();
        let headers = [("content-type".to_string(), JSON_CONTENT_TYPE.to_string())];
        self.send(
            Method::PUT,
            Resource::BucketProps(bucket),
            &QueryParams::new(),
            &headers,
            Some(Bytes::from(body)),
        )
        .await
    }

    async fn get_keys(&self, bucket: &str) -> Result<Reply> {
        self.get_json(Resource::Keys(bucket), &flag("keys")).await
    }

    async fn index_keys(&self, bucket: &str, query: &IndexQuery) -> Result<Reply> {
        self.get_json(Resource::Index(bucket, query), &QueryParams::new())
            .await
    }

    async fn get(&self, bucket: &str, key: &str, options: &QueryParams) -> Result<Reply> {
        let initial = self
            .send(Method::GET, Resource::Object(bucket, key), options, &[], None)
            .await?;
        self.resolve(bucket, key, options, initial).await
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Reply> {
        let mut reply = self
            .send(
                Method::HEAD,
                Resource::Object(bucket, key),
                &QueryParams::new(),
                &[],
                None,
            )
            .await?;
        reply.vclock = reply.header(VCLOCK_HEADER).map(str::to_string);
        Ok(reply)
    }

    async fn put(&self, bucket: &str, write: &WriteRequest) -> Result<Reply> {
        check_index_values(&write.indexes)?;
        let (method, resource) = match (write.method(), write.key.as_deref()) {
            (WriteMethod::Put, Some(key)) => (Method::PUT, Resource::Object(bucket, key)),
            _ => (Method::POST, Resource::Keys(bucket)),
        };
        let mut reply = self
            .send(
                method,
                resource,
                &write.query(),
                &write.headers(),
                Some(write.body.clone()),
            )
            .await?;
        reply.vclock = reply.header(VCLOCK_HEADER).map(str::to_string);

        if reply.data.is_empty() {
            return Ok(reply);
        }
        let Some(key) = write.key.clone().or_else(|| reply.key.clone()) else {
            return Ok(reply);
        };
        self.resolve(bucket, &key, &QueryParams::new(), reply).await
    }

    /// A key that is already gone counts as deleted
    async fn delete(&self, bucket: &str, key: &str, options: &QueryParams) -> Result<Reply> {
        match self
            .send(Method::DELETE, Resource::Object(bucket, key), options, &[], None)
            .await
        {
            Err(Error::HttpStatus {
                status: 404, reply, ..
            }) => {
                tracing::debug!(bucket, key, "delete: no object");
                Ok(Reply {
                    status_code: 204,
                    data: Data::Empty,
                    ..*reply
                })
            }
            outcome => outcome,
        }
    }

    async fn mapred(&self, job: &Job) -> Result<Reply> {
        let headers = [("content-type".to_string(), JSON_CONTENT_TYPE.to_string())];
        self.send(
            Method::POST,
            Resource::MapRed,
            &QueryParams::new(),
            &headers,
            Some(Bytes::from(job.to_json().to_string())),
        )
        .await
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<Reply> {
        let reply = self.get_json(Resource::Search(index), &query.params()).await?;
        search_results(reply)
    }

    async fn ping(&self) -> Result<Reply> {
        self.send(Method::GET, Resource::Ping, &QueryParams::new(), &[], None)
            .await
    }

    async fn status(&self) -> Result<Reply> {
        self.get_json(Resource::Stats, &QueryParams::new()).await
    }

    async fn resources(&self) -> Result<Reply> {
        self.get_json(Resource::Root, &QueryParams::new()).await
    }
}
