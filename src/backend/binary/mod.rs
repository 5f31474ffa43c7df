//! Binary protocol backend
//!
//! Speaks length-prefixed protocol buffer frames over TCP, one connection
//! per operation. Native results are rewritten into the same status codes
//! the HTTP interface would have produced and then normalized, so callers
//! cannot tell the transports apart.

pub mod codec;
pub mod messages;

use self::codec::{read_frame, Frame, MessageCode};
use self::messages::*;
use super::{Backend, Capabilities, Properties};
use crate::codec::index::indexes_from_pairs;
use crate::codec::{encode_name, IndexMatch, IndexQuery, Link};
use crate::common::utils::encode_segment;
use crate::common::{BackendKind, Error, Result};
use crate::mapred::Job;
use crate::reply::{
    normalize, Content, Data, RawResponse, Reply, TransportFailure, JSON_CONTENT_TYPE,
    TEXT_CONTENT_TYPE,
};
use crate::request::{QueryParams, WriteRequest, VCLOCK_HEADER};
use crate::siblings;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use prost::Message;
use serde_json::{json, Value};
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

pub struct BinaryBackend {
    addr: String,
}

impl BinaryBackend {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and read frames until `done` accepts one
    async fn exchange(&self, request: Frame, done: fn(&Frame) -> bool) -> io::Result<Vec<Frame>> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(&request.encode()).await?;

        let mut frames = Vec::new();
        loop {
            let frame = read_frame(&mut stream).await?;
            let last = frame.code == MessageCode::ErrorResp || done(&frame);
            frames.push(frame);
            if last {
                return Ok(frames);
            }
        }
    }

    async fn call(
        &self,
        code: MessageCode,
        payload: Vec<u8>,
        expect: MessageCode,
        done: fn(&Frame) -> bool,
    ) -> Result<Vec<Frame>> {
        tracing::debug!(addr = %self.addr, ?code, "riak request");

        let frames = match self.exchange(Frame::new(code, payload), done).await {
            Ok(frames) => frames,
            Err(e) => return Err(rejected(Err(TransportFailure::from(e)))),
        };

        for frame in &frames {
            if frame.code == MessageCode::ErrorResp {
                let err = RpbErrorResp::decode(&frame.payload[..])?;
                let raw = RawResponse::new(500)
                    .header("content-type", TEXT_CONTENT_TYPE)
                    .body(err.errmsg);
                return Err(rejected(Ok(raw)));
            }
            if frame.code != expect {
                return Err(Error::MalformedResponse(format!(
                    "expected {:?}, got {:?}",
                    expect, frame.code
                )));
            }
        }
        Ok(frames)
    }

    /// Single-frame request whose response payload is returned as is
    async fn call_once(
        &self,
        code: MessageCode,
        payload: Vec<u8>,
        expect: MessageCode,
    ) -> Result<Frame> {
        let mut frames = self.call(code, payload, expect, |_| true).await?;
        frames
            .pop()
            .ok_or_else(|| Error::MalformedResponse("empty response".into()))
    }

    async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        options: &QueryParams,
        head: bool,
    ) -> Result<Reply> {
        let request = RpbGetReq {
            bucket: bucket.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
            r: quorum(options, "r")?,
            pr: quorum(options, "pr")?,
            head: head.then_some(true),
            ..Default::default()
        };
        let frame = self
            .call_once(MessageCode::GetReq, request.encode_to_vec(), MessageCode::GetResp)
            .await?;
        let response = RpbGetResp::decode(&frame.payload[..])?;

        let status = match response.content.len() {
            0 => 404,
            1 => 200,
            _ => siblings::MULTIPLE_CHOICES,
        };
        let mut raw = RawResponse::new(status);
        if let Some(vclock) = &response.vclock {
            raw = raw.header(VCLOCK_HEADER, BASE64.encode(vclock));
        }
        if status == 404 {
            raw = raw.header("content-type", TEXT_CONTENT_TYPE).body("not found");
        }
        let reply = normalize(Ok(raw))?;

        let content = response
            .content
            .into_iter()
            .map(content_from_pb)
            .collect::<Result<Vec<_>>>()?;
        Ok(siblings::aggregate(reply, content))
    }
}

/// Normalize an outcome that is known to be a failure
fn rejected(outcome: std::result::Result<RawResponse, TransportFailure>) -> Error {
    match normalize(outcome) {
        Err(e) => e,
        Ok(reply) => Error::MalformedResponse(format!("unexpected status {}", reply.status_code)),
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn streamed_keys_done(frame: &Frame) -> bool {
    RpbListKeysResp::decode(&frame.payload[..]).map_or(true, |r| r.done.unwrap_or(false))
}

fn streamed_mapred_done(frame: &Frame) -> bool {
    RpbMapRedResp::decode(&frame.payload[..]).map_or(true, |r| r.done.unwrap_or(false))
}

fn quorum(options: &QueryParams, name: &str) -> Result<Option<u32>> {
    options
        .get(name)
        .map(|value| {
            value.parse().map_err(|_| {
                Error::InvalidRequest(format!("{} must be numeric, got {:?}", name, value))
            })
        })
        .transpose()
}

fn content_from_pb(content: RpbContent) -> Result<Content> {
    let content_type = content.content_type.as_deref().map(text).unwrap_or_default();
    let value = Data::decode(
        Some(content_type.as_str()).filter(|ct| !ct.is_empty()),
        &content.value,
    );

    let pairs: Vec<(String, String)> = content
        .indexes
        .iter()
        .map(|p| (text(&p.key), p.value.as_deref().map(text).unwrap_or_default()))
        .collect();
    let indexes = indexes_from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

    let links = content
        .links
        .iter()
        .map(|l| {
            Link::new(
                l.bucket.as_deref().map(text).unwrap_or_default(),
                l.key.as_deref().map(text).unwrap_or_default(),
                l.tag.as_deref().map(text).unwrap_or_default(),
            )
        })
        .collect();

    Ok(Content {
        value,
        content_type,
        vtag: content.vtag.as_deref().map(text),
        indexes,
        links,
    })
}

fn content_to_pb(write: &WriteRequest) -> RpbContent {
    let indexes = write
        .indexes
        .iter()
        .flat_map(|(name, values)| {
            values.iter().map(move |value| RpbPair {
                key: encode_name(name, value).into_bytes(),
                value: Some(value.wire_value().into_bytes()),
            })
        })
        .collect();
    let links = write
        .links
        .iter()
        .map(|l| RpbLink {
            bucket: Some(l.bucket.as_bytes().to_vec()),
            key: Some(l.key.as_bytes().to_vec()),
            tag: Some(l.tag.as_bytes().to_vec()),
        })
        .collect();

    RpbContent {
        value: write.body.to_vec(),
        content_type: Some(write.content_type.as_bytes().to_vec()),
        indexes,
        links,
        ..Default::default()
    }
}

fn props_to_json(props: &RpbBucketProps) -> Value {
    let mut map = Properties::new();
    let mut set = |name: &str, value: Option<Value>| {
        if let Some(value) = value {
            map.insert(name.to_string(), value);
        }
    };
    set("n_val", props.n_val.map(Value::from));
    set("allow_mult", props.allow_mult.map(Value::from));
    set("last_write_wins", props.last_write_wins.map(Value::from));
    set("r", props.r.map(Value::from));
    set("w", props.w.map(Value::from));
    set("dw", props.dw.map(Value::from));
    set("rw", props.rw.map(Value::from));
    set("notfound_ok", props.notfound_ok.map(Value::from));
    set("backend", props.backend.as_deref().map(|b| Value::from(text(b))));
    set("search", props.search.map(Value::from));
    Value::Object(map)
}

fn props_from_json(props: &Properties) -> Result<RpbBucketProps> {
    fn uint(name: &str, value: &Value) -> Result<u32> {
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::InvalidRequest(format!("{} must be an unsigned integer", name)))
    }
    fn boolean(name: &str, value: &Value) -> Result<bool> {
        value
            .as_bool()
            .ok_or_else(|| Error::InvalidRequest(format!("{} must be a boolean", name)))
    }

    let mut pb = RpbBucketProps::default();
    for (name, value) in props {
        match name.as_str() {
            "n_val" => pb.n_val = Some(uint(name, value)?),
            "allow_mult" => pb.allow_mult = Some(boolean(name, value)?),
            "last_write_wins" => pb.last_write_wins = Some(boolean(name, value)?),
            "r" => pb.r = Some(uint(name, value)?),
            "w" => pb.w = Some(uint(name, value)?),
            "dw" => pb.dw = Some(uint(name, value)?),
            "rw" => pb.rw = Some(uint(name, value)?),
            "notfound_ok" => pb.notfound_ok = Some(boolean(name, value)?),
            "search" => pb.search = Some(boolean(name, value)?),
            "backend" => {
                let backend = value
                    .as_str()
                    .ok_or_else(|| Error::InvalidRequest("backend must be a string".into()))?;
                pb.backend = Some(backend.as_bytes().to_vec());
            }
            other => {
                return Err(Error::InvalidRequest(format!(
                    "bucket property {} is not supported over the binary protocol",
                    other
                )))
            }
        }
    }
    Ok(pb)
}

fn keys_reply(keys: Vec<Vec<u8>>) -> Result<Reply> {
    let keys: Vec<String> = keys.iter().map(|k| text(k)).collect();
    normalize(Ok(RawResponse::new(200).json(&json!({ "keys": keys }))))
}

#[async_trait]
impl Backend for BinaryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Binary
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            native_search: false,
        }
    }

    async fn get_buckets(&self) -> Result<Reply> {
        let frame = self
            .call_once(MessageCode::ListBucketsReq, Vec::new(), MessageCode::ListBucketsResp)
            .await?;
        let response = RpbListBucketsResp::decode(&frame.payload[..])?;
        let buckets: Vec<String> = response.buckets.iter().map(|b| text(b)).collect();
        normalize(Ok(RawResponse::new(200).json(&json!({ "buckets": buckets }))))
    }

    async fn get_bucket(&self, bucket: &str) -> Result<Reply> {
        let request = RpbGetBucketReq {
            bucket: bucket.as_bytes().to_vec(),
        };
        let frame = self
            .call_once(
                MessageCode::GetBucketReq,
                request.encode_to_vec(),
                MessageCode::GetBucketResp,
            )
            .await?;
        let response = RpbGetBucketResp::decode(&frame.payload[..])?;
        let props = props_to_json(&response.props.unwrap_or_default());
        normalize(Ok(RawResponse::new(200).json(&json!({ "props": props }))))
    }

    async fn set_bucket(&self, bucket: &str, props: &Properties) -> Result<Reply> {
        let request = RpbSetBucketReq {
            bucket: bucket.as_bytes().to_vec(),
            props: Some(props_from_json(props)?),
        };
        self.call_once(
            MessageCode::SetBucketReq,
            request.encode_to_vec(),
            MessageCode::SetBucketResp,
        )
        .await?;
        normalize(Ok(RawResponse::new(204)))
    }

    async fn get_keys(&self, bucket: &str) -> Result<Reply> {
        let request = RpbListKeysReq {
            bucket: bucket.as_bytes().to_vec(),
        };
        let frames = self
            .call(
                MessageCode::ListKeysReq,
                request.encode_to_vec(),
                MessageCode::ListKeysResp,
                streamed_keys_done,
            )
            .await?;

        let mut keys = Vec::new();
        for frame in &frames {
            keys.extend(RpbListKeysResp::decode(&frame.payload[..])?.keys);
        }
        keys_reply(keys)
    }

    async fn index_keys(&self, bucket: &str, query: &IndexQuery) -> Result<Reply> {
        let mut request = RpbIndexReq {
            bucket: bucket.as_bytes().to_vec(),
            index: query.wire_name().into_bytes(),
            ..Default::default()
        };
        match &query.matcher {
            IndexMatch::Exact(value) => {
                request.qtype = IndexQueryType::Eq as i32;
                request.key = Some(value.wire_value().into_bytes());
            }
            IndexMatch::Range(start, end) => {
                request.qtype = IndexQueryType::Range as i32;
                request.range_min = Some(start.wire_value().into_bytes());
                request.range_max = Some(end.wire_value().into_bytes());
            }
        }

        let frame = self
            .call_once(MessageCode::IndexReq, request.encode_to_vec(), MessageCode::IndexResp)
            .await?;
        keys_reply(RpbIndexResp::decode(&frame.payload[..])?.keys)
    }

    async fn get(&self, bucket: &str, key: &str, options: &QueryParams) -> Result<Reply> {
        self.fetch(bucket, key, options, false).await
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Reply> {
        self.fetch(bucket, key, &QueryParams::new(), true).await
    }

    async fn put(&self, bucket: &str, write: &WriteRequest) -> Result<Reply> {
        let vclock = write
            .vclock
            .as_deref()
            .map(|v| {
                BASE64
                    .decode(v)
                    .map_err(|e| Error::InvalidRequest(format!("vclock is not base64: {}", e)))
            })
            .transpose()?;
        let request = RpbPutReq {
            bucket: bucket.as_bytes().to_vec(),
            key: write.key.as_ref().map(|k| k.as_bytes().to_vec()),
            vclock,
            content: Some(content_to_pb(write)),
            w: quorum(&write.options, "w")?,
            dw: quorum(&write.options, "dw")?,
            return_body: write.return_body.then_some(true),
        };
        let frame = self
            .call_once(MessageCode::PutReq, request.encode_to_vec(), MessageCode::PutResp)
            .await?;
        let response = RpbPutResp::decode(&frame.payload[..])?;

        let mut raw = match (&write.key, &response.key) {
            (None, Some(key)) => RawResponse::new(201).header(
                "location",
                format!(
                    "/buckets/{}/keys/{}",
                    encode_segment(bucket),
                    encode_segment(&text(key))
                ),
            ),
            _ if write.return_body => RawResponse::new(200),
            _ => RawResponse::new(204),
        };
        if let Some(vclock) = &response.vclock {
            raw = raw.header(VCLOCK_HEADER, BASE64.encode(vclock));
        }
        let reply = normalize(Ok(raw))?;

        if response.content.is_empty() {
            return Ok(Reply {
                vclock: reply.header(VCLOCK_HEADER).map(str::to_string),
                ..reply
            });
        }
        let content = response
            .content
            .into_iter()
            .map(content_from_pb)
            .collect::<Result<Vec<_>>>()?;
        Ok(siblings::aggregate(reply, content))
    }

    async fn delete(&self, bucket: &str, key: &str, options: &QueryParams) -> Result<Reply> {
        let request = RpbDelReq {
            bucket: bucket.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
            rw: quorum(options, "rw")?,
            vclock: None,
        };
        self.call_once(MessageCode::DelReq, request.encode_to_vec(), MessageCode::DelResp)
            .await?;
        normalize(Ok(RawResponse::new(204)))
    }

    async fn mapred(&self, job: &Job) -> Result<Reply> {
        let request = RpbMapRedReq {
            request: job.to_json().to_string().into_bytes(),
            content_type: JSON_CONTENT_TYPE.as_bytes().to_vec(),
        };
        let frames = self
            .call(
                MessageCode::MapRedReq,
                request.encode_to_vec(),
                MessageCode::MapRedResp,
                streamed_mapred_done,
            )
            .await?;

        let mut results = Vec::new();
        for frame in &frames {
            let Some(chunk) = RpbMapRedResp::decode(&frame.payload[..])?.response else {
                continue;
            };
            match serde_json::from_slice::<Value>(&chunk) {
                Ok(Value::Array(items)) => results.extend(items),
                Ok(item) => results.push(item),
                Err(e) => {
                    return Err(Error::MalformedResponse(format!(
                        "map-reduce chunk is not JSON: {}",
                        e
                    )))
                }
            }
        }
        normalize(Ok(RawResponse::new(200).json(&Value::Array(results))))
    }

    async fn ping(&self) -> Result<Reply> {
        self.call_once(MessageCode::PingReq, Vec::new(), MessageCode::PingResp)
            .await?;
        normalize(Ok(RawResponse::new(200)
            .header("content-type", TEXT_CONTENT_TYPE)
            .body("OK")))
    }

    async fn status(&self) -> Result<Reply> {
        let frame = self
            .call_once(
                MessageCode::GetServerInfoReq,
                Vec::new(),
                MessageCode::GetServerInfoResp,
            )
            .await?;
        let info = RpbGetServerInfoResp::decode(&frame.payload[..])?;
        let stats = json!({
            "node": info.node.as_deref().map(text),
            "server_version": info.server_version.as_deref().map(text),
        });
        normalize(Ok(RawResponse::new(200).json(&stats)))
    }

    async fn resources(&self) -> Result<Reply> {
        Err(Error::NotImplemented(
            "resources over the binary protocol".into(),
        ))
    }
}
