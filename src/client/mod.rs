//! The client facade
//!
//! Resolves the bucket, picks the execution path for the selected
//! transport, and hands back one uniform [`Reply`]. Lookups a backend cannot
//! answer directly are rewritten into map-reduce jobs and reshaped so the
//! caller sees the same result either way.

mod params;

pub use params::{MapRedParams, ModifyParams, PutParams, Query, Target, Transform, WalkParams};

use crate::backend::{self, Backend, Properties};
use crate::codec::index::indexes_to_json;
use crate::codec::{intersect, IndexQuery};
use crate::common::{ClientConfig, Error, Result};
use crate::mapred::{lookup_job, reshape, walk_job, Inputs, Job, JobBuilder, Projection};
use crate::reply::{Data, Reply};
use crate::request::{resolve_bucket, QueryParams, SearchQuery, WriteRequest};
use futures_util::future::try_join_all;
use serde_json::{json, Value};

pub struct Client {
    config: ClientConfig,
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client for the backend named in `config`
    pub fn new(config: ClientConfig) -> Result<Self> {
        let backend = backend::connect(&config)?;
        Ok(Self { config, backend })
    }

    /// Create a client over an already constructed backend
    pub fn with_backend(config: ClientConfig, backend: Box<dyn Backend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    fn bucket(&self, explicit: Option<&str>) -> Result<String> {
        resolve_bucket(explicit, self.config.bucket.as_deref())
    }

    // === Buckets ===

    pub async fn get_buckets(&self) -> Result<Reply> {
        self.backend.get_buckets().await
    }

    pub async fn get_bucket(&self, bucket: Option<&str>) -> Result<Reply> {
        let bucket = self.bucket(bucket)?;
        self.backend.get_bucket(&bucket).await
    }

    pub async fn set_bucket(&self, bucket: Option<&str>, props: &Properties) -> Result<Reply> {
        let bucket = self.bucket(bucket)?;
        self.backend.set_bucket(&bucket, props).await
    }

    // === Keys and objects ===

    /// `{keys: [...]}` for the whole bucket, an index match or a search
    pub async fn get_keys(&self, query: &Query) -> Result<Reply> {
        let bucket = self.bucket(query.bucket.as_deref())?;

        if !query.index.is_empty() {
            return self.index_keys(&bucket, &query.index).await;
        }
        if let Some(search) = &query.search {
            if self.backend.capabilities().native_search {
                let reply = self.backend.search(&bucket, search).await?;
                return search_keys(reply);
            }
            let inputs = Inputs::Search {
                index: bucket,
                query: search.query.clone(),
            };
            return self.rewrite(inputs, Projection::Keys).await;
        }
        self.backend.get_keys(&bucket).await
    }

    async fn index_keys(&self, bucket: &str, queries: &[IndexQuery]) -> Result<Reply> {
        if let [single] = queries {
            return self.backend.index_keys(bucket, single).await;
        }

        tracing::debug!(bucket, count = queries.len(), "index fan-out");
        let replies =
            try_join_all(queries.iter().map(|q| self.backend.index_keys(bucket, q))).await?;
        let sets = replies
            .iter()
            .map(Reply::keys)
            .collect::<Result<Vec<_>>>()?;

        Ok(Reply::new(200, Data::Json(json!({ "keys": intersect(sets) }))))
    }

    /// Read by key, index constraints or search
    pub async fn get(&self, query: &Query) -> Result<Reply> {
        let bucket = self.bucket(query.bucket.as_deref())?;

        match query.target() {
            Target::Key(key) => {
                tracing::debug!(bucket = %bucket, key, "get");
                self.backend.get(&bucket, key, &query.options).await
            }
            Target::Index(queries) => {
                let inputs = Inputs::Index {
                    bucket,
                    queries: queries.to_vec(),
                };
                self.rewrite(inputs, Projection::KeyData).await
            }
            Target::Search(search) if self.backend.capabilities().native_search => {
                self.backend.search(&bucket, search).await
            }
            Target::Search(search) => {
                let inputs = Inputs::Search {
                    index: bucket,
                    query: search.query.clone(),
                };
                self.rewrite(inputs, Projection::KeyData).await
            }
            Target::All => Err(Error::NoKeySpecified),
        }
    }

    /// Secondary indexes of one object as `{name: value | [values]}`
    pub async fn get_indexes(&self, query: &Query) -> Result<Reply> {
        let bucket = self.bucket(query.bucket.as_deref())?;
        let key = query.key.as_deref().ok_or(Error::NoKeySpecified)?;

        let reply = self.backend.get(&bucket, key, &query.options).await?;
        if reply.has_siblings() {
            return Err(Error::UnresolvedSiblings {
                count: reply.content.len(),
            });
        }
        let data = reply
            .content
            .first()
            .map(|c| indexes_to_json(&c.indexes))
            .unwrap_or_else(|| json!({}));
        Ok(Reply {
            data: Data::Json(data),
            ..reply
        })
    }

    pub async fn put(&self, params: PutParams) -> Result<Reply> {
        let bucket = self.bucket(params.bucket.as_deref())?;

        let mut write = WriteRequest::new(
            params.key.clone(),
            &params.data,
            params.content_type.as_deref(),
        );
        write.indexes = params.indexes;
        write.links = params.links;
        write.return_body = params.return_body;
        write.options = params.options;
        write.vclock = match (params.vclock, &params.key) {
            (Some(vclock), _) => Some(vclock),
            (None, Some(key)) => self.probe(&bucket, key).await?,
            (None, None) => None,
        };

        tracing::debug!(bucket = %bucket, key = ?write.key, method = ?write.method(), "put");
        self.backend.put(&bucket, &write).await
    }

    /// Current vclock of `key`, or `None` when it does not exist yet
    async fn probe(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        match self.backend.head(bucket, key).await {
            Ok(reply) => {
                tracing::debug!(bucket, key, found = reply.vclock.is_some(), "vclock probe");
                Ok(reply.vclock)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(bucket, key, "vclock probe: no object");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Read, transform and write back one object under its vclock
    pub async fn modify(&self, params: ModifyParams) -> Result<Reply> {
        let bucket = self.bucket(params.bucket.as_deref())?;
        let key = params.key.clone().ok_or(Error::NoKeySpecified)?;

        let current = self.backend.get(&bucket, &key, &QueryParams::new()).await?;
        if current.has_siblings() {
            return Err(Error::UnresolvedSiblings {
                count: current.content.len(),
            });
        }
        let vclock = current.vclock.clone();
        let content = current.content.into_iter().next().unwrap_or_default();

        let mut indexes = content.indexes;
        params.apply_index(&mut indexes);
        let value = match params.transform {
            Some(transform) => transform(content.value),
            None => content.value,
        };
        let content_type = matches!(value, Data::Binary(_))
            .then_some(content.content_type)
            .filter(|ct| !ct.is_empty());

        let mut write = WriteRequest::new(Some(key), &value, content_type.as_deref());
        write.vclock = vclock;
        write.indexes = indexes;
        write.links = content.links;
        write.return_body = true;

        tracing::debug!(bucket = %bucket, key = ?write.key, "modify");
        self.backend.put(&bucket, &write).await
    }

    /// Delete one key. Index or search selections are refused.
    pub async fn delete(&self, query: &Query) -> Result<Reply> {
        let bucket = self.bucket(query.bucket.as_deref())?;
        let key = query.key.as_deref().ok_or(Error::NoKeySpecified)?;

        tracing::debug!(bucket = %bucket, key, "delete");
        self.backend.delete(&bucket, key, &query.options).await
    }

    pub async fn del(&self, query: &Query) -> Result<Reply> {
        self.delete(query).await
    }

    // === Map-reduce ===

    pub async fn mapred(&self, params: MapRedParams) -> Result<Reply> {
        let bucket = self.bucket(params.bucket.as_deref())?;

        let inputs = if !params.keys.is_empty() {
            Inputs::Keys(
                params
                    .keys
                    .into_iter()
                    .map(|key| (bucket.clone(), key))
                    .collect(),
            )
        } else if !params.index.is_empty() {
            Inputs::Index {
                bucket,
                queries: params.index,
            }
        } else if let Some(query) = params.search {
            Inputs::Search {
                index: bucket,
                query,
            }
        } else {
            Inputs::Bucket(bucket)
        };

        let mut builder = JobBuilder::new(inputs);
        for link in params.links {
            builder = builder.link(link);
        }
        for phase in params.map {
            builder = builder.map(phase);
        }
        for phase in params.reduce {
            builder = builder.reduce(phase);
        }
        if let Some(timeout) = params.timeout {
            builder = builder.timeout(timeout);
        }
        self.run(&builder.build()?).await
    }

    /// Follow links from one object; results are `[{key, data}, ...]`
    pub async fn walk(&self, params: WalkParams) -> Result<Reply> {
        let bucket = self.bucket(params.bucket.as_deref())?;
        let key = params.key.as_deref().ok_or(Error::NoKeySpecified)?;

        let job = walk_job(&bucket, key, params.links)?;
        reshape(self.run(&job).await?, Projection::KeyData)
    }

    async fn run(&self, job: &Job) -> Result<Reply> {
        tracing::debug!(phases = job.query.len(), "map-reduce");
        self.backend.mapred(job).await
    }

    async fn rewrite(&self, inputs: Inputs, projection: Projection) -> Result<Reply> {
        tracing::debug!(?projection, "rewriting lookup as map-reduce");
        let job = lookup_job(inputs, projection)?;
        reshape(self.run(&job).await?, projection)
    }

    // === Search ===

    /// Search `index` (the effective bucket when omitted)
    pub async fn search(&self, index: Option<&str>, query: &SearchQuery) -> Result<Reply> {
        let index = match index {
            Some(index) if !index.is_empty() => index.to_string(),
            _ => self.bucket(None)?,
        };

        if self.backend.capabilities().native_search {
            return self.backend.search(&index, query).await;
        }
        let inputs = Inputs::Search {
            index,
            query: query.query.clone(),
        };
        self.rewrite(inputs, Projection::KeyData).await
    }

    // === Server ===

    pub async fn ping(&self) -> Result<Reply> {
        self.backend.ping().await
    }

    pub async fn status(&self) -> Result<Reply> {
        self.backend.status().await
    }

    pub async fn stats(&self) -> Result<Reply> {
        self.status().await
    }

    pub async fn resources(&self) -> Result<Reply> {
        self.backend.resources().await
    }
}

/// `{keys: [...]}` from `[{key, data}, ...]` search results
fn search_keys(reply: Reply) -> Result<Reply> {
    let results = match &reply.data {
        Data::Json(Value::Array(results)) => results,
        other => {
            return Err(Error::MalformedResponse(format!(
                "search results are not a list: {}",
                other
            )))
        }
    };
    let keys: Vec<Value> = results
        .iter()
        .filter_map(|r| r.get("key"))
        .filter(|k| !k.is_null())
        .cloned()
        .collect();
    Ok(Reply {
        data: Data::Json(json!({ "keys": keys })),
        ..reply
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Capabilities;
    use crate::codec::IndexValue;
    use crate::common::BackendKind;
    use crate::reply::{Content, RawResponse};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    /// Records every call and answers from canned data
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        native_search: bool,
        index: BTreeMap<String, Vec<String>>,
        objects: BTreeMap<String, Vec<Content>>,
        writes: Mutex<Vec<WriteRequest>>,
        jobs: Mutex<Vec<Value>>,
        mapred_result: Value,
    }

    impl FakeBackend {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn not_found() -> Error {
            crate::reply::normalize(Ok(RawResponse::new(404))).unwrap_err()
        }
    }

    #[async_trait]
    impl Backend for Arc<FakeBackend> {
        fn kind(&self) -> BackendKind {
            BackendKind::Http
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                native_search: self.native_search,
            }
        }

        async fn get_buckets(&self) -> Result<Reply> {
            self.record("get_buckets".into());
            Ok(Reply::new(200, Data::Json(json!({"buckets": []}))))
        }

        async fn get_bucket(&self, bucket: &str) -> Result<Reply> {
            self.record(format!("get_bucket {}", bucket));
            Ok(Reply::new(200, Data::Json(json!({"props": {}}))))
        }

        async fn set_bucket(&self, bucket: &str, _props: &Properties) -> Result<Reply> {
            self.record(format!("set_bucket {}", bucket));
            Ok(Reply::new(204, Data::Empty))
        }

        async fn get_keys(&self, bucket: &str) -> Result<Reply> {
            self.record(format!("get_keys {}", bucket));
            Ok(Reply::new(200, Data::Json(json!({"keys": ["a"]}))))
        }

        async fn index_keys(&self, bucket: &str, query: &IndexQuery) -> Result<Reply> {
            self.record(format!("index_keys {} {}", bucket, query.wire_name()));
            let keys = self.index.get(&query.wire_name()).cloned().unwrap_or_default();
            Ok(Reply::new(200, Data::Json(json!({ "keys": keys }))))
        }

        async fn get(&self, bucket: &str, key: &str, _options: &QueryParams) -> Result<Reply> {
            self.record(format!("get {} {}", bucket, key));
            let content = self.objects.get(key).cloned().ok_or_else(FakeBackend::not_found)?;
            let mut reply = Reply::new(if content.len() > 1 { 300 } else { 200 }, Data::Empty);
            reply.vclock = Some(format!("vclock-{}", key));
            Ok(crate::siblings::aggregate(reply, content))
        }

        async fn head(&self, bucket: &str, key: &str) -> Result<Reply> {
            self.record(format!("head {} {}", bucket, key));
            if !self.objects.contains_key(key) {
                return Err(FakeBackend::not_found());
            }
            let mut reply = Reply::new(200, Data::Empty);
            reply.vclock = Some(format!("vclock-{}", key));
            Ok(reply)
        }

        async fn put(&self, bucket: &str, write: &WriteRequest) -> Result<Reply> {
            self.record(format!("put {} {:?}", bucket, write.key));
            self.writes.lock().unwrap().push(write.clone());
            let status = if write.key.is_none() { 201 } else { 204 };
            Ok(Reply::new(status, Data::Empty))
        }

        async fn delete(&self, bucket: &str, key: &str, _options: &QueryParams) -> Result<Reply> {
            self.record(format!("delete {} {}", bucket, key));
            Ok(Reply::new(204, Data::Empty))
        }

        async fn mapred(&self, job: &Job) -> Result<Reply> {
            self.record("mapred".into());
            self.jobs.lock().unwrap().push(job.to_json());
            Ok(Reply::new(200, Data::Json(self.mapred_result.clone())))
        }

        async fn search(&self, index: &str, _query: &SearchQuery) -> Result<Reply> {
            self.record(format!("search {}", index));
            Ok(Reply::new(
                200,
                Data::Json(json!([{"key": "bob", "data": {"name_s": "Bob"}}])),
            ))
        }

        async fn ping(&self) -> Result<Reply> {
            self.record("ping".into());
            Ok(Reply::new(200, Data::Text("OK".into())))
        }

        async fn status(&self) -> Result<Reply> {
            self.record("status".into());
            Ok(Reply::new(200, Data::Json(json!({}))))
        }

        async fn resources(&self) -> Result<Reply> {
            Err(Error::NotImplemented("resources".into()))
        }
    }

    fn setup(backend: FakeBackend, bucket: Option<&str>) -> (Client, Arc<FakeBackend>) {
        let mut config = ClientConfig::default();
        config.bucket = bucket.map(str::to_string);
        let backend = Arc::new(backend);
        let client = Client::with_backend(config, Box::new(Arc::clone(&backend)));
        (client, backend)
    }

    fn text_content(value: &str) -> Content {
        Content {
            value: Data::Text(value.into()),
            content_type: "text/plain".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_bucket_fails_before_any_call() {
        let (client, backend) = setup(FakeBackend::default(), None);
        tokio_test::block_on(async {
            assert!(matches!(
                client.get(&Query::key("k")).await,
                Err(Error::NoBucketSpecified)
            ));
            assert!(matches!(
                client.put(PutParams::new("v").key("k")).await,
                Err(Error::NoBucketSpecified)
            ));
            assert!(matches!(
                client.get_keys(&Query::all()).await,
                Err(Error::NoBucketSpecified)
            ));
        });
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_explicit_bucket_overrides_default() {
        let (client, backend) = setup(FakeBackend::default(), Some("default"));
        tokio_test::block_on(async {
            client.get_keys(&Query::all()).await.unwrap();
            client.get_keys(&Query::all().bucket("other")).await.unwrap();
        });
        assert_eq!(
            backend.calls(),
            vec!["get_keys default", "get_keys other"]
        );
    }

    #[tokio::test]
    async fn test_multi_index_keys_are_intersected() {
        let mut backend = FakeBackend::default();
        backend.index.insert("age_int".into(), vec!["a".into(), "b".into(), "c".into()]);
        backend.index.insert("team_bin".into(), vec!["c".into(), "a".into()]);
        let (client, _) = setup(backend, Some("people"));

        let query = Query::index(IndexQuery::exact("age", 30))
            .and_index(IndexQuery::exact("team", "red"));
        let reply = client.get_keys(&query).await.unwrap();
        assert_eq!(reply.keys().unwrap(), vec!["a", "c"]);
        assert!(reply.headers.is_none());

        let query = Query::index(IndexQuery::exact("age", 30))
            .and_index(IndexQuery::exact("missing", "x"));
        let reply = client.get_keys(&query).await.unwrap();
        assert!(reply.keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_index_is_rewritten() {
        let backend = FakeBackend {
            mapred_result: json!([{"key": "a", "data": {"n": 1}}]),
            ..Default::default()
        };
        let (client, backend) = setup(backend, Some("people"));

        let reply = client
            .get(&Query::index(IndexQuery::exact("age", 30)))
            .await
            .unwrap();
        assert_eq!(reply.data, Data::Json(json!([{"key": "a", "data": {"n": 1}}])));

        let jobs = backend.jobs.lock().unwrap().clone();
        assert_eq!(
            jobs[0]["inputs"],
            json!({"bucket": "people", "index": "age_int", "key": 30})
        );
    }

    #[tokio::test]
    async fn test_search_path_depends_on_capability() {
        let backend = FakeBackend {
            native_search: true,
            ..Default::default()
        };
        let (client, native) = setup(backend, Some("people"));
        let reply = client.get_keys(&Query::search("name_s:Bob")).await.unwrap();
        assert_eq!(reply.keys().unwrap(), vec!["bob"]);
        assert_eq!(native.calls(), vec!["search people"]);

        let backend = FakeBackend {
            mapred_result: json!(["bob", "bob", "carol"]),
            ..Default::default()
        };
        let (client, rewritten) = setup(backend, Some("people"));
        let reply = client.get_keys(&Query::search("name_s:*")).await.unwrap();
        assert_eq!(reply.keys().unwrap(), vec!["bob", "carol"]);
        let jobs = rewritten.jobs.lock().unwrap().clone();
        assert_eq!(jobs[0]["inputs"]["module"], json!("yokozuna"));
    }

    #[tokio::test]
    async fn test_put_probes_only_without_vclock() {
        let mut backend = FakeBackend::default();
        backend.objects.insert("k".into(), vec![text_content("old")]);
        let (client, backend) = setup(backend, Some("b"));

        client.put(PutParams::new("v").key("k")).await.unwrap();
        client.put(PutParams::new("v").key("new")).await.unwrap();
        client.put(PutParams::new("v").key("k").vclock("given")).await.unwrap();
        let reply = client.put(PutParams::new("v")).await.unwrap();
        assert_eq!(reply.status_code, 201);

        let fake = backend;
        assert_eq!(
            fake.calls(),
            vec![
                "head b k",
                "put b Some(\"k\")",
                "head b new",
                "put b Some(\"new\")",
                "put b Some(\"k\")",
                "put b None",
            ]
        );
        let writes = fake.writes.lock().unwrap();
        assert_eq!(writes[0].vclock.as_deref(), Some("vclock-k"));
        assert_eq!(writes[1].vclock, None);
        assert_eq!(writes[2].vclock.as_deref(), Some("given"));
    }

    #[tokio::test]
    async fn test_modify_writes_back_under_vclock() {
        let mut backend = FakeBackend::default();
        let mut content = text_content("1");
        content.indexes.insert("age".into(), vec![IndexValue::Int(30)]);
        content.indexes.insert("team".into(), vec!["red".into()]);
        backend.objects.insert("k".into(), vec![content]);
        let (client, backend) = setup(backend, Some("b"));

        let params = ModifyParams::new("k")
            .transform(|data| Data::Text(format!("{}1", data)))
            .remove_index("team");
        client.modify(params).await.unwrap();

        let writes = backend.writes.lock().unwrap();
        let write = &writes[0];
        assert_eq!(&write.body[..], b"11");
        assert_eq!(write.vclock.as_deref(), Some("vclock-k"));
        assert!(write.return_body);
        assert_eq!(write.indexes["age"], vec![IndexValue::Int(30)]);
        assert!(!write.indexes.contains_key("team"));
    }

    #[tokio::test]
    async fn test_modify_surfaces_read_errors() {
        let mut backend = FakeBackend::default();
        backend
            .objects
            .insert("split".into(), vec![text_content("a"), text_content("b")]);
        let (client, backend) = setup(backend, Some("b"));

        let err = client.modify(ModifyParams::new("missing")).await.unwrap_err();
        assert!(err.is_not_found());

        let err = client.modify(ModifyParams::new("split")).await.unwrap_err();
        assert!(matches!(err, Error::UnresolvedSiblings { count: 2 }));

        assert!(backend.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_key() {
        let (client, backend) = setup(FakeBackend::default(), Some("b"));

        let by_index = Query::index(IndexQuery::exact("age", 30));
        assert!(matches!(
            client.delete(&by_index).await,
            Err(Error::NoKeySpecified)
        ));
        assert!(backend.calls().is_empty());

        let reply = client.del(&Query::key("k")).await.unwrap();
        assert_eq!(reply.status_code, 204);
    }

    #[tokio::test]
    async fn test_get_indexes() {
        let mut backend = FakeBackend::default();
        let mut content = text_content("v");
        content
            .indexes
            .insert("age".into(), vec![IndexValue::Int(30), IndexValue::Int(31)]);
        content.indexes.insert("name".into(), vec!["bob".into()]);
        backend.objects.insert("k".into(), vec![content]);
        let (client, _) = setup(backend, Some("b"));

        let reply = client.get_indexes(&Query::key("k")).await.unwrap();
        assert_eq!(reply.data, Data::Json(json!({"age": [30, 31], "name": "bob"})));
    }

    #[tokio::test]
    async fn test_mapred_inputs_and_walk() {
        let backend = FakeBackend {
            mapred_result: json!([{"key": "alice", "data": "hi"}]),
            ..Default::default()
        };
        let (client, backend) = setup(backend, Some("people"));

        client
            .mapred(MapRedParams::new().keys(["a", "b"]).timeout(5000))
            .await
            .unwrap();
        client
            .walk(WalkParams::new("bob").step(crate::mapred::LinkPhase::new(
                None,
                Some("friend"),
                false,
            )))
            .await
            .unwrap();

        let jobs = backend.jobs.lock().unwrap().clone();
        assert_eq!(jobs[0]["inputs"], json!([["people", "a"], ["people", "b"]]));
        assert_eq!(jobs[0]["timeout"], json!(5000));
        assert_eq!(jobs[1]["inputs"], json!([["people", "bob"]]));
        assert_eq!(jobs[1]["query"][0]["link"]["tag"], json!("friend"));
    }

    #[tokio::test]
    async fn test_search_index_defaults_to_bucket() {
        let backend = FakeBackend {
            native_search: true,
            ..Default::default()
        };
        let (client, backend) = setup(backend, Some("people"));
        client.search(None, &SearchQuery::new("*:*")).await.unwrap();
        client
            .search(Some("users"), &SearchQuery::new("*:*"))
            .await
            .unwrap();
        assert_eq!(backend.calls(), vec!["search people", "search users"]);
    }
}
