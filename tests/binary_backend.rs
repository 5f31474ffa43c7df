//! End-to-end tests of the binary backend against an in-process fake node

use prost::Message;
use serde_json::{json, Value};
use simpleriak::backend::binary::codec::{read_frame, Frame, MessageCode};
use simpleriak::backend::binary::messages::*;
use simpleriak::{
    BackendKind, Client, ClientConfig, Data, Error, IndexQuery, IndexValue, PutParams, Query,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
struct Store {
    objects: BTreeMap<(String, String), Vec<RpbContent>>,
    props: BTreeMap<String, RpbBucketProps>,
    clock: u8,
    /// vclock carried by each put, in arrival order
    put_vclocks: Vec<Option<Vec<u8>>>,
    jobs: Vec<Value>,
}

type Riak = Arc<Mutex<Store>>;

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn error(message: &str) -> Vec<Frame> {
    let err = RpbErrorResp {
        errmsg: message.as_bytes().to_vec(),
        errcode: 0,
    };
    vec![Frame::new(MessageCode::ErrorResp, err.encode_to_vec())]
}

fn respond(riak: &Riak, request: Frame) -> Vec<Frame> {
    let mut store = riak.lock().unwrap();
    let payload = &request.payload[..];

    match request.code {
        MessageCode::PingReq => vec![Frame::new(MessageCode::PingResp, Vec::new())],
        MessageCode::GetServerInfoReq => {
            let info = RpbGetServerInfoResp {
                node: Some(b"riak@127.0.0.1".to_vec()),
                server_version: Some(b"2.9.0".to_vec()),
            };
            vec![Frame::new(MessageCode::GetServerInfoResp, info.encode_to_vec())]
        }
        MessageCode::ListBucketsReq => {
            let mut buckets: Vec<Vec<u8>> = store
                .objects
                .keys()
                .map(|(b, _)| b.as_bytes().to_vec())
                .collect();
            buckets.dedup();
            let resp = RpbListBucketsResp { buckets };
            vec![Frame::new(MessageCode::ListBucketsResp, resp.encode_to_vec())]
        }
        MessageCode::ListKeysReq => {
            let req = RpbListKeysReq::decode(payload).unwrap();
            let bucket = text(&req.bucket);
            let keys: Vec<Vec<u8>> = store
                .objects
                .keys()
                .filter(|(b, _)| *b == bucket)
                .map(|(_, k)| k.as_bytes().to_vec())
                .collect();
            // one frame per key, then an empty done frame
            let mut frames: Vec<Frame> = keys
                .into_iter()
                .map(|key| {
                    let chunk = RpbListKeysResp {
                        keys: vec![key],
                        done: None,
                    };
                    Frame::new(MessageCode::ListKeysResp, chunk.encode_to_vec())
                })
                .collect();
            let done = RpbListKeysResp {
                keys: Vec::new(),
                done: Some(true),
            };
            frames.push(Frame::new(MessageCode::ListKeysResp, done.encode_to_vec()));
            frames
        }
        MessageCode::GetBucketReq => {
            let req = RpbGetBucketReq::decode(payload).unwrap();
            let props = store
                .props
                .get(&text(&req.bucket))
                .cloned()
                .unwrap_or(RpbBucketProps {
                    n_val: Some(3),
                    allow_mult: Some(false),
                    ..Default::default()
                });
            let resp = RpbGetBucketResp { props: Some(props) };
            vec![Frame::new(MessageCode::GetBucketResp, resp.encode_to_vec())]
        }
        MessageCode::SetBucketReq => {
            let req = RpbSetBucketReq::decode(payload).unwrap();
            store
                .props
                .insert(text(&req.bucket), req.props.unwrap_or_default());
            vec![Frame::new(MessageCode::SetBucketResp, Vec::new())]
        }
        MessageCode::GetReq => {
            let req = RpbGetReq::decode(payload).unwrap();
            let id = (text(&req.bucket), text(&req.key));
            let resp = match store.objects.get(&id) {
                Some(content) => {
                    let mut content = content.clone();
                    if req.head == Some(true) {
                        for c in &mut content {
                            c.value.clear();
                        }
                    }
                    RpbGetResp {
                        content,
                        vclock: Some(vec![store.clock]),
                        unchanged: None,
                    }
                }
                None => RpbGetResp::default(),
            };
            vec![Frame::new(MessageCode::GetResp, resp.encode_to_vec())]
        }
        MessageCode::PutReq => {
            let req = RpbPutReq::decode(payload).unwrap();
            let bucket = text(&req.bucket);
            if bucket == "locked" {
                return error("bucket is locked");
            }
            store.clock += 1;
            store.put_vclocks.push(req.vclock.clone());

            let (key, generated) = match &req.key {
                Some(key) => (text(key), None),
                None => {
                    let key = format!("gen{}", store.clock);
                    (key.clone(), Some(key.into_bytes()))
                }
            };
            let mut content = req.content.unwrap_or_default();
            content.vtag = Some(format!("vt{}", store.clock).into_bytes());
            store.objects.insert((bucket, key), vec![content.clone()]);

            let resp = RpbPutResp {
                content: if req.return_body == Some(true) {
                    vec![content]
                } else {
                    Vec::new()
                },
                vclock: Some(vec![store.clock]),
                key: generated,
            };
            vec![Frame::new(MessageCode::PutResp, resp.encode_to_vec())]
        }
        MessageCode::DelReq => {
            let req = RpbDelReq::decode(payload).unwrap();
            store.objects.remove(&(text(&req.bucket), text(&req.key)));
            vec![Frame::new(MessageCode::DelResp, Vec::new())]
        }
        MessageCode::IndexReq => {
            let req = RpbIndexReq::decode(payload).unwrap();
            let bucket = text(&req.bucket);
            let index = req.index.clone();
            let wanted = req.key.clone().unwrap_or_default();
            let keys = store
                .objects
                .iter()
                .filter(|((b, _), content)| {
                    *b == bucket
                        && content[0].indexes.iter().any(|pair| {
                            pair.key == index && pair.value.as_deref() == Some(&wanted[..])
                        })
                })
                .map(|((_, k), _)| k.as_bytes().to_vec())
                .collect();
            let resp = RpbIndexResp { keys };
            vec![Frame::new(MessageCode::IndexResp, resp.encode_to_vec())]
        }
        MessageCode::MapRedReq => {
            let req = RpbMapRedReq::decode(payload).unwrap();
            assert_eq!(req.content_type, b"application/json");
            let job: Value = serde_json::from_slice(&req.request).unwrap();
            store.jobs.push(job);

            let first = RpbMapRedResp {
                phase: Some(0),
                response: Some(br#"["alice","bob"]"#.to_vec()),
                done: None,
            };
            let second = RpbMapRedResp {
                phase: Some(0),
                response: Some(br#"["alice"]"#.to_vec()),
                done: None,
            };
            let done = RpbMapRedResp {
                phase: None,
                response: None,
                done: Some(true),
            };
            [first, second, done]
                .iter()
                .map(|m| Frame::new(MessageCode::MapRedResp, m.encode_to_vec()))
                .collect()
        }
        other => panic!("unexpected request {:?}", other),
    }
}

async fn serve(riak: Riak, mut socket: TcpStream) {
    let Ok(request) = read_frame(&mut socket).await else {
        return;
    };
    let frames = respond(&riak, request);
    for frame in frames {
        socket.write_all(&frame.encode()).await.unwrap();
    }
}

async fn start() -> (Client, Riak) {
    let riak = Riak::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = riak.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::spawn(serve(server.clone(), socket));
        }
    });

    let config = ClientConfig::new(BackendKind::Binary)
        .with_host("127.0.0.1")
        .with_port(port)
        .with_bucket("test");
    (Client::new(config).unwrap(), riak)
}

#[tokio::test]
async fn test_put_get_delete() {
    let (client, riak) = start().await;

    let reply = client.put(PutParams::new("v").key("k")).await.unwrap();
    assert_eq!(reply.status_code, 204);
    assert!(reply.key.is_none());

    let reply = client.get(&Query::key("k")).await.unwrap();
    assert_eq!(reply.status_code, 200);
    assert_eq!(reply.data, Data::Text("v".into()));
    assert_eq!(reply.content[0].vtag.as_deref(), Some("vt1"));
    assert_eq!(reply.vclock.as_deref(), Some("AQ=="));

    client.put(PutParams::new("w").key("k")).await.unwrap();
    assert_eq!(riak.lock().unwrap().put_vclocks, vec![None, Some(vec![1])]);

    let reply = client.delete(&Query::key("k")).await.unwrap();
    assert_eq!(reply.status_code, 204);

    let err = client.get(&Query::key("k")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Not Found");
}

#[tokio::test]
async fn test_delete_missing_key_succeeds() {
    let (client, riak) = start().await;

    let reply = client.delete(&Query::key("never-written")).await.unwrap();
    assert_eq!(reply.status_code, 204);
    assert_eq!(reply.data, Data::Empty);
    assert!(riak.lock().unwrap().objects.is_empty());
}

#[tokio::test]
async fn test_server_assigned_key_and_return_body() {
    let (client, _) = start().await;

    let reply = client.put(PutParams::new(json!({"a": 1}))).await.unwrap();
    assert_eq!(reply.status_code, 201);
    assert_eq!(reply.key.as_deref(), Some("gen1"));

    let reply = client
        .put(PutParams::new(json!({"a": 2})).key("k").return_body())
        .await
        .unwrap();
    assert_eq!(reply.status_code, 200);
    assert_eq!(reply.data, Data::Json(json!({"a": 2})));
    assert!(reply.vclock.is_some());
}

#[tokio::test]
async fn test_siblings() {
    let (client, riak) = start().await;
    {
        let mut store = riak.lock().unwrap();
        store.clock = 9;
        let sibling = |value: &str, vtag: &str| RpbContent {
            value: value.as_bytes().to_vec(),
            content_type: Some(b"text/plain".to_vec()),
            vtag: Some(vtag.as_bytes().to_vec()),
            ..Default::default()
        };
        store.objects.insert(
            ("test".into(), "split".into()),
            vec![sibling("left", "a"), sibling("right", "b")],
        );
    }

    let reply = client.get(&Query::key("split")).await.unwrap();
    assert_eq!(reply.status_code, 300);
    assert_eq!(reply.content.len(), 2);
    assert_eq!(reply.vclock.as_deref(), Some("CQ=="));
    assert_eq!(reply.data, Data::Json(json!(["left", "right"])));
}

#[tokio::test]
async fn test_indexes() {
    let (client, _) = start().await;
    for (key, age, team) in [("alice", 30, "red"), ("bob", 42, "blue"), ("carol", 30, "blue")] {
        client
            .put(PutParams::new("x").key(key).index("age", age).index("team", team))
            .await
            .unwrap();
    }

    let thirty = client
        .get_keys(&Query::index(IndexQuery::exact("age", 30)))
        .await
        .unwrap();
    assert_eq!(thirty.keys().unwrap(), vec!["alice", "carol"]);

    let both = client
        .get_keys(
            &Query::index(IndexQuery::exact("age", 30)).and_index(IndexQuery::exact("team", "blue")),
        )
        .await
        .unwrap();
    assert_eq!(both.keys().unwrap(), vec!["carol"]);

    let reply = client.get(&Query::key("bob")).await.unwrap();
    assert_eq!(reply.content[0].indexes["age"], vec![IndexValue::Int(42)]);

    let indexes = client.get_indexes(&Query::key("carol")).await.unwrap();
    assert_eq!(indexes.data, Data::Json(json!({"age": 30, "team": "blue"})));
}

#[tokio::test]
async fn test_streamed_keys_and_buckets() {
    let (client, _) = start().await;
    for key in ["a", "b", "c"] {
        client.put(PutParams::new("x").key(key)).await.unwrap();
    }

    let keys = client.get_keys(&Query::all()).await.unwrap();
    assert_eq!(keys.keys().unwrap(), vec!["a", "b", "c"]);

    let buckets = client.get_buckets().await.unwrap();
    assert_eq!(buckets.data, Data::Json(json!({"buckets": ["test"]})));
}

#[tokio::test]
async fn test_search_is_rewritten_to_map_reduce() {
    let (client, riak) = start().await;

    let keys = client.get_keys(&Query::search("name_s:*")).await.unwrap();
    assert_eq!(keys.keys().unwrap(), vec!["alice", "bob"]);

    let jobs = riak.lock().unwrap().jobs.clone();
    assert_eq!(
        jobs[0]["inputs"],
        json!({"module": "yokozuna", "function": "mapred_search", "arg": ["test", "name_s:*"]})
    );
}

#[tokio::test]
async fn test_bucket_properties() {
    let (client, _) = start().await;

    let reply = client.get_bucket(None).await.unwrap();
    assert_eq!(reply.data, Data::Json(json!({"props": {"n_val": 3, "allow_mult": false}})));

    let mut props = simpleriak::Properties::new();
    props.insert("allow_mult".into(), json!(true));
    let reply = client.set_bucket(None, &props).await.unwrap();
    assert_eq!(reply.status_code, 204);

    let reply = client.get_bucket(None).await.unwrap();
    assert_eq!(reply.data, Data::Json(json!({"props": {"allow_mult": true}})));

    props.insert("chash_keyfun".into(), json!({}));
    assert!(matches!(
        client.set_bucket(None, &props).await,
        Err(Error::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_server_calls() {
    let (client, _) = start().await;

    let ping = client.ping().await.unwrap();
    assert_eq!(ping.data, Data::Text("OK".into()));

    let stats = client.status().await.unwrap();
    assert_eq!(
        stats.data,
        Data::Json(json!({"node": "riak@127.0.0.1", "server_version": "2.9.0"}))
    );

    assert!(matches!(
        client.resources().await,
        Err(Error::NotImplemented(_))
    ));
}

#[tokio::test]
async fn test_error_response_is_normalized() {
    let (client, _) = start().await;

    let err = client
        .put(PutParams::new("v").key("k").bucket("locked"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Internal Server Error");
    let reply = err.reply().unwrap();
    assert_eq!(reply.status_code, 500);
    assert_eq!(reply.data, Data::Text("bucket is locked".into()));
}
