//! Map-reduce job descriptions
//!
//! The client only builds jobs; the server runs them. A job has exactly one
//! input form and an ordered list of phases:
//!
//! ```text
//! inputs ─▶ link* ─▶ index filter? ─▶ map* ─▶ reduce*
//! ```
//!
//! Index and search lookups that a transport cannot answer directly are
//! rewritten into a job here and reshaped back into the direct-call result.

pub mod builtins;

use crate::codec::IndexQuery;
use crate::common::{Error, Result};
use crate::reply::{Data, Reply};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// What a phase runs
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseFunction {
    /// Named JavaScript function: a client built-in such as `mapNoop`, sent
    /// as source, or a server one such as `Riak.mapValuesJson`
    Builtin(String),
    /// Inline JavaScript source
    Source(String),
    /// Erlang function from a module stored on the server
    Stored { module: String, function: String },
}

impl PhaseFunction {
    fn describe(&self) -> Map<String, Value> {
        let mut spec = Map::new();
        match self {
            PhaseFunction::Builtin(name) => {
                spec.insert("language".into(), json!("javascript"));
                match builtins::by_name(name) {
                    Some(source) => spec.insert("source".into(), json!(source)),
                    None => spec.insert("name".into(), json!(name)),
                };
            }
            PhaseFunction::Source(source) => {
                spec.insert("language".into(), json!("javascript"));
                spec.insert("source".into(), json!(source));
            }
            PhaseFunction::Stored { module, function } => {
                spec.insert("language".into(), json!("erlang"));
                spec.insert("module".into(), json!(module));
                spec.insert("function".into(), json!(function));
            }
        }
        spec
    }
}

/// A map or reduce step
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub function: PhaseFunction,
    pub arg: Option<Value>,
    pub keep: Option<bool>,
}

impl Phase {
    pub fn new(function: PhaseFunction) -> Self {
        Self {
            function,
            arg: None,
            keep: None,
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self::new(PhaseFunction::Builtin(name.into()))
    }

    pub fn source(source: impl Into<String>) -> Self {
        Self::new(PhaseFunction::Source(source.into()))
    }

    pub fn stored(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self::new(PhaseFunction::Stored {
            module: module.into(),
            function: function.into(),
        })
    }

    pub fn with_arg(mut self, arg: Value) -> Self {
        self.arg = Some(arg);
        self
    }

    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = Some(keep);
        self
    }

    fn describe(&self) -> Value {
        let mut spec = self.function.describe();
        if let Some(arg) = &self.arg {
            spec.insert("arg".into(), arg.clone());
        }
        if let Some(keep) = self.keep {
            spec.insert("keep".into(), json!(keep));
        }
        Value::Object(spec)
    }
}

/// Follow links by bucket and/or tag; `None` matches any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkPhase {
    pub bucket: Option<String>,
    pub tag: Option<String>,
    pub keep: bool,
}

impl LinkPhase {
    pub fn new(bucket: Option<&str>, tag: Option<&str>, keep: bool) -> Self {
        Self {
            bucket: bucket.map(str::to_string),
            tag: tag.map(str::to_string),
            keep,
        }
    }

    fn describe(&self) -> Value {
        json!({
            "bucket": self.bucket.as_deref().unwrap_or("_"),
            "tag": self.tag.as_deref().unwrap_or("_"),
            "keep": self.keep,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPhase {
    Link(LinkPhase),
    Map(Phase),
    Reduce(Phase),
}

impl QueryPhase {
    fn describe(&self) -> Value {
        match self {
            QueryPhase::Link(link) => json!({ "link": link.describe() }),
            QueryPhase::Map(phase) => json!({ "map": phase.describe() }),
            QueryPhase::Reduce(phase) => json!({ "reduce": phase.describe() }),
        }
    }
}

/// The one input form governing a job
#[derive(Debug, Clone, PartialEq)]
pub enum Inputs {
    Bucket(String),
    Keys(Vec<(String, String)>),
    Index {
        bucket: String,
        queries: Vec<IndexQuery>,
    },
    Search {
        index: String,
        query: String,
    },
}

impl Inputs {
    fn describe(&self) -> Result<Value> {
        match self {
            Inputs::Bucket(bucket) => Ok(json!(bucket)),
            Inputs::Keys(keys) if keys.is_empty() => {
                Err(Error::InvalidRequest("key inputs are empty".into()))
            }
            Inputs::Keys(keys) => Ok(Value::Array(
                keys.iter().map(|(b, k)| json!([b, k])).collect(),
            )),
            Inputs::Index { bucket, queries } => match queries.first() {
                Some(first) => Ok(first.to_input(bucket)),
                None => Err(Error::InvalidRequest("index inputs have no constraint".into())),
            },
            Inputs::Search { index, query } => Ok(json!({
                "module": "yokozuna",
                "function": "mapred_search",
                "arg": [index, query],
            })),
        }
    }
}

/// A serializable job
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub inputs: Value,
    pub query: Vec<QueryPhase>,
    pub timeout: Option<u64>,
}

impl Job {
    /// Wire format sent to `/mapred` or inside a map-reduce request frame
    pub fn to_json(&self) -> Value {
        let mut job = json!({
            "inputs": self.inputs,
            "query": self.query.iter().map(QueryPhase::describe).collect::<Vec<_>>(),
        });
        if let Some(timeout) = self.timeout {
            job["timeout"] = json!(timeout);
        }
        job
    }
}

/// Assembles a [`Job`], fixing phase order.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    inputs: Inputs,
    links: Vec<LinkPhase>,
    maps: Vec<Phase>,
    reduces: Vec<Phase>,
    timeout: Option<u64>,
}

impl JobBuilder {
    pub fn new(inputs: Inputs) -> Self {
        Self {
            inputs,
            links: Vec::new(),
            maps: Vec::new(),
            reduces: Vec::new(),
            timeout: None,
        }
    }

    pub fn link(mut self, link: LinkPhase) -> Self {
        self.links.push(link);
        self
    }

    pub fn map(mut self, phase: Phase) -> Self {
        self.maps.push(phase);
        self
    }

    pub fn reduce(mut self, phase: Phase) -> Self {
        self.reduces.push(phase);
        self
    }

    pub fn timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    pub fn build(self) -> Result<Job> {
        let inputs = self.inputs.describe()?;

        let mut query: Vec<QueryPhase> = self.links.into_iter().map(QueryPhase::Link).collect();
        if let Inputs::Index { queries, .. } = &self.inputs {
            if queries.len() > 1 {
                query.push(QueryPhase::Map(index_filter(queries)));
            }
        }
        query.extend(self.maps.into_iter().map(QueryPhase::Map));
        query.extend(self.reduces.into_iter().map(QueryPhase::Reduce));

        Ok(Job {
            inputs,
            query,
            timeout: self.timeout,
        })
    }
}

/// Map phase testing every constraint against the stored index metadata
fn index_filter(queries: &[IndexQuery]) -> Phase {
    let constraints = queries
        .iter()
        .map(|q| {
            let mut constraint = q.to_filter();
            constraint["index"] = json!(q.wire_name());
            constraint
        })
        .collect();
    Phase::source(builtins::FILTER_INDEXES).with_arg(Value::Array(constraints))
}

/// Result shape a rewritten lookup must produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// `{keys: [...]}` as returned by a key listing
    Keys,
    /// `[{key, data}, ...]` as returned by a lookup with values
    KeyData,
}

impl Projection {
    fn phase(&self) -> Phase {
        match self {
            Projection::Keys => Phase::source(builtins::MAP_KEY),
            Projection::KeyData => Phase::source(builtins::MAP_KEY_DATA),
        }
    }
}

/// Job answering a lookup in the given shape
pub fn lookup_job(inputs: Inputs, projection: Projection) -> Result<Job> {
    JobBuilder::new(inputs).map(projection.phase()).build()
}

/// Job following `links` from one object, ending in `{key, data}` pairs
pub fn walk_job(bucket: &str, key: &str, links: Vec<LinkPhase>) -> Result<Job> {
    let builder = links.into_iter().fold(
        JobBuilder::new(Inputs::Keys(vec![(bucket.to_string(), key.to_string())])),
        JobBuilder::link,
    );
    builder.map(Projection::KeyData.phase()).build()
}

/// Reshape a lookup job's reply into the direct-call result shape
pub fn reshape(reply: Reply, projection: Projection) -> Result<Reply> {
    let results = match &reply.data {
        Data::Empty => Vec::new(),
        Data::Json(Value::Array(items)) => items.clone(),
        other => {
            return Err(Error::MalformedResponse(format!(
                "map-reduce results are not a list: {}",
                other
            )))
        }
    };

    let data = match projection {
        Projection::Keys => {
            let mut seen = HashSet::new();
            let mut keys = Vec::new();
            for item in results {
                let key = item.as_str().ok_or_else(|| {
                    Error::MalformedResponse(format!("map-reduce key is not a string: {}", item))
                })?;
                if seen.insert(key.to_string()) {
                    keys.push(json!(key));
                }
            }
            json!({ "keys": keys })
        }
        Projection::KeyData => {
            if let Some(bad) = results.iter().find(|item| item.get("key").is_none()) {
                return Err(Error::MalformedResponse(format!(
                    "map-reduce result has no key: {}",
                    bad
                )));
            }
            Value::Array(results)
        }
    };

    Ok(Reply {
        data: Data::Json(data),
        ..reply
    })
}
