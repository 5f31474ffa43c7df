//! Operation parameters

use crate::codec::{IndexQuery, IndexValue, Indexes, Link};
use crate::mapred::{LinkPhase, Phase};
use crate::reply::Data;
use crate::request::{QueryParams, SearchQuery};
use std::collections::BTreeMap;

/// Selects the objects a read, key listing or delete applies to.
///
/// A key wins over index constraints, which win over a search query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub index: Vec<IndexQuery>,
    pub search: Option<SearchQuery>,
    /// Passed through as query parameters (`r`, `pr`, `rw`, ...)
    pub options: QueryParams,
}

/// What a [`Query`] resolves to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    Key(&'a str),
    Index(&'a [IndexQuery]),
    Search(&'a SearchQuery),
    All,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn index(query: IndexQuery) -> Self {
        Self {
            index: vec![query],
            ..Default::default()
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            search: Some(SearchQuery::new(query)),
            ..Default::default()
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Add another constraint; all of them must hold
    pub fn and_index(mut self, query: IndexQuery) -> Self {
        self.index.push(query);
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn target(&self) -> Target<'_> {
        if let Some(key) = &self.key {
            Target::Key(key)
        } else if !self.index.is_empty() {
            Target::Index(&self.index)
        } else if let Some(search) = &self.search {
            Target::Search(search)
        } else {
            Target::All
        }
    }
}

/// An object write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutParams {
    pub bucket: Option<String>,
    /// `None` lets the server assign one
    pub key: Option<String>,
    pub data: Data,
    pub content_type: Option<String>,
    /// Skips the vclock probe when set
    pub vclock: Option<String>,
    pub indexes: Indexes,
    pub links: Vec<Link>,
    pub return_body: bool,
    pub options: QueryParams,
}

impl PutParams {
    pub fn new(data: impl Into<Data>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn vclock(mut self, vclock: impl Into<String>) -> Self {
        self.vclock = Some(vclock.into());
        self
    }

    pub fn index(mut self, name: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        self.indexes.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    pub fn return_body(mut self) -> Self {
        self.return_body = true;
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

pub type Transform = Box<dyn FnOnce(Data) -> Data + Send>;

/// A read-modify-write of one key
#[derive(Default)]
pub struct ModifyParams {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub transform: Option<Transform>,
    /// `Some` adds the value to the index, `None` drops the index entirely
    pub index: BTreeMap<String, Option<IndexValue>>,
}

impl ModifyParams {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn transform(mut self, f: impl FnOnce(Data) -> Data + Send + 'static) -> Self {
        self.transform = Some(Box::new(f));
        self
    }

    pub fn add_index(mut self, name: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        self.index.insert(name.into(), Some(value.into()));
        self
    }

    pub fn remove_index(mut self, name: impl Into<String>) -> Self {
        self.index.insert(name.into(), None);
        self
    }

    /// Apply the index changes; untouched entries are kept
    pub(crate) fn apply_index(&self, indexes: &mut Indexes) {
        for (name, change) in &self.index {
            match change {
                Some(value) => {
                    let values = indexes.entry(name.clone()).or_default();
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
                None => {
                    indexes.remove(name);
                }
            }
        }
    }
}

/// A caller-built map-reduce job. Inputs are taken from the first non-empty
/// of `keys`, `index`, `search`; otherwise the whole bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapRedParams {
    pub bucket: Option<String>,
    pub keys: Vec<String>,
    pub index: Vec<IndexQuery>,
    pub search: Option<String>,
    pub links: Vec<LinkPhase>,
    pub map: Vec<Phase>,
    pub reduce: Vec<Phase>,
    pub timeout: Option<u64>,
}

impl MapRedParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn index(mut self, query: IndexQuery) -> Self {
        self.index.push(query);
        self
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    pub fn link(mut self, link: LinkPhase) -> Self {
        self.links.push(link);
        self
    }

    pub fn map(mut self, phase: Phase) -> Self {
        self.map.push(phase);
        self
    }

    pub fn reduce(mut self, phase: Phase) -> Self {
        self.reduce.push(phase);
        self
    }

    pub fn timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }
}

/// Link walk starting at one object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkParams {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub links: Vec<LinkPhase>,
}

impl WalkParams {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn step(mut self, link: LinkPhase) -> Self {
        self.links.push(link);
        self
    }
}
