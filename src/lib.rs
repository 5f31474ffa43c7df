//! # simpleriak
//!
//! A Riak client that speaks either the HTTP interface or the binary
//! protocol buffers interface behind one API:
//! - Buckets, keys and objects with vclock-aware writes
//! - Secondary index lookups, intersected across several indexes
//! - Sibling reads that never drop a version
//! - Map-reduce jobs, link walking and search
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 Client                   │
//! │  bucket resolution, lookup rewrites      │
//! └───────┬───────────────────┬──────────────┘
//!         │ request           │ map-reduce jobs
//!   ┌─────▼──────┐      ┌─────▼──────┐
//!   │    HTTP    │      │   Binary   │   dyn Backend
//!   │  backend   │      │  backend   │
//!   └─────┬──────┘      └─────┬──────┘
//!         └────────┬──────────┘
//!            ┌─────▼─────┐
//!            │ normalize │  one Reply, one Error
//!            └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use simpleriak::{Client, ClientConfig, IndexQuery, PutParams, Query};
//!
//! # async fn run() -> simpleriak::Result<()> {
//! let client = Client::new(ClientConfig::default().with_bucket("people"))?;
//!
//! client.put(PutParams::new(r#"{"name":"bob"}"#).key("bob").index("age", 42)).await?;
//! let bob = client.get(&Query::key("bob")).await?;
//! let keys = client.get_keys(&Query::index(IndexQuery::range("age", 18, 65))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Use the CLI
//! ```bash
//! simpleriak --bucket people put bob --data '{"name":"bob"}'
//! simpleriak --bucket people keys --index age=42
//! simpleriak --backend binary ping
//! ```

#![allow(clippy::result_large_err)]

pub mod backend;
pub mod client;
pub mod codec;
pub mod common;
pub mod mapred;
pub mod reply;
pub mod request;
pub mod siblings;

// Re-export commonly used types
pub use backend::{Backend, Capabilities, Properties};
pub use client::{Client, MapRedParams, ModifyParams, PutParams, Query, WalkParams};
pub use codec::{IndexQuery, IndexValue, Link};
pub use common::{BackendKind, ClientConfig, Error, Result};
pub use mapred::{LinkPhase, Phase};
pub use reply::{Content, Data, Reply};
pub use request::SearchQuery;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
