//! Common utilities and types shared across simpleriak

pub mod config;
pub mod error;
pub mod utils;

pub use config::{BackendKind, ClientConfig};
pub use error::{Error, Result};
pub use utils::{decode_segment, encode_segment, last_segment, reason_phrase};
