//! Wire encodings for object metadata

pub mod index;
pub mod link;

pub use index::{
    decode_name, encode_name, encode_range_name, intersect, IndexKind, IndexMatch, IndexQuery,
    IndexValue, Indexes,
};
pub use link::{decode_links, encode_links, Link};
