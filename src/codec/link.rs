//! Link header codec
//!
//! Links travel as one `Link` header: a comma-joined list of
//! `</buckets/<bucket>/keys/<key>>; riaktag="<tag>"` entries.

use crate::common::utils::{decode_segment, encode_segment};
use crate::common::Result;
use serde::{Deserialize, Serialize};

/// A tagged edge from one object to another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub bucket: String,
    pub key: String,
    pub tag: String,
}

impl Link {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            tag: tag.into(),
        }
    }

    fn to_header_entry(&self) -> String {
        format!(
            "</buckets/{}/keys/{}>; riaktag=\"{}\"",
            encode_segment(&self.bucket),
            encode_segment(&self.key),
            self.tag
        )
    }
}

/// Header value for a link set, `None` when there are no links
pub fn encode_links(links: &[Link]) -> Option<String> {
    if links.is_empty() {
        return None;
    }
    Some(
        links
            .iter()
            .map(Link::to_header_entry)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Parse a `Link` header. Entries without a `riaktag` (such as the
/// `rel="up"` bucket link) are skipped.
pub fn decode_links(header: &str) -> Result<Vec<Link>> {
    let mut links = Vec::new();
    for entry in header.split(',') {
        let entry = entry.trim();
        let (Some(open), Some(close)) = (entry.find('<'), entry.find('>')) else {
            continue;
        };
        if close < open {
            continue;
        }
        let Some(tag) = riaktag(&entry[close + 1..]) else {
            continue;
        };
        if let Some((bucket, key)) = target(&entry[open + 1..close])? {
            links.push(Link { bucket, key, tag });
        }
    }
    Ok(links)
}

fn riaktag(params: &str) -> Option<String> {
    params.split(';').find_map(|param| {
        let (name, value) = param.trim().split_once('=')?;
        (name.trim() == "riaktag").then(|| value.trim().trim_matches('"').to_string())
    })
}

/// `(bucket, key)` from `/buckets/b/keys/k` or the older `/riak/b/k` form
fn target(url: &str) -> Result<Option<(String, String)>> {
    let segments: Vec<&str> = url.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["buckets", bucket, "keys", key] | ["riak", bucket, key] => {
            Ok(Some((decode_segment(bucket)?, decode_segment(key)?)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_links() {
        let links = vec![
            Link::new("people", "bob", "friend"),
            Link::new("people", "a b", "boss"),
        ];
        assert_eq!(
            encode_links(&links).unwrap(),
            "</buckets/people/keys/bob>; riaktag=\"friend\", </buckets/people/keys/a%20b>; riaktag=\"boss\""
        );
        assert!(encode_links(&[]).is_none());
    }

    #[test]
    fn test_decode_links() {
        let header = "</buckets/people>; rel=\"up\", </buckets/people/keys/bob>; riaktag=\"friend\", </riak/pets/rex>; riaktag=\"pet\"";
        let links = decode_links(header).unwrap();
        assert_eq!(
            links,
            vec![
                Link::new("people", "bob", "friend"),
                Link::new("pets", "rex", "pet"),
            ]
        );
    }

    #[test]
    fn test_links_round_trip() {
        let links = vec![Link::new("b", "k/1", "t")];
        let header = encode_links(&links).unwrap();
        assert_eq!(decode_links(&header).unwrap(), links);
    }
}
