//! Sibling resolution for direct key reads
//!
//! A `300 Multiple Choices` read lists one vtag per line between a
//! `Siblings:` header line and a trailing empty line. Each sibling is then
//! fetched by vtag and the results are gathered into one reply; nothing is
//! dropped.

use crate::codec::index::indexes_from_headers;
use crate::codec::decode_links;
use crate::common::utils::media_type;
use crate::common::{Error, Result};
use crate::reply::{Content, Data, Reply};
use crate::request::{LINK_HEADER, VCLOCK_HEADER};
use futures_util::future::try_join_all;
use std::future::Future;

pub const MULTIPLE_CHOICES: u16 = 300;

const SIBLINGS_HEADER: &str = "Siblings:";

/// Vtags listed in a 300 body
pub fn parse_vtags(body: &Data) -> Result<Vec<String>> {
    let text = match body {
        Data::Text(text) => text.as_str(),
        other => {
            return Err(Error::MalformedResponse(format!(
                "sibling list is not text: {:?}",
                other
            )))
        }
    };

    let mut lines = text.lines().map(str::trim);
    if lines.next() != Some(SIBLINGS_HEADER) {
        return Err(Error::MalformedResponse(format!(
            "sibling list missing header: {:?}",
            text
        )));
    }
    let vtags: Vec<String> = lines
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if vtags.is_empty() {
        return Err(Error::MalformedResponse("sibling list is empty".into()));
    }
    Ok(vtags)
}

/// Build a [`Content`] from a single-value HTTP read
pub fn content_from_reply(reply: &Reply, vtag: Option<&str>) -> Result<Content> {
    let headers = reply.headers.as_ref();
    let indexes = match headers {
        Some(headers) => indexes_from_headers(headers)?,
        None => Default::default(),
    };
    let links = match reply.header(LINK_HEADER) {
        Some(header) => decode_links(header)?,
        None => Vec::new(),
    };
    let vtag = vtag
        .map(str::to_string)
        .or_else(|| reply.header("etag").map(|e| e.trim_matches('"').to_string()));

    Ok(Content {
        value: reply.data.clone(),
        content_type: reply
            .header("content-type")
            .map(|ct| media_type(ct).to_string())
            .unwrap_or_default(),
        vtag,
        indexes,
        links,
    })
}

/// Attach sibling contents to the initial read. Every sibling shares the
/// vclock of that read; `data` lists their values in order.
pub fn aggregate(mut initial: Reply, content: Vec<Content>) -> Reply {
    if initial.vclock.is_none() {
        initial.vclock = initial.header(VCLOCK_HEADER).map(str::to_string);
    }
    if content.len() == 1 {
        initial.data = content[0].value.clone();
    } else {
        initial.data = Data::Json(content.iter().map(|c| c.value.to_json()).collect());
    }
    initial.content = content;
    initial
}

/// Resolve a normalized HTTP read.
///
/// A plain read becomes a one-element `content`. A 300 read fetches every
/// listed vtag through `fetch`, waiting for all of them before returning.
pub async fn resolve<F, Fut>(initial: Reply, fetch: F) -> Result<Reply>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Reply>>,
{
    if initial.status_code != MULTIPLE_CHOICES {
        let content = content_from_reply(&initial, None)?;
        return Ok(aggregate(initial, vec![content]));
    }

    let vtags = parse_vtags(&initial.data)?;
    tracing::debug!(count = vtags.len(), "fetching siblings");

    let fetches = vtags.iter().map(|vtag| {
        let sibling = fetch(vtag.clone());
        async move {
            let reply = sibling.await?;
            content_from_reply(&reply, Some(vtag.as_str()))
        }
    });
    let content = try_join_all(fetches).await?;
    Ok(aggregate(initial, content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::IndexValue;
    use crate::reply::{normalize, RawResponse};

    fn sibling_list() -> Reply {
        normalize(Ok(RawResponse::new(300)
            .header("content-type", "text/plain")
            .header(VCLOCK_HEADER, "vclock-1")
            .body("Siblings:\n4v5xOg4bVEb5VK5X6LA8Ss\n6xZJXyRJxxXfTpPhsDSk2M\n")))
        .unwrap()
    }

    fn sibling(value: &str, etag: &str) -> Reply {
        normalize(Ok(RawResponse::new(200)
            .header("content-type", "text/plain; charset=utf-8")
            .header("etag", format!("\"{}\"", etag))
            .header("x-riak-index-color_bin", "red")
            .body(value.to_string())))
        .unwrap()
    }

    #[test]
    fn test_parse_vtags() {
        let vtags = parse_vtags(&Data::Text("Siblings:\nabc\ndef\n".into())).unwrap();
        assert_eq!(vtags, vec!["abc", "def"]);
        assert!(parse_vtags(&Data::Text("abc\ndef\n".into())).is_err());
        assert!(parse_vtags(&Data::Text("Siblings:\n".into())).is_err());
        assert!(parse_vtags(&Data::Empty).is_err());
    }

    #[test]
    fn test_content_from_reply() {
        let content = content_from_reply(&sibling("red car", "tag-1"), None).unwrap();
        assert_eq!(content.value, Data::Text("red car".into()));
        assert_eq!(content.content_type, "text/plain");
        assert_eq!(content.vtag.as_deref(), Some("tag-1"));
        assert_eq!(content.indexes["color"], vec![IndexValue::from("red")]);
    }

    #[tokio::test]
    async fn test_resolve_single_value() {
        let reply = resolve(sibling("only", "t"), |_| async {
            Err(Error::MalformedResponse("unexpected sibling fetch".into()))
        })
        .await
        .unwrap();
        assert_eq!(reply.content.len(), 1);
        assert_eq!(reply.data, Data::Text("only".into()));
    }

    #[tokio::test]
    async fn test_resolve_fetches_every_sibling() {
        let reply = resolve(sibling_list(), |vtag| async move {
            Ok(sibling(&format!("value for {}", vtag), "ignored"))
        })
        .await
        .unwrap();

        assert_eq!(reply.status_code, 300);
        assert_eq!(reply.content.len(), 2);
        assert_eq!(reply.vclock.as_deref(), Some("vclock-1"));
        assert_eq!(reply.content[0].vtag.as_deref(), Some("4v5xOg4bVEb5VK5X6LA8Ss"));
        assert_eq!(
            reply.content[1].value,
            Data::Text("value for 6xZJXyRJxxXfTpPhsDSk2M".into())
        );
        assert!(reply.has_siblings());
    }

    #[tokio::test]
    async fn test_resolve_propagates_fetch_error() {
        let result = resolve(sibling_list(), |_| async {
            Err(Error::MalformedResponse("boom".into()))
        })
        .await;
        assert!(result.is_err());
    }
}
