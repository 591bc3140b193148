use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::source::{FetchError, PostSource, SearchPage};
use super::types::{Post, ReplyRef, ThreadNode};
use crate::config::Config;
use crate::constants::USER_AGENT;

/// XRPC client for the search and thread endpoints.
#[derive(Clone)]
pub struct BskyClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl BskyClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        subject: &str,
    ) -> Result<T, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let error: XrpcError = serde_json::from_slice(&body).unwrap_or_default();
            if status == reqwest::StatusCode::NOT_FOUND || error.error.as_deref() == Some("NotFound")
            {
                return Err(FetchError::NotFound(subject.to_string()));
            }
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: error
                    .message
                    .or(error.error)
                    .unwrap_or_else(|| status.to_string()),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl PostSource for BskyClient {
    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPage, FetchError> {
        let mut url = format!(
            "{}/app.bsky.feed.searchPosts?q={}&limit={limit}",
            self.base_url,
            urlencoding::encode(query)
        );
        if let Some(cursor) = cursor {
            url.push_str("&cursor=");
            url.push_str(&urlencoding::encode(cursor));
        }

        let response: SearchPostsResponse = self.get_json(&url, query).await?;
        let total = response.posts.len();
        let posts: Vec<Post> = response.posts.into_iter().filter_map(decode_post).collect();
        debug!(
            query,
            received = total,
            kept = posts.len(),
            has_cursor = response.cursor.is_some(),
            "Fetched search page"
        );

        Ok(SearchPage {
            posts,
            cursor: response.cursor.filter(|c| !c.is_empty()),
        })
    }

    async fn get_thread(
        &self,
        uri: &str,
        depth: u32,
        parent_height: u32,
    ) -> Result<ThreadNode, FetchError> {
        let url = format!(
            "{}/app.bsky.feed.getPostThread?uri={}&depth={depth}&parentHeight={parent_height}",
            self.base_url,
            urlencoding::encode(uri)
        );

        let response: PostThreadResponse = self.get_json(&url, uri).await?;
        let thread: WireThreadView = serde_json::from_value(response.thread)?;

        if thread.not_found || is_union_kind(thread.kind.as_deref(), "notFoundPost") {
            return Err(FetchError::NotFound(uri.to_string()));
        }
        if thread.blocked || is_union_kind(thread.kind.as_deref(), "blockedPost") {
            return Err(FetchError::Status {
                status: 403,
                message: format!("thread is blocked: {uri}"),
            });
        }

        decode_thread(thread).ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct XrpcError {
    error: Option<String>,
    message: Option<String>,
}

/// Response from searchPosts API
#[derive(Debug, Deserialize)]
struct SearchPostsResponse {
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    posts: Vec<Value>,
}

/// Response from getPostThread API
#[derive(Debug, Deserialize)]
struct PostThreadResponse {
    thread: Value,
}

#[derive(Debug, Deserialize)]
struct WireThreadView {
    #[serde(rename = "$type", default)]
    kind: Option<String>,
    #[serde(default)]
    post: Option<Value>,
    #[serde(default)]
    replies: Option<Vec<Value>>,
    #[serde(rename = "notFound", default)]
    not_found: bool,
    #[serde(default)]
    blocked: bool,
}

#[derive(Debug, Deserialize)]
struct WirePostView {
    uri: String,
    author: WireAuthor,
    #[serde(default)]
    record: Value,
    #[serde(rename = "indexedAt")]
    indexed_at: String,
    #[serde(rename = "likeCount", default)]
    like_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    did: String,
}

fn is_union_kind(kind: Option<&str>, name: &str) -> bool {
    kind.is_some_and(|k| k.rsplit('#').next() == Some(name))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Decode a `PostView`, skipping records too broken to order or address.
fn decode_post(value: Value) -> Option<Post> {
    let wire: WirePostView = match serde_json::from_value(value) {
        Ok(w) => w,
        Err(e) => {
            warn!("Skipping undecodable post: {e}");
            return None;
        }
    };

    let Some(indexed_at) = parse_timestamp(&wire.indexed_at) else {
        warn!(uri = %wire.uri, indexed_at = %wire.indexed_at, "Skipping post with bad indexedAt");
        return None;
    };

    let created_at = wire
        .record
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or(indexed_at);

    let text = wire
        .record
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(Post {
        uri: wire.uri,
        author_id: wire.author.did,
        text,
        indexed_at,
        created_at,
        like_count: wire.like_count,
        reply: decode_reply_ref(wire.record.get("reply")),
    })
}

/// A present, non-null `reply` always yields a `ReplyRef`; sides without a string `uri` are dropped.
fn decode_reply_ref(value: Option<&Value>) -> Option<ReplyRef> {
    let value = value.filter(|v| !v.is_null())?;
    let side = |name: &str| {
        value
            .get(name)
            .and_then(|r| r.get("uri"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
    };
    Some(ReplyRef {
        root: side("root"),
        parent: side("parent"),
    })
}

fn decode_thread(thread: WireThreadView) -> Option<ThreadNode> {
    let post = decode_post(thread.post?)?;
    let replies = thread.replies.map(|replies| {
        replies
            .into_iter()
            .filter_map(|reply| serde_json::from_value::<WireThreadView>(reply).ok())
            .filter_map(decode_thread)
            .collect()
    });
    Some(ThreadNode { post, replies })
}
