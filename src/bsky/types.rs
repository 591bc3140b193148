//! Post and thread shapes the aggregation engine works on.
//!
//! These are deliberately smaller than the upstream `PostView`: only the fields
//! needed for classification, ordering and rendering survive decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reply reference carried by a post that answers another post.
///
/// Either side may be missing when the upstream record is malformed. A post
/// with a `ReplyRef` is a reply even if both sides are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReplyRef {
    pub root: Option<String>,
    pub parent: Option<String>,
}

/// A single upstream post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub uri: String,
    pub author_id: String,
    pub text: String,
    /// Assigned by the upstream indexer; the only ordering signal search gives us.
    pub indexed_at: DateTime<Utc>,
    /// Author-asserted creation time. Falls back to `indexed_at` when absent.
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
}

impl Post {
    /// Create a top-level post whose creation time equals its index time.
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        author_id: impl Into<String>,
        text: impl Into<String>,
        indexed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uri: uri.into(),
            author_id: author_id.into(),
            text: text.into(),
            indexed_at,
            created_at: indexed_at,
            like_count: None,
            reply: None,
        }
    }

    #[must_use]
    pub fn with_reply(mut self, root: impl Into<String>, parent: impl Into<String>) -> Self {
        self.reply = Some(ReplyRef {
            root: Some(root.into()),
            parent: Some(parent.into()),
        });
        self
    }

    #[must_use]
    pub fn with_like_count(mut self, like_count: u64) -> Self {
        self.like_count = Some(like_count);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// URI of the conversation root, if this is a well-formed reply.
    #[must_use]
    pub fn root_uri(&self) -> Option<&str> {
        self.reply.as_ref().and_then(|r| r.root.as_deref())
    }

    /// URI of the post this one directly answers, if this is a well-formed reply.
    #[must_use]
    pub fn parent_uri(&self) -> Option<&str> {
        self.reply.as_ref().and_then(|r| r.parent.as_deref())
    }

    #[must_use]
    pub fn likes(&self) -> u64 {
        self.like_count.unwrap_or(0)
    }
}

/// A node of a fetched thread view.
///
/// `replies` is `None` when the upstream stopped descending before this node,
/// and `Some(vec![])` when it looked and found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadNode {
    pub post: Post,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<ThreadNode>>,
}

impl ThreadNode {
    #[must_use]
    pub fn leaf(post: Post) -> Self {
        Self {
            post,
            replies: None,
        }
    }

    #[must_use]
    pub fn with_replies(post: Post, replies: Vec<ThreadNode>) -> Self {
        Self {
            post,
            replies: Some(replies),
        }
    }
}
