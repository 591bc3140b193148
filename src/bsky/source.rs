use async_trait::async_trait;
use thiserror::Error;

use super::types::{Post, ThreadNode};

/// One page of upstream search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub posts: Vec<Post>,
    /// Absent once the upstream has nothing further to return.
    pub cursor: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The two upstream reads the aggregation engine depends on.
///
/// Implementations own transport, auth, deadlines and any retry policy. The
/// engine calls them sequentially unless stated otherwise and never retries.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Full-text search. Ranking is implementation-defined.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream cannot be reached or answers with a failure.
    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPage, FetchError>;

    /// Fetch a post with up to `depth` levels of replies and `parent_height` ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] when the post does not exist upstream.
    async fn get_thread(
        &self,
        uri: &str,
        depth: u32,
        parent_height: u32,
    ) -> Result<ThreadNode, FetchError>;
}
