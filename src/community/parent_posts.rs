//! Community root posts for a hashtag.
//!
//! The search endpoint knows nothing about threads. This module pages through
//! it, keeps the top-level posts that carry the tag, and uses every reply it
//! sees along the way to work out how recently each of those posts was active.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::tag::{normalize_tag, tag_needle, text_has_tag};
use crate::bsky::{FetchError, Post, PostSource};
use crate::constants::{DEFAULT_MAX_POSTS, DEFAULT_MAX_SEARCH_PAGES, DEFAULT_SEARCH_PAGE_SIZE};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("tag must not be empty")]
    EmptyTag,
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recent activity first.
    #[default]
    Recent,
    /// Most liked first, then most recent activity.
    Top,
}

/// A top-level post plus the newest reply time seen for its conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPost {
    pub post: Post,
    /// Never earlier than `post.indexed_at`.
    pub latest_reply_at: DateTime<Utc>,
}

impl CommunityPost {
    fn new(post: Post) -> Self {
        let latest_reply_at = post.indexed_at;
        Self {
            post,
            latest_reply_at,
        }
    }

    fn bump(&mut self, reply_at: DateTime<Utc>) {
        if reply_at > self.latest_reply_at {
            self.latest_reply_at = reply_at;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParentPostsResult {
    pub posts: Vec<CommunityPost>,
    /// Last cursor the upstream handed back; pass it in to continue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Parameters for [`get_parent_posts`].
#[derive(Debug, Clone)]
pub struct ParentPostsRequest {
    pub tag: String,
    pub cursor: Option<String>,
    pub max_posts: usize,
    pub sort: SortOrder,
    /// Author ids allowed to start a thread. Ignored when `include_all` is set.
    pub member_filter: Option<HashSet<String>>,
    pub include_all: bool,
    /// Upstream page size, independent of `max_posts`.
    pub page_size: u32,
    pub max_pages: usize,
}

impl ParentPostsRequest {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            cursor: None,
            max_posts: DEFAULT_MAX_POSTS,
            sort: SortOrder::Recent,
            member_filter: None,
            include_all: false,
            page_size: DEFAULT_SEARCH_PAGE_SIZE,
            max_pages: DEFAULT_MAX_SEARCH_PAGES,
        }
    }

    #[must_use]
    pub fn cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    #[must_use]
    pub fn max_posts(mut self, max_posts: usize) -> Self {
        self.max_posts = max_posts;
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn members(mut self, members: HashSet<String>, include_all: bool) -> Self {
        self.member_filter = Some(members);
        self.include_all = include_all;
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Stop after this many upstream pages even if `max_posts` is not reached.
    /// The returned cursor lets the caller pick up where the call stopped.
    #[must_use]
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn admits_author(&self, author_id: &str) -> bool {
        match &self.member_filter {
            Some(members) if !self.include_all => members.contains(author_id),
            _ => true,
        }
    }
}

/// Collect up to `max_posts` community root posts for a hashtag.
///
/// Pages are fetched one after another, because each cursor comes from the
/// previous response. Fetching stops once enough parents are collected, the
/// cursor runs out, a page comes back empty, or `max_pages` is reached.
///
/// # Errors
///
/// Returns [`FeedError::EmptyTag`] before any request if the tag is blank, and
/// passes upstream failures through unchanged.
pub async fn get_parent_posts<S>(
    source: &S,
    request: &ParentPostsRequest,
) -> Result<ParentPostsResult, FeedError>
where
    S: PostSource + ?Sized,
{
    let tag = normalize_tag(&request.tag);
    if tag.is_empty() {
        return Err(FeedError::EmptyTag);
    }

    let query = format!("#{tag}");
    let needle = tag_needle(tag);

    let mut parents: Vec<CommunityPost> = Vec::new();
    let mut parent_index: HashMap<String, usize> = HashMap::new();
    let mut latest_reply_by_root: HashMap<String, DateTime<Utc>> = HashMap::new();
    let mut cursor = request.cursor.clone();
    let mut pages = 0usize;

    while parents.len() < request.max_posts && pages < request.max_pages {
        let page = source
            .search_posts(&query, request.page_size, cursor.as_deref())
            .await?;
        pages += 1;

        let page_len = page.posts.len();
        let before = parents.len();

        for post in page.posts {
            if post.is_reply() {
                match post.root_uri() {
                    Some(root) => {
                        let latest = latest_reply_by_root
                            .entry(root.to_string())
                            .or_insert(post.indexed_at);
                        if post.indexed_at > *latest {
                            *latest = post.indexed_at;
                        }
                    }
                    None => debug!(uri = %post.uri, "Reply without a usable root reference"),
                }
                continue;
            }

            if parent_index.contains_key(&post.uri)
                || !text_has_tag(&post.text, &needle)
                || !request.admits_author(&post.author_id)
            {
                continue;
            }

            parent_index.insert(post.uri.clone(), parents.len());
            parents.push(CommunityPost::new(post));
        }

        debug!(
            tag,
            page = pages,
            received = page_len,
            new_parents = parents.len() - before,
            collected = parents.len(),
            "Processed search page"
        );

        let repeated = page.cursor.is_some() && page.cursor == cursor;
        cursor = page.cursor;

        if page_len == 0 || cursor.is_none() {
            break;
        }
        if repeated {
            warn!(tag, cursor = ?cursor, "Upstream repeated its cursor, stopping");
            break;
        }
    }

    if pages >= request.max_pages && parents.len() < request.max_posts && cursor.is_some() {
        warn!(
            tag,
            pages,
            collected = parents.len(),
            "Search page cap reached before enough parent posts were found"
        );
    }

    for parent in &mut parents {
        if let Some(reply_at) = latest_reply_by_root.get(&parent.post.uri) {
            parent.bump(*reply_at);
        }
    }

    sort_community_posts(&mut parents, request.sort);
    parents.truncate(request.max_posts);

    info!(
        tag,
        pages,
        returned = parents.len(),
        has_cursor = cursor.is_some(),
        "Collected parent posts"
    );

    Ok(ParentPostsResult {
        posts: parents,
        cursor,
    })
}

/// Order posts for display. The sort is stable, so ties keep discovery order.
pub fn sort_community_posts(posts: &mut [CommunityPost], order: SortOrder) {
    match order {
        SortOrder::Top => posts.sort_by(|a, b| {
            b.post
                .likes()
                .cmp(&a.post.likes())
                .then_with(|| b.latest_reply_at.cmp(&a.latest_reply_at))
        }),
        SortOrder::Recent => posts.sort_by(|a, b| b.latest_reply_at.cmp(&a.latest_reply_at)),
    }
}
