//! Shared fixtures: an in-memory `PostSource` that records every call.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use community_threads::bsky::{FetchError, Post, PostSource, SearchPage, ThreadNode};

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn uri(n: u32) -> String {
    format!("at://did:plc:test/app.bsky.feed.post/{n}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub limit: u32,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadCall {
    pub uri: String,
    pub depth: u32,
    pub parent_height: u32,
}

/// Search results are served from `feed` in order, `limit` at a time, with
/// the offset as the cursor. Threads are served from a parent -> children
/// index and truncated to the requested depth.
#[derive(Default)]
pub struct FakeSource {
    feed: Vec<Post>,
    posts: HashMap<String, Post>,
    children: HashMap<String, Vec<String>>,
    fail_search: bool,
    fail_thread: bool,
    pub search_calls: Mutex<Vec<SearchCall>>,
    pub thread_calls: Mutex<Vec<ThreadCall>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(feed: Vec<Post>) -> Self {
        Self {
            feed,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_search: true,
            fail_thread: true,
            ..Self::default()
        }
    }

    /// Register a post for thread fetches, as a reply to `parent` when given.
    pub fn add_thread_post(&mut self, post: Post, parent: Option<String>) {
        if let Some(parent) = parent {
            self.children
                .entry(parent)
                .or_default()
                .push(post.uri.clone());
        }
        self.posts.insert(post.uri.clone(), post);
    }

    pub fn search_calls(&self) -> Vec<SearchCall> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn thread_calls(&self) -> Vec<ThreadCall> {
        self.thread_calls.lock().unwrap().clone()
    }

    fn build_node(&self, uri: &str, depth: u32) -> Option<ThreadNode> {
        let post = self.posts.get(uri)?.clone();
        if depth == 0 {
            return Some(ThreadNode::leaf(post));
        }
        let replies = self
            .children
            .get(uri)
            .map(|kids| {
                kids.iter()
                    .filter_map(|k| self.build_node(k, depth - 1))
                    .collect()
            })
            .unwrap_or_default();
        Some(ThreadNode::with_replies(post, replies))
    }
}

#[async_trait]
impl PostSource for FakeSource {
    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPage, FetchError> {
        self.search_calls.lock().unwrap().push(SearchCall {
            query: query.to_string(),
            limit,
            cursor: cursor.map(ToString::to_string),
        });

        if self.fail_search {
            return Err(FetchError::Status {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }

        let start: usize = cursor.map_or(0, |c| c.parse().unwrap());
        let end = (start + limit as usize).min(self.feed.len());
        let posts = self.feed.get(start..end).unwrap_or_default().to_vec();
        let cursor = (end < self.feed.len()).then(|| end.to_string());

        Ok(SearchPage { posts, cursor })
    }

    async fn get_thread(
        &self,
        uri: &str,
        depth: u32,
        parent_height: u32,
    ) -> Result<ThreadNode, FetchError> {
        self.thread_calls.lock().unwrap().push(ThreadCall {
            uri: uri.to_string(),
            depth,
            parent_height,
        });

        if self.fail_thread {
            return Err(FetchError::Status {
                status: 500,
                message: "internal error".to_string(),
            });
        }

        self.build_node(uri, depth)
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}
