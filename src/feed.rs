//! Continuously polled thread feeds for watched tags.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::bsky::PostSource;
use crate::community::tag::tag_key;
use crate::community::{rollup_threads, FeedError, Thread};

const MAX_BACKOFF_INTERVAL: Duration = Duration::from_secs(300);

/// Polled state for one tag. Owns the thread list that each poll folds into.
#[derive(Debug, Clone)]
pub struct TagFeed {
    tag: String,
    page_size: u32,
    threads: Vec<Thread>,
}

impl TagFeed {
    #[must_use]
    pub fn new(tag: &str, page_size: u32) -> Self {
        Self {
            tag: tag_key(tag),
            page_size,
            threads: Vec::new(),
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    /// Fetch the newest search page and fold it into the current threads.
    ///
    /// Returns how many posts (roots and replies) were added.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is empty or the search request fails. The
    /// current threads are left untouched in that case.
    pub async fn poll_once<S>(&mut self, source: &S) -> Result<usize, FeedError>
    where
        S: PostSource + ?Sized,
    {
        if self.tag.is_empty() {
            return Err(FeedError::EmptyTag);
        }

        let page = source
            .search_posts(&format!("#{}", self.tag), self.page_size, None)
            .await?;

        let before = post_count(&self.threads);
        self.threads = rollup_threads(&page.posts, &self.threads, &self.tag).threads;
        let added = post_count(&self.threads).saturating_sub(before);

        debug!(tag = %self.tag, fetched = page.posts.len(), added, "Polled tag feed");
        Ok(added)
    }
}

fn post_count(threads: &[Thread]) -> usize {
    threads.iter().map(|t| 1 + t.children.len()).sum()
}

/// Latest threads per watched tag, shared between pollers and the web layer.
#[derive(Debug, Clone, Default)]
pub struct FeedStore {
    feeds: Arc<RwLock<HashMap<String, Vec<Thread>>>>,
}

impl FeedStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag so lookups return an empty list before the first poll lands.
    pub async fn watch(&self, tag: &str) {
        self.feeds
            .write()
            .await
            .entry(tag_key(tag))
            .or_default();
    }

    pub async fn publish(&self, tag: &str, threads: Vec<Thread>) {
        self.feeds
            .write()
            .await
            .insert(tag_key(tag), threads);
    }

    /// Threads for a watched tag, or `None` if nobody polls it.
    pub async fn threads(&self, tag: &str) -> Option<Vec<Thread>> {
        self.feeds.read().await.get(&tag_key(tag)).cloned()
    }
}

/// Poll one tag forever, publishing every successful fold to `store`.
pub async fn poll_loop(
    source: Arc<dyn PostSource>,
    mut feed: TagFeed,
    store: FeedStore,
    base_interval: Duration,
) {
    let mut consecutive_empty = 0u32;

    store.watch(feed.tag()).await;
    info!(tag = %feed.tag(), interval_secs = base_interval.as_secs(), "Starting tag feed poller");

    loop {
        match feed.poll_once(source.as_ref()).await {
            Ok(added) => {
                store.publish(feed.tag(), feed.threads().to_vec()).await;
                if added > 0 {
                    info!(tag = %feed.tag(), added, threads = feed.threads().len(), "Tag feed updated");
                    consecutive_empty = 0;
                } else {
                    consecutive_empty = consecutive_empty.saturating_add(1);
                    debug!(tag = %feed.tag(), consecutive_empty, "No new posts");
                }
            }
            Err(e) => {
                error!(tag = %feed.tag(), "Poll error: {e:#}");
                consecutive_empty = consecutive_empty.saturating_add(1);
            }
        }

        tokio::time::sleep(backoff_interval(base_interval, consecutive_empty)).await;
    }
}

/// Adaptive polling: back off while the tag is quiet.
///
/// Never shorter than `base`, and never stretched past five minutes
/// unless `base` itself is longer.
#[must_use]
pub fn backoff_interval(base: Duration, consecutive_empty: u32) -> Duration {
    let stretched = if consecutive_empty > 10 {
        base.saturating_mul(2)
    } else if consecutive_empty > 5 {
        base.saturating_add(base / 2)
    } else {
        return base;
    };
    stretched.min(MAX_BACKOFF_INTERVAL).max(base)
}
