//! Incremental thread rollup for a single-tag feed.
//!
//! Each call folds a freshly fetched batch into the threads from the previous
//! call. Folding is idempotent (a child is recorded once) and monotonic (a
//! thread's `latest_update` never moves backwards). A reply whose root has not
//! been seen yet is dropped for this call; it is picked up again by a later
//! batch that contains the root.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::tag::{tag_needle, text_has_tag};
use crate::bsky::Post;

/// A root post and every reply attached to it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub root_post: Post,
    /// Unique by URI, in discovery order.
    pub children: Vec<Post>,
    /// Newest `indexed_at` of the root and all children.
    pub latest_update: DateTime<Utc>,
}

impl Thread {
    #[must_use]
    pub fn new(root_post: Post) -> Self {
        let latest_update = root_post.indexed_at;
        Self {
            root_post,
            children: Vec::new(),
            latest_update,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollupResult {
    pub threads: Vec<Thread>,
}

/// Working copy of a thread with a URI set for cheap duplicate checks.
struct ThreadEntry {
    thread: Thread,
    child_uris: HashSet<String>,
}

impl ThreadEntry {
    fn from_existing(thread: &Thread) -> Self {
        let mut thread = thread.clone();
        // Repair lists that arrived with duplicates or a stale timestamp.
        let mut child_uris = HashSet::with_capacity(thread.children.len());
        thread.children.retain(|c| child_uris.insert(c.uri.clone()));
        let newest = thread
            .children
            .iter()
            .map(|c| c.indexed_at)
            .chain(std::iter::once(thread.root_post.indexed_at))
            .max()
            .unwrap_or(thread.latest_update);
        thread.latest_update = thread.latest_update.max(newest);
        Self { thread, child_uris }
    }

    fn new(root: &Post) -> Self {
        Self {
            thread: Thread::new(root.clone()),
            child_uris: HashSet::new(),
        }
    }

    fn add_child(&mut self, post: &Post) -> bool {
        if post.uri == self.thread.root_post.uri || !self.child_uris.insert(post.uri.clone()) {
            return false;
        }
        if post.indexed_at > self.thread.latest_update {
            self.thread.latest_update = post.indexed_at;
        }
        self.thread.children.push(post.clone());
        true
    }
}

/// Thread map that remembers insertion order, so equal timestamps sort deterministically.
#[derive(Default)]
struct ThreadMap {
    entries: Vec<ThreadEntry>,
    index: HashMap<String, usize>,
}

impl ThreadMap {
    fn get_mut(&mut self, root_uri: &str) -> Option<&mut ThreadEntry> {
        let idx = *self.index.get(root_uri)?;
        self.entries.get_mut(idx)
    }

    fn get_or_insert(&mut self, root: &Post) -> &mut ThreadEntry {
        let idx = match self.index.get(&root.uri) {
            Some(idx) => *idx,
            None => {
                self.entries.push(ThreadEntry::new(root));
                let idx = self.entries.len() - 1;
                self.index.insert(root.uri.clone(), idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    fn insert_existing(&mut self, thread: &Thread) {
        if self.index.contains_key(&thread.root_post.uri) {
            return;
        }
        self.index
            .insert(thread.root_post.uri.clone(), self.entries.len());
        self.entries.push(ThreadEntry::from_existing(thread));
    }
}

/// Fold a batch of posts into previously computed threads.
///
/// Only posts whose text contains `#tag` take part. `existing` is copied and
/// never modified. Threads come back newest activity first.
#[must_use]
pub fn rollup_threads(posts: &[Post], existing: &[Thread], tag: &str) -> RollupResult {
    let needle = tag_needle(tag);
    let mut map = ThreadMap::default();
    for thread in existing {
        map.insert_existing(thread);
    }

    let by_uri: HashMap<&str, &Post> = posts.iter().map(|p| (p.uri.as_str(), p)).collect();
    let tagged: Vec<&Post> = posts
        .iter()
        .filter(|p| text_has_tag(&p.text, &needle))
        .collect();

    let mut attached = 0usize;
    let mut deferred: HashSet<&str> = HashSet::new();

    // Replies whose root is already known.
    for post in tagged.iter().filter(|p| p.is_reply()) {
        let Some(root) = post.root_uri() else {
            trace!(uri = %post.uri, "Reply without a usable root reference");
            continue;
        };
        match map.get_mut(root) {
            Some(entry) => attached += usize::from(entry.add_child(post)),
            None => {
                trace!(uri = %post.uri, root, "Root not seen yet, deferring reply");
                deferred.insert(post.uri.as_str());
            }
        }
    }

    // Roots in this batch pick up any descendants that arrived alongside them.
    for root in tagged.iter().filter(|p| !p.is_reply()) {
        let entry = map.get_or_insert(root);
        for candidate in tagged.iter().filter(|p| p.is_reply()) {
            if descends_from(candidate, &root.uri, &by_uri) {
                attached += usize::from(entry.add_child(candidate));
                deferred.remove(candidate.uri.as_str());
            }
        }
    }

    let mut threads: Vec<Thread> = map.entries.into_iter().map(|e| e.thread).collect();
    threads.sort_by(|a, b| b.latest_update.cmp(&a.latest_update));

    debug!(
        batch = posts.len(),
        tagged = tagged.len(),
        attached,
        deferred = deferred.len(),
        threads = threads.len(),
        "Rolled up threads"
    );

    RollupResult { threads }
}

/// Whether `post` belongs to the conversation rooted at `root_uri`.
///
/// Follows `parent` links through the batch until it reaches the root, falls
/// off the batch, or loops. A reply whose `root` names the root directly also
/// counts, since intermediate posts are often missing from a search window.
fn descends_from(post: &Post, root_uri: &str, by_uri: &HashMap<&str, &Post>) -> bool {
    if post.root_uri() == Some(root_uri) {
        return true;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = post;
    while let Some(parent) = current.parent_uri() {
        if parent == root_uri {
            return true;
        }
        if !visited.insert(parent) {
            return false;
        }
        match by_uri.get(parent) {
            Some(next) => current = *next,
            None => return false,
        }
    }
    false
}
