//! Single-thread detail view.
//!
//! A presentation is the conversation root, its direct replies in creation
//! order, and for each direct reply the chain reached by repeatedly following
//! the earliest reply. Only that one path is expanded, which keeps the number
//! of upstream calls proportional to conversation depth rather than size.

use std::collections::HashSet;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bsky::{AtUri, FetchError, InvalidUri, Post, PostSource, ThreadNode};
use crate::constants::DEFAULT_MAX_REPLY_DEPTH;

#[derive(Debug, Error)]
pub enum ThreadLoadError {
    #[error(transparent)]
    InvalidUri(#[from] InvalidUri),
    #[error("Thread not found: {0}")]
    NotFound(String),
    #[error("Failed to load thread: {0}")]
    Upstream(#[source] FetchError),
}

impl ThreadLoadError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<FetchError> for ThreadLoadError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(uri) => Self::NotFound(uri),
            other => Self::Upstream(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectChildPresentation {
    pub post: Post,
    /// Earliest reply, its earliest reply, and so on. Excludes `post` itself.
    pub first_children_sequence: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadPresentation {
    pub parent_post: Post,
    /// Sorted by creation time, oldest first.
    pub direct_children: Vec<DirectChildPresentation>,
}

#[derive(Debug, Clone, Copy)]
pub struct PresentationOptions {
    /// Longest first-reply chain built for one child.
    pub max_reply_depth: usize,
    /// Children expanded at the same time. 1 expands them one by one.
    pub concurrency: usize,
}

impl Default for PresentationOptions {
    fn default() -> Self {
        Self {
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
            concurrency: 1,
        }
    }
}

/// Load the presentation for the conversation containing `uri`.
///
/// `uri` may be `at://repo/collection/rkey` or the same without the scheme.
/// When it names a reply, the presentation is built around its root instead.
///
/// # Errors
///
/// Returns [`ThreadLoadError::InvalidUri`] without touching the network for a
/// malformed URI, [`ThreadLoadError::NotFound`] when the upstream has no such
/// post, and [`ThreadLoadError::Upstream`] for any other fetch failure.
pub async fn load_thread<S>(
    source: &S,
    uri: &str,
    options: &PresentationOptions,
) -> Result<ThreadPresentation, ThreadLoadError>
where
    S: PostSource + ?Sized,
{
    let uri = AtUri::normalize(uri)?.to_string();
    let target = source.get_thread(&uri, 1, 1).await?;

    let root = match target.post.parent_uri() {
        Some(parent) => {
            let root_uri = target.post.root_uri().unwrap_or(parent).to_string();
            debug!(uri = %uri, root = %root_uri, "Target is a reply, loading its root");
            source.get_thread(&root_uri, 1, 0).await?
        }
        None => target,
    };

    let presentation = build_thread_presentation(source, root, options).await?;
    info!(
        root = %presentation.parent_post.uri,
        children = presentation.direct_children.len(),
        "Loaded thread presentation"
    );
    Ok(presentation)
}

/// Build a presentation from an already fetched root node.
///
/// Direct children come from the node's inline replies. Their first-reply
/// chains are completed with extra fetches where the node stops short.
///
/// # Errors
///
/// Returns [`ThreadLoadError::Upstream`] if any of those fetches fails.
pub async fn build_thread_presentation<S>(
    source: &S,
    root: ThreadNode,
    options: &PresentationOptions,
) -> Result<ThreadPresentation, ThreadLoadError>
where
    S: PostSource + ?Sized,
{
    let ThreadNode {
        post: parent_post,
        replies,
    } = root;
    let max_depth = options.max_reply_depth;

    let mut direct_children: Vec<DirectChildPresentation> =
        stream::iter(replies.unwrap_or_default())
            .map(|child| async move {
                let post = child.post.clone();
                let first_children_sequence = first_reply_sequence(source, child, max_depth).await?;
                Ok::<_, FetchError>(DirectChildPresentation {
                    post,
                    first_children_sequence,
                })
            })
            .buffered(options.concurrency.max(1))
            .try_collect()
            .await?;

    direct_children.sort_by(|a, b| a.post.created_at.cmp(&b.post.created_at));

    Ok(ThreadPresentation {
        parent_post,
        direct_children,
    })
}

/// Follow the earliest reply from `start` until a post has no replies.
///
/// Inline replies are used when present; otherwise the node is fetched once
/// with depth 1. The walk stops after `max_depth` posts or if it would revisit
/// a URI. A post that vanished upstream ends the chain quietly.
///
/// # Errors
///
/// Returns any fetch failure other than not-found.
pub async fn first_reply_sequence<S>(
    source: &S,
    start: ThreadNode,
    max_depth: usize,
) -> Result<Vec<Post>, FetchError>
where
    S: PostSource + ?Sized,
{
    let mut sequence = Vec::new();
    let mut visited: HashSet<String> = HashSet::from([start.post.uri.clone()]);
    let mut current = start;

    loop {
        let replies = match current.replies.take() {
            Some(replies) if !replies.is_empty() => replies,
            _ => match source.get_thread(&current.post.uri, 1, 0).await {
                Ok(node) => node.replies.unwrap_or_default(),
                Err(e) if e.is_not_found() => {
                    warn!(uri = %current.post.uri, "Reply disappeared while walking first replies");
                    break;
                }
                Err(e) => return Err(e),
            },
        };

        let Some(next) = earliest(replies) else {
            break;
        };
        if !visited.insert(next.post.uri.clone()) {
            warn!(uri = %next.post.uri, "Reply cycle detected, stopping descent");
            break;
        }

        sequence.push(next.post.clone());
        if sequence.len() >= max_depth {
            warn!(uri = %next.post.uri, max_depth, "Reply chain hit depth cap");
            break;
        }
        current = next;
    }

    Ok(sequence)
}

/// Earliest-created node; the first one wins a tie.
fn earliest(nodes: Vec<ThreadNode>) -> Option<ThreadNode> {
    nodes.into_iter().reduce(|best, node| {
        if node.post.created_at < best.post.created_at {
            node
        } else {
            best
        }
    })
}
