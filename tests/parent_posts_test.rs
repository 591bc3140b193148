mod common;

use std::collections::HashSet;

use community_threads::bsky::Post;
use community_threads::community::{get_parent_posts, FeedError, ParentPostsRequest, SortOrder};

use common::{ts, uri, FakeSource};

fn root(n: u32, secs: i64) -> Post {
    Post::new(uri(n), "did:plc:alice", format!("post {n} #tag"), ts(secs))
}

fn reply(n: u32, to: u32, secs: i64) -> Post {
    Post::new(uri(n), "did:plc:bob", format!("reply {n} #tag"), ts(secs)).with_reply(uri(to), uri(to))
}

fn uris(result: &community_threads::community::ParentPostsResult) -> Vec<String> {
    result.posts.iter().map(|p| p.post.uri.clone()).collect()
}

/// 100 posts one second apart, newest first. 1-9 and 100 are roots, the rest
/// reply to post 1.
fn hundred_posts() -> Vec<Post> {
    (1..=100u32)
        .map(|n| {
            let secs = i64::from(100 - n);
            if n <= 9 || n == 100 {
                root(n, secs)
            } else {
                reply(n, 1, secs)
            }
        })
        .collect()
}

#[tokio::test]
async fn test_collects_roots_across_five_pages() {
    let source = FakeSource::with_feed(hundred_posts());
    let request = ParentPostsRequest::new("tag").max_posts(10).page_size(20);

    let result = get_parent_posts(&source, &request).await.unwrap();

    let expected: Vec<String> = (1..=9).chain(std::iter::once(100)).map(uri).collect();
    assert_eq!(uris(&result), expected);
    assert_eq!(source.search_calls().len(), 5);
    assert!(result.cursor.is_none());
}

#[tokio::test]
async fn test_search_query_and_cursor_chaining() {
    let source = FakeSource::with_feed(hundred_posts());
    let request = ParentPostsRequest::new("#Tag").max_posts(10).page_size(20);

    get_parent_posts(&source, &request).await.unwrap();

    let calls = source.search_calls();
    assert!(calls.iter().all(|c| c.query == "#Tag" && c.limit == 20));
    let cursors: Vec<Option<String>> = calls.into_iter().map(|c| c.cursor).collect();
    assert_eq!(
        cursors,
        vec![
            None,
            Some("20".to_string()),
            Some("40".to_string()),
            Some("60".to_string()),
            Some("80".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_stops_once_enough_roots_collected() {
    let source = FakeSource::with_feed(hundred_posts());
    let request = ParentPostsRequest::new("tag").max_posts(5).page_size(20);

    let result = get_parent_posts(&source, &request).await.unwrap();

    assert_eq!(source.search_calls().len(), 1);
    assert_eq!(result.posts.len(), 5);
    assert_eq!(result.cursor.as_deref(), Some("20"));
}

#[tokio::test]
async fn test_resumes_from_caller_cursor() {
    let source = FakeSource::with_feed(hundred_posts());
    let request = ParentPostsRequest::new("tag")
        .cursor(Some("80".to_string()))
        .page_size(20);

    let result = get_parent_posts(&source, &request).await.unwrap();

    assert_eq!(source.search_calls()[0].cursor.as_deref(), Some("80"));
    assert_eq!(source.search_calls().len(), 1);
    assert_eq!(uris(&result), vec![uri(100)]);
}

#[tokio::test]
async fn test_exhausted_cursor_stops_short_of_max_posts() {
    let source = FakeSource::with_feed(vec![root(1, 30), root(2, 20), root(3, 10)]);
    let request = ParentPostsRequest::new("tag").max_posts(10).page_size(2);

    let result = get_parent_posts(&source, &request).await.unwrap();

    assert_eq!(uris(&result), vec![uri(1), uri(2), uri(3)]);
    assert_eq!(source.search_calls().len(), 2);
    assert!(result.cursor.is_none());
}

#[tokio::test]
async fn test_page_cap_returns_resumable_cursor() {
    let mut feed: Vec<Post> = (1..=50)
        .map(|n| Post::new(uri(n), "did:a", "nothing tagged", ts(100 - i64::from(n))))
        .collect();
    feed.push(root(51, 0));
    let source = FakeSource::with_feed(feed);
    let request = ParentPostsRequest::new("tag")
        .max_posts(1)
        .page_size(10)
        .max_pages(2);

    let result = get_parent_posts(&source, &request).await.unwrap();

    assert!(result.posts.is_empty());
    assert_eq!(source.search_calls().len(), 2);
    assert_eq!(result.cursor.as_deref(), Some("20"));

    let resumed = get_parent_posts(&source, &request.clone().cursor(result.cursor))
        .await
        .unwrap();
    assert!(resumed.posts.is_empty());
    assert_eq!(resumed.cursor.as_deref(), Some("40"));
}

#[tokio::test]
async fn test_empty_tag_makes_no_request() {
    let source = FakeSource::with_feed(hundred_posts());

    for tag in ["", "   ", "#"] {
        let err = get_parent_posts(&source, &ParentPostsRequest::new(tag))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::EmptyTag));
    }
    assert!(source.search_calls().is_empty());
}

#[tokio::test]
async fn test_empty_page_stops_pagination() {
    let source = FakeSource::with_feed(Vec::new());

    let result = get_parent_posts(&source, &ParentPostsRequest::new("tag"))
        .await
        .unwrap();

    assert!(result.posts.is_empty());
    assert_eq!(source.search_calls().len(), 1);
}

#[tokio::test]
async fn test_upstream_failure_is_propagated() {
    let source = FakeSource::failing();

    let err = get_parent_posts(&source, &ParentPostsRequest::new("tag"))
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::Fetch(_)));
}

#[tokio::test]
async fn test_reply_bumps_root_activity() {
    // Root 1 is older than root 2 but has a newer reply.
    let source = FakeSource::with_feed(vec![
        reply(3, 1, 50),
        root(2, 20),
        root(1, 10),
    ]);

    let result = get_parent_posts(&source, &ParentPostsRequest::new("tag"))
        .await
        .unwrap();

    assert_eq!(uris(&result), vec![uri(1), uri(2)]);
    assert_eq!(result.posts[0].latest_reply_at, ts(50));
    assert_eq!(result.posts[1].latest_reply_at, ts(20));
}

#[tokio::test]
async fn test_reply_seen_before_its_root_on_earlier_page() {
    let source = FakeSource::with_feed(vec![reply(3, 1, 50), root(2, 20), root(1, 10)]);
    let request = ParentPostsRequest::new("tag").page_size(1);

    let result = get_parent_posts(&source, &request).await.unwrap();

    let bumped = result.posts.iter().find(|p| p.post.uri == uri(1)).unwrap();
    assert_eq!(bumped.latest_reply_at, ts(50));
}

#[tokio::test]
async fn test_bump_never_lowers_activity() {
    let source = FakeSource::with_feed(vec![root(1, 100), reply(2, 1, 5)]);

    let result = get_parent_posts(&source, &ParentPostsRequest::new("tag"))
        .await
        .unwrap();

    assert_eq!(result.posts[0].latest_reply_at, ts(100));
}

#[tokio::test]
async fn test_replies_are_never_roots() {
    let malformed = Post {
        reply: Some(community_threads::bsky::ReplyRef::default()),
        ..root(5, 40)
    };
    let source = FakeSource::with_feed(vec![malformed, reply(4, 99, 30), root(1, 10)]);

    let result = get_parent_posts(&source, &ParentPostsRequest::new("tag"))
        .await
        .unwrap();

    assert_eq!(uris(&result), vec![uri(1)]);
}

#[tokio::test]
async fn test_duplicate_roots_across_pages_collapse() {
    // Overlapping pages hand back post 1 twice.
    let source = FakeSource::with_feed(vec![root(1, 10), root(2, 5), root(1, 10)]);
    let request = ParentPostsRequest::new("tag").page_size(2);

    let result = get_parent_posts(&source, &request).await.unwrap();

    assert_eq!(uris(&result), vec![uri(1), uri(2)]);
}

#[tokio::test]
async fn test_untagged_and_case_insensitive_matching() {
    let source = FakeSource::with_feed(vec![
        Post::new(uri(1), "did:a", "Shouting #TAG", ts(30)),
        Post::new(uri(2), "did:a", "no hashtag here, just tag", ts(20)),
        Post::new(uri(3), "did:a", "prefix match #tagextra", ts(10)),
    ]);

    let result = get_parent_posts(&source, &ParentPostsRequest::new("Tag"))
        .await
        .unwrap();

    assert_eq!(uris(&result), vec![uri(1), uri(3)]);
}

#[tokio::test]
async fn test_tag_with_pattern_characters_matches_literally() {
    let source = FakeSource::with_feed(vec![
        Post::new(uri(1), "did:a", "learning #c++", ts(30)),
        Post::new(uri(2), "did:a", "learning #cxx", ts(20)),
    ]);

    let result = get_parent_posts(&source, &ParentPostsRequest::new("c++"))
        .await
        .unwrap();

    assert_eq!(uris(&result), vec![uri(1)]);
}

#[tokio::test]
async fn test_member_filter_restricts_authors() {
    let source = FakeSource::with_feed(vec![
        Post::new(uri(1), "did:member", "#tag", ts(30)),
        Post::new(uri(2), "did:stranger", "#tag", ts(20)),
    ]);
    let members: HashSet<String> = ["did:member".to_string()].into_iter().collect();

    let filtered = get_parent_posts(
        &source,
        &ParentPostsRequest::new("tag").members(members.clone(), false),
    )
    .await
    .unwrap();
    assert_eq!(uris(&filtered), vec![uri(1)]);

    let everyone = get_parent_posts(&source, &ParentPostsRequest::new("tag").members(members, true))
        .await
        .unwrap();
    assert_eq!(uris(&everyone), vec![uri(1), uri(2)]);
}

#[tokio::test]
async fn test_top_sort_orders_by_likes() {
    let source = FakeSource::with_feed(vec![
        root(1, 30).with_like_count(1),
        root(2, 20).with_like_count(10),
        root(3, 10),
    ]);

    let result = get_parent_posts(&source, &ParentPostsRequest::new("tag").sort(SortOrder::Top))
        .await
        .unwrap();

    assert_eq!(uris(&result), vec![uri(2), uri(1), uri(3)]);
}
