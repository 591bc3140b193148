//! Shared constants used across the application.

/// User agent sent with upstream API requests.
pub const USER_AGENT: &str = concat!("community-threads/", env!("CARGO_PKG_VERSION"));

/// Public read-only XRPC endpoint.
pub const DEFAULT_API_URL: &str = "https://public.api.bsky.app/xrpc";

/// Posts requested per upstream search page, independent of how many parents are wanted.
pub const DEFAULT_SEARCH_PAGE_SIZE: u32 = 25;

/// Upper bound the search endpoint accepts for `limit`.
pub const MAX_SEARCH_PAGE_SIZE: u32 = 100;

/// Parent posts returned per extractor call when the caller does not say.
pub const DEFAULT_MAX_POSTS: usize = 25;

/// Largest `limit` the parent-posts endpoint honours.
pub const MAX_POSTS_PER_REQUEST: usize = 100;

/// Nodes visited by a single first-reply descent before giving up.
pub const DEFAULT_MAX_REPLY_DEPTH: usize = 64;

/// Search pages a single extractor call may walk before returning what it has.
pub const DEFAULT_MAX_SEARCH_PAGES: usize = 40;
