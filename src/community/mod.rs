//! Thread and community aggregation over the flat search feed.

mod parent_posts;
mod presentation;
mod rollup;
pub mod tag;

pub use parent_posts::{
    get_parent_posts, sort_community_posts, CommunityPost, FeedError, ParentPostsRequest,
    ParentPostsResult, SortOrder,
};
pub use presentation::{
    build_thread_presentation, first_reply_sequence, load_thread, DirectChildPresentation,
    PresentationOptions, ThreadLoadError, ThreadPresentation,
};
pub use rollup::{rollup_threads, RollupResult, Thread};
