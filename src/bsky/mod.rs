//! Upstream social-network access: the post model, the fetch seam and its HTTP client.

mod client;
mod source;
mod types;
mod uri;

pub use client::BskyClient;
pub use source::{FetchError, PostSource, SearchPage};
pub use types::{Post, ReplyRef, ThreadNode};
pub use uri::{AtUri, InvalidUri};
