//! Community threads library.
//!
//! Reconstructs hashtag communities and threaded conversations from the flat,
//! paginated post search of a decentralized social network, and serves them
//! as a small JSON API.

pub mod bsky;
pub mod community;
pub mod config;
pub mod constants;
pub mod feed;
pub mod web;
