//! AT URI helpers
//!
//! Feed generators and lists are addressed by `at://` URIs, but people usually
//! copy the web link from the app. This module turns web links into AT URIs
//! and picks record keys out of AT URIs.
//!
//! # Supported Formats
//!
//! - **Feed link**: `https://bsky.app/profile/<id>/feed/<rkey>`
//!   → `at://<id>/app.bsky.feed.generator/<rkey>`
//! - **List link**: `https://bsky.app/profile/<id>/lists/<rkey>`
//!   → `at://<id>/app.bsky.graph.list/<rkey>`
//!
//! Normalization is a pure string transform. Anything it does not recognise
//! is returned unchanged, so a bad identifier surfaces as a fetch error for
//! that source only.
//!
//! # Example
//!
//! ```
//! use libskyboost::platforms::uri::normalize_feed_uri;
//!
//! let uri = normalize_feed_uri("https://bsky.app/profile/did:plc:abc/feed/whats-hot");
//! assert_eq!(uri, "at://did:plc:abc/app.bsky.feed.generator/whats-hot");
//! ```

pub const FEED_GENERATOR_COLLECTION: &str = "app.bsky.feed.generator";
pub const LIST_COLLECTION: &str = "app.bsky.graph.list";
pub const REPOST_COLLECTION: &str = "app.bsky.feed.repost";
pub const LIKE_COLLECTION: &str = "app.bsky.feed.like";

/// Parsed `at://<authority>/<collection>/<rkey>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub authority: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    /// Parse a record URI; `None` for anything that is not exactly three segments
    #[must_use]
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix("at://")?;
        let mut parts = rest.split('/');

        let authority = parts.next().filter(|s| !s.is_empty())?;
        let collection = parts.next().filter(|s| !s.is_empty())?;
        let rkey = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            authority: authority.to_string(),
            collection: collection.to_string(),
            rkey: rkey.to_string(),
        })
    }
}

impl std::fmt::Display for AtUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "at://{}/{}/{}", self.authority, self.collection, self.rkey)
    }
}

/// Normalize a feed generator identifier to its AT URI form
#[must_use]
pub fn normalize_feed_uri(input: &str) -> String {
    normalize_web_link(input, "feed", FEED_GENERATOR_COLLECTION)
}

/// Normalize a list identifier to its AT URI form
#[must_use]
pub fn normalize_list_uri(input: &str) -> String {
    normalize_web_link(input, "lists", LIST_COLLECTION)
}

/// `http(s)://<host>/profile/<id>/<segment>/<rkey>` → `at://<id>/<collection>/<rkey>`
fn normalize_web_link(input: &str, segment: &str, collection: &str) -> String {
    let Some(after_scheme) = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
    else {
        return input.to_string();
    };

    // Drop query string and fragment
    let without_query = after_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(after_scheme);

    let parts: Vec<&str> = without_query
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match parts.as_slice() {
        [_host, "profile", id, seg, rkey] if *seg == segment => {
            format!("at://{}/{}/{}", id, collection, rkey)
        }
        _ => input.to_string(),
    }
}
