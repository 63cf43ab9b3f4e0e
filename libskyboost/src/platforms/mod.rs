//! Platform abstraction and implementations
//!
//! The engine talks to the remote service only through [`Platform`], an
//! authenticated session for one bot account, and obtains sessions through a
//! [`SessionProvider`]. The production implementation lives in [`bluesky`];
//! [`mock`] records every call for tests.
//!
//! # Examples
//!
//! ```no_run
//! use libskyboost::credentials::{CredentialStore, EnvCredentials};
//! use libskyboost::platforms::bluesky::BlueskySessions;
//! use libskyboost::platforms::{AuthorFeedFilter, SessionProvider};
//!
//! # async fn example() -> libskyboost::error::Result<()> {
//! let credentials = EnvCredentials::default().credentials_for("BEAUTYFAN")?;
//! let sessions = BlueskySessions::new("https://bsky.social");
//! let platform = sessions.login(&credentials).await?;
//!
//! let entries = platform
//!     .fetch_author_feed("dmphotos.bsky.social", 100, AuthorFeedFilter::PostsNoReplies)
//!     .await?;
//! println!("{} entries", entries.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::credentials::AccountCredentials;
use crate::error::Result;
use crate::types::{FeedEntry, PostRef};

pub mod bluesky;
pub mod uri;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Server-side filter for author feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorFeedFilter {
    PostsNoReplies,
    PostsWithReplies,
}

impl AuthorFeedFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorFeedFilter::PostsNoReplies => "posts_no_replies",
            AuthorFeedFilter::PostsWithReplies => "posts_with_replies",
        }
    }
}

/// An authenticated session against the remote service
///
/// Fetch methods return entries in feed order (newest first). Mutations return
/// the URI of the created record.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Handle of the acting account
    fn handle(&self) -> &str;

    /// Posts from one author's timeline
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Fetch` (or a network/rate-limit error) when the
    /// feed cannot be retrieved or decoded.
    async fn fetch_author_feed(
        &self,
        handle: &str,
        limit: u32,
        filter: AuthorFeedFilter,
    ) -> Result<Vec<FeedEntry>>;

    /// Posts surfaced by a feed generator
    async fn fetch_generator_feed(&self, feed_uri: &str, limit: u32) -> Result<Vec<FeedEntry>>;

    /// Handles of all list members, following pagination
    async fn fetch_list_members(&self, list_uri: &str) -> Result<Vec<String>>;

    /// Delete one of our repost records
    async fn delete_repost(&self, repost_uri: &str) -> Result<()>;

    /// Create a repost record for `post`, returning its URI
    async fn create_repost(&self, post: &PostRef) -> Result<String>;

    /// Create a like record for `post`, returning its URI
    async fn create_like(&self, post: &PostRef) -> Result<String>;
}

/// Establishes sessions for bot accounts
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Log in and return a session
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` when the credentials are
    /// rejected.
    async fn login(&self, credentials: &AccountCredentials) -> Result<Box<dyn Platform>>;
}
