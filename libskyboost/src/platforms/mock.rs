//! Mock platform implementation for testing
//!
//! A scriptable in-memory stand-in for the remote service. Feeds and list
//! memberships are seeded up front, failures can be injected per operation,
//! and every call is recorded in order so tests can assert on the exact
//! delete/repost/like sequence.
//!
//! The mock keeps its own repost and like records and reflects them in the
//! viewer state of entries it returns, so a second run sees what the first
//! one did.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::credentials::AccountCredentials;
use crate::error::{PlatformError, Result};
use crate::platforms::uri::{LIKE_COLLECTION, REPOST_COLLECTION};
use crate::platforms::{AuthorFeedFilter, Platform, SessionProvider};
use crate::types::{FeedEntry, PostRef};

/// One recorded call against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    FetchAuthorFeed(String),
    FetchGeneratorFeed(String),
    FetchListMembers(String),
    DeleteRepost(String),
    /// Post URI being reposted
    CreateRepost(String),
    /// Post URI being liked
    CreateLike(String),
}

impl MockCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            MockCall::DeleteRepost(_) | MockCall::CreateRepost(_) | MockCall::CreateLike(_)
        )
    }
}

#[derive(Debug, Default)]
struct MockState {
    author_feeds: HashMap<String, Vec<FeedEntry>>,
    generator_feeds: HashMap<String, Vec<FeedEntry>>,
    lists: HashMap<String, Vec<String>>,
    failing_sources: HashSet<String>,
    fail_delete: bool,
    fail_repost: bool,
    fail_like: bool,
    /// post URI -> our repost record URI
    reposts: HashMap<String, String>,
    /// post URI -> our like record URI
    likes: HashMap<String, String>,
    calls: Vec<MockCall>,
}

impl MockState {
    fn with_viewer_state(&self, entries: &[FeedEntry]) -> Vec<FeedEntry> {
        entries
            .iter()
            .cloned()
            .map(|mut entry| {
                if let Some(repost) = self.reposts.get(&entry.post.uri) {
                    entry.post.viewer.repost = Some(repost.clone());
                }
                if let Some(like) = self.likes.get(&entry.post.uri) {
                    entry.post.viewer.like = Some(like.clone());
                }
                entry
            })
            .collect()
    }

    fn record_uri(handle: &str, collection: &str) -> String {
        format!("at://{}/{}/{}", handle, collection, Uuid::new_v4().simple())
    }
}

/// Mock session for a single account
///
/// Cloning shares the underlying state, so a test can keep a handle while the
/// engine owns a boxed copy.
#[derive(Debug, Clone)]
pub struct MockPlatform {
    handle: String,
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new(handle: &str) -> Self {
        Self {
            handle: handle.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only happens after a test already panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_author_feed(self, handle: &str, entries: Vec<FeedEntry>) -> Self {
        self.state().author_feeds.insert(handle.to_string(), entries);
        self
    }

    pub fn with_generator_feed(self, feed_uri: &str, entries: Vec<FeedEntry>) -> Self {
        self.state()
            .generator_feeds
            .insert(feed_uri.to_string(), entries);
        self
    }

    pub fn with_list(self, list_uri: &str, members: &[&str]) -> Self {
        self.state().lists.insert(
            list_uri.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    /// Fetching this handle / feed / list fails
    pub fn with_failing_source(self, identifier: &str) -> Self {
        self.state().failing_sources.insert(identifier.to_string());
        self
    }

    pub fn failing_delete(self) -> Self {
        self.state().fail_delete = true;
        self
    }

    pub fn failing_repost(self) -> Self {
        self.state().fail_repost = true;
        self
    }

    pub fn failing_like(self) -> Self {
        self.state().fail_like = true;
        self
    }

    /// Pretend an earlier run already reposted `post_uri`
    pub fn with_existing_repost(self, post_uri: &str, repost_uri: &str) -> Self {
        self.state()
            .reposts
            .insert(post_uri.to_string(), repost_uri.to_string());
        self
    }

    /// Pretend an earlier run already liked `post_uri`
    pub fn with_existing_like(self, post_uri: &str, like_uri: &str) -> Self {
        self.state()
            .likes
            .insert(post_uri.to_string(), like_uri.to_string());
        self
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn mutations(&self) -> Vec<MockCall> {
        self.calls().into_iter().filter(MockCall::is_mutation).collect()
    }

    /// Current repost record for a post, if any
    pub fn repost_of(&self, post_uri: &str) -> Option<String> {
        self.state().reposts.get(post_uri).cloned()
    }

    /// Current like record for a post, if any
    pub fn like_of(&self, post_uri: &str) -> Option<String> {
        self.state().likes.get(post_uri).cloned()
    }

    pub fn like_count(&self) -> usize {
        self.state().likes.len()
    }

    fn check_source(state: &MockState, identifier: &str) -> Result<()> {
        if state.failing_sources.contains(identifier) {
            return Err(PlatformError::Fetch(format!("Mock fetch failed for {}", identifier)).into());
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn handle(&self) -> &str {
        &self.handle
    }

    async fn fetch_author_feed(
        &self,
        handle: &str,
        limit: u32,
        _filter: AuthorFeedFilter,
    ) -> Result<Vec<FeedEntry>> {
        let mut state = self.state();
        state.calls.push(MockCall::FetchAuthorFeed(handle.to_string()));
        Self::check_source(&state, handle)?;

        let entries = state.author_feeds.get(handle).cloned().unwrap_or_default();
        let mut entries = state.with_viewer_state(&entries);
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn fetch_generator_feed(&self, feed_uri: &str, limit: u32) -> Result<Vec<FeedEntry>> {
        let mut state = self.state();
        state
            .calls
            .push(MockCall::FetchGeneratorFeed(feed_uri.to_string()));
        Self::check_source(&state, feed_uri)?;

        let entries = state
            .generator_feeds
            .get(feed_uri)
            .cloned()
            .ok_or_else(|| PlatformError::Fetch(format!("Unknown feed {}", feed_uri)))?;
        let mut entries = state.with_viewer_state(&entries);
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn fetch_list_members(&self, list_uri: &str) -> Result<Vec<String>> {
        let mut state = self.state();
        state
            .calls
            .push(MockCall::FetchListMembers(list_uri.to_string()));
        Self::check_source(&state, list_uri)?;

        state
            .lists
            .get(list_uri)
            .cloned()
            .ok_or_else(|| PlatformError::Fetch(format!("Unknown list {}", list_uri)).into())
    }

    async fn delete_repost(&self, repost_uri: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::DeleteRepost(repost_uri.to_string()));

        if state.fail_delete {
            return Err(PlatformError::Mutation("Mock delete failed".to_string()).into());
        }

        state.reposts.retain(|_, record| record.as_str() != repost_uri);
        Ok(())
    }

    async fn create_repost(&self, post: &PostRef) -> Result<String> {
        let mut state = self.state();
        state.calls.push(MockCall::CreateRepost(post.uri.clone()));

        if state.fail_repost {
            return Err(PlatformError::Mutation("Mock repost failed".to_string()).into());
        }

        let record = MockState::record_uri(&self.handle, REPOST_COLLECTION);
        state.reposts.insert(post.uri.clone(), record.clone());
        Ok(record)
    }

    async fn create_like(&self, post: &PostRef) -> Result<String> {
        let mut state = self.state();
        state.calls.push(MockCall::CreateLike(post.uri.clone()));

        if state.fail_like {
            return Err(PlatformError::Mutation("Mock like failed".to_string()).into());
        }

        let record = MockState::record_uri(&self.handle, LIKE_COLLECTION);
        state.likes.insert(post.uri.clone(), record.clone());
        Ok(record)
    }
}

/// Session provider handing out pre-built mock sessions by login identifier
#[derive(Debug, Default, Clone)]
pub struct MockSessionProvider {
    sessions: HashMap<String, MockPlatform>,
    logins: Arc<Mutex<Vec<String>>>,
}

impl MockSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logging in as `identifier` yields `platform`; unknown identifiers fail
    pub fn with_session(mut self, identifier: &str, platform: MockPlatform) -> Self {
        self.sessions.insert(identifier.to_string(), platform);
        self
    }

    /// Identifiers that attempted to log in, in order
    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn login(&self, credentials: &AccountCredentials) -> Result<Box<dyn Platform>> {
        self.logins
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(credentials.identifier.clone());

        match self.sessions.get(&credentials.identifier) {
            Some(platform) => Ok(Box::new(platform.clone())),
            None => Err(PlatformError::Authentication(format!(
                "Invalid credentials for {}",
                credentials.identifier
            ))
            .into()),
        }
    }
}
