//! Core types for Skyboost
//!
//! Everything here lives for a single run: entries are fetched, classified,
//! selected and acted on, then dropped. The remote service is the only
//! durable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embed::EmbedKind;

/// A configured place to pull candidate posts from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// One author's timeline, queried without replies
    AuthorFeed(String),
    /// An algorithmic feed generator, identified by its `at://` URI
    GeneratorFeed(String),
    /// A curated list whose members each become an author feed
    ListMembership(String),
}

impl Source {
    pub fn kind(&self) -> &'static str {
        match self {
            Source::AuthorFeed(_) => "target",
            Source::GeneratorFeed(_) => "feed",
            Source::ListMembership(_) => "list",
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Source::AuthorFeed(id) | Source::GeneratorFeed(id) | Source::ListMembership(id) => id,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.identifier())
    }
}

/// The acting account's existing records for a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerState {
    /// URI of our repost record, if any
    pub repost: Option<String>,
    /// URI of our like record, if any
    pub like: Option<String>,
}

/// Strong reference to a post (what repost/like records point at)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

/// A post as seen through the acting account's session
#[derive(Debug, Clone, PartialEq)]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author_handle: String,
    pub indexed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub embed: EmbedKind,
    /// The underlying record carries a reply reference
    pub is_reply: bool,
    pub viewer: ViewerState,
}

impl PostView {
    pub fn new(uri: impl Into<String>, cid: impl Into<String>, author_handle: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            cid: cid.into(),
            author_handle: author_handle.into(),
            indexed_at: None,
            created_at: None,
            embed: EmbedKind::None,
            is_reply: false,
            viewer: ViewerState::default(),
        }
    }

    pub fn with_embed(mut self, embed: EmbedKind) -> Self {
        self.embed = embed;
        self
    }

    pub fn with_indexed_at(mut self, indexed_at: DateTime<Utc>) -> Self {
        self.indexed_at = Some(indexed_at);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_viewer(mut self, viewer: ViewerState) -> Self {
        self.viewer = viewer;
        self
    }

    pub fn as_reply(mut self) -> Self {
        self.is_reply = true;
        self
    }

    /// Ordering timestamp: index time, then creation time, then "earliest"
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.indexed_at.or(self.created_at)
    }

    pub fn post_ref(&self) -> PostRef {
        PostRef {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
        }
    }
}

/// Present when a feed entry is a repost surfacing in someone's feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepostMarker {
    /// Handle of the account that reposted, when reported
    pub by_handle: Option<String>,
}

/// One item returned by a source query
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub post: PostView,
    pub repost_marker: Option<RepostMarker>,
}

impl FeedEntry {
    pub fn original(post: PostView) -> Self {
        Self {
            post,
            repost_marker: None,
        }
    }

    pub fn reposted_by(post: PostView, handle: impl Into<String>) -> Self {
        Self {
            post,
            repost_marker: Some(RepostMarker {
                by_handle: Some(handle.into()),
            }),
        }
    }
}

/// Step of the republish sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepublishStage {
    Unrepost,
    Repost,
    Like,
}

impl std::fmt::Display for RepublishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepublishStage::Unrepost => write!(f, "unrepost"),
            RepublishStage::Repost => write!(f, "repost"),
            RepublishStage::Like => write!(f, "like"),
        }
    }
}

/// Result of synchronizing one post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepublishOutcome {
    /// No remote call was made (dry run)
    Skipped,
    /// Reposted, but the like could not be created
    RepostedOnly,
    /// Reposted and liked (the like may have existed already)
    RepostedAndLiked,
    Failed(RepublishStage),
}

impl std::fmt::Display for RepublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepublishOutcome::Skipped => write!(f, "skipped"),
            RepublishOutcome::RepostedOnly => write!(f, "reposted_only"),
            RepublishOutcome::RepostedAndLiked => write!(f, "reposted_and_liked"),
            RepublishOutcome::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}
