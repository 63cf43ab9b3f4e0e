//! Post classification
//!
//! Decides whether a single feed entry is a repostable original media post
//! for the source it came from. Classification is pure: it looks only at the
//! entry and the [`SourceContext`], never at the network or the clock.
//!
//! Rules run in order and the first failing rule rejects:
//!
//! 1. the embed must carry media (images, video or a link thumbnail)
//! 2. quote posts are rejected, with or without media
//! 3. replies are rejected when the context excludes them
//! 4. repost-surfaced entries are rejected, except a passthrough target
//!    reposting its own post
//! 5. target contexts only accept posts authored by the target

use crate::types::FeedEntry;

/// How a source relates its entries to an author
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    /// A single author's timeline (configured target or list member)
    Target {
        handle: String,
        /// The target may surface its own reposts
        self_repost_passthrough: bool,
    },
    /// A feed generator surfacing posts from many authors
    Generator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    pub mode: SourceMode,
    pub exclude_replies: bool,
}

impl SourceContext {
    /// Context for an author feed queried with `posts_no_replies`
    ///
    /// Passthrough is granted when `handle` appears (case-insensitively) in
    /// `passthrough_allow_list`.
    pub fn target(handle: &str, passthrough_allow_list: &[String]) -> Self {
        let self_repost_passthrough = passthrough_allow_list
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(handle));

        Self {
            mode: SourceMode::Target {
                handle: handle.to_string(),
                self_repost_passthrough,
            },
            exclude_replies: true,
        }
    }

    pub fn generator(exclude_replies: bool) -> Self {
        Self {
            mode: SourceMode::Generator,
            exclude_replies,
        }
    }
}

/// Why an entry was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoMedia,
    QuotePost,
    Reply,
    Repost,
    ForeignAuthor,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Rejection::NoMedia => "no media",
            Rejection::QuotePost => "quote post",
            Rejection::Reply => "reply",
            Rejection::Repost => "repost",
            Rejection::ForeignAuthor => "not authored by target",
        };
        f.write_str(reason)
    }
}

/// Apply the rules and report the first one that fails
pub fn classify(entry: &FeedEntry, ctx: &SourceContext) -> Result<(), Rejection> {
    let post = &entry.post;

    if !post.embed.has_media() {
        return Err(Rejection::NoMedia);
    }

    if post.embed.is_quote() {
        return Err(Rejection::QuotePost);
    }

    if ctx.exclude_replies && post.is_reply {
        return Err(Rejection::Reply);
    }

    if entry.repost_marker.is_some() {
        let passthrough = match &ctx.mode {
            SourceMode::Target {
                handle,
                self_repost_passthrough: true,
            } => post.author_handle.eq_ignore_ascii_case(handle),
            _ => false,
        };
        if !passthrough {
            return Err(Rejection::Repost);
        }
    }

    if let SourceMode::Target { handle, .. } = &ctx.mode {
        if !post.author_handle.eq_ignore_ascii_case(handle) {
            return Err(Rejection::ForeignAuthor);
        }
    }

    Ok(())
}

/// True when the entry may be republished from this source
pub fn is_eligible(entry: &FeedEntry, ctx: &SourceContext) -> bool {
    classify(entry, ctx).is_ok()
}
