//! Idempotent republishing
//!
//! Re-sharing a post the account already reposted would be rejected or leave
//! the old repost buried in its timeline, so an existing repost is deleted
//! first and recreated. The like is created only when the account has not
//! liked the post yet.
//!
//! ```text
//!   has repost? ──yes──> delete repost ──(ok or failed)──┐
//!        │ no                                             v
//!        └──────────────────────────────────────────> create repost ──failed──> Failed(Repost)
//!                                                         │ ok
//!                                                    already liked? ──yes──> RepostedAndLiked
//!                                                         │ no
//!                                                    create like ──ok──> RepostedAndLiked
//!                                                         └──failed──> RepostedOnly
//! ```

use tracing::{error, info, warn};

use crate::platforms::Platform;
use crate::types::{PostView, RepublishOutcome, RepublishStage};

/// Drive the unrepost → repost → like sequence for one post
///
/// Uses the viewer state carried by `post`, as reported when the source was
/// fetched. Never returns an error: every failure is logged and folded into
/// the outcome. With `dry_run` no remote call is made.
pub async fn synchronize(platform: &dyn Platform, post: &PostView, dry_run: bool) -> RepublishOutcome {
    if dry_run {
        info!(
            "Dry run: would republish {} by {} (existing repost: {}, liked: {})",
            post.uri,
            post.author_handle,
            post.viewer.repost.is_some(),
            post.viewer.like.is_some()
        );
        return RepublishOutcome::Skipped;
    }

    if let Some(repost_uri) = &post.viewer.repost {
        match platform.delete_repost(repost_uri).await {
            Ok(()) => info!("Removed previous repost {} of {}", repost_uri, post.uri),
            Err(e) => warn!(
                "Failed to remove previous repost {} of {}: {}",
                repost_uri, post.uri, e
            ),
        }
    }

    let post_ref = post.post_ref();
    match platform.create_repost(&post_ref).await {
        Ok(repost_uri) => info!("Reposted {} by {} as {}", post.uri, post.author_handle, repost_uri),
        Err(e) => {
            error!("Failed to repost {} by {}: {}", post.uri, post.author_handle, e);
            return RepublishOutcome::Failed(RepublishStage::Repost);
        }
    }

    if post.viewer.like.is_some() {
        tracing::debug!("{} is already liked", post.uri);
        return RepublishOutcome::RepostedAndLiked;
    }

    match platform.create_like(&post_ref).await {
        Ok(like_uri) => {
            info!("Liked {} as {}", post.uri, like_uri);
            RepublishOutcome::RepostedAndLiked
        }
        Err(e) => {
            warn!("Failed to like {}: {}", post.uri, e);
            RepublishOutcome::RepostedOnly
        }
    }
}
