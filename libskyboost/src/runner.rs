//! Per-account source iteration
//!
//! Walks the configured sources for one account session in a fixed order:
//! generator feeds, then lists, then targets. Within each kind the slots are
//! declared highest priority first and walked in reverse, so the most
//! important source is republished last and ends up on top of the account's
//! timeline.
//!
//! Each source goes through fetch → classify → select → synchronize. A source
//! that cannot be fetched counts as having no eligible posts; nothing here
//! aborts the walk.

use rand::Rng;
use tracing::{error, info, Instrument};

use crate::classifier::{classify, SourceContext};
use crate::config::Config;
use crate::config::SourcesConfig;
use crate::error::Result;
use crate::platforms::uri::{normalize_feed_uri, normalize_list_uri};
use crate::platforms::{AuthorFeedFilter, Platform};
use crate::republish::synchronize;
use crate::selection::SelectionRule;
use crate::types::{FeedEntry, RepublishOutcome, Source};

/// Sources in processing order, blank slots dropped
pub fn plan_sources(sources: &SourcesConfig) -> Vec<Source> {
    let feeds = sources
        .feeds
        .iter()
        .rev()
        .flatten()
        .map(|feed| Source::GeneratorFeed(normalize_feed_uri(feed)));
    let lists = sources
        .lists
        .iter()
        .rev()
        .flatten()
        .map(|list| Source::ListMembership(normalize_list_uri(list)));
    let targets = sources
        .targets
        .iter()
        .rev()
        .flatten()
        .map(|handle| Source::AuthorFeed(handle.clone()));

    feeds.chain(lists).chain(targets).collect()
}

/// Outcome of synchronizing one selected post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    pub source: Source,
    pub post_uri: String,
    pub outcome: RepublishOutcome,
}

/// What happened for one account
#[derive(Debug, Clone, Default)]
pub struct AccountRun {
    pub outcomes: Vec<PostOutcome>,
    /// Sources fetched successfully, list members included
    pub sources_processed: usize,
    pub sources_failed: usize,
    pub quota_reached: bool,
}

impl AccountRun {
    /// Synchronize attempts made, dry runs included
    pub fn attempts(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, outcome: RepublishOutcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, RepublishOutcome::Failed(_)))
            .count()
    }
}

/// Runs every configured source for one account session
pub struct SourceRunner<'a, R: Rng + Send> {
    platform: &'a dyn Platform,
    config: &'a Config,
    rng: &'a mut R,
    run: AccountRun,
}

impl<'a, R: Rng + Send> SourceRunner<'a, R> {
    pub fn new(platform: &'a dyn Platform, config: &'a Config, rng: &'a mut R) -> Self {
        Self {
            platform,
            config,
            rng,
            run: AccountRun::default(),
        }
    }

    pub async fn run(mut self) -> AccountRun {
        let plan = plan_sources(&self.config.sources);
        info!(
            "Processing {} source(s) as {}",
            plan.len(),
            self.platform.handle()
        );

        for source in plan {
            if !self.has_quota() {
                self.stop_for_quota();
                break;
            }

            let span = tracing::info_span!("source", source = %source);
            match &source {
                Source::GeneratorFeed(uri) => self.process_feed(uri).instrument(span).await,
                Source::ListMembership(uri) => self.process_list(uri).instrument(span).await,
                Source::AuthorFeed(handle) => {
                    let rule = self.config.selection.targets.rule();
                    self.process_author(handle, rule).instrument(span).await
                }
            }
        }

        self.run
    }

    fn has_quota(&self) -> bool {
        self.config
            .tuning
            .per_run_quota
            .map_or(true, |quota| self.run.attempts() < quota)
    }

    fn stop_for_quota(&mut self) {
        if !self.run.quota_reached {
            info!(
                "Per-run quota of {} reached; skipping remaining posts and sources",
                self.run.attempts()
            );
            self.run.quota_reached = true;
        }
    }

    async fn process_feed(&mut self, feed_uri: &str) {
        info!("Fetching feed {}", feed_uri);
        let fetched = self
            .platform
            .fetch_generator_feed(feed_uri, self.config.tuning.feed_limit)
            .await;

        let ctx = SourceContext::generator(self.config.tuning.exclude_feed_replies);
        let rule = self.config.selection.feeds.rule();
        self.process_entries(Source::GeneratorFeed(feed_uri.to_string()), fetched, &ctx, rule)
            .await;
    }

    async fn process_list(&mut self, list_uri: &str) {
        info!("Expanding list {}", list_uri);
        let members = match self.platform.fetch_list_members(list_uri).await {
            Ok(members) => dedup_preserving_order(members),
            Err(e) => {
                error!("Failed to fetch members of list {}: {}", list_uri, e);
                self.run.sources_failed += 1;
                return;
            }
        };
        info!("List {} has {} member(s)", list_uri, members.len());

        let rule = self.config.selection.lists.rule();
        for member in members {
            if !self.has_quota() {
                self.stop_for_quota();
                return;
            }
            let span = tracing::info_span!("member", handle = %member);
            self.process_author(&member, rule).instrument(span).await;
        }
    }

    async fn process_author(&mut self, handle: &str, rule: SelectionRule) {
        info!("Fetching posts from {}", handle);
        let fetched = self
            .platform
            .fetch_author_feed(
                handle,
                self.config.tuning.author_feed_limit,
                AuthorFeedFilter::PostsNoReplies,
            )
            .await;

        let ctx = SourceContext::target(handle, &self.config.sources.self_repost_passthrough);
        self.process_entries(Source::AuthorFeed(handle.to_string()), fetched, &ctx, rule)
            .await;
    }

    async fn process_entries(
        &mut self,
        source: Source,
        fetched: Result<Vec<FeedEntry>>,
        ctx: &SourceContext,
        rule: SelectionRule,
    ) {
        let entries = match fetched {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to fetch {}: {}", source, e);
                self.run.sources_failed += 1;
                return;
            }
        };
        self.run.sources_processed += 1;

        let total = entries.len();
        let eligible: Vec<FeedEntry> = entries
            .into_iter()
            .filter(|entry| match classify(entry, ctx) {
                Ok(()) => true,
                Err(reason) => {
                    match entry.repost_marker.as_ref().and_then(|m| m.by_handle.as_deref()) {
                        Some(by) => tracing::debug!(
                            "Skipping {} (reposted by {}): {}",
                            entry.post.uri,
                            by,
                            reason
                        ),
                        None => tracing::debug!("Skipping {}: {}", entry.post.uri, reason),
                    }
                    false
                }
            })
            .collect();

        if eligible.is_empty() {
            info!("No eligible posts in {} ({} fetched)", source, total);
            return;
        }

        let batch = rule.apply(eligible, &mut *self.rng);
        info!(
            "Selected {} of at most {} post(s) from {} ({} fetched, policy {})",
            batch.len(),
            rule.policy.cap(),
            source,
            total,
            rule.policy
        );

        let pacing = self.config.tuning.pacing_delay();
        for entry in batch {
            if !self.has_quota() {
                self.stop_for_quota();
                return;
            }

            let outcome =
                synchronize(self.platform, &entry.post, self.config.tuning.dry_run).await;
            self.run.outcomes.push(PostOutcome {
                source: source.clone(),
                post_uri: entry.post.uri.clone(),
                outcome,
            });

            if outcome != RepublishOutcome::Skipped && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
        }
    }
}

fn dedup_preserving_order(handles: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    handles
        .into_iter()
        .filter(|handle| seen.insert(handle.to_ascii_lowercase()))
        .collect()
}
