//! End-to-end tests for the republish engine
//!
//! Drive whole runs against the mock platform and check the exact sequence of
//! remote calls.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use libskyboost::classifier::{is_eligible, SourceContext};
use libskyboost::config::Config;
use libskyboost::credentials::MemoryCredentials;
use libskyboost::embed::EmbedKind;
use libskyboost::platforms::mock::{MockCall, MockPlatform, MockSessionProvider};
use libskyboost::republish::synchronize;
use libskyboost::runner::SourceRunner;
use libskyboost::selection::{select, SelectionPolicy};
use libskyboost::types::{FeedEntry, PostView, RepublishStage, ViewerState};
use libskyboost::{Orchestrator, RepublishOutcome};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

const BOT: &str = "beautyfan.bsky.social";
const BEAUTY: &str = "bleuskybeauty.bsky.social";
const DMPHOTOS: &str = "dmphotos.bsky.social";

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
}

fn post_uri(author: &str, n: u32) -> String {
    format!("at://{}/app.bsky.feed.post/{}", author, n)
}

fn media_post(author: &str, n: u32) -> FeedEntry {
    FeedEntry::original(
        PostView::new(post_uri(author, n), format!("cid{}", n), author)
            .with_embed(EmbedKind::Images(1))
            .with_indexed_at(at(n)),
    )
}

/// Newest first, like a real feed
fn timeline(author: &str, count: u32) -> Vec<FeedEntry> {
    (1..=count).rev().map(|n| media_post(author, n)).collect()
}

fn config(extra: &str) -> Config {
    Config::from_toml(&format!(
        "accounts = [\"BEAUTYFAN\"]\n[tuning]\npacing_delay_seconds = 0.0\n{}",
        extra
    ))
    .unwrap()
}

#[test]
fn scenario_newest_plus_two_older_is_ordered_oldest_first() {
    let eligible = timeline(BEAUTY, 5);
    let policy = SelectionPolicy::NewestPlusRandomOlder { older: 2 };

    // Find a seed that picks t3 and t1 as the older posts
    let seed = (0..10_000u64)
        .find(|seed| {
            let batch = select(eligible.clone(), policy, &mut StdRng::seed_from_u64(*seed));
            let mut picked: Vec<String> = batch.iter().map(|e| e.post.uri.clone()).collect();
            picked.sort();
            picked == vec![post_uri(BEAUTY, 1), post_uri(BEAUTY, 3), post_uri(BEAUTY, 5)]
        })
        .expect("some seed picks t3 and t1");

    let batch = select(eligible, policy, &mut StdRng::seed_from_u64(seed));
    let uris: Vec<String> = batch.iter().map(|e| e.post.uri.clone()).collect();
    assert_eq!(
        uris,
        vec![post_uri(BEAUTY, 1), post_uri(BEAUTY, 3), post_uri(BEAUTY, 5)]
    );
}

#[test]
fn scenario_empty_image_list_is_not_eligible() {
    let embed = json!({"$type": "app.bsky.embed.images#view", "images": []});
    let entry = FeedEntry::original(
        PostView::new(post_uri(BEAUTY, 1), "cid", BEAUTY).with_embed(EmbedKind::decode(Some(&embed))),
    );

    assert!(!is_eligible(&entry, &SourceContext::target(BEAUTY, &[])));
    assert!(!is_eligible(&entry, &SourceContext::generator(true)));
}

#[test]
fn scenario_self_repost_passthrough() {
    let allow_list = vec![BEAUTY.to_string()];

    let own_repost = FeedEntry::reposted_by(
        PostView::new(post_uri(BEAUTY, 1), "cid", BEAUTY).with_embed(EmbedKind::Video),
        BEAUTY,
    );
    assert!(is_eligible(&own_repost, &SourceContext::target(BEAUTY, &allow_list)));

    let not_allowed = FeedEntry::reposted_by(
        PostView::new(post_uri(DMPHOTOS, 1), "cid", DMPHOTOS).with_embed(EmbedKind::Video),
        DMPHOTOS,
    );
    assert!(!is_eligible(&not_allowed, &SourceContext::target(DMPHOTOS, &allow_list)));
}

#[tokio::test]
async fn scenario_existing_repost_is_recreated_and_liked() {
    let platform = MockPlatform::new(BOT);
    let post = PostView::new(post_uri(BEAUTY, 1), "cid1", BEAUTY)
        .with_embed(EmbedKind::Images(1))
        .with_viewer(ViewerState {
            repost: Some("r1".to_string()),
            like: None,
        });

    let outcome = synchronize(&platform, &post, false).await;

    assert_eq!(outcome, RepublishOutcome::RepostedAndLiked);
    assert_eq!(
        platform.mutations(),
        vec![
            MockCall::DeleteRepost("r1".to_string()),
            MockCall::CreateRepost(post_uri(BEAUTY, 1)),
            MockCall::CreateLike(post_uri(BEAUTY, 1)),
        ]
    );
}

#[tokio::test]
async fn scenario_repost_failure_after_delete() {
    let platform = MockPlatform::new(BOT).failing_repost();
    let post = PostView::new(post_uri(BEAUTY, 1), "cid1", BEAUTY)
        .with_embed(EmbedKind::Images(1))
        .with_viewer(ViewerState {
            repost: Some("r1".to_string()),
            like: None,
        });

    let outcome = synchronize(&platform, &post, false).await;

    assert_eq!(outcome, RepublishOutcome::Failed(RepublishStage::Repost));
    assert_eq!(
        platform.mutations(),
        vec![
            MockCall::DeleteRepost("r1".to_string()),
            MockCall::CreateRepost(post_uri(BEAUTY, 1)),
        ]
    );
}

#[tokio::test]
async fn two_runs_never_duplicate_a_like() -> Result<()> {
    let config = config(&format!("[sources]\ntargets = [\"{}\"]", BEAUTY));
    let platform = MockPlatform::new(BOT).with_author_feed(BEAUTY, timeline(BEAUTY, 1));

    let first = SourceRunner::new(&platform, &config, &mut StdRng::seed_from_u64(1))
        .run()
        .await;
    let first_repost = platform.repost_of(&post_uri(BEAUTY, 1));
    let second = SourceRunner::new(&platform, &config, &mut StdRng::seed_from_u64(2))
        .run()
        .await;

    assert_eq!(first.count(RepublishOutcome::RepostedAndLiked), 1);
    assert_eq!(second.count(RepublishOutcome::RepostedAndLiked), 1);
    assert_eq!(platform.like_count(), 1);

    let first_repost = first_repost.expect("reposted on the first run");
    let uri = post_uri(BEAUTY, 1);
    assert_eq!(
        platform.mutations(),
        vec![
            MockCall::CreateRepost(uri.clone()),
            MockCall::CreateLike(uri.clone()),
            MockCall::DeleteRepost(first_repost),
            MockCall::CreateRepost(uri.clone()),
        ]
    );
    assert!(platform.repost_of(&uri).is_some());
    Ok(())
}

#[tokio::test]
async fn state_left_by_an_earlier_run_is_refreshed_without_a_second_like() -> Result<()> {
    let uri = post_uri(DMPHOTOS, 1);
    let old_repost = format!("at://{}/app.bsky.feed.repost/old", BOT);
    let old_like = format!("at://{}/app.bsky.feed.like/old", BOT);
    let config = config(&format!("[sources]\ntargets = [\"{}\"]", DMPHOTOS));
    let platform = MockPlatform::new(BOT)
        .with_author_feed(DMPHOTOS, timeline(DMPHOTOS, 1))
        .with_existing_repost(&uri, &old_repost)
        .with_existing_like(&uri, &old_like);

    let run = SourceRunner::new(&platform, &config, &mut StdRng::seed_from_u64(4))
        .run()
        .await;

    assert_eq!(run.count(RepublishOutcome::RepostedAndLiked), 1);
    assert_eq!(
        platform.mutations(),
        vec![
            MockCall::DeleteRepost(old_repost.clone()),
            MockCall::CreateRepost(uri.clone()),
        ]
    );
    assert_ne!(platform.repost_of(&uri), Some(old_repost));
    assert_eq!(platform.like_of(&uri), Some(old_like));
    Ok(())
}

#[tokio::test]
async fn sources_are_walked_feeds_then_lists_then_targets() {
    let feed_a = "at://did:plc:f/app.bsky.feed.generator/a";
    let feed_b = "at://did:plc:f/app.bsky.feed.generator/b";
    let list = "at://did:plc:l/app.bsky.graph.list/members";
    let member = "member.bsky.social";

    let config = config(&format!(
        "[sources]\nfeeds = [\"{feed_a}\", \"{feed_b}\"]\nlists = [\"{list}\"]\ntargets = [\"{BEAUTY}\", \"\", \"{DMPHOTOS}\"]"
    ));
    let platform = MockPlatform::new(BOT)
        .with_generator_feed(feed_a, vec![media_post("x.bsky.social", 1)])
        .with_generator_feed(feed_b, vec![media_post("y.bsky.social", 2)])
        .with_list(list, &[member])
        .with_author_feed(member, timeline(member, 1))
        .with_author_feed(BEAUTY, timeline(BEAUTY, 1))
        .with_author_feed(DMPHOTOS, timeline(DMPHOTOS, 1));

    let run = SourceRunner::new(&platform, &config, &mut StdRng::seed_from_u64(3))
        .run()
        .await;

    let fetches: Vec<MockCall> = platform
        .calls()
        .into_iter()
        .filter(|call| !call.is_mutation())
        .collect();
    assert_eq!(
        fetches,
        vec![
            MockCall::FetchGeneratorFeed(feed_b.to_string()),
            MockCall::FetchGeneratorFeed(feed_a.to_string()),
            MockCall::FetchListMembers(list.to_string()),
            MockCall::FetchAuthorFeed(member.to_string()),
            MockCall::FetchAuthorFeed(DMPHOTOS.to_string()),
            MockCall::FetchAuthorFeed(BEAUTY.to_string()),
        ]
    );

    // The highest priority target is republished last
    let reposts: Vec<MockCall> = platform
        .mutations()
        .into_iter()
        .filter(|call| matches!(call, MockCall::CreateRepost(_)))
        .collect();
    assert_eq!(reposts.last(), Some(&MockCall::CreateRepost(post_uri(BEAUTY, 1))));
    assert_eq!(run.attempts(), 5);
}

#[tokio::test]
async fn list_members_are_deduplicated_and_use_the_list_window() {
    let list = "at://did:plc:l/app.bsky.graph.list/photographers";
    let config = config(&format!(
        "[sources]\nlists = [\"{list}\"]\n[selection.lists]\npolicy = \"bounded_random\"\ncount = 5\ncandidate_window = 2"
    ));
    let platform = MockPlatform::new(BOT)
        .with_list(list, &[DMPHOTOS, BEAUTY, DMPHOTOS])
        .with_author_feed(DMPHOTOS, timeline(DMPHOTOS, 6))
        .with_author_feed(BEAUTY, timeline(BEAUTY, 6));

    let run = SourceRunner::new(&platform, &config, &mut StdRng::seed_from_u64(9))
        .run()
        .await;

    let member_fetches = platform
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MockCall::FetchAuthorFeed(_)))
        .count();
    assert_eq!(member_fetches, 2);

    // Only the two newest posts of each member were candidates
    let mut reposted: Vec<String> = platform
        .mutations()
        .into_iter()
        .filter_map(|call| match call {
            MockCall::CreateRepost(uri) => Some(uri),
            _ => None,
        })
        .collect();
    reposted.sort();
    let mut expected = vec![
        post_uri(DMPHOTOS, 6),
        post_uri(DMPHOTOS, 5),
        post_uri(BEAUTY, 6),
        post_uri(BEAUTY, 5),
    ];
    expected.sort();
    assert_eq!(reposted, expected);
    assert_eq!(run.attempts(), 4);
}

#[tokio::test]
async fn ineligible_posts_are_never_republished() {
    let feed = "at://did:plc:f/app.bsky.feed.generator/mixed";
    let config = config(&format!(
        "[sources]\nfeeds = [\"{feed}\"]\ntargets = [\"{DMPHOTOS}\"]\n[selection.feeds]\npolicy = \"bounded_random\"\ncount = 10"
    ));

    let text_only = FeedEntry::original(PostView::new(post_uri(DMPHOTOS, 1), "c1", DMPHOTOS));
    let quote = FeedEntry::original(
        PostView::new(post_uri(DMPHOTOS, 2), "c2", DMPHOTOS)
            .with_embed(EmbedKind::RecordWithMedia { has_media: true }),
    );
    let reply = FeedEntry::original(
        PostView::new(post_uri("z.bsky.social", 3), "c3", "z.bsky.social")
            .with_embed(EmbedKind::Video)
            .as_reply(),
    );
    let someone_elses_repost = FeedEntry::reposted_by(
        PostView::new(post_uri("other.bsky.social", 4), "c4", "other.bsky.social")
            .with_embed(EmbedKind::Images(2)),
        DMPHOTOS,
    );

    let platform = MockPlatform::new(BOT)
        .with_generator_feed(feed, vec![reply.clone(), quote.clone(), text_only.clone()])
        .with_author_feed(DMPHOTOS, vec![someone_elses_repost, quote, text_only]);

    let run = SourceRunner::new(&platform, &config, &mut StdRng::seed_from_u64(0))
        .run()
        .await;

    assert_eq!(run.attempts(), 0);
    assert_eq!(run.sources_processed, 2);
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn broken_list_does_not_stop_targets() {
    let list = "at://did:plc:l/app.bsky.graph.list/gone";
    let config = config(&format!(
        "[sources]\nlists = [\"{list}\"]\ntargets = [\"{BEAUTY}\"]"
    ));
    let platform = MockPlatform::new(BOT).with_author_feed(BEAUTY, timeline(BEAUTY, 2));

    let run = SourceRunner::new(&platform, &config, &mut StdRng::seed_from_u64(0))
        .run()
        .await;

    assert_eq!(run.sources_failed, 1);
    assert_eq!(run.count(RepublishOutcome::RepostedAndLiked), 2);
}

#[tokio::test]
async fn seeded_runs_are_reproducible() {
    let config = config(&format!(
        "[sources]\ntargets = [\"{BEAUTY}\"]\n[selection.targets]\npolicy = \"bounded_random\"\ncount = 3"
    ));

    let mut picks = Vec::new();
    for _ in 0..2 {
        let platform = MockPlatform::new(BOT).with_author_feed(BEAUTY, timeline(BEAUTY, 20));
        let sessions = MockSessionProvider::new().with_session(BOT, platform.clone());
        let credentials = MemoryCredentials::new().with("BEAUTYFAN", BOT, "app-password");

        Orchestrator::new(config.clone(), credentials, sessions)
            .with_seed(42)
            .run()
            .await;
        picks.push(platform.mutations());
    }

    assert_eq!(picks[0].len(), 6);
    assert_eq!(picks[0], picks[1]);
}
