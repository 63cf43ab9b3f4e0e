//! Selection policies
//!
//! Picks a bounded random batch out of a source's eligible posts and orders it
//! oldest-first, so that when the batch is republished in sequence the most
//! recent post ends up as the most recent repost.
//!
//! Input is expected newest-first, which is how feeds are returned.

use rand::Rng;

use crate::types::FeedEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Always the newest post, plus `older` random picks from the rest
    NewestPlusRandomOlder { older: usize },
    /// Up to `count` random picks from the whole set
    BoundedRandom { count: usize },
}

impl SelectionPolicy {
    /// Largest batch this policy can produce
    pub fn cap(&self) -> usize {
        match self {
            SelectionPolicy::NewestPlusRandomOlder { older } => older.saturating_add(1),
            SelectionPolicy::BoundedRandom { count } => *count,
        }
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::NewestPlusRandomOlder { older } => {
                write!(f, "newest+{} random older", older)
            }
            SelectionPolicy::BoundedRandom { count } => write!(f, "{} random", count),
        }
    }
}

/// Policy plus an optional limit on how many eligible posts are considered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRule {
    pub policy: SelectionPolicy,
    /// Only the newest N eligible posts are candidates
    pub candidate_window: Option<usize>,
}

impl SelectionRule {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            candidate_window: None,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.candidate_window = Some(window);
        self
    }

    pub fn apply<R: Rng + ?Sized>(&self, mut eligible: Vec<FeedEntry>, rng: &mut R) -> Vec<FeedEntry> {
        if let Some(window) = self.candidate_window {
            eligible.truncate(window);
        }
        select(eligible, self.policy, rng)
    }
}

/// Choose a batch from `eligible` (newest-first) and sort it oldest-first
pub fn select<R: Rng + ?Sized>(
    eligible: Vec<FeedEntry>,
    policy: SelectionPolicy,
    rng: &mut R,
) -> Vec<FeedEntry> {
    let mut chosen = match policy {
        SelectionPolicy::NewestPlusRandomOlder { older } => {
            let mut entries = eligible.into_iter();
            let Some(newest) = entries.next() else {
                return Vec::new();
            };
            let mut picked = sample(entries.collect(), older, rng);
            // Pushed last so a timestamp tie still leaves it at the end
            picked.push(newest);
            picked
        }
        SelectionPolicy::BoundedRandom { count } => sample(eligible, count, rng),
    };

    // Stable: ties keep their relative order. `None` sorts first.
    chosen.sort_by_key(|entry| entry.post.timestamp());
    chosen
}

/// Uniform sample without replacement, clamped to the available count
fn sample<R: Rng + ?Sized>(items: Vec<FeedEntry>, amount: usize, rng: &mut R) -> Vec<FeedEntry> {
    let amount = amount.min(items.len());
    if amount == items.len() {
        return items;
    }

    let mut picks = rand::seq::index::sample(rng, items.len(), amount).into_vec();
    picks.sort_unstable();

    let mut slots: Vec<Option<FeedEntry>> = items.into_iter().map(Some).collect();
    picks
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}
