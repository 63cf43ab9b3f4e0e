//! Skyboost - scheduled media resharing for Bluesky bot accounts
//!
//! This library provides the candidate-selection and idempotent-republish
//! engine: it classifies feed entries, samples a batch per source and drives
//! the unrepost → repost → like sequence for each selected post.

pub mod classifier;
pub mod config;
pub mod credentials;
pub mod embed;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod platforms;
pub mod republish;
pub mod runner;
pub mod selection;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{AccountCredentials, CredentialStore, EnvCredentials};
pub use error::{PlatformError, Result, SkyboostError};
pub use orchestrator::{AccountReport, Orchestrator, RunReport};
pub use types::{FeedEntry, PostView, RepublishOutcome, Source, ViewerState};
