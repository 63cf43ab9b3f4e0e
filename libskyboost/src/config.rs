//! Configuration management for Skyboost
//!
//! The configuration is a single TOML file. Every section is optional except
//! `accounts`; omitted values fall back to the defaults below.
//!
//! ```toml
//! accounts = ["BEAUTYFAN", "HOTBLEUSKY"]
//!
//! [sources]
//! # Highest priority first; blank slots are skipped
//! targets = ["bleuskybeauty.bsky.social", "", "dmphotos.bsky.social"]
//! feeds = ["https://bsky.app/profile/did:plc:abc/feed/photos"]
//! lists = []
//! self_repost_passthrough = ["bleuskybeauty.bsky.social"]
//!
//! [tuning]
//! pacing_delay_seconds = 1.0
//! per_run_quota = 30
//!
//! [selection.targets]
//! policy = "newest_plus_random_older"
//! count = 2
//! ```

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::platforms::bluesky::DEFAULT_SERVICE;
use crate::selection::{SelectionPolicy, SelectionRule};

pub const CONFIG_ENV: &str = "SKYBOOST_CONFIG";

/// Largest page the AT Protocol feed endpoints accept
pub const MAX_FETCH_LIMIT: u32 = 100;

/// Longest accepted pause between republished posts
pub const MAX_PACING_DELAY_SECONDS: f64 = 3600.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Account labels; credentials are looked up per label
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
    #[serde(default)]
    pub selection: SelectionSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_service")]
    pub service: String,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
        }
    }
}

/// Source slots, each declared highest priority first
///
/// A blank slot decodes to `None` and is skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default, deserialize_with = "deserialize_slots")]
    pub feeds: Vec<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_slots")]
    pub lists: Vec<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_handle_slots")]
    pub targets: Vec<Option<String>>,
    /// Targets whose own reposts are accepted
    #[serde(default, deserialize_with = "deserialize_handles")]
    pub self_repost_passthrough: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TuningConfig {
    #[serde(default = "default_fetch_limit")]
    pub author_feed_limit: u32,
    #[serde(default = "default_fetch_limit")]
    pub feed_limit: u32,
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_seconds: f64,
    /// Maximum synchronize attempts per account per run
    #[serde(default)]
    pub per_run_quota: Option<usize>,
    #[serde(default = "default_true")]
    pub exclude_feed_replies: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            author_feed_limit: default_fetch_limit(),
            feed_limit: default_fetch_limit(),
            pacing_delay_seconds: default_pacing_delay(),
            per_run_quota: None,
            exclude_feed_replies: true,
            dry_run: false,
        }
    }
}

impl TuningConfig {
    /// Pacing delay, clamped to `0..=MAX_PACING_DELAY_SECONDS`
    pub fn pacing_delay(&self) -> Duration {
        let seconds = self.pacing_delay_seconds.clamp(0.0, MAX_PACING_DELAY_SECONDS);
        Duration::try_from_secs_f64(seconds).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    NewestPlusRandomOlder,
    BoundedRandom,
}

/// Selection settings for one source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SelectionConfig {
    pub policy: PolicyKind,
    /// Older picks for `newest_plus_random_older`, total picks for `bounded_random`
    pub count: usize,
    #[serde(default)]
    pub candidate_window: Option<usize>,
}

impl SelectionConfig {
    pub fn rule(&self) -> SelectionRule {
        let policy = match self.policy {
            PolicyKind::NewestPlusRandomOlder => {
                SelectionPolicy::NewestPlusRandomOlder { older: self.count }
            }
            PolicyKind::BoundedRandom => SelectionPolicy::BoundedRandom { count: self.count },
        };
        SelectionRule {
            policy,
            candidate_window: self.candidate_window,
        }
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.policy == PolicyKind::BoundedRandom && self.count == 0 {
            return Err(invalid(field, "bounded_random needs a count of at least 1"));
        }
        if self.candidate_window == Some(0) {
            return Err(invalid(field, "candidate_window must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionSection {
    #[serde(default = "default_feed_selection")]
    pub feeds: SelectionConfig,
    #[serde(default = "default_list_selection")]
    pub lists: SelectionConfig,
    #[serde(default = "default_target_selection")]
    pub targets: SelectionConfig,
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            feeds: default_feed_selection(),
            lists: default_list_selection(),
            targets: default_target_selection(),
        }
    }
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_fetch_limit() -> u32 {
    MAX_FETCH_LIMIT
}

fn default_pacing_delay() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_feed_selection() -> SelectionConfig {
    SelectionConfig {
        policy: PolicyKind::BoundedRandom,
        count: 1,
        candidate_window: None,
    }
}

fn default_list_selection() -> SelectionConfig {
    SelectionConfig {
        policy: PolicyKind::BoundedRandom,
        count: 1,
        candidate_window: Some(10),
    }
}

fn default_target_selection() -> SelectionConfig {
    SelectionConfig {
        policy: PolicyKind::NewestPlusRandomOlder,
        count: 2,
        candidate_window: None,
    }
}

fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}

fn deserialize_slots<'de, D>(deserializer: D) -> std::result::Result<Vec<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw
        .iter()
        .map(|slot| Some(slot.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}

fn deserialize_handle_slots<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw
        .iter()
        .map(|slot| Some(normalize_handle(slot)).filter(|s| !s.is_empty()))
        .collect())
}

fn deserialize_handles<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw
        .iter()
        .map(|h| normalize_handle(h))
        .filter(|h| !h.is_empty())
        .collect())
}

fn deserialize_labels<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

fn invalid(field: &str, reason: &str) -> crate::error::SkyboostError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load and validate configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Check numeric ranges and that at least one account is configured
    pub fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(ConfigError::MissingField("accounts".to_string()).into());
        }

        if self.bluesky.service.trim().is_empty() {
            return Err(invalid("bluesky.service", "must not be empty"));
        }

        for (field, limit) in [
            ("tuning.author_feed_limit", self.tuning.author_feed_limit),
            ("tuning.feed_limit", self.tuning.feed_limit),
        ] {
            if limit == 0 || limit > MAX_FETCH_LIMIT {
                return Err(invalid(
                    field,
                    &format!("must be between 1 and {}", MAX_FETCH_LIMIT),
                ));
            }
        }

        let delay = self.tuning.pacing_delay_seconds;
        if !delay.is_finite() || delay < 0.0 || delay > MAX_PACING_DELAY_SECONDS {
            return Err(invalid(
                "tuning.pacing_delay_seconds",
                &format!("must be between 0 and {} seconds", MAX_PACING_DELAY_SECONDS),
            ));
        }

        if self.tuning.per_run_quota == Some(0) {
            return Err(invalid("tuning.per_run_quota", "must be at least 1"));
        }

        self.selection.feeds.validate("selection.feeds")?;
        self.selection.lists.validate("selection.lists")?;
        self.selection.targets.validate("selection.targets")?;

        Ok(())
    }
}

/// Resolve the configuration file path
///
/// `SKYBOOST_CONFIG` wins (with `~` expanded), otherwise the platform config
/// directory is used.
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
        }
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("skyboost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkyboostError;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(r#"accounts = ["BEAUTYFAN"]"#).unwrap();

        assert_eq!(config.accounts, vec!["BEAUTYFAN"]);
        assert_eq!(config.bluesky.service, "https://bsky.social");
        assert_eq!(config.tuning.author_feed_limit, 100);
        assert_eq!(config.tuning.feed_limit, 100);
        assert_eq!(config.tuning.pacing_delay(), Duration::from_secs(1));
        assert_eq!(config.tuning.per_run_quota, None);
        assert!(config.tuning.exclude_feed_replies);
        assert!(!config.tuning.dry_run);

        assert_eq!(
            config.selection.targets.rule(),
            SelectionRule::new(SelectionPolicy::NewestPlusRandomOlder { older: 2 })
        );
        assert_eq!(
            config.selection.feeds.rule(),
            SelectionRule::new(SelectionPolicy::BoundedRandom { count: 1 })
        );
        assert_eq!(
            config.selection.lists.rule(),
            SelectionRule::new(SelectionPolicy::BoundedRandom { count: 1 }).with_window(10)
        );
    }

    #[test]
    fn test_blank_slots_become_none() {
        let config = Config::from_toml(
            r#"
            accounts = ["A"]

            [sources]
            targets = ["@bleuskybeauty.bsky.social", "", "   ", " dmphotos.bsky.social "]
            feeds = ["", "at://did:plc:abc/app.bsky.feed.generator/photos"]
            self_repost_passthrough = ["@BleuskyBeauty.bsky.social", ""]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.sources.targets,
            vec![
                Some("bleuskybeauty.bsky.social".to_string()),
                None,
                None,
                Some("dmphotos.bsky.social".to_string()),
            ]
        );
        assert_eq!(
            config.sources.feeds,
            vec![
                None,
                Some("at://did:plc:abc/app.bsky.feed.generator/photos".to_string())
            ]
        );
        assert!(config.sources.lists.is_empty());
        assert_eq!(
            config.sources.self_repost_passthrough,
            vec!["BleuskyBeauty.bsky.social"]
        );
    }

    #[test]
    fn test_selection_override() {
        let config = Config::from_toml(
            r#"
            accounts = ["A"]

            [selection.feeds]
            policy = "bounded_random"
            count = 3
            candidate_window = 20
            "#,
        )
        .unwrap();

        assert_eq!(
            config.selection.feeds.rule(),
            SelectionRule::new(SelectionPolicy::BoundedRandom { count: 3 }).with_window(20)
        );
        // Untouched sections keep their defaults
        assert_eq!(config.selection.targets, default_target_selection());
    }

    #[test]
    fn test_missing_accounts_rejected() {
        let err = Config::from_toml(r#"accounts = ["", " "]"#).unwrap_err();
        assert!(matches!(
            err,
            SkyboostError::Config(ConfigError::MissingField(ref f)) if f == "accounts"
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let cases = [
            ("[tuning]\nauthor_feed_limit = 0", "tuning.author_feed_limit"),
            ("[tuning]\nfeed_limit = 101", "tuning.feed_limit"),
            ("[tuning]\npacing_delay_seconds = -1.0", "tuning.pacing_delay_seconds"),
            ("[tuning]\npacing_delay_seconds = 1e20", "tuning.pacing_delay_seconds"),
            ("[tuning]\npacing_delay_seconds = 3601.0", "tuning.pacing_delay_seconds"),
            ("[tuning]\nper_run_quota = 0", "tuning.per_run_quota"),
            (
                "[selection.lists]\npolicy = \"bounded_random\"\ncount = 0",
                "selection.lists",
            ),
            (
                "[selection.targets]\npolicy = \"newest_plus_random_older\"\ncount = 1\ncandidate_window = 0",
                "selection.targets",
            ),
        ];

        for (section, expected_field) in cases {
            let content = format!("accounts = [\"A\"]\n{}", section);
            match Config::from_toml(&content) {
                Err(SkyboostError::Config(ConfigError::Invalid { field, .. })) => {
                    assert_eq!(field, expected_field)
                }
                other => panic!("expected invalid {}, got {:?}", expected_field, other),
            }
        }
    }

    #[test]
    fn test_pacing_delay_never_panics_on_unvalidated_values() {
        let mut tuning = TuningConfig::default();

        tuning.pacing_delay_seconds = 1e20;
        assert_eq!(tuning.pacing_delay(), Duration::from_secs(3600));

        tuning.pacing_delay_seconds = f64::NAN;
        assert_eq!(tuning.pacing_delay(), Duration::ZERO);

        tuning.pacing_delay_seconds = -5.0;
        assert_eq!(tuning.pacing_delay(), Duration::ZERO);
    }

    #[test]
    fn test_pacing_delay_upper_bound_is_accepted() {
        let config =
            Config::from_toml("accounts = [\"A\"]\n[tuning]\npacing_delay_seconds = 3600.0").unwrap();
        assert_eq!(config.tuning.pacing_delay(), Duration::from_secs(3600));
    }

    #[test]
    fn test_unknown_policy_is_parse_error() {
        let err = Config::from_toml(
            "accounts = [\"A\"]\n[selection.feeds]\npolicy = \"everything\"\ncount = 1",
        )
        .unwrap_err();
        assert!(matches!(err, SkyboostError::Config(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "accounts = [\"BEAUTYFAN\"]\n[tuning]\npacing_delay_seconds = 0.5\nper_run_quota = 12"
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.tuning.pacing_delay(), Duration::from_millis(500));
        assert_eq!(config.tuning.per_run_quota, Some(12));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load_from_path(Path::new("/nonexistent/skyboost.toml")).unwrap_err();
        assert!(matches!(err, SkyboostError::Config(ConfigError::ReadError(_))));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        std::env::set_var(CONFIG_ENV, "/tmp/skyboost-test.toml");
        assert_eq!(
            resolve_config_path().unwrap(),
            PathBuf::from("/tmp/skyboost-test.toml")
        );
        std::env::remove_var(CONFIG_ENV);
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_default() {
        std::env::remove_var(CONFIG_ENV);
        let path = resolve_config_path().unwrap();
        assert!(path.ends_with("skyboost/config.toml"));
    }
}
