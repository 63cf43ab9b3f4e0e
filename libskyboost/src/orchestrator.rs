//! Account orchestration
//!
//! Runs every configured bot account one after another: look up its
//! credentials, log in, and hand the session to the [`SourceRunner`]. An
//! account that cannot be used is reported as skipped and the run moves on.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn, Instrument};

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::{Result, SkyboostError};
use crate::platforms::SessionProvider;
use crate::runner::{AccountRun, SourceRunner};
use crate::types::RepublishOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Completed,
    /// Credentials or login failed
    Skipped(String),
}

/// Result for one account
#[derive(Debug, Clone)]
pub struct AccountReport {
    pub label: String,
    /// Handle of the session, once logged in
    pub handle: Option<String>,
    pub status: AccountStatus,
    pub run: AccountRun,
}

impl AccountReport {
    fn skipped(label: &str, reason: String) -> Self {
        Self {
            label: label.to_string(),
            handle: None,
            status: AccountStatus::Skipped(reason),
            run: AccountRun::default(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, AccountStatus::Skipped(_))
    }
}

impl std::fmt::Display for AccountReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let AccountStatus::Skipped(reason) = &self.status {
            return write!(f, "{}: skipped ({})", self.label, reason);
        }

        write!(f, "{}", self.label)?;
        if let Some(handle) = &self.handle {
            write!(f, " ({})", handle)?;
        }
        write!(
            f,
            ": {} attempted, {} reposted+liked, {} reposted only, {} failed, {} dry-run",
            self.run.attempts(),
            self.run.count(RepublishOutcome::RepostedAndLiked),
            self.run.count(RepublishOutcome::RepostedOnly),
            self.run.failures(),
            self.run.count(RepublishOutcome::Skipped),
        )?;
        if self.run.sources_failed > 0 {
            write!(f, ", {} source(s) unavailable", self.run.sources_failed)?;
        }
        if self.run.quota_reached {
            write!(f, ", quota reached")?;
        }
        Ok(())
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub accounts: Vec<AccountReport>,
}

impl RunReport {
    pub fn attempts(&self) -> usize {
        self.accounts.iter().map(|a| a.run.attempts()).sum()
    }

    pub fn skipped_accounts(&self) -> usize {
        self.accounts.iter().filter(|a| a.is_skipped()).count()
    }
}

/// Drives a run across all selected accounts
pub struct Orchestrator {
    config: Config,
    credentials: Box<dyn CredentialStore>,
    sessions: Box<dyn SessionProvider>,
    accounts: Vec<String>,
    seed: Option<u64>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        credentials: impl CredentialStore + 'static,
        sessions: impl SessionProvider + 'static,
    ) -> Self {
        let accounts = config.accounts.clone();
        Self {
            config,
            credentials: Box::new(credentials),
            sessions: Box::new(sessions),
            accounts,
            seed: None,
        }
    }

    /// Seed the sampler so selections are reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Restrict the run to some of the configured accounts
    ///
    /// Labels match case-insensitively and keep the configured order.
    ///
    /// # Errors
    ///
    /// Returns `SkyboostError::InvalidInput` for a label that is not configured.
    pub fn with_accounts(mut self, labels: &[String]) -> Result<Self> {
        if labels.is_empty() {
            return Ok(self);
        }

        if let Some(unknown) = labels.iter().find(|label| {
            !self
                .config
                .accounts
                .iter()
                .any(|configured| configured.eq_ignore_ascii_case(label.trim()))
        }) {
            return Err(SkyboostError::InvalidInput(format!(
                "Account '{}' is not configured. Configured accounts: {}",
                unknown,
                self.config.accounts.join(", ")
            )));
        }

        self.accounts = self
            .config
            .accounts
            .iter()
            .filter(|configured| {
                labels
                    .iter()
                    .any(|label| configured.eq_ignore_ascii_case(label.trim()))
            })
            .cloned()
            .collect();
        Ok(self)
    }

    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self) -> RunReport {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        if self.config.tuning.dry_run {
            info!("Dry run: no reposts or likes will be created");
        }

        let mut report = RunReport::default();
        for label in &self.accounts {
            let span = tracing::info_span!("account", label = %label);
            let account = self.run_account(label, &mut rng).instrument(span).await;
            report.accounts.push(account);
        }

        info!(
            "Run finished: {} account(s), {} skipped, {} post(s) attempted",
            report.accounts.len(),
            report.skipped_accounts(),
            report.attempts()
        );
        report
    }

    async fn run_account(&self, label: &str, rng: &mut StdRng) -> AccountReport {
        info!(
            "Starting account {} (credentials from {})",
            label,
            self.credentials.backend_name()
        );

        let credentials = match self.credentials.credentials_for(label) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("Skipping account {}: {}", label, e);
                return AccountReport::skipped(label, e.to_string());
            }
        };

        let platform = match self.sessions.login(&credentials).await {
            Ok(platform) => platform,
            Err(e) if e.is_authentication() => {
                warn!(
                    "Skipping account {}: login rejected, check its credentials in {}: {}",
                    label,
                    self.credentials.backend_name(),
                    e
                );
                return AccountReport::skipped(label, e.to_string());
            }
            Err(e) => {
                warn!("Skipping account {}: login failed: {}", label, e);
                return AccountReport::skipped(label, e.to_string());
            }
        };
        info!("Logged in as {}", platform.handle());

        let run = SourceRunner::new(platform.as_ref(), &self.config, rng)
            .run()
            .await;

        let report = AccountReport {
            label: label.to_string(),
            handle: Some(platform.handle().to_string()),
            status: AccountStatus::Completed,
            run,
        };
        info!("{}", report);
        report
    }
}
