//! skyboost - Scheduled media resharing for Bluesky bot accounts
//!
//! Runs once and exits; schedule it with cron or a CI workflow.

use clap::Parser;
use libskyboost::config::{resolve_config_path, Config};
use libskyboost::logging::{LogFormat, LoggingConfig};
use libskyboost::platforms::bluesky::BlueskySessions;
use libskyboost::runner::plan_sources;
use libskyboost::{EnvCredentials, Orchestrator, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "skyboost")]
#[command(version)]
#[command(about = "Repost and like media posts from chosen sources on behalf of Bluesky bot accounts")]
#[command(long_about = "\
skyboost - Scheduled media resharing for Bluesky bot accounts

DESCRIPTION:
    For every configured account, skyboost walks its sources (feed
    generators, lists, then target handles), keeps original posts that
    carry images, video or a link thumbnail, picks a small random batch
    per source and reposts + likes each pick. A post the account already
    reposted is unreposted first so it moves back to the top.

    Safe to re-run: likes are never duplicated.

USAGE:
    # Run every configured account
    skyboost

    # One account, reproducible picks, nothing written
    skyboost --account BEAUTYFAN --seed 42 --dry-run

    # Validate the configuration and show the source order
    skyboost --check-config

CREDENTIALS:
    BSKY_USERNAME_<LABEL> and BSKY_PASSWORD_<LABEL> for each label in
    `accounts`. Use an app password.

CONFIGURATION:
    --config, else $SKYBOOST_CONFIG, else ~/.config/skyboost/config.toml

EXIT CODES:
    0 - Run completed (individual accounts or sources may have failed)
    2 - Configuration error
    3 - Invalid command-line input
")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only run these account labels (repeatable)
    #[arg(short, long = "account", value_name = "LABEL")]
    accounts: Vec<String>,

    /// Seed for the random selection
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Select posts but do not repost or like anything
    #[arg(long)]
    dry_run: bool,

    /// Delay after each republished post, e.g. "500ms" or "2s" (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pacing_delay: Option<Duration>,

    /// Maximum posts to republish per account (overrides config)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    quota: Option<u64>,

    /// Validate the configuration, print the source order and exit
    #[arg(long)]
    check_config: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => resolve_config_path()?,
    };
    let mut config = Config::load_from_path(&path)?;

    if cli.dry_run {
        config.tuning.dry_run = true;
    }
    if let Some(delay) = cli.pacing_delay {
        config.tuning.pacing_delay_seconds = delay.as_secs_f64();
    }
    if let Some(quota) = cli.quota {
        config.tuning.per_run_quota = Some(quota as usize);
    }
    config.validate()?;

    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let sessions = BlueskySessions::new(&config.bluesky.service);
    let mut orchestrator =
        Orchestrator::new(config, EnvCredentials::default(), sessions).with_accounts(&cli.accounts)?;
    if let Some(seed) = cli.seed {
        orchestrator = orchestrator.with_seed(seed);
    }

    if cli.check_config {
        print_plan(&orchestrator);
        return Ok(());
    }

    info!(
        "skyboost starting for {} account(s)",
        orchestrator.accounts().len()
    );
    let report = orchestrator.run().await;

    for account in &report.accounts {
        println!("{}", account);
    }
    Ok(())
}

fn print_plan(orchestrator: &Orchestrator) {
    let config = orchestrator.config();
    println!("Configuration OK");
    println!("Accounts: {}", orchestrator.accounts().join(", "));

    let plan = plan_sources(&config.sources);
    if plan.is_empty() {
        println!("No sources configured");
    }
    for (position, source) in plan.iter().enumerate() {
        println!("{:>3}. {}", position + 1, source);
    }
    if config.tuning.dry_run {
        println!("Dry run enabled");
    }
}
