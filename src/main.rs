use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use issuewarden::config::DEFAULT_CONFIG_FILE;
use issuewarden::moderation::{authenticate, select_repositories, KeywordSet, RunSummary};
use issuewarden::models::RepoRef;
use issuewarden::{
    CancellationToken, ConfigProvider, EnvConfig, Error, FileConfig, GitHubClient, Moderator,
    RunContext, RunPolicy, Schedule, Settings,
};

#[derive(Parser, Debug)]
#[command(name = "issuewarden")]
#[command(version = "0.1.0")]
#[command(about = "Delete spam issues from your GitHub repositories")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check repeatedly until interrupted, using the saved configuration
    Watch {
        /// Configuration file written by `configure`
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Read settings from environment variables instead of the file
        #[arg(long)]
        env: bool,

        /// Do not draw the countdown between checks
        #[arg(long)]
        no_countdown: bool,
    },

    /// Check every repository once and exit (for CI)
    Once {
        /// Read settings from this file instead of environment variables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the pass report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a token and save settings for `watch`
    Configure {
        /// GitHub token with Issues and Metadata permissions
        #[arg(long)]
        token: String,

        /// Suspicious keyword (repeatable, defaults to the built-in list)
        #[arg(short = 'k', long = "keyword")]
        keywords: Vec<String>,

        /// Repository to monitor as owner/name (repeatable, defaults to all owned)
        #[arg(short = 'r', long = "repo")]
        repos: Vec<String>,

        /// Seconds between checks (minimum 30)
        #[arg(long, default_value_t = issuewarden::config::DEFAULT_INTERVAL_SECS)]
        interval: u64,

        /// Where to write the configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Print the saved configuration
    Show {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("issuewarden=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    match args.command {
        Command::Watch {
            config,
            env,
            no_countdown,
        } => {
            let provider: Box<dyn ConfigProvider> = if env {
                Box::new(EnvConfig::new())
            } else {
                Box::new(FileConfig::new(config))
            };
            monitor(provider.as_ref(), RunPolicy::Forever, !no_countdown).await?;
        }
        Command::Once { config, json } => {
            let provider: Box<dyn ConfigProvider> = match config {
                Some(path) => Box::new(FileConfig::new(path)),
                None => Box::new(EnvConfig::new()),
            };
            let summary = monitor(provider.as_ref(), RunPolicy::Once, false).await?;
            if json {
                if let Some(report) = summary.last_report {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }
        Command::Configure {
            token,
            keywords,
            repos,
            interval,
            config,
        } => configure(token, keywords, repos, interval, FileConfig::new(config)).await?,
        Command::Show { config } => show(&FileConfig::new(config))?,
    }

    Ok(())
}

async fn monitor(
    provider: &dyn ConfigProvider,
    policy: RunPolicy,
    countdown: bool,
) -> anyhow::Result<RunSummary> {
    let settings = match provider.load() {
        Err(Error::ConfigNotFound(path)) => anyhow::bail!(
            "no configuration at {}; run `issuewarden configure --token <TOKEN>` first",
            path.display()
        ),
        other => other?,
    };
    tracing::info!("Loaded settings from {}", provider.describe());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        let mut signals = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            signals += 1;
            if signals > 1 {
                tracing::warn!("Interrupted again, exiting now");
                std::process::exit(130);
            }
            tracing::info!("Interrupted, stopping after the current issue (Ctrl-C again to force)");
            interrupt.cancel();
        }
    });

    let client = GitHubClient::new(&settings.token, cancel.clone())?;
    let account = authenticate(&client).await?;
    let repositories = select_repositories(&client, &account, &settings.repositories).await?;

    let names: Vec<String> = repositories.iter().map(ToString::to_string).collect();
    let keywords: Vec<&str> = settings.keywords.iter().collect();
    tracing::info!("Monitoring repositories: {}", names.join(", "));
    tracing::info!("Keywords: {}", keywords.join(", "));

    let schedule = Schedule::new(settings.interval()).with_countdown(countdown);
    let moderator = Moderator::new(client, settings.keywords.clone(), repositories, schedule);

    let mut ctx = RunContext::new(cancel);
    let summary = moderator.run(policy, &mut ctx).await;

    tracing::info!(
        "Done: {} passes, {} issues deleted, {} passes rate limited",
        summary.passes,
        summary.deleted,
        summary.rate_limited_passes
    );
    Ok(summary)
}

async fn configure(
    token: String,
    keywords: Vec<String>,
    repos: Vec<String>,
    interval: u64,
    file: FileConfig,
) -> anyhow::Result<()> {
    let mut settings = Settings::new(token);
    if !keywords.is_empty() {
        settings.keywords = KeywordSet::new(&keywords)?;
    }
    settings.repositories = repos
        .iter()
        .map(|r| r.parse::<RepoRef>())
        .collect::<issuewarden::Result<Vec<_>>>()?;
    settings.check_interval = interval;
    let mut settings = settings.validated()?;

    let client = GitHubClient::new(&settings.token, CancellationToken::new())?;
    let account = authenticate(&client).await?;

    settings.repositories = match select_repositories(&client, &account, &settings.repositories).await
    {
        Err(Error::NoRepositories(_)) => anyhow::bail!(
            "no repositories found for {}; pass one with --repo owner/name",
            account
        ),
        other => other?,
    };
    settings.account = Some(account);

    file.save(&settings)?;
    Ok(())
}

fn show(file: &FileConfig) -> anyhow::Result<()> {
    let settings = file
        .load()
        .with_context(|| format!("failed to read {}", file.path().display()))?;

    let repos: Vec<String> = settings.repositories.iter().map(ToString::to_string).collect();
    let keywords: Vec<&str> = settings.keywords.iter().collect();

    println!("Account:      {}", settings.account.as_deref().unwrap_or("N/A"));
    println!("Token:        {}", settings.masked_token());
    println!(
        "Repositories: {}",
        if repos.is_empty() {
            "all owned".to_string()
        } else {
            repos.join(", ")
        }
    );
    println!("Keywords:     {}", keywords.join(", "));
    println!("Interval:     {}s", settings.check_interval);
    Ok(())
}
