//! Thin front end over the scraper core: argument parsing, config and
//! logging bootstrap, collaborator wiring, and the shutdown signal.

mod code_source;
mod jsonl_store;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use jobscout_core::AppConfig;
use jobscout_scraper::{
    process_page_url, NavigatorFactory, RetryOptions, Scheduler, SchedulerConfig, SiteRegistry,
    WebDriverFactory,
};
use jobscout_state::StateStore;

use code_source::FileCodeSource;
use jsonl_store::JsonlStore;

#[derive(Debug, Parser)]
#[command(name = "jobscout")]
#[command(about = "Job-site scraper orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every auto-run crawler on its configured cadence, forever
    RunAll {
        /// Sleep one full interval before the first pass
        #[arg(long)]
        wait_first: bool,

        /// Start the first pass at this crawler (case-insensitive); runs it
        /// even when flagged ignore_auto_run
        #[arg(long)]
        starting_at: Option<String>,

        /// Stop after a single pass
        #[arg(long)]
        once: bool,
    },
    /// Run exactly the named crawlers once, in order, ignoring cadence
    Run {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Re-extract a single already-known posting URL
    ProcessUrl { url: String },
    /// Print the recorded per-crawler failure summaries
    Failures { crawler: Option<String> },
    /// Reset all stored crawl state for one crawler
    ClearState { crawler: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = jobscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::RunAll {
            wait_first,
            starting_at,
            once,
        } => run_all(&config, wait_first, starting_at, once).await,
        Commands::Run { names } => run_specified(&config, &names).await,
        Commands::ProcessUrl { url } => process_url(&config, &url).await,
        Commands::Failures { crawler } => print_failures(&config, crawler.as_deref()),
        Commands::ClearState { crawler } => clear_state(&config, &crawler),
    }
}

/// Everything a scheduler run needs, built once from config.
struct Collaborators {
    navigators: Arc<dyn NavigatorFactory>,
    store: Arc<JsonlStore>,
    state: Arc<StateStore>,
}

fn build_collaborators(config: &AppConfig) -> anyhow::Result<Collaborators> {
    let browser = Arc::new(WebDriverFactory::new(
        &config.webdriver_url,
        Duration::from_secs(config.page_load_timeout_secs),
        Duration::from_secs(config.element_wait_timeout_secs),
    ));
    let codes = Arc::new(FileCodeSource::new(
        &config.verification_code_path,
        Duration::from_secs(config.verification_timeout_secs),
    ));
    let navigators = Arc::new(SiteRegistry::new(config.clone(), browser, codes));
    let store = Arc::new(JsonlStore::open(&config.jobs_out_path)?);
    let state = Arc::new(StateStore::open(&config.state_path)?);
    Ok(Collaborators {
        navigators,
        store,
        state,
    })
}

fn scheduler_config(
    config: &AppConfig,
    wait_first: bool,
    starting_at: Option<String>,
    once: bool,
) -> SchedulerConfig {
    SchedulerConfig {
        wait_before_first_run: wait_first,
        starting_at,
        run_once: once,
        run_in_tabs: config.run_in_tabs,
        retry: RetryOptions::new(
            config.nav_max_retries,
            Duration::from_secs(config.nav_retry_delay_secs),
        ),
        skip_fresh: Duration::from_secs(config.skip_fresh_secs),
    }
}

fn build_scheduler(
    config: &AppConfig,
    sched_config: SchedulerConfig,
) -> anyhow::Result<Scheduler> {
    let crawlers = jobscout_core::load_crawlers(&config.crawlers_path)?;
    let collaborators = build_collaborators(config)?;
    Ok(Scheduler::new(
        crawlers.crawlers,
        sched_config,
        collaborators.navigators,
        collaborators.store,
        collaborators.state,
        shutdown_channel(),
    ))
}

async fn run_all(
    config: &AppConfig,
    wait_first: bool,
    starting_at: Option<String>,
    once: bool,
) -> anyhow::Result<()> {
    let mut scheduler =
        build_scheduler(config, scheduler_config(config, wait_first, starting_at, once))?;
    scheduler.run_all().await?;
    Ok(())
}

async fn run_specified(config: &AppConfig, names: &[String]) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(config, scheduler_config(config, false, None, true))?;
    scheduler.run_specified(names).await?;
    Ok(())
}

async fn process_url(config: &AppConfig, url: &str) -> anyhow::Result<()> {
    let browser = WebDriverFactory::new(
        &config.webdriver_url,
        Duration::from_secs(config.page_load_timeout_secs),
        Duration::from_secs(config.element_wait_timeout_secs),
    );
    let codes = Arc::new(FileCodeSource::new(
        &config.verification_code_path,
        Duration::from_secs(config.verification_timeout_secs),
    ));
    let store = JsonlStore::open(&config.jobs_out_path)?;

    let summary = process_page_url(url, config, &browser, codes).await?;

    use jobscout_scraper::JobStore;
    match store.insert_job(&summary).await? {
        Some(id) => println!("stored {id}"),
        None => println!("already stored; extraction refreshed nothing"),
    }
    println!("{:>10}: {}", "title", summary.title);
    println!("{:>10}: {}", "company", summary.company);
    println!("{:>10}: {}", "location", summary.location);
    println!("{:>10}: {}", "url", summary.url);
    Ok(())
}

fn print_failures(config: &AppConfig, crawler: Option<&str>) -> anyhow::Result<()> {
    let state = StateStore::open(&config.state_path)?;

    let crawlers: Vec<String> = match crawler {
        Some(name) => {
            let file = jobscout_core::load_crawlers(&config.crawlers_path)?;
            let canonical = file
                .canonical_name(name)
                .ok_or_else(|| anyhow::anyhow!("no crawler named '{name}' is configured"))?;
            vec![canonical.to_string()]
        }
        None => state.crawler_names(),
    };

    let mut any = false;
    for name in &crawlers {
        let failures = state.failure_summary(name);
        if failures.is_empty() {
            continue;
        }
        any = true;
        println!("{name}: {} failed keyword(s)", failures.len());
        for failure in failures {
            let when = failure
                .last_error_time
                .map_or_else(|| "unknown time".to_string(), |t| t.to_rfc3339());
            println!(
                "  {:<24} {} ({when})",
                failure.keyword,
                failure.last_error.as_deref().unwrap_or("unknown error"),
            );
        }
    }
    if !any {
        println!("no recorded failures");
    }
    Ok(())
}

fn clear_state(config: &AppConfig, crawler: &str) -> anyhow::Result<()> {
    let file = jobscout_core::load_crawlers(&config.crawlers_path)?;
    let canonical = file
        .canonical_name(crawler)
        .ok_or_else(|| anyhow::anyhow!("no crawler named '{crawler}' is configured"))?;

    let state = StateStore::open(&config.state_path)?;
    state.clear_state(canonical)?;
    println!("cleared state for {canonical}");
    Ok(())
}

/// Watch channel flipped to `true` on ctrl-c or SIGTERM. Crawls poll it
/// between keywords and pages; the scheduler selects on it while sleeping.
fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received — stopping after the current page");
        let _ = tx.send(true);
    });
    rx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
