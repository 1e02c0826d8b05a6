use anyhow::Context;
use clap::{Parser, Subcommand};
use os_core::types::{ClientStatus, PrWatch, ReviewWatch};
use os_core::{GithubService, ReviewPollTrigger};
use os_db::DbStore;
use os_events::EventBus;
use os_github::{ClientConfig, EnvSecretStore, client_from_env};
use os_poller::{Poller, PollerConfig};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_BUS_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "os", about = "Watches GitHub pull requests for Overseer tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the PR and review pollers until interrupted.
    Serve,
    Github {
        #[command(subcommand)]
        command: GithubCommand,
    },
    Watches {
        #[command(subcommand)]
        command: WatchesCommand,
    },
}

#[derive(Subcommand)]
enum GithubCommand {
    /// Show which client is in use and who it is authenticated as.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WatchesCommand {
    /// List active PR watches and review watches.
    List {
        /// Only review watches of this workspace; all enabled ones otherwise.
        #[arg(long)]
        workspace: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => serve().await,
        Command::Github {
            command: GithubCommand::Status { json },
        } => {
            let (service, _) = build_service().await?;
            print_status(&service.status().await, json)
        }
        Command::Watches {
            command: WatchesCommand::List { workspace, json },
        } => {
            let (service, _) = build_service().await?;
            let pr_watches = service.list_active_pr_watches()?;
            let review_watches = match workspace {
                Some(workspace) => service.list_review_watches(&workspace)?,
                None => service.list_enabled_review_watches()?,
            };
            print_watches(&pr_watches, &review_watches, json)
        }
    }
}

fn db_path() -> String {
    std::env::var("OVERSEER_DB_PATH").unwrap_or_else(|_| ".overseer/tasks.db".to_string())
}

async fn build_service() -> anyhow::Result<(GithubService<DbStore>, EventBus)> {
    let db_path = db_path();
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let conn = os_db::schema::open_and_migrate(&db_path)
        .with_context(|| format!("opening database at {db_path}"))?;
    let secrets = EnvSecretStore::only(os_github::factory::TOKEN_SECRET_NAMES);
    let client = client_from_env(&ClientConfig::from_env(), Some(&secrets)).await;
    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let service = GithubService::new(DbStore::new(conn), client, event_bus.clone());
    Ok((service, event_bus))
}

async fn serve() -> anyhow::Result<()> {
    let (service, _event_bus) = build_service().await?;
    if !service.is_available() {
        tracing::warn!("no github client available; pollers will idle");
    }
    let (trigger, queue) = ReviewPollTrigger::channel(os_core::trigger::DEFAULT_TRIGGER_CAPACITY);
    let service = Arc::new(service.with_review_trigger(trigger));
    let mut poller = Poller::new(service, PollerConfig::from_env()).with_review_queue(queue);
    poller.start();
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown requested");
    poller.stop().await;
    Ok(())
}

fn print_status(status: &ClientStatus, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }
    let kind = format!("{:?}", status.kind);
    if status.available {
        println!("{} github via {}", "●".green(), kind.bold());
    } else {
        println!("{} github integration disabled", "●".red());
    }
    match &status.user {
        Some(user) => println!("  user: {user}"),
        None if status.available => println!("  user: {}", "unknown".yellow()),
        None => {}
    }
    Ok(())
}

fn print_watches(
    pr_watches: &[PrWatch],
    review_watches: &[ReviewWatch],
    json: bool,
) -> anyhow::Result<()> {
    if json {
        let value = serde_json::json!({
            "pr_watches": pr_watches,
            "review_watches": review_watches,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("{}", "PR watches".bold());
    if pr_watches.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for watch in pr_watches {
        let target = if watch.pr_number == 0 {
            format!("branch {}", watch.branch).yellow().to_string()
        } else {
            format!("#{}", watch.pr_number).green().to_string()
        };
        let checked = watch
            .last_checked_at
            .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "  {}  {}/{} {}  task {}  checked {}",
            watch.id.as_str().dimmed(),
            watch.owner,
            watch.repo,
            target,
            watch.task_id,
            checked
        );
    }
    println!("{}", "Review watches".bold());
    if review_watches.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for watch in review_watches {
        let repos = if watch.repos.is_empty() {
            "all repositories".to_string()
        } else {
            watch
                .repos
                .iter()
                .map(|filter| filter.qualifier())
                .collect::<Vec<_>>()
                .join(" ")
        };
        let state = if watch.enabled {
            "enabled".green().to_string()
        } else {
            "disabled".red().to_string()
        };
        println!(
            "  {}  {}  {}  every {}s  {}",
            watch.id.as_str().dimmed(),
            watch.workspace_id,
            repos,
            watch.poll_interval_seconds,
            state
        );
    }
    Ok(())
}
