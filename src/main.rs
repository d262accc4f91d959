use clap::{Args, Parser, Subcommand};
use matchday::autoclose::RunSource;
use matchday::config::AppConfig;
use matchday::context::AppContext;
use matchday::{jobs, server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "matchday", version, about = "Club community server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server and background jobs
    Serve,
    /// Close expired voting windows once and exit
    CloseVotes(CloseVotesArgs),
}

/// Exactly one of --dry-run or --apply must be given; there is no default
/// action for an operational close.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct CloseVotesArgs {
    /// Log the events that would be closed without committing
    #[arg(long)]
    dry_run: bool,
    /// Commit the close
    #[arg(long)]
    apply: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchday=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Serve => {
            let ctx = Arc::new(AppContext::new(config).await?);

            let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
            scheduler.start();

            server::serve((*ctx).clone()).await?;
        }
        Command::CloseVotes(args) => {
            let ctx = AppContext::new(config).await?;
            let report = ctx
                .engine
                .run(chrono::Utc::now(), RunSource::OpsScript, args.dry_run)
                .await?;

            let mode = if report.dry_run { "dry-run" } else { "apply" };
            println!(
                "close-votes ({}): selected={} closed={} failed_chunks={} plan={:?}",
                mode,
                report.selected.len(),
                report.closed,
                report.failed_chunks,
                report.plan
            );
            for id in &report.selected {
                println!("  {}", id);
            }
            if report.failed_chunks > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
