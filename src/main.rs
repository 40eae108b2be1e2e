//! # SitePulse — scheduled-jobs daemon for marketing sites.
//!
//! Registers the built-in sitemap-submission task and runs the scheduler
//! until interrupted. There is exactly one scheduler per process, owned
//! here and started once.
//!
//! Usage:
//!   sitepulse                        # run the scheduler daemon
//!   sitepulse --once                 # submit the sitemap now and exit
//!   sitepulse --config ./dev.toml    # custom config path

mod sitemap;

use anyhow::Result;
use clap::Parser;
use futures::FutureExt;
use sitepulse_core::SitePulseConfig;
use sitepulse_scheduler::{Scheduler, TaskSpec};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sitepulse",
    version,
    about = "🌐 SitePulse — scheduled jobs for marketing sites"
)]
struct Cli {
    /// Config file path (default ~/.sitepulse/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Submit the sitemap once and exit
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sitepulse=debug,sitepulse_scheduler=debug"
    } else {
        "sitepulse=info,sitepulse_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let path = shellexpand::tilde(path).to_string();
            SitePulseConfig::load_from(std::path::Path::new(&path))?
        }
        None => SitePulseConfig::load()?,
    };

    // One outbound client, shared by every job that talks HTTP.
    let client = reqwest::Client::new();

    if cli.once {
        sitemap::submit_sitemap(&client, &config.sitemap).await?;
        return Ok(());
    }

    let scheduler = Scheduler::with_check_interval(config.scheduler.check_interval_secs);

    if config.sitemap.enabled {
        let sitemap_config = config.sitemap.clone();
        scheduler
            .add_task(TaskSpec::new(
                "sitemap-submit",
                "Sitemap submission",
                &config.sitemap.schedule,
                move || {
                    let client = client.clone();
                    let config = sitemap_config.clone();
                    async move { sitemap::submit_sitemap(&client, &config).await }.boxed()
                },
            ))
            .await;
    } else {
        tracing::info!("Sitemap submission disabled in config");
    }

    scheduler.start().await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    scheduler.stop().await;

    Ok(())
}
