//! Binary entry point for the lab server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use sqli_lab::config::load_settings;
use sqli_lab::logging::init_logging;
use sqli_lab::querier::Querier;
use sqli_lab::registry::BackendRegistry;
use sqli_lab::seed::Seeder;
use sqli_lab::server::{router, AppState};

/// Deliberately injectable SQL endpoints for SQL-injection training.
#[derive(Parser)]
#[command(name = "sqli-lab")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (default: ./sqli-lab.toml if present)
    #[arg(long, short = 'c', env = "SQLI_LAB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configured one
    #[arg(long, short = 'b')]
    bind: Option<String>,

    /// Start serving without seeding the databases first
    #[arg(long)]
    skip_init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let settings = load_settings(cli.config.as_deref()).context("Failed to load configuration")?;

    let registry = Arc::new(BackendRegistry::from_settings(&settings));
    let seeder = Arc::new(Seeder::new(Arc::clone(&registry), &settings.seed));

    if settings.seed.on_startup && !cli.skip_init {
        let report = seeder.initialize_all().await;
        if !report.all_seeded() {
            tracing::warn!("some databases are not initialized; call /init once they are up");
        }
    }

    let app = router(AppState::new(Querier::new(registry), seeder));

    let bind = cli.bind.unwrap_or(settings.server.bind);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C, shutting down gracefully");
        })
        .await?;

    Ok(())
}
