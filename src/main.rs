use anyhow::{Context, Result};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use bot_trap::config::Config;
use bot_trap::init::{build_app, setup_logging};
use bot_trap::logger::RequestLogger;
use bot_trap::server;
use bot_trap::stats::StatsCollector;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or("bot-trap.toml".to_string());
    let config_exists = std::path::Path::new(&config_path).exists();
    let config = if config_exists {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting bot-trap...");

    if !config_exists {
        info!("Config file {} not found, using defaults.", config_path);
    }

    // 3. Validate settings and load pages
    let settings = config.resolve().context("Invalid configuration")?;

    // 4. Stats & request log
    let stats = StatsCollector::new();
    let logger = RequestLogger::new(config.logging.clone(), Vec::new());

    // 5. Blocklist, site index, robots.txt, handlers
    let app = build_app(&settings, stats.clone(), logger)?;

    if config.stats.enable {
        stats.spawn_logger(
            Duration::from_secs(config.stats.log_interval_seconds.max(1)),
            app.store.clone(),
        );
    }

    // 6. Start Server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    server::run(listener, app.router).await?;

    info!(
        "Stopped with {} blocked identities in {}.",
        app.store.len(),
        app.store.path().display()
    );
    Ok(())
}
