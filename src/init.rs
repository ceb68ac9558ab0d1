//! Initialization helpers for the application startup.

use crate::config::{Config, Settings};
use crate::engine::BlocklistStore;
use crate::logger::RequestLogger;
use crate::robots::RobotsTxt;
use crate::server::{
    build_router, ContentRouter, Handlers, IdentityResolver, RobotsHandler, Telemetry,
    TrapHandler,
};
use crate::site::StaticSite;
use crate::stats::StatsCollector;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Keep the HTTP stack quiet unless explicitly asked for
        for target in ["hyper", "tower"] {
            if !filter.contains(target) {
                filter.push_str(&format!(",{target}=warn"));
            }
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Everything the server needs, loaded from validated settings.
pub struct App {
    pub router: Router,
    pub store: Arc<BlocklistStore>,
}

/// Loads the blocklist, indexes the public directory, renders robots.txt and
/// wires the handlers. Any failure here must stop the process.
pub fn build_app(
    settings: &Settings,
    stats: Arc<StatsCollector>,
    logger: Arc<RequestLogger>,
) -> Result<App> {
    let store = Arc::new(
        BlocklistStore::load(&settings.blocklist_path).context("Failed to load blocklist")?,
    );

    let site = StaticSite::scan(&settings.public_root).with_context(|| {
        format!(
            "Failed to index public directory {}",
            settings.public_root.display()
        )
    })?;

    let robots = RobotsTxt::load(&settings.trap_path, &settings.public_root)
        .context("Failed to read robots.txt")?;

    let resolver = IdentityResolver::new(settings.behind_proxy);
    info!(
        "Trap at {} ({:?} client identity), {} blocked identities.",
        settings.trap_path,
        resolver,
        store.len()
    );

    let telemetry = Telemetry { stats, logger };
    let handlers = Handlers {
        trap: TrapHandler::new(store.clone(), resolver, telemetry.clone()),
        robots: RobotsHandler::new(robots.body().to_string(), resolver, telemetry.clone()),
        content: ContentRouter::new(
            store.clone(),
            site,
            resolver,
            settings.decoy_content.clone(),
            settings.not_found_content.clone(),
            telemetry,
        ),
    };

    Ok(App {
        router: build_router(&settings.trap_path, handlers),
        store,
    })
}
