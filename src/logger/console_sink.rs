use crate::config::LoggingConfig;
use crate::logger::types::{RequestAction, RequestLogEntry, RequestLogSink};
use tracing::info;

pub struct ConsoleLogSink {
    config: LoggingConfig,
}

impl ConsoleLogSink {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl RequestLogSink for ConsoleLogSink {
    async fn log(&self, entry: &RequestLogEntry) {
        let client = entry.client.as_deref().unwrap_or("-");
        let blocked = entry.action == RequestAction::Decoy;

        if self.config.format == "json" {
            info!(
                target: "bot_trap::request",
                client = %client,
                path = %entry.path,
                user_agent = ?entry.user_agent,
                action = entry.action.as_str(),
                status = entry.status,
                blocked = blocked,
                lat = %entry.latency_ms
            );
        } else {
            info!(
                "{}: {} -> {} [{}] blocked={} [{}ms]",
                client,
                entry.path,
                entry.action.as_str(),
                entry.status,
                blocked,
                entry.latency_ms
            );
        }
    }
}
