//! Per-request log pipeline.
//!
//! Handlers hand entries over with `try_send` and never wait on a sink. Each
//! sink drains its own bounded channel on a spawned task; entries are
//! dropped when a sink falls behind.

pub mod console_sink;
pub mod types;

pub use self::console_sink::ConsoleLogSink;
pub use self::types::{RequestAction, RequestLogEntry, RequestLogSink};

use crate::config::LoggingConfig;
use std::sync::Arc;
use tokio::sync::mpsc;

const SINK_BUFFER: usize = 1000;

pub struct RequestLogger {
    sinks: Vec<mpsc::Sender<RequestLogEntry>>,
}

impl RequestLogger {
    /// Spawns one drain task per sink, so this must run inside a tokio runtime.
    pub fn new(config: LoggingConfig, extra_sinks: Vec<Box<dyn RequestLogSink>>) -> Arc<Self> {
        let mut all: Vec<Box<dyn RequestLogSink>> = Vec::new();
        if config.log_requests {
            all.push(Box::new(ConsoleLogSink::new(config.clone())));
        }
        all.extend(extra_sinks);

        let sinks = all
            .into_iter()
            .map(|sink| {
                let (tx, mut rx) = mpsc::channel::<RequestLogEntry>(SINK_BUFFER);
                tokio::spawn(async move {
                    while let Some(entry) = rx.recv().await {
                        sink.log(&entry).await;
                    }
                });
                tx
            })
            .collect();

        Arc::new(Self { sinks })
    }

    /// A logger with no sinks.
    pub fn disabled() -> Arc<Self> {
        Arc::new(Self { sinks: Vec::new() })
    }

    pub fn log(&self, entry: RequestLogEntry) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                let _ = sink.try_send(entry.clone());
            }
            let _ = last.try_send(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct TestLogSink {
        logs: Arc<Mutex<Vec<RequestLogEntry>>>,
    }

    #[async_trait::async_trait]
    impl RequestLogSink for TestLogSink {
        async fn log(&self, entry: &RequestLogEntry) {
            self.logs.lock().unwrap().push(entry.clone());
        }
    }

    fn entry(action: RequestAction) -> RequestLogEntry {
        RequestLogEntry {
            client: Some("1.2.3.4".to_string()),
            path: "/index.html".to_string(),
            user_agent: None,
            action,
            status: 200,
            latency_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_entries_reach_every_sink() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let config = LoggingConfig {
            log_requests: false,
            ..LoggingConfig::default()
        };

        let logger = RequestLogger::new(
            config,
            vec![
                Box::new(TestLogSink { logs: first.clone() }),
                Box::new(TestLogSink { logs: second.clone() }),
            ],
        );
        logger.log(entry(RequestAction::Decoy));
        logger.log(entry(RequestAction::Served));

        for _ in 0..20 {
            if first.lock().unwrap().len() == 2 && second.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let first = first.lock().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].action, RequestAction::Decoy);
        assert_eq!(second.lock().unwrap()[1].action, RequestAction::Served);
    }

    #[test]
    fn test_disabled_logger_accepts_entries() {
        RequestLogger::disabled().log(entry(RequestAction::NotFound));
    }
}
